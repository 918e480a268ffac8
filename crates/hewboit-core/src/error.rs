use thiserror::Error;

/// Errors raised while configuring the transparency pipeline.
///
/// The per-frame kernels never fail; everything that can go wrong is caught
/// here, before any buffer is allocated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("num_bins must be at least 1")]
    ZeroBins,

    #[error("num_bins {num_bins} exceeds the CDF build workgroup width {max}")]
    BinsExceedWorkgroup { num_bins: u32, max: u32 },

    #[error("tile_size must be at least 1 pixel")]
    ZeroTileSize,

    #[error("max_depth must be finite and positive, got {0}")]
    InvalidMaxDepth(f32),

    #[error("exponential falloff must be finite and non-negative, got {0}")]
    InvalidFalloff(f32),

    #[error("viewport {width}x{height} has no pixels")]
    EmptyViewport { width: u32, height: u32 },

    #[error("{resource} holds {actual} cells, expected {expected}")]
    BufferSizeMismatch {
        resource: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to parse settings RON: {0}")]
    SettingsParseError(String),

    #[error("invalid settings: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ConfigError>),
}
