use serde::{Deserialize, Serialize};

use crate::constants::{
    ALPHA_PREMULTIPLIED, ALPHA_STRAIGHT, DEFAULT_EXPONENTIAL_FALLOFF, DEFAULT_MAX_DEPTH,
    DEFAULT_NUM_BINS, DEFAULT_TILE_SIZE, DEPTH_SOURCE_CLIP, DEPTH_SOURCE_CLIP_REVERSED,
    DEPTH_SOURCE_LINEAR_EYE, HISTOGRAM_WORKGROUP_SIZE, WEIGHT_FIXED_EXPONENTIAL,
    WEIGHT_HISTOGRAM_EQUALIZED,
};
use crate::error::ConfigError;

/// Where the normalized fragment depth comes from.
///
/// The two definitions are distinct configurations. They are never blended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DepthSource {
    /// Linear eye-space distance divided by `max_depth`, clamped to [0, 1].
    #[default]
    LinearEye,
    /// Clip-space depth component used directly. With `reversed_z` the
    /// value is flipped so that 0 is still near.
    ClipSpace { reversed_z: bool },
}

impl DepthSource {
    /// WGSL selector for this variant.
    pub fn gpu_id(self) -> u32 {
        match self {
            DepthSource::LinearEye => DEPTH_SOURCE_LINEAR_EYE,
            DepthSource::ClipSpace { reversed_z: false } => DEPTH_SOURCE_CLIP,
            DepthSource::ClipSpace { reversed_z: true } => DEPTH_SOURCE_CLIP_REVERSED,
        }
    }
}

/// How each fragment's blend weight is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightStrategy {
    /// Per-tile histogram equalization with one frame of CDF latency.
    #[default]
    HistogramEqualized,
    /// Fixed global falloff `exp(-falloff * z)`. No histogram, no CDF build.
    FixedExponential { falloff: f32 },
}

impl WeightStrategy {
    pub fn gpu_id(self) -> u32 {
        match self {
            WeightStrategy::HistogramEqualized => WEIGHT_HISTOGRAM_EQUALIZED,
            WeightStrategy::FixedExponential { .. } => WEIGHT_FIXED_EXPONENTIAL,
        }
    }

    /// Whether this strategy needs the histogram and CDF passes at all.
    pub fn uses_histogram(self) -> bool {
        matches!(self, WeightStrategy::HistogramEqualized)
    }

    /// Falloff rate, or the default when the strategy has none.
    pub fn falloff(self) -> f32 {
        match self {
            WeightStrategy::FixedExponential { falloff } => falloff,
            WeightStrategy::HistogramEqualized => DEFAULT_EXPONENTIAL_FALLOFF,
        }
    }
}

/// Whether incoming fragment colors are already multiplied by alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AlphaMode {
    #[default]
    Straight,
    Premultiplied,
}

impl AlphaMode {
    pub fn gpu_id(self) -> u32 {
        match self {
            AlphaMode::Straight => ALPHA_STRAIGHT,
            AlphaMode::Premultiplied => ALPHA_PREMULTIPLIED,
        }
    }
}

/// Per-camera transparency configuration.
///
/// Example RON:
/// ```ignore
/// (
///     tile_size: 32,
///     num_bins: 64,
///     max_depth: 100.0,
///     depth_source: ClipSpace(reversed_z: true),
///     weight_strategy: HistogramEqualized,
///     alpha_mode: Straight,
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OitSettings {
    pub tile_size: u32,
    pub num_bins: u32,
    /// Maximum scene depth in world units used to normalize linear depth
    /// into [0, 1]. Set it to about the farthest transparent object.
    pub max_depth: f32,
    pub depth_source: DepthSource,
    pub weight_strategy: WeightStrategy,
    pub alpha_mode: AlphaMode,
}

impl Default for OitSettings {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            num_bins: DEFAULT_NUM_BINS,
            max_depth: DEFAULT_MAX_DEPTH,
            depth_source: DepthSource::default(),
            weight_strategy: WeightStrategy::default(),
            alpha_mode: AlphaMode::default(),
        }
    }
}

impl OitSettings {
    /// Check every constraint the kernels rely on. Collects all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.num_bins == 0 {
            errors.push(ConfigError::ZeroBins);
        }
        if self.num_bins > HISTOGRAM_WORKGROUP_SIZE {
            errors.push(ConfigError::BinsExceedWorkgroup {
                num_bins: self.num_bins,
                max: HISTOGRAM_WORKGROUP_SIZE,
            });
        }
        if self.tile_size == 0 {
            errors.push(ConfigError::ZeroTileSize);
        }
        if !self.max_depth.is_finite() || self.max_depth <= 0.0 {
            errors.push(ConfigError::InvalidMaxDepth(self.max_depth));
        }
        if let WeightStrategy::FixedExponential { falloff } = self.weight_strategy {
            if !falloff.is_finite() || falloff < 0.0 {
                errors.push(ConfigError::InvalidFalloff(falloff));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Parse settings from a RON string and validate them.
pub fn load_settings_from_str(ron_str: &str) -> Result<OitSettings, ConfigError> {
    let options = ron::Options::default();
    let settings: OitSettings = options
        .from_str(ron_str)
        .map_err(|e| ConfigError::SettingsParseError(e.to_string()))?;
    if let Err(errors) = settings.validate() {
        for e in &errors {
            log::warn!("OIT settings validation error: {e}");
        }
        return Err(ConfigError::Invalid(errors));
    }
    Ok(settings)
}
