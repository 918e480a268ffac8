use glam::UVec2;

use crate::error::ConfigError;
use crate::settings::OitSettings;

/// Tile grid and binning configuration shared by the accumulator and the
/// CDF builder. Immutable for the duration of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramParams {
    pub tile_count_x: u32,
    pub tile_count_y: u32,
    pub num_bins: u32,
    pub tile_size: u32,
    /// Depth-normalization reference for `DepthSource::LinearEye`.
    pub max_depth: f32,
}

impl HistogramParams {
    /// Derive the tile grid covering a `width` x `height` viewport.
    pub fn for_viewport(
        settings: &OitSettings,
        width: u32,
        height: u32,
    ) -> Result<Self, ConfigError> {
        settings.validate().map_err(ConfigError::Invalid)?;
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyViewport { width, height });
        }
        if width % settings.tile_size != 0 || height % settings.tile_size != 0 {
            log::debug!(
                "{}x{} viewport is not a multiple of {} px tiles, edge tiles are partial",
                width,
                height,
                settings.tile_size
            );
        }
        Ok(Self {
            tile_count_x: width.div_ceil(settings.tile_size),
            tile_count_y: height.div_ceil(settings.tile_size),
            num_bins: settings.num_bins,
            tile_size: settings.tile_size,
            max_depth: settings.max_depth,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tile_count_x as usize * self.tile_count_y as usize
    }

    pub fn tile_grid(&self) -> UVec2 {
        UVec2::new(self.tile_count_x, self.tile_count_y)
    }

    /// Number of histogram cells (and CDF texels): tiles * bins.
    pub fn cell_count(&self) -> usize {
        self.tile_count() * self.num_bins as usize
    }

    /// Row-major tile index.
    pub fn tile_index(&self, tile: UVec2) -> usize {
        tile.y as usize * self.tile_count_x as usize + tile.x as usize
    }

    /// Flat (tile, bin) index into the histogram buffer.
    pub fn cell_index(&self, tile_index: usize, bin: u32) -> usize {
        tile_index * self.num_bins as usize + bin as usize
    }

    /// Pixel extent covered by the tile grid (>= the viewport).
    pub fn covered_extent(&self) -> UVec2 {
        self.tile_grid() * self.tile_size
    }

    /// Whether switching to `other` requires reallocating the histogram and
    /// CDF resources. Tile size or max depth alone only rewrite the uniform.
    pub fn needs_recreate(&self, other: &HistogramParams) -> bool {
        self.tile_count_x != other.tile_count_x
            || self.tile_count_y != other.tile_count_y
            || self.num_bins != other.num_bins
    }
}

/// GPU-uploadable histogram parameters. Must match `HistogramParams` in params.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuHistogramParams {
    pub tile_count_x: u32,
    pub tile_count_y: u32,
    pub num_bins: u32,
    pub tile_size: u32,
    pub max_depth: f32,
    /// Falloff for the fixed exponential strategy.
    pub falloff: f32,
    /// Packed selectors: depth source [0:7], weight strategy [8:15], alpha mode [16:23].
    pub modes: u32,
    pub _pad: u32,
}

impl GpuHistogramParams {
    pub fn new(params: &HistogramParams, settings: &OitSettings) -> Self {
        let modes = settings.depth_source.gpu_id()
            | (settings.weight_strategy.gpu_id() << 8)
            | (settings.alpha_mode.gpu_id() << 16);
        Self {
            tile_count_x: params.tile_count_x,
            tile_count_y: params.tile_count_y,
            num_bins: params.num_bins,
            tile_size: params.tile_size,
            max_depth: params.max_depth,
            falloff: settings.weight_strategy.falloff(),
            modes,
            _pad: 0,
        }
    }

    pub fn depth_source(&self) -> u32 {
        self.modes & 0xFF
    }

    pub fn weight_strategy(&self) -> u32 {
        (self.modes >> 8) & 0xFF
    }

    pub fn alpha_mode(&self) -> u32 {
        (self.modes >> 16) & 0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AlphaMode, DepthSource, WeightStrategy};

    #[test]
    fn test_tile_counts_round_up() {
        let params = HistogramParams::for_viewport(&OitSettings::default(), 1920, 1080).unwrap();
        assert_eq!(params.tile_count_x, 60);
        // 1080 / 32 = 33.75 -> 34
        assert_eq!(params.tile_count_y, 34);
        assert_eq!(params.cell_count(), 60 * 34 * 64);
        assert_eq!(params.covered_extent(), UVec2::new(1920, 1088));
    }

    #[test]
    fn test_empty_viewport_rejected() {
        let err = HistogramParams::for_viewport(&OitSettings::default(), 0, 720).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmptyViewport {
                width: 0,
                height: 720
            }
        );
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = OitSettings {
            num_bins: 100,
            ..Default::default()
        };
        assert!(matches!(
            HistogramParams::for_viewport(&settings, 64, 64),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_cell_index_layout() {
        let params = HistogramParams::for_viewport(&OitSettings::default(), 96, 64).unwrap();
        assert_eq!(params.tile_index(UVec2::new(2, 1)), 5);
        assert_eq!(params.cell_index(0, 0), 0);
        assert_eq!(params.cell_index(1, 0), 64);
        assert_eq!(params.cell_index(5, 63), 5 * 64 + 63);
    }

    #[test]
    fn test_needs_recreate() {
        let base = HistogramParams::for_viewport(&OitSettings::default(), 640, 480).unwrap();
        let mut deeper = base;
        deeper.max_depth = 500.0;
        assert!(!base.needs_recreate(&deeper));

        let bigger = HistogramParams::for_viewport(&OitSettings::default(), 1280, 480).unwrap();
        assert!(base.needs_recreate(&bigger));

        let mut fewer_bins = base;
        fewer_bins.num_bins = 32;
        assert!(base.needs_recreate(&fewer_bins));
    }

    #[test]
    fn test_gpu_params_size() {
        // Must be a multiple of 16 for WebGPU uniform alignment
        assert_eq!(std::mem::size_of::<GpuHistogramParams>(), 32);
        assert_eq!(std::mem::size_of::<GpuHistogramParams>() % 16, 0);
    }

    #[test]
    fn test_gpu_params_mode_packing() {
        let settings = OitSettings {
            depth_source: DepthSource::ClipSpace { reversed_z: true },
            weight_strategy: WeightStrategy::FixedExponential { falloff: 3.0 },
            alpha_mode: AlphaMode::Premultiplied,
            ..Default::default()
        };
        let params = HistogramParams::for_viewport(&settings, 64, 64).unwrap();
        let gpu = GpuHistogramParams::new(&params, &settings);
        assert_eq!(gpu.depth_source(), settings.depth_source.gpu_id());
        assert_eq!(gpu.weight_strategy(), settings.weight_strategy.gpu_id());
        assert_eq!(gpu.alpha_mode(), settings.alpha_mode.gpu_id());
        assert_eq!(gpu.falloff, 3.0);
        assert_eq!(gpu.tile_count_x, 2);
    }
}
