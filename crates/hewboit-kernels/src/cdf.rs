use hewboit_core::{ConfigError, HistogramParams};

/// Per-tile cumulative distribution of optical depth over depth bins.
///
/// Stored tile-major (`tile * num_bins + bin`) so each tile's column is a
/// contiguous slice the builder can own exclusively. Sampling treats the
/// table as a `tile_count_x x tile_count_y x num_bins` 3D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct CdfTable {
    values: Vec<f32>,
    tile_count_x: u32,
    tile_count_y: u32,
    num_bins: u32,
}

impl CdfTable {
    /// Zero-filled table. Before the first build every fragment samples
    /// `equalized_z = 0` and gets weight 1.
    pub fn new(params: &HistogramParams) -> Self {
        Self {
            values: vec![0.0; params.cell_count()],
            tile_count_x: params.tile_count_x,
            tile_count_y: params.tile_count_y,
            num_bins: params.num_bins,
        }
    }

    pub fn from_values(params: &HistogramParams, values: Vec<f32>) -> Result<Self, ConfigError> {
        if values.len() != params.cell_count() {
            return Err(ConfigError::BufferSizeMismatch {
                resource: "cdf",
                expected: params.cell_count(),
                actual: values.len(),
            });
        }
        Ok(Self {
            values,
            tile_count_x: params.tile_count_x,
            tile_count_y: params.tile_count_y,
            num_bins: params.num_bins,
        })
    }

    pub fn num_bins(&self) -> u32 {
        self.num_bins
    }

    pub fn get(&self, tx: u32, ty: u32, bin: u32) -> f32 {
        let tile = ty as usize * self.tile_count_x as usize + tx as usize;
        self.values[tile * self.num_bins as usize + bin as usize]
    }

    pub fn tile(&self, tile: usize) -> &[f32] {
        let n = self.num_bins as usize;
        &self.values[tile * n..(tile + 1) * n]
    }

    pub fn tile_mut(&mut self, tile: usize) -> &mut [f32] {
        let n = self.num_bins as usize;
        &mut self.values[tile * n..(tile + 1) * n]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Trilinear sample at normalized `(u, v, w)`, clamp-to-edge.
    ///
    /// Texel `i` along an axis of size `n` is centered at `(i + 0.5) / n`,
    /// the same convention as a linear-filtered 3D texture.
    pub fn sample(&self, u: f32, v: f32, w: f32) -> f32 {
        let (x0, x1, fx) = axis_taps(u, self.tile_count_x);
        let (y0, y1, fy) = axis_taps(v, self.tile_count_y);
        let (z0, z1, fz) = axis_taps(w, self.num_bins);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let plane = |z: u32| {
            let row0 = lerp(self.get(x0, y0, z), self.get(x1, y0, z), fx);
            let row1 = lerp(self.get(x0, y1, z), self.get(x1, y1, z), fx);
            lerp(row0, row1, fy)
        };
        lerp(plane(z0), plane(z1), fz)
    }
}

/// Neighboring texel indices and blend factor along one axis.
fn axis_taps(coord: f32, size: u32) -> (u32, u32, f32) {
    let last = size.saturating_sub(1) as f32;
    let coord = if coord.is_nan() { 0.0 } else { coord };
    let texel = (coord * size as f32 - 0.5).clamp(0.0, last);
    let lo = texel.floor();
    let hi = (lo + 1.0).min(last);
    (lo as u32, hi as u32, texel - lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hewboit_core::OitSettings;

    fn params(width: u32, height: u32, num_bins: u32) -> HistogramParams {
        let settings = OitSettings {
            num_bins,
            ..Default::default()
        };
        HistogramParams::for_viewport(&settings, width, height).unwrap()
    }

    #[test]
    fn test_new_is_zeroed() {
        let cdf = CdfTable::new(&params(64, 32, 8));
        assert_eq!(cdf.values().len(), 2 * 8);
        assert!(cdf.values().iter().all(|&v| v == 0.0));
        assert_eq!(cdf.sample(0.3, 0.7, 0.9), 0.0);
    }

    #[test]
    fn test_tile_major_layout() {
        let p = params(64, 64, 4);
        let values: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let cdf = CdfTable::from_values(&p, values).unwrap();
        // tile (1, 1) is tile index 3
        assert_eq!(cdf.tile(3), &[12.0, 13.0, 14.0, 15.0]);
        assert_eq!(cdf.get(1, 1, 2), 14.0);
        assert_eq!(cdf.get(1, 0, 0), 4.0);
    }

    #[test]
    fn test_from_values_validates_size() {
        let err = CdfTable::from_values(&params(32, 32, 4), vec![0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::BufferSizeMismatch {
                resource: "cdf",
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_sample_hits_texel_centers_exactly() {
        let p = params(32, 32, 4);
        let cdf = CdfTable::from_values(&p, vec![0.1, 0.2, 0.6, 1.0]).unwrap();
        assert!((cdf.sample(0.5, 0.5, 0.125) - 0.1).abs() < 1e-6);
        assert!((cdf.sample(0.5, 0.5, 0.625) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_sample_interpolates_between_bins() {
        let p = params(32, 32, 4);
        let cdf = CdfTable::from_values(&p, vec![0.0, 0.4, 0.8, 1.0]).unwrap();
        // Halfway between texel 1 (0.375) and texel 2 (0.625)
        assert!((cdf.sample(0.5, 0.5, 0.5) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_to_edge() {
        let p = params(32, 32, 4);
        let cdf = CdfTable::from_values(&p, vec![0.25, 0.5, 0.75, 1.0]).unwrap();
        assert_eq!(cdf.sample(0.5, 0.5, 0.0), 0.25);
        assert_eq!(cdf.sample(0.5, 0.5, 1.0), 1.0);
        assert_eq!(cdf.sample(-3.0, 9.0, 2.0), 1.0);
    }

    #[test]
    fn test_sample_interpolates_between_tiles() {
        let p = params(64, 32, 1);
        let cdf = CdfTable::from_values(&p, vec![0.0, 1.0]).unwrap();
        assert!((cdf.sample(0.5, 0.5, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(cdf.sample(0.25, 0.5, 0.5), 0.0);
        assert_eq!(cdf.sample(0.75, 0.5, 0.5), 1.0);
    }
}
