use glam::{UVec2, Vec2, Vec3};
use hewboit_core::math::{
    depth_bin, fixed_exponential_weight, normalize_depth, optical_depth, premultiply,
    quantize_optical_depth, tile_coord, transmittance_weight,
};
use hewboit_core::{AlphaMode, DepthSource, HistogramParams, WeightStrategy};
use rayon::prelude::*;

use crate::cdf::CdfTable;
use crate::histogram::HistogramBuffer;
use crate::images::{AccumImage, RevealageImage};

/// One shaded transparent fragment as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    /// Pixel-space position, origin top-left.
    pub position: Vec2,
    /// Final shaded linear color. Straight or premultiplied per `AlphaMode`.
    pub color: Vec3,
    pub alpha: f32,
    /// Normalized depth in [0, 1], 0 = near.
    pub depth: f32,
}

impl Fragment {
    /// Build a fragment, normalizing depth with the configured source.
    pub fn with_depth_source(
        position: Vec2,
        color: Vec3,
        alpha: f32,
        source: DepthSource,
        max_depth: f32,
        linear_depth: f32,
        clip_depth: f32,
    ) -> Self {
        Self {
            position,
            color,
            alpha,
            depth: normalize_depth(source, max_depth, linear_depth, clip_depth),
        }
    }
}

/// Everything one accumulation invocation reads and writes.
///
/// `prev_cdf` and `prev_revealage` are last frame's slots and are only read.
pub struct AccumulateContext<'a> {
    pub params: &'a HistogramParams,
    pub weight_strategy: WeightStrategy,
    pub alpha_mode: AlphaMode,
    pub histogram: &'a HistogramBuffer,
    pub prev_cdf: &'a CdfTable,
    pub prev_revealage: &'a RevealageImage,
    pub accum: &'a AccumImage,
    pub revealage: &'a RevealageImage,
}

/// Run the accumulator for a single fragment.
///
/// Returns false when the fragment lies outside the render target and was
/// dropped. Safe to call concurrently: every write is an atomic combine.
pub fn accumulate_fragment(ctx: &AccumulateContext<'_>, fragment: &Fragment) -> bool {
    let Some(pixel) = pixel_of(fragment.position, ctx.accum) else {
        return false;
    };
    let alpha = fragment.alpha.clamp(0.0, 1.0);
    let z = if fragment.depth.is_nan() {
        0.0
    } else {
        fragment.depth.clamp(0.0, 1.0)
    };

    let weight = match ctx.weight_strategy {
        WeightStrategy::HistogramEqualized => {
            let params = ctx.params;
            let tile = tile_coord(fragment.position, params.tile_size, params.tile_grid());
            let tile_index = params.tile_index(tile);
            let bin = depth_bin(z, params.num_bins);

            let quantized = quantize_optical_depth(optical_depth(alpha));
            if quantized > 0 {
                ctx.histogram.add(tile_index, bin, quantized);
            }

            let extent = params.covered_extent().as_vec2();
            let uv = fragment.position / extent;
            let equalized_z = ctx.prev_cdf.sample(uv.x, uv.y, z);
            let prev_revealage = ctx.prev_revealage.load(pixel.x, pixel.y);
            transmittance_weight(prev_revealage, equalized_z)
        }
        WeightStrategy::FixedExponential { falloff } => fixed_exponential_weight(z, falloff),
    };

    let premultiplied = premultiply(fragment.color, alpha, ctx.alpha_mode);
    ctx.accum.add(pixel.x, pixel.y, premultiplied * weight);
    ctx.revealage.multiply(pixel.x, pixel.y, 1.0 - alpha);
    true
}

/// Run the accumulator over every fragment in parallel. Returns how many
/// landed inside the render target.
pub fn accumulate_fragments(ctx: &AccumulateContext<'_>, fragments: &[Fragment]) -> usize {
    fragments
        .par_iter()
        .filter(|fragment| accumulate_fragment(ctx, fragment))
        .count()
}

fn pixel_of(position: Vec2, image: &AccumImage) -> Option<UVec2> {
    if !position.is_finite() || position.x < 0.0 || position.y < 0.0 {
        return None;
    }
    let pixel = position.floor().as_uvec2();
    (pixel.x < image.width() && pixel.y < image.height()).then_some(pixel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hewboit_core::constants::{OPTICAL_DEPTH_QUANT_MAX, REVEALAGE_EPSILON};
    use hewboit_core::OitSettings;

    struct Targets {
        params: HistogramParams,
        histogram: HistogramBuffer,
        prev_cdf: CdfTable,
        prev_revealage: RevealageImage,
        accum: AccumImage,
        revealage: RevealageImage,
    }

    impl Targets {
        fn new(width: u32, height: u32) -> Self {
            let params =
                HistogramParams::for_viewport(&OitSettings::default(), width, height).unwrap();
            Self {
                histogram: HistogramBuffer::new(&params),
                prev_cdf: CdfTable::new(&params),
                prev_revealage: RevealageImage::new(width, height),
                accum: AccumImage::new(width, height),
                revealage: RevealageImage::new(width, height),
                params,
            }
        }

        fn ctx(&self, weight_strategy: WeightStrategy) -> AccumulateContext<'_> {
            AccumulateContext {
                params: &self.params,
                weight_strategy,
                alpha_mode: AlphaMode::Straight,
                histogram: &self.histogram,
                prev_cdf: &self.prev_cdf,
                prev_revealage: &self.prev_revealage,
                accum: &self.accum,
                revealage: &self.revealage,
            }
        }
    }

    fn fragment(x: f32, y: f32, alpha: f32, depth: f32) -> Fragment {
        Fragment {
            position: Vec2::new(x, y),
            color: Vec3::new(1.0, 0.5, 0.25),
            alpha,
            depth,
        }
    }

    #[test]
    fn test_opaque_fragment_hits_quant_ceiling() {
        let t = Targets::new(64, 64);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        // depth 5.5 / 64 lands in bin 5 of tile (0, 0)
        assert!(accumulate_fragment(&ctx, &fragment(3.5, 7.5, 1.0, 5.5 / 64.0)));
        assert_eq!(t.histogram.load(0, 5), OPTICAL_DEPTH_QUANT_MAX);
        assert_eq!(t.histogram.snapshot().iter().filter(|&&v| v != 0).count(), 1);
    }

    #[test]
    fn test_first_frame_weight_is_one() {
        let t = Targets::new(32, 32);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        accumulate_fragment(&ctx, &fragment(4.0, 4.0, 0.5, 0.9));
        // Zeroed CDF -> pow(x, 0) = 1
        let accum = t.accum.load(4, 4);
        assert!((accum - glam::Vec4::new(0.5, 0.25, 0.125, 0.5)).abs().max_element() < 1e-6);
        assert!((t.revealage.load(4, 4) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_equalized_weight_uses_previous_frame() {
        let mut t = Targets::new(32, 32);
        t.prev_cdf = CdfTable::from_values(&t.params, vec![1.0; 64]).unwrap();
        t.prev_revealage.multiply(10, 10, 0.25);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        accumulate_fragment(&ctx, &fragment(10.2, 10.7, 1.0, 0.3));
        // weight = 0.25^1, color premultiplied by alpha 1
        let accum = t.accum.load(10, 10);
        assert!((accum.w - 0.25).abs() < 1e-6);
        assert!((accum.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_revealage_floor_applies() {
        let mut t = Targets::new(32, 32);
        t.prev_cdf = CdfTable::from_values(&t.params, vec![1.0; 64]).unwrap();
        t.prev_revealage.multiply(0, 0, 0.0);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        accumulate_fragment(&ctx, &fragment(0.0, 0.0, 1.0, 0.5));
        assert!((t.accum.load(0, 0).w - REVEALAGE_EPSILON).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_exponential_skips_histogram() {
        let t = Targets::new(32, 32);
        let ctx = t.ctx(WeightStrategy::FixedExponential { falloff: 2.0 });
        accumulate_fragment(&ctx, &fragment(1.0, 1.0, 0.5, 0.5));
        assert!(t.histogram.is_clear());
        let expected = 0.5 * (-1.0f32).exp();
        assert!((t.accum.load(1, 1).w - expected).abs() < 1e-6);
    }

    #[test]
    fn test_outside_fragments_are_dropped() {
        let t = Targets::new(32, 32);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        let fragments = [
            fragment(-1.0, 3.0, 0.5, 0.5),
            fragment(32.0, 3.0, 0.5, 0.5),
            fragment(f32::NAN, 3.0, 0.5, 0.5),
            fragment(31.9, 31.9, 0.5, 0.5),
        ];
        assert_eq!(accumulate_fragments(&ctx, &fragments), 1);
    }

    #[test]
    fn test_parallel_accumulation_matches_totals() {
        let t = Targets::new(64, 64);
        let ctx = t.ctx(WeightStrategy::HistogramEqualized);
        let fragments: Vec<Fragment> = (0..4096)
            .map(|i| fragment((i % 64) as f32, (i / 64) as f32, 0.5, 0.0))
            .collect();
        assert_eq!(accumulate_fragments(&ctx, &fragments), 4096);
        let per_fragment = quantize_optical_depth(optical_depth(0.5));
        // 1024 fragments per 32x32 tile, all in bin 0
        for tile in 0..4 {
            assert_eq!(t.histogram.load(tile, 0), per_fragment * 1024);
        }
    }

    #[test]
    fn test_with_depth_source() {
        let f = Fragment::with_depth_source(
            Vec2::ZERO,
            Vec3::ONE,
            0.5,
            DepthSource::LinearEye,
            50.0,
            25.0,
            0.9,
        );
        assert_eq!(f.depth, 0.5);
        let f = Fragment::with_depth_source(
            Vec2::ZERO,
            Vec3::ONE,
            0.5,
            DepthSource::ClipSpace { reversed_z: false },
            50.0,
            25.0,
            0.9,
        );
        assert_eq!(f.depth, 0.9);
    }
}
