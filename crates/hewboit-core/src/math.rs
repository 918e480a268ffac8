use glam::{UVec2, Vec2, Vec3, Vec4};

use crate::constants::{
    OPTICAL_DEPTH_EPSILON, OPTICAL_DEPTH_QUANT_MAX, OPTICAL_DEPTH_SCALE, REVEALAGE_EPSILON,
};
use crate::settings::{AlphaMode, DepthSource};

/// Convert opacity into additive optical depth: `-ln(max(1 - alpha, ε₁))`.
/// Alpha is clamped to [0, 1] first.
pub fn optical_depth(alpha: f32) -> f32 {
    let alpha = alpha.clamp(0.0, 1.0);
    -(1.0 - alpha).max(OPTICAL_DEPTH_EPSILON).ln()
}

/// Quantize optical depth to the histogram's fixed-point format.
/// Clamps to [0, OPTICAL_DEPTH_QUANT_MAX].
pub fn quantize_optical_depth(od: f32) -> u32 {
    if od.is_nan() || od <= 0.0 {
        return 0;
    }
    let scaled = (od * OPTICAL_DEPTH_SCALE).round();
    if scaled >= OPTICAL_DEPTH_QUANT_MAX as f32 {
        OPTICAL_DEPTH_QUANT_MAX
    } else {
        scaled as u32
    }
}

/// Convert a fixed-point histogram value back to optical depth.
pub fn dequantize_optical_depth(quantized: u32) -> f32 {
    quantized as f32 / OPTICAL_DEPTH_SCALE
}

/// Depth bin for a normalized depth: `min(floor(z * n), n - 1)`.
/// Out-of-range depths clamp; NaN maps to bin 0.
pub fn depth_bin(z: f32, num_bins: u32) -> u32 {
    debug_assert!(num_bins > 0, "num_bins must be positive");
    let z = if z.is_nan() { 0.0 } else { z.clamp(0.0, 1.0) };
    ((z * num_bins as f32).floor() as u32).min(num_bins.saturating_sub(1))
}

/// Tile containing a pixel position, clamped to the tile grid.
pub fn tile_coord(position: Vec2, tile_size: u32, tile_count: UVec2) -> UVec2 {
    let px = position.max(Vec2::ZERO).floor().as_uvec2();
    let tile = px / tile_size.max(1);
    tile.min(tile_count.saturating_sub(UVec2::ONE))
}

/// Equalized transmittance weight: `pow(max(prev_revealage, ε₂), equalized_z)`.
pub fn transmittance_weight(prev_revealage: f32, equalized_z: f32) -> f32 {
    prev_revealage.max(REVEALAGE_EPSILON).powf(equalized_z)
}

/// Weight of the fixed exponential strategy: `exp(-falloff * z)`.
pub fn fixed_exponential_weight(z: f32, falloff: f32) -> f32 {
    (-falloff * z).exp()
}

/// Produce a premultiplied RGBA value from a shaded fragment.
pub fn premultiply(color: Vec3, alpha: f32, mode: AlphaMode) -> Vec4 {
    match mode {
        AlphaMode::Straight => (color * alpha).extend(alpha),
        AlphaMode::Premultiplied => color.extend(alpha),
    }
}

/// Normalize a fragment depth into [0, 1] with 0 = near.
///
/// `linear_depth` is the positive eye-space distance, `clip_depth` the
/// fragment's depth-buffer value. Only the one selected by `source` is read.
pub fn normalize_depth(
    source: DepthSource,
    max_depth: f32,
    linear_depth: f32,
    clip_depth: f32,
) -> f32 {
    let z = match source {
        DepthSource::LinearEye => linear_depth / max_depth,
        DepthSource::ClipSpace { reversed_z: false } => clip_depth,
        DepthSource::ClipSpace { reversed_z: true } => 1.0 - clip_depth,
    };
    if z.is_nan() {
        0.0
    } else {
        z.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OPTICAL_DEPTH_SCALE;

    #[test]
    fn test_optical_depth_endpoints() {
        assert_eq!(optical_depth(0.0), 0.0);
        let opaque = optical_depth(1.0);
        assert!((opaque - 13.815_51).abs() < 1e-3, "got {opaque}");
        // Out-of-range alpha is clamped, not propagated
        assert_eq!(optical_depth(-0.5), 0.0);
        assert_eq!(optical_depth(2.0), opaque);
    }

    #[test]
    fn test_optical_depth_is_additive() {
        // Two layers of alpha 0.5 absorb as much as one layer of alpha 0.75
        let two = optical_depth(0.5) * 2.0;
        let one = optical_depth(0.75);
        assert!((two - one).abs() < 1e-5);
    }

    #[test]
    fn test_quantize_roundtrip_within_one_step() {
        let step = 1.0 / OPTICAL_DEPTH_SCALE;
        let max = dequantize_optical_depth(OPTICAL_DEPTH_QUANT_MAX);
        let mut od = 0.0f32;
        while od < max {
            let back = dequantize_optical_depth(quantize_optical_depth(od));
            assert!(
                (back - od).abs() <= step,
                "roundtrip error too large at {od}: {back}"
            );
            od += 0.0137;
        }
    }

    #[test]
    fn test_quantize_clamps() {
        assert_eq!(quantize_optical_depth(-1.0), 0);
        assert_eq!(quantize_optical_depth(f32::NAN), 0);
        assert_eq!(quantize_optical_depth(1e9), OPTICAL_DEPTH_QUANT_MAX);
        assert_eq!(
            quantize_optical_depth(optical_depth(1.0)),
            OPTICAL_DEPTH_QUANT_MAX
        );
    }

    #[test]
    fn test_depth_bin_edges() {
        assert_eq!(depth_bin(0.0, 64), 0);
        assert_eq!(depth_bin(1.0, 64), 63);
        assert_eq!(depth_bin(0.5, 64), 32);
        assert_eq!(depth_bin(5.5 / 64.0, 64), 5);
        assert_eq!(depth_bin(-3.0, 64), 0);
        assert_eq!(depth_bin(7.0, 64), 63);
        assert_eq!(depth_bin(f32::NAN, 64), 0);
        assert_eq!(depth_bin(0.99, 1), 0);
    }

    #[test]
    fn test_tile_coord_clamps_to_grid() {
        let counts = UVec2::new(4, 3);
        assert_eq!(tile_coord(Vec2::new(0.5, 0.5), 32, counts), UVec2::ZERO);
        assert_eq!(tile_coord(Vec2::new(32.0, 65.0), 32, counts), UVec2::new(1, 2));
        assert_eq!(
            tile_coord(Vec2::new(5000.0, 5000.0), 32, counts),
            UVec2::new(3, 2)
        );
        assert_eq!(tile_coord(Vec2::new(-4.0, -1.0), 32, counts), UVec2::ZERO);
    }

    #[test]
    fn test_transmittance_weight() {
        // Empty history: no attenuation regardless of depth
        assert!((transmittance_weight(1.0, 0.7) - 1.0).abs() < 1e-6);
        // Equalized depth 0 always weighs 1
        assert_eq!(transmittance_weight(0.3, 0.0), 1.0);
        // Zero revealage is floored, never 0^z
        let w = transmittance_weight(0.0, 1.0);
        assert!((w - REVEALAGE_EPSILON).abs() < 1e-9);
        // Farther fragments weigh less under the same history
        assert!(transmittance_weight(0.25, 0.9) < transmittance_weight(0.25, 0.1));
    }

    #[test]
    fn test_fixed_exponential_weight_monotonic() {
        assert_eq!(fixed_exponential_weight(0.0, 8.0), 1.0);
        assert!(fixed_exponential_weight(0.5, 8.0) > fixed_exponential_weight(0.9, 8.0));
    }

    #[test]
    fn test_premultiply_modes() {
        let c = Vec3::new(1.0, 0.5, 0.25);
        assert_eq!(
            premultiply(c, 0.5, AlphaMode::Straight),
            Vec4::new(0.5, 0.25, 0.125, 0.5)
        );
        assert_eq!(
            premultiply(c, 0.5, AlphaMode::Premultiplied),
            Vec4::new(1.0, 0.5, 0.25, 0.5)
        );
    }

    #[test]
    fn test_normalize_depth_variants() {
        let linear = normalize_depth(DepthSource::LinearEye, 100.0, 25.0, 0.9);
        assert!((linear - 0.25).abs() < 1e-6);
        assert_eq!(normalize_depth(DepthSource::LinearEye, 100.0, 250.0, 0.0), 1.0);

        let clip = normalize_depth(DepthSource::ClipSpace { reversed_z: false }, 100.0, 25.0, 0.9);
        assert!((clip - 0.9).abs() < 1e-6);
        let reversed =
            normalize_depth(DepthSource::ClipSpace { reversed_z: true }, 100.0, 25.0, 0.9);
        assert!((reversed - 0.1).abs() < 1e-6);
    }
}
