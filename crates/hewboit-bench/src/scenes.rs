use glam::{Vec2, Vec3, Vec4};
use hewboit_core::{DepthSource, OitSettings};
use hewboit_kernels::Fragment;
use hewboit_render::TransparentQuad;

/// Configuration for a single benchmark scene.
pub struct SceneConfig {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub layout: SceneLayout,
}

/// How the synthetic transparent quads are arranged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneLayout {
    /// Scattered small quads, most tiles empty.
    Sparse { count: u32 },
    /// Full-screen sheets at evenly spaced depths.
    StackedSheets { layers: u32 },
    /// Many small low-alpha quads clustered in a narrow depth band.
    DenseSmoke { count: u32 },
}

/// Return the standard suite of benchmark scenes.
pub fn standard_scenes() -> Vec<SceneConfig> {
    vec![
        SceneConfig {
            name: "sparse",
            width: 640,
            height: 480,
            layout: SceneLayout::Sparse { count: 200 },
        },
        SceneConfig {
            name: "stacked-sheets",
            width: 640,
            height: 480,
            layout: SceneLayout::StackedSheets { layers: 8 },
        },
        SceneConfig {
            name: "dense-smoke",
            width: 640,
            height: 480,
            layout: SceneLayout::DenseSmoke { count: 4000 },
        },
    ]
}

/// Deterministic hash in [0, 1) for scene generation.
fn unit_hash(seed: u32, salt: u32) -> f32 {
    let mut h = seed.wrapping_mul(0x9E37_79B9) ^ salt.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7FEB_352D);
    h ^= h >> 15;
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Build the scene's transparent quads. Depths are linear eye distances in
/// `[0, max_depth]`, clip depth is the same distance normalized.
pub fn generate_quads(config: &SceneConfig, settings: &OitSettings) -> Vec<TransparentQuad> {
    let size = Vec2::new(config.width as f32, config.height as f32);
    let max_depth = settings.max_depth;
    let quad = |min: Vec2, max: Vec2, color: Vec4, z: f32| {
        TransparentQuad::new(min, max.min(size), color, z * max_depth, z)
    };

    match config.layout {
        SceneLayout::Sparse { count } => (0..count)
            .map(|i| {
                let min = Vec2::new(unit_hash(i, 1), unit_hash(i, 2)) * size;
                let extent = Vec2::splat(8.0 + 24.0 * unit_hash(i, 3));
                let color = Vec4::new(unit_hash(i, 4), unit_hash(i, 5), unit_hash(i, 6), 0.5);
                quad(min, min + extent, color, unit_hash(i, 7))
            })
            .collect(),
        SceneLayout::StackedSheets { layers } => (0..layers)
            .map(|i| {
                let t = (i as f32 + 0.5) / layers as f32;
                let color = Vec3::new(t, 0.3, 1.0 - t).extend(0.3);
                quad(Vec2::ZERO, size, color, t)
            })
            .collect(),
        SceneLayout::DenseSmoke { count } => (0..count)
            .map(|i| {
                let center = size * 0.5
                    + (Vec2::new(unit_hash(i, 1), unit_hash(i, 2)) - 0.5) * size * 0.6;
                let half = Vec2::splat(4.0 + 12.0 * unit_hash(i, 3));
                let grey = 0.5 + 0.4 * unit_hash(i, 4);
                let z = 0.4 + 0.1 * unit_hash(i, 5);
                quad(
                    (center - half).max(Vec2::ZERO),
                    center + half,
                    Vec4::new(grey, grey, grey, 0.08),
                    z,
                )
            })
            .collect(),
    }
}

/// Rasterize quads into fragments at covered pixel centers.
pub fn rasterize(quads: &[TransparentQuad], settings: &OitSettings) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for quad in quads {
        let [x0, y0, x1, y1] = quad.rect;
        let [r, g, b, a] = quad.color;
        let [linear_depth, clip_depth] = quad.depth;
        for y in covered_span(y0, y1) {
            for x in covered_span(x0, x1) {
                fragments.push(Fragment::with_depth_source(
                    Vec2::new(x as f32 + 0.5, y as f32 + 0.5),
                    Vec3::new(r, g, b),
                    a,
                    settings.depth_source,
                    settings.max_depth,
                    linear_depth,
                    clip_depth,
                ));
            }
        }
    }
    fragments
}

/// Pixels whose centers lie in `[lo, hi)`.
fn covered_span(lo: f32, hi: f32) -> std::ops::Range<u32> {
    let first = (lo - 0.5).ceil().max(0.0) as u32;
    let end = (hi - 0.5).ceil().max(0.0) as u32;
    first..end
}

/// Settings used for every scene: defaults with linear eye depth.
pub fn bench_settings() -> OitSettings {
    OitSettings {
        depth_source: DepthSource::LinearEye,
        ..Default::default()
    }
}
