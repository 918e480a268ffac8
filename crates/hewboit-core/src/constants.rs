//! Single source of truth for shared constants.
//! These values are used by both Rust and WGSL; the render crate injects
//! them into shader preambles so the two never drift apart.

/// Lanes per CDF build workgroup. `num_bins` may not exceed this.
pub const HISTOGRAM_WORKGROUP_SIZE: u32 = 64;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// Default number of depth bins per tile.
pub const DEFAULT_NUM_BINS: u32 = 64;

/// Default depth-normalization reference in world units.
/// Roughly the distance of the farthest transparent surface.
pub const DEFAULT_MAX_DEPTH: f32 = 100.0;

/// Floor on `1 - alpha` before taking the log (ε₁).
pub const OPTICAL_DEPTH_EPSILON: f32 = 1e-6;

/// Floor on the previous frame's revealage before raising it to a power (ε₂).
pub const REVEALAGE_EPSILON: f32 = 1e-4;

/// Accumulated alpha below which the resolver discards the pixel (ε₃).
pub const RESOLVE_EPSILON: f32 = 1e-5;

/// Fixed-point scale for optical depth. One quantization step is 1/8192.
pub const OPTICAL_DEPTH_SCALE: f32 = 8192.0;

/// Ceiling for a single quantized contribution (u16::MAX).
/// The representable optical depth is therefore [0, 65535 / 8192) ≈ [0, 8).
pub const OPTICAL_DEPTH_QUANT_MAX: u32 = 65535;

/// Falloff rate used by the fixed exponential weighting strategy.
pub const DEFAULT_EXPONENTIAL_FALLOFF: f32 = 8.0;

/// WGSL selector values for `DepthSource`. Must match params.wgsl.
pub const DEPTH_SOURCE_LINEAR_EYE: u32 = 0;
pub const DEPTH_SOURCE_CLIP: u32 = 1;
pub const DEPTH_SOURCE_CLIP_REVERSED: u32 = 2;

/// WGSL selector values for `WeightStrategy`. Must match params.wgsl.
pub const WEIGHT_HISTOGRAM_EQUALIZED: u32 = 0;
pub const WEIGHT_FIXED_EXPONENTIAL: u32 = 1;

/// WGSL selector values for `AlphaMode`. Must match params.wgsl.
pub const ALPHA_STRAIGHT: u32 = 0;
pub const ALPHA_PREMULTIPLIED: u32 = 1;
