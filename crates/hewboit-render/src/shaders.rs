//! WGSL source composition.
//!
//! Every shader is `constants preamble + params.wgsl + stage`, so numeric
//! constants and selector ids come from `hewboit_core::constants` only.

use hewboit_core::constants::{
    ALPHA_PREMULTIPLIED, ALPHA_STRAIGHT, DEPTH_SOURCE_CLIP, DEPTH_SOURCE_CLIP_REVERSED,
    DEPTH_SOURCE_LINEAR_EYE, HISTOGRAM_WORKGROUP_SIZE, OPTICAL_DEPTH_EPSILON,
    OPTICAL_DEPTH_QUANT_MAX, OPTICAL_DEPTH_SCALE, RESOLVE_EPSILON, REVEALAGE_EPSILON,
    WEIGHT_FIXED_EXPONENTIAL, WEIGHT_HISTOGRAM_EQUALIZED,
};

const PARAMS_WGSL: &str = include_str!("../../../shaders/oit/params.wgsl");
const ACCUM_WGSL: &str = include_str!("../../../shaders/oit/accum.wgsl");
const CDF_BUILD_WGSL: &str = include_str!("../../../shaders/oit/cdf_build.wgsl");
const COMPOSITE_WGSL: &str = include_str!("../../../shaders/oit/composite.wgsl");

/// Rust-side constants as WGSL `const` declarations.
pub fn constants_preamble() -> String {
    format!(
        "const HISTOGRAM_WORKGROUP_SIZE: u32 = {}u;\n\
         const OPTICAL_DEPTH_EPSILON: f32 = {:?};\n\
         const REVEALAGE_EPSILON: f32 = {:?};\n\
         const RESOLVE_EPSILON: f32 = {:?};\n\
         const OPTICAL_DEPTH_SCALE: f32 = {:?};\n\
         const OPTICAL_DEPTH_QUANT_MAX: u32 = {}u;\n\
         const DEPTH_SOURCE_LINEAR_EYE: u32 = {}u;\n\
         const DEPTH_SOURCE_CLIP: u32 = {}u;\n\
         const DEPTH_SOURCE_CLIP_REVERSED: u32 = {}u;\n\
         const WEIGHT_HISTOGRAM_EQUALIZED: u32 = {}u;\n\
         const WEIGHT_FIXED_EXPONENTIAL: u32 = {}u;\n\
         const ALPHA_STRAIGHT: u32 = {}u;\n\
         const ALPHA_PREMULTIPLIED: u32 = {}u;\n",
        HISTOGRAM_WORKGROUP_SIZE,
        OPTICAL_DEPTH_EPSILON,
        REVEALAGE_EPSILON,
        RESOLVE_EPSILON,
        OPTICAL_DEPTH_SCALE,
        OPTICAL_DEPTH_QUANT_MAX,
        DEPTH_SOURCE_LINEAR_EYE,
        DEPTH_SOURCE_CLIP,
        DEPTH_SOURCE_CLIP_REVERSED,
        WEIGHT_HISTOGRAM_EQUALIZED,
        WEIGHT_FIXED_EXPONENTIAL,
        ALPHA_STRAIGHT,
        ALPHA_PREMULTIPLIED,
    )
}

fn compose(stage: &str) -> String {
    let preamble = constants_preamble();
    format!("{preamble}\n{PARAMS_WGSL}\n{stage}")
}

pub fn accum_source() -> String {
    compose(ACCUM_WGSL)
}

pub fn cdf_build_source() -> String {
    compose(CDF_BUILD_WGSL)
}

pub fn composite_source() -> String {
    compose(COMPOSITE_WGSL)
}
