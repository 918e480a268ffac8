pub mod accum;
pub mod cdf_build;
pub mod composite;
pub mod renderer;
pub mod shaders;
pub mod targets;

pub use accum::{TransparentQuad, ViewportUniforms};
pub use renderer::OitRenderer;
pub use targets::OitTargets;
