pub mod constants;
pub mod error;
pub mod math;
pub mod params;
pub mod ping_pong;
pub mod settings;

pub use error::ConfigError;
pub use params::{GpuHistogramParams, HistogramParams};
pub use ping_pong::{FrameParity, PingPong};
pub use settings::{AlphaMode, DepthSource, OitSettings, WeightStrategy};
