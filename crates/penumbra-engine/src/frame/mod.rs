//! Per-frame orchestration: configuration, long-lived GPU state, and the
//! driver that encodes mask → blur → composite each frame.

mod config;
mod driver;
mod state;

pub use config::{ConfigError, PipelineConfig, SpriteConfig, SurfaceConfig};
pub use driver::{FrameDriver, FrameStage};
pub use state::FrameState;
