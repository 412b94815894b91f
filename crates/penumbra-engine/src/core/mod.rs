//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and the application
//! driving the renderer. Keeps winit and surface handling out of app code.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, FrameOutcome};
