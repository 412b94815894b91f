//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue
//! - creating & configuring the window Surface (swapchain)
//! - acquiring frames and providing encoders/views for rendering
//! - a surfaceless device for offscreen rendering and tests

mod gpu;
mod headless;
mod init;
mod surface;

pub use gpu::{Gpu, GpuFrame};
pub use headless::{HeadlessGpu, HeadlessSurface};
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
