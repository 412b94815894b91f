//! Shadow render pipeline.
//!
//! Three passes per frame, all encoded on one command encoder:
//! 1. [`mask::MaskPass`] draws the sprite silhouette into offscreen slot A.
//! 2. [`blur::BlurFilter`] diffuses it over the [`offscreen::OffscreenTargetPair`].
//! 3. [`composite::CompositePass`] draws the sheared shadow, then the sprite,
//!    onto the visible surface.
//!
//! Binding convention: every pass opens its own render pass and sets its
//! pipeline, bind groups, vertex buffers and viewport before drawing. Nothing
//! is inherited from a previous pass.
//!
//! Each pass owns its GPU objects (pipelines, uniform rings, cached bind
//! groups). They are created once; steady-state frames only write uniforms.

mod ctx;
mod error;

pub mod blur;
pub mod common;
pub mod composite;
pub mod mask;
pub mod offscreen;
pub mod program;
pub mod readback;
pub mod shadow;
pub mod texture;

#[cfg(test)]
pub(crate) mod testing;

pub use ctx::{RenderCtx, RenderTarget};
pub use error::RenderError;
