//! Penumbra engine crate.
//!
//! Renders a single sprite together with a soft drop shadow:
//! silhouette mask → iterative Kawase blur on a half-resolution ping-pong
//! pair → composite (sheared shadow, then sprite) onto the visible surface.
//!
//! The crate also owns the platform + GPU runtime pieces the viewer needs
//! (window loop, surface management, headless device, readback).

pub mod device;
pub mod window;
pub mod core;

pub mod logging;
pub mod coords;
pub mod render;
pub mod frame;
