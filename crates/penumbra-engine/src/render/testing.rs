//! Helpers shared by GPU-backed tests.

use crate::coords::Viewport;
use crate::device::{GpuInit, HeadlessGpu};
use crate::render::readback::read_texture_rgba8;
use crate::render::texture::{SpriteImage, Texture2D};
use crate::render::RenderCtx;

/// Headless device, or `None` (with a note on stderr) on machines without
/// any usable adapter.
pub(crate) fn gpu_or_skip() -> Option<HeadlessGpu> {
    match HeadlessGpu::new(GpuInit::downlevel()) {
        Ok(gpu) => Some(gpu),
        Err(err) => {
            eprintln!("skipping GPU test: {err:#}");
            None
        }
    }
}

/// Context for passes that only touch offscreen targets.
pub(crate) fn offscreen_ctx(gpu: &HeadlessGpu) -> RenderCtx<'_> {
    RenderCtx::new(
        gpu.device(),
        gpu.queue(),
        wgpu::TextureFormat::Rgba8Unorm,
        Viewport::new(1.0, 1.0),
    )
}

pub(crate) fn read(gpu: &HeadlessGpu, texture: &Texture2D) -> Vec<u8> {
    read_texture_rgba8(gpu.device(), gpu.queue(), texture.texture()).expect("readback")
}

pub(crate) fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
}

/// `w`×`h` sprite filled with one color.
pub(crate) fn solid_sprite(w: u32, h: u32, rgba: [u8; 4]) -> SpriteImage {
    let pixels = rgba.iter().copied().cycle().take((w * h * 4) as usize).collect();
    SpriteImage::from_rgba8(w, h, pixels)
}

/// `size`² sprite: opaque `rgba` inside a centered circle of `radius` px,
/// fully transparent outside.
pub(crate) fn circle_sprite(size: u32, radius: f32, rgba: [u8; 4]) -> SpriteImage {
    let c = size as f32 / 2.0;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 + 0.5 - c;
            let dy = y as f32 + 0.5 - c;
            if dx * dx + dy * dy <= radius * radius {
                pixels.extend_from_slice(&rgba);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    SpriteImage::from_rgba8(size, size, pixels)
}

/// Overwrites `texture` with tightly packed RGBA8 `pixels`.
pub(crate) fn upload(gpu: &HeadlessGpu, texture: &Texture2D, pixels: &[u8]) {
    let (w, h) = texture.size();
    gpu.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: texture.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * w),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
}

/// `w`×`h` transparent image with an opaque black `side`² square centered.
pub(crate) fn centered_square(w: u32, h: u32, side: u32) -> Vec<u8> {
    let (x0, y0) = ((w - side) / 2, (h - side) / 2);
    let mut pixels = vec![0u8; (w * h * 4) as usize];
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            pixels[((y * w + x) * 4 + 3) as usize] = 255;
        }
    }
    pixels
}
