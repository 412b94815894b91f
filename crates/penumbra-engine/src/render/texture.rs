//! Sampled 2D textures: the sprite image and the offscreen color attachments.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{RenderCtx, RenderError};

/// Process-unique texture identity, used to key cached bind groups.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Channel layout of the source image. GPU storage is always RGBA8.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PixelFormat {
    Rgb,
    Rgba,
}

/// Owned GPU image + view + sampler.
///
/// Every constructor here uses a linear, edge-clamped sampler: the blur
/// relies on hardware interpolation between texels, and the shadow mask is
/// magnified when composited.
pub struct Texture2D {
    id: TextureId,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    source_format: PixelFormat,
    filter: wgpu::FilterMode,
}

impl Texture2D {
    /// Uploads tightly packed RGBA8 pixels (top row first).
    pub fn from_rgba8(
        ctx: &RenderCtx<'_>,
        label: &'static str,
        width: u32,
        height: u32,
        pixels: &[u8],
        format: wgpu::TextureFormat,
        source_format: PixelFormat,
    ) -> Result<Self, RenderError> {
        check_dimensions(ctx.device, label, width, height)?;
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::resource(
                label,
                format!("expected {expected} bytes of RGBA8, got {}", pixels.len()),
            ));
        }

        let texture = Self::create_raw(
            ctx.device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        Ok(Self::wrap(ctx.device, label, texture, source_format))
    }

    /// Fully transparent texture. Drawn through the tint program it produces
    /// no visible pixels (every texel fails the alpha test).
    pub fn transparent(
        ctx: &RenderCtx<'_>,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let pixels = vec![0u8; width as usize * height as usize * 4];
        Self::from_rgba8(ctx, label, width, height, &pixels, format, PixelFormat::Rgba)
    }

    /// Color attachment that can also be sampled, read back and seeded.
    pub(crate) fn render_target(
        device: &wgpu::Device,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        check_dimensions(device, label, width, height)?;
        let texture = Self::create_raw(
            device,
            label,
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        Ok(Self::wrap(device, label, texture, PixelFormat::Rgba))
    }

    fn create_raw(
        device: &wgpu::Device,
        label: &'static str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    }

    fn wrap(
        device: &wgpu::Device,
        label: &'static str,
        texture: wgpu::Texture,
        source_format: PixelFormat,
    ) -> Self {
        let filter = wgpu::FilterMode::Linear;
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        Self {
            id: TextureId::next(),
            width: texture.width(),
            height: texture.height(),
            texture,
            view,
            sampler,
            source_format,
            filter,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    pub fn source_format(&self) -> PixelFormat {
        self.source_format
    }

    pub fn is_linear(&self) -> bool {
        self.filter == wgpu::FilterMode::Linear
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Builds a bind group for a `sampled_texture_layout`.
    pub(crate) fn bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &'static str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Frees the GPU allocation now instead of when the last handle drops.
    pub fn release(self) {
        self.texture.destroy();
    }
}

fn check_dimensions(
    device: &wgpu::Device,
    what: &'static str,
    width: u32,
    height: u32,
) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::resource(
            what,
            format!("zero-area texture ({width}x{height})"),
        ));
    }
    let max = device.limits().max_texture_dimension_2d;
    if width > max || height > max {
        return Err(RenderError::resource(
            what,
            format!("{width}x{height} exceeds the device limit of {max}"),
        ));
    }
    Ok(())
}

/// Sprite storage format matching the surface's color space, so texels pass
/// through the composite unchanged.
pub fn sprite_format_for(surface_format: wgpu::TextureFormat) -> wgpu::TextureFormat {
    if surface_format.is_srgb() {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

// ── sprite loading ────────────────────────────────────────────────────────

/// Decoded sprite image, ready for upload.
#[derive(Debug, Clone)]
pub struct SpriteImage {
    pub width: u32,
    pub height: u32,
    pub source_format: PixelFormat,
    /// RGBA8, top row first.
    pub pixels: Vec<u8>,
}

impl SpriteImage {
    /// Decodes an image file. RGB sources are expanded to opaque RGBA.
    pub fn decode(path: &Path) -> Result<Self, RenderError> {
        let load_err = |reason: String| RenderError::AssetLoad {
            path: path.to_path_buf(),
            reason,
        };

        let img = image::open(path).map_err(|e| load_err(e.to_string()))?;
        let source_format = if img.color().has_alpha() {
            PixelFormat::Rgba
        } else {
            PixelFormat::Rgb
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(load_err("image has zero size".to_string()));
        }

        Ok(Self {
            width,
            height,
            source_format,
            pixels: rgba.into_raw(),
        })
    }

    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            source_format: PixelFormat::Rgba,
            pixels,
        }
    }

    pub fn upload(&self, ctx: &RenderCtx<'_>) -> Result<Texture2D, RenderError> {
        Texture2D::from_rgba8(
            ctx,
            "penumbra sprite",
            self.width,
            self.height,
            &self.pixels,
            sprite_format_for(ctx.surface_format),
            self.source_format,
        )
    }
}

/// Loads the sprite at `path`, substituting an empty `fallback`-sized
/// texture when the file is missing or cannot be decoded.
///
/// The fallback keeps every downstream size non-zero; the empty texture
/// renders nothing. Only GPU allocation failures are returned.
pub fn load_sprite(
    ctx: &RenderCtx<'_>,
    path: &Path,
    fallback: (u32, u32),
) -> Result<Texture2D, RenderError> {
    match SpriteImage::decode(path) {
        Ok(image) => {
            log::info!(
                "loaded sprite {} ({}x{}, {:?})",
                path.display(),
                image.width,
                image.height,
                image.source_format
            );
            image.upload(ctx)
        }
        Err(err) => {
            let (w, h) = fallback;
            log::warn!("{err}; using an empty {w}x{h} sprite");
            Texture2D::transparent(ctx, "penumbra fallback sprite", w, h, sprite_format_for(ctx.surface_format))
        }
    }
}

// ── bind group cache ──────────────────────────────────────────────────────

/// Small cache of texture bind groups keyed by [`TextureId`].
///
/// Filled on first use; steady-state frames only look up.
#[derive(Default)]
pub(crate) struct BindGroupCache {
    entries: Vec<(TextureId, wgpu::BindGroup)>,
}

impl BindGroupCache {
    /// Creates the bind group for `texture` unless one is already cached.
    pub(crate) fn ensure(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        texture: &Texture2D,
        label: &'static str,
    ) {
        if self.get(texture.id()).is_some() {
            return;
        }
        log::trace!("{label}: new bind group for {:?}", texture.id());
        self.entries
            .push((texture.id(), texture.bind_group(device, layout, label)));
    }

    pub(crate) fn get(&self, id: TextureId) -> Option<&wgpu::BindGroup> {
        self.entries.iter().find(|(e, _)| *e == id).map(|(_, bg)| bg)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
