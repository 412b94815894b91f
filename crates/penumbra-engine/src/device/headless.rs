use anyhow::{Context, Result};

use crate::coords::Viewport;
use crate::render::readback::read_texture_rgba8;
use crate::render::RenderCtx;

use super::GpuInit;

/// Surfaceless GPU context for offscreen frames (screenshots, tests).
///
/// Same device setup as [`super::Gpu`] but without a window: the "visible
/// surface" is a [`HeadlessSurface`] texture that can be read back.
pub struct HeadlessGpu {
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl HeadlessGpu {
    /// Blocking constructor.
    pub fn new(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new_async(init))
    }

    pub async fn new_async(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a headless GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&init.device_descriptor("penumbra headless device"))
            .await
            .context("failed to create headless wgpu device/queue")?;

        let info = adapter.get_info();
        log::debug!("headless gpu ready: {} ({:?})", info.name, info.backend);

        Ok(Self {
            _instance: instance,
            device,
            queue,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Renderer-facing context targeting `surface`.
    pub fn render_ctx(&self, surface: &HeadlessSurface) -> RenderCtx<'_> {
        RenderCtx::new(&self.device, &self.queue, surface.format(), surface.viewport())
    }

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Submits `encoder` and blocks until the GPU has finished it.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .context("device poll failed while waiting for submission")?;
        Ok(())
    }
}

/// Offscreen stand-in for the window surface.
pub struct HeadlessSurface {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl HeadlessSurface {
    /// Linear `Rgba8Unorm` so readback bytes equal what the shaders wrote.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(gpu: &HeadlessGpu, width: u32, height: u32) -> Result<Self> {
        Self::with_format(gpu, width, height, Self::FORMAT)
    }

    /// Surface with an explicit RGBA8 format, e.g. `Rgba8UnormSrgb` to stand
    /// in for an sRGB swapchain.
    pub fn with_format(
        gpu: &HeadlessGpu,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "headless surface has zero size");
        anyhow::ensure!(
            matches!(
                format,
                wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb
            ),
            "headless surface must be RGBA8, got {format:?}"
        );

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("penumbra headless surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            format,
            view,
            width,
            height,
        })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::from_pixels(self.width, self.height)
    }

    /// Copies the surface into a tightly packed RGBA8 buffer (row-major, top row first).
    pub fn read_rgba8(&self, gpu: &HeadlessGpu) -> Result<Vec<u8>> {
        read_texture_rgba8(gpu.device(), gpu.queue(), &self.texture)
    }
}
