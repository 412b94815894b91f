//! Texture → CPU copies with row de-padding.

use std::sync::mpsc;

use anyhow::{anyhow, bail, Context, Result};

/// Aligns a row size to wgpu's copy alignment (256 bytes).
fn align_bytes_per_row(value: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    value.div_ceil(align) * align
}

/// Reads an RGBA8 texture into a tightly packed buffer (top row first).
///
/// The texture must be single-sampled and created with `COPY_SRC`. Blocks
/// until the copy has completed.
pub fn read_texture_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Texture,
) -> Result<Vec<u8>> {
    let (width, height) = (src.width(), src.height());

    anyhow::ensure!(width > 0 && height > 0, "readback size must be positive");
    anyhow::ensure!(
        src.sample_count() == 1,
        "readback requires a single-sample texture, got {}",
        src.sample_count()
    );
    match src.format() {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {}
        other => bail!("readback only supports RGBA8 formats, got {other:?}"),
    }

    let tight_bpr = 4 * width;
    let padded_bpr = align_bytes_per_row(tight_bpr);
    let buffer_size = padded_bpr as u64 * height as u64;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("penumbra readback staging"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("penumbra readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: src,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .context("device poll failed during readback")?;

    receiver
        .recv()
        .map_err(|_| anyhow!("map_async callback was dropped"))?
        .context("failed to map readback buffer")?;

    let mut tight = vec![0u8; (tight_bpr * height) as usize];
    {
        let data = slice.get_mapped_range();
        for (row, dst) in tight.chunks_exact_mut(tight_bpr as usize).enumerate() {
            let start = row * padded_bpr as usize;
            dst.copy_from_slice(&data[start..start + tight_bpr as usize]);
        }
    }
    staging.unmap();

    Ok(tight)
}
