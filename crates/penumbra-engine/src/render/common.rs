//! Shared GPU types and utilities used by all passes.

use std::marker::PhantomData;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

// ── blend ─────────────────────────────────────────────────────────────────

/// Straight alpha blending: `src·srcA + dst·(1 − srcA)`.
pub(crate) fn straight_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

pub(crate) fn triangle_list() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

// ── quad vertex ───────────────────────────────────────────────────────────

/// Unit-quad corner. The same value doubles as the texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub pos: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

pub(crate) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { pos: [0.0, 0.0] },
    QuadVertex { pos: [1.0, 0.0] },
    QuadVertex { pos: [1.0, 1.0] },
    QuadVertex { pos: [0.0, 1.0] },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Textured unit quad (`[0,1]²`), the only mesh the tint program draws.
/// Clones share the same buffers.
#[derive(Clone)]
pub struct QuadMesh {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
}

impl QuadMesh {
    pub fn new(device: &wgpu::Device) -> Self {
        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("penumbra quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("penumbra quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vbo, ibo }
    }

    /// Binds the quad buffers and issues one indexed draw.
    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_vertex_buffer(0, self.vbo.slice(..));
        rpass.set_index_buffer(self.ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

/// Full-surface triangle: three vertices generated from `vertex_index` in the
/// vertex stage, no vertex buffer. Covers clip space `[-1,1]²` entirely.
#[derive(Debug, Copy, Clone, Default)]
pub struct FullscreenTriangle;

impl FullscreenTriangle {
    pub const VERTEX_COUNT: u32 = 3;

    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.draw(0..Self::VERTEX_COUNT, 0..1);
    }
}

// ── uniform ring ──────────────────────────────────────────────────────────

/// Fixed-stride uniform buffer addressed with dynamic offsets.
///
/// One slot per draw in a frame, so every draw sees its own values even
/// though all `write_buffer` calls land before the single submit.
pub(crate) struct UniformRing<T: Pod> {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: u32,
    label: &'static str,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformRing<T> {
    pub(crate) fn new(device: &wgpu::Device, label: &'static str, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        let stride = uniform_stride::<T>(device);
        Self {
            buffer: create_ring_buffer(device, label, stride, capacity),
            stride,
            capacity,
            label,
            _marker: PhantomData,
        }
    }

    /// Grows the ring to hold at least `required` slots.
    ///
    /// Returns `true` when the buffer was replaced; bind groups referencing
    /// the old buffer must be rebuilt.
    pub(crate) fn ensure_capacity(&mut self, device: &wgpu::Device, required: u32) -> bool {
        if required <= self.capacity {
            return false;
        }
        let new_cap = required.next_power_of_two();
        log::debug!("{}: growing uniform ring {} -> {new_cap} slots", self.label, self.capacity);
        self.buffer = create_ring_buffer(device, self.label, self.stride, new_cap);
        self.capacity = new_cap;
        true
    }

    pub(crate) fn write(&self, queue: &wgpu::Queue, slot: u32, value: &T) {
        debug_assert!(slot < self.capacity, "uniform slot {slot} out of range");
        queue.write_buffer(&self.buffer, self.stride * slot as u64, bytemuck::bytes_of(value));
    }

    /// Dynamic offset to pass to `set_bind_group` for `slot`.
    pub(crate) fn offset(&self, slot: u32) -> u32 {
        (self.stride * slot as u64) as u32
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Binding covering one slot; used with a dynamic offset.
    pub(crate) fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: Some(uniform_min_binding_size::<T>()),
        })
    }
}

fn create_ring_buffer(
    device: &wgpu::Device,
    label: &'static str,
    stride: u64,
    capacity: u32,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Size of `T` rounded up to the device's dynamic-offset alignment.
pub(crate) fn uniform_stride<T>(device: &wgpu::Device) -> u64 {
    let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
    (std::mem::size_of::<T>() as u64).div_ceil(align) * align
}

/// Minimum binding size for a uniform block of type `T`.
///
/// Every uniform struct in this crate is non-empty, which keeps the
/// `expect` below unreachable.
pub(crate) fn uniform_min_binding_size<T>() -> NonZeroU64 {
    NonZeroU64::new(std::mem::size_of::<T>() as u64)
        .expect("uniform blocks have non-zero size by construction")
}

// ── layouts ───────────────────────────────────────────────────────────────

/// `texture_2d<f32>` at binding 0 + filtering sampler at binding 1.
pub(crate) fn sampled_texture_layout(
    device: &wgpu::Device,
    label: &'static str,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Single dynamic-offset uniform block of type `T` at binding 0.
pub(crate) fn dynamic_uniform_layout<T>(
    device: &wgpu::Device,
    label: &'static str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: Some(uniform_min_binding_size::<T>()),
            },
            count: None,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_indices_reference_all_corners() {
        let mut seen = [false; 4];
        for i in QUAD_INDICES {
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
