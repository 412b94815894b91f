//! The two compiled shader programs and their uniform layouts.
//!
//! A program owns the shader module and bind group layouts; passes build
//! their own pipelines from it for the target format and blend they need.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::coords::ColorRgba;

use super::common::{
    dynamic_uniform_layout, sampled_texture_layout, triangle_list, QuadVertex, UniformRing,
};

/// Texels with alpha below this are discarded by the tint program.
pub const ALPHA_THRESHOLD: f32 = 0.1;

// ── program 1: tint ───────────────────────────────────────────────────────

/// Uniform block of `tint.wgsl` (160 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct TintUniform {
    pub model: Mat4,
    pub projection: Mat4,
    pub color_mod: [f32; 4],
    pub alpha_threshold: f32,
    pub _pad: [f32; 3],
}

impl TintUniform {
    pub(crate) fn new(model: Mat4, projection: Mat4, color_mod: ColorRgba) -> Self {
        Self {
            model,
            projection,
            color_mod: color_mod.to_array(),
            alpha_threshold: ALPHA_THRESHOLD,
            _pad: [0.0; 3],
        }
    }
}

/// Silhouette-and-tint program: `model`, `projection`, `color_mod` uniforms
/// at group 0 (dynamic offset), `image` texture + sampler at group 1.
pub struct TintProgram {
    shader: wgpu::ShaderModule,
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl TintProgram {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("penumbra tint shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tint.wgsl").into()),
        });

        let uniform_layout = dynamic_uniform_layout::<TintUniform>(
            device,
            "penumbra tint uniform bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let texture_layout = sampled_texture_layout(device, "penumbra tint texture bgl");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("penumbra tint pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            uniform_layout,
            texture_layout,
            pipeline_layout,
        }
    }

    /// Group 0 bind group over `ring`; draws select their slot with a
    /// dynamic offset.
    pub(crate) fn uniform_bind_group(
        &self,
        device: &wgpu::Device,
        label: &'static str,
        ring: &UniformRing<TintUniform>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ring.binding(),
            }],
        })
    }

    /// Pipeline drawing the unit quad into `format` with `blend`.
    pub(crate) fn pipeline(
        &self,
        device: &wgpu::Device,
        label: &'static str,
        format: wgpu::TextureFormat,
        blend: wgpu::BlendState,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: triangle_list(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

// ── program 2: kawase ─────────────────────────────────────────────────────

/// Uniform block of `kawase.wgsl` (16 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct KawaseUniform {
    pub tex_size: [f32; 2],
    pub offset: f32,
    pub _pad: f32,
}

/// Four-tap diffusion program: `screen_texture` + sampler at group 0,
/// `tex_size` / `offset` uniforms at group 1 (dynamic offset).
pub struct KawaseProgram {
    shader: wgpu::ShaderModule,
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    pub(crate) uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

impl KawaseProgram {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("penumbra kawase shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/kawase.wgsl").into()),
        });

        let texture_layout = sampled_texture_layout(device, "penumbra kawase texture bgl");
        let uniform_layout = dynamic_uniform_layout::<KawaseUniform>(
            device,
            "penumbra kawase uniform bgl",
            wgpu::ShaderStages::FRAGMENT,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("penumbra kawase pipeline layout"),
            bind_group_layouts: &[&texture_layout, &uniform_layout],
            immediate_size: 0,
        });

        Self {
            shader,
            texture_layout,
            uniform_layout,
            pipeline_layout,
        }
    }

    /// Full-surface triangle pipeline; output replaces the target.
    pub(crate) fn pipeline(
        &self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("penumbra kawase pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: triangle_list(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<TintUniform>(), 160);
        assert_eq!(std::mem::size_of::<KawaseUniform>(), 16);
    }

    #[test]
    fn tint_uniform_carries_threshold() {
        let u = TintUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, ColorRgba::new(0.0, 0.0, 0.0, 0.5));
        assert_eq!(u.alpha_threshold, ALPHA_THRESHOLD);
        assert_eq!(u.color_mod, [0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn model_translation_sits_in_fourth_column() {
        let model = Mat4::from_translation(glam::Vec3::new(7.0, 9.0, 0.0));
        let u = TintUniform::new(model, Mat4::IDENTITY, ColorRgba::white());
        let raw: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&u));
        assert_eq!(&raw[12..14], &[7.0, 9.0]);
        assert_eq!(&raw[32..36], &[1.0, 1.0, 1.0, 1.0]);
    }
}
