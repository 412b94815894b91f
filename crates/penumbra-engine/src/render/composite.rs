//! Final pass onto the visible surface: background, shadow, sprite.

use glam::Mat4;

use crate::coords::ColorRgba;

use super::common::{straight_alpha_blend, QuadMesh, UniformRing};
use super::program::{TintProgram, TintUniform};
use super::texture::{BindGroupCache, Texture2D};
use super::{RenderCtx, RenderTarget};

const SHADOW_SLOT: u32 = 0;
const SPRITE_SLOT: u32 = 1;

/// Clears the surface and draws the blurred shadow, then the sprite, both
/// with straight alpha blending.
pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniforms: UniformRing<TintUniform>,
    uniform_bind_group: wgpu::BindGroup,
    textures: BindGroupCache,
    quad: QuadMesh,
    background: ColorRgba,
    /// `background` as stored by the target's format.
    clear: ColorRgba,
    shadow_tint: ColorRgba,
}

impl CompositePass {
    pub fn new(
        device: &wgpu::Device,
        program: &TintProgram,
        quad: QuadMesh,
        surface_format: wgpu::TextureFormat,
        background: ColorRgba,
        shadow_alpha: f32,
    ) -> Self {
        let pipeline = program.pipeline(
            device,
            "penumbra composite pipeline",
            surface_format,
            straight_alpha_blend(),
        );
        let uniforms = UniformRing::new(device, "penumbra composite uniforms", 2);
        let uniform_bind_group =
            program.uniform_bind_group(device, "penumbra composite uniform bg", &uniforms);

        let clear = if surface_format.is_srgb() {
            background.srgb_to_linear()
        } else {
            background
        };

        Self {
            pipeline,
            texture_layout: program.texture_layout.clone(),
            uniforms,
            uniform_bind_group,
            textures: BindGroupCache::default(),
            quad,
            background,
            clear,
            shadow_tint: ColorRgba::new(0.0, 0.0, 0.0, shadow_alpha),
        }
    }

    /// Configured background, as authored.
    pub fn background(&self) -> ColorRgba {
        self.background
    }

    /// Draws onto `target` in surface pixels (origin top-left, +Y down).
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        sprite: &Texture2D,
        shadow_texture: &Texture2D,
        shadow_transform: Mat4,
        sprite_model: Mat4,
    ) {
        debug_assert!(shadow_texture.is_linear(), "shadow source must be linearly filtered");
        for (texture, label) in [
            (shadow_texture, "penumbra composite shadow bg"),
            (sprite, "penumbra composite sprite bg"),
        ] {
            self.textures
                .ensure(ctx.device, &self.texture_layout, texture, label);
        }
        let Some(shadow_bg) = self.textures.get(shadow_texture.id()) else { return };
        let Some(sprite_bg) = self.textures.get(sprite.id()) else { return };

        let vp = ctx.viewport;
        let projection = Mat4::orthographic_rh(0.0, vp.width, vp.height, 0.0, -1.0, 1.0);
        self.uniforms.write(
            ctx.queue,
            SHADOW_SLOT,
            &TintUniform::new(shadow_transform, projection, self.shadow_tint),
        );
        self.uniforms.write(
            ctx.queue,
            SPRITE_SLOT,
            &TintUniform::new(sprite_model, projection, ColorRgba::white()),
        );

        log::trace!("composite: {}x{} surface", vp.width, vp.height);

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("penumbra composite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_viewport(0.0, 0.0, vp.width, vp.height, 0.0, 1.0);
        rpass.set_pipeline(&self.pipeline);

        // Shadow first so the sprite covers it.
        rpass.set_bind_group(0, &self.uniform_bind_group, &[self.uniforms.offset(SHADOW_SLOT)]);
        rpass.set_bind_group(1, shadow_bg, &[]);
        self.quad.draw(&mut rpass);

        rpass.set_bind_group(0, &self.uniform_bind_group, &[self.uniforms.offset(SPRITE_SLOT)]);
        rpass.set_bind_group(1, sprite_bg, &[]);
        self.quad.draw(&mut rpass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::HeadlessSurface;
    use crate::render::shadow::sprite_model;
    use crate::render::testing::{gpu_or_skip, pixel, solid_sprite};

    #[test]
    fn sprite_is_drawn_over_background_and_shadow() {
        let Some(gpu) = gpu_or_skip() else { return };
        let surface = HeadlessSurface::new(&gpu, 64, 64).unwrap();
        let ctx = gpu.render_ctx(&surface);
        let program = TintProgram::new(gpu.device());
        let quad = QuadMesh::new(gpu.device());

        let sprite = solid_sprite(16, 16, [255, 0, 0, 255]).upload(&ctx).unwrap();
        let shade = solid_sprite(16, 16, [0, 0, 0, 255]).upload(&ctx).unwrap();
        let background = ColorRgba::new(0.0, 0.0, 1.0, 1.0);
        let mut pass = CompositePass::new(gpu.device(), &program, quad, surface.format(), background, 0.5);

        // Shadow covers [0,32)², sprite covers [8,24)².
        let shadow_model = sprite_model(Vec2::new(0.0, 0.0), 32.0, 32.0);
        let model = sprite_model(Vec2::new(8.0, 8.0), 16.0, 16.0);

        let mut encoder = gpu.create_encoder("composite test");
        {
            let mut target = RenderTarget::new(&mut encoder, surface.view());
            pass.render(&ctx, &mut target, &sprite, &shade, shadow_model, model);
        }
        gpu.submit_and_wait(encoder).unwrap();
        let out = surface.read_rgba8(&gpu).unwrap();

        assert_eq!(pixel(&out, 64, 48, 48), [0, 0, 255, 255], "background");
        assert_eq!(pixel(&out, 64, 16, 16), [255, 0, 0, 255], "sprite");

        // Half-strength black over blue.
        let [r, g, b, _] = pixel(&out, 64, 2, 2);
        assert_eq!((r, g), (0, 0));
        assert!((b as i32 - 128).abs() <= 1, "shadow blend {b}");
    }

    #[test]
    fn background_bytes_match_on_srgb_and_unorm_targets() {
        let Some(gpu) = gpu_or_skip() else { return };
        let program = TintProgram::new(gpu.device());
        let quad = QuadMesh::new(gpu.device());
        let background = ColorRgba::new(0.6, 0.7, 0.8, 1.0);
        let sprite = solid_sprite(4, 4, [0, 0, 0, 0]);

        for format in [wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Rgba8UnormSrgb] {
            let surface = HeadlessSurface::with_format(&gpu, 32, 32, format).unwrap();
            let ctx = gpu.render_ctx(&surface);
            let empty = sprite.upload(&ctx).unwrap();
            let mut pass =
                CompositePass::new(gpu.device(), &program, quad.clone(), format, background, 0.5);
            let model = sprite_model(Vec2::new(0.0, 0.0), 4.0, 4.0);

            let mut encoder = gpu.create_encoder("composite background");
            {
                let mut target = RenderTarget::new(&mut encoder, surface.view());
                pass.render(&ctx, &mut target, &empty, &empty, model, model);
            }
            gpu.submit_and_wait(encoder).unwrap();
            let out = surface.read_rgba8(&gpu).unwrap();

            let [r, g, b, a] = pixel(&out, 32, 20, 20);
            for (got, want) in [(r, 153), (g, 179), (b, 204)] {
                assert!((got as i32 - want).abs() <= 1, "{format:?}: {:?}", [r, g, b, a]);
            }
            assert_eq!(a, 255);
        }
    }
}
