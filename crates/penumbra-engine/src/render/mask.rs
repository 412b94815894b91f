//! Silhouette pass: sprite alpha → black mask in an offscreen buffer.

use glam::Mat4;

use crate::coords::ColorRgba;

use super::common::{QuadMesh, UniformRing};
use super::offscreen::{OFFSCREEN_FORMAT, OffscreenTargetPair, TargetSlot};
use super::program::{TintProgram, TintUniform};
use super::texture::{BindGroupCache, Texture2D};
use super::RenderCtx;

/// Draws the sprite as a solid black silhouette filling one buffer of the
/// pair. Texels under the alpha threshold are discarded and stay cleared.
pub struct MaskPass {
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniforms: UniformRing<TintUniform>,
    uniform_bind_group: wgpu::BindGroup,
    sprites: BindGroupCache,
    quad: QuadMesh,
}

impl MaskPass {
    pub fn new(device: &wgpu::Device, program: &TintProgram, quad: QuadMesh) -> Self {
        let pipeline = program.pipeline(
            device,
            "penumbra mask pipeline",
            OFFSCREEN_FORMAT,
            wgpu::BlendState::REPLACE,
        );
        let uniforms = UniformRing::new(device, "penumbra mask uniforms", 1);
        let uniform_bind_group =
            program.uniform_bind_group(device, "penumbra mask uniform bg", &uniforms);

        Self {
            pipeline,
            texture_layout: program.texture_layout.clone(),
            uniforms,
            uniform_bind_group,
            sprites: BindGroupCache::default(),
            quad,
        }
    }

    /// Clears `slot` to transparent and draws `sprite` over the whole buffer
    /// in black.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        sprite: &Texture2D,
        pair: &OffscreenTargetPair,
        slot: TargetSlot,
    ) {
        debug_assert!(sprite.is_linear(), "mask source must be linearly filtered");
        self.sprites
            .ensure(ctx.device, &self.texture_layout, sprite, "penumbra mask sprite bg");
        let Some(sprite_bg) = self.sprites.get(sprite.id()) else {
            return;
        };

        // Unit quad onto [0,1]², origin top-left like the sprite image.
        let uniform = TintUniform::new(
            Mat4::IDENTITY,
            Mat4::orthographic_rh(0.0, 1.0, 1.0, 0.0, -1.0, 1.0),
            ColorRgba::black(),
        );
        self.uniforms.write(ctx.queue, 0, &uniform);

        log::trace!(
            "mask: {}x{} sprite -> {slot:?} ({}x{})",
            sprite.width(),
            sprite.height(),
            pair.width(),
            pair.height()
        );

        let mut rpass =
            pair.begin_write(slot, encoder, "penumbra mask pass", Some(ColorRgba::transparent()));
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.uniform_bind_group, &[self.uniforms.offset(0)]);
        rpass.set_bind_group(1, sprite_bg, &[]);
        self.quad.draw(&mut rpass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::offscreen::scaled_size;
    use crate::render::testing::{gpu_or_skip, offscreen_ctx, pixel, read, solid_sprite};
    use crate::render::texture::SpriteImage;

    fn mask_of(image: &SpriteImage) -> Option<(Vec<u8>, u32, u32)> {
        let gpu = gpu_or_skip()?;
        let ctx = offscreen_ctx(&gpu);
        let sprite = image.upload(&ctx).unwrap();
        let (w, h) = scaled_size(sprite.size(), 0.5);
        let pair = OffscreenTargetPair::create(&ctx, w, h).unwrap();

        let program = TintProgram::new(gpu.device());
        let mut pass = MaskPass::new(gpu.device(), &program, QuadMesh::new(gpu.device()));
        let mut encoder = gpu.create_encoder("mask test");
        pass.render(&ctx, &mut encoder, &sprite, &pair, TargetSlot::A);
        gpu.submit_and_wait(encoder).unwrap();

        Some((read(&gpu, pair.texture_of(TargetSlot::A)), w, h))
    }

    #[test]
    fn opaque_sprite_masks_to_solid_black() {
        let Some((mask, w, h)) = mask_of(&solid_sprite(8, 8, [200, 30, 30, 255])) else {
            return;
        };
        assert_eq!((w, h), (4, 4));
        assert!(mask.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn transparent_half_stays_clear() {
        // Left half opaque, right half fully transparent.
        let (w, h) = (256, 256);
        let mut pixels = Vec::with_capacity((w * h * 4) as usize);
        for _ in 0..h {
            for x in 0..w {
                let a = if x < w / 2 { 255 } else { 0 };
                pixels.extend_from_slice(&[255, 255, 255, a]);
            }
        }
        let Some((mask, mw, mh)) = mask_of(&SpriteImage::from_rgba8(w, h, pixels)) else {
            return;
        };

        for y in 0..mh {
            for x in 0..mw {
                let expected = if x < mw / 2 { [0, 0, 0, 255] } else { [0, 0, 0, 0] };
                assert_eq!(pixel(&mask, mw, x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn faint_texels_are_discarded() {
        // alpha 20/255 < 0.1
        let Some((mask, _, _)) = mask_of(&solid_sprite(8, 8, [0, 0, 0, 20])) else {
            return;
        };
        assert!(mask.iter().all(|&b| b == 0));
    }
}
