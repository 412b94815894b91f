//! Iterative four-tap (Kawase) blur over an offscreen pair.

use serde::Deserialize;

use crate::coords::ColorRgba;
use crate::frame::ConfigError;

use super::common::{FullscreenTriangle, UniformRing};
use super::offscreen::{OFFSCREEN_FORMAT, OffscreenTargetPair, TargetSlot};
use super::program::{KawaseProgram, KawaseUniform};
use super::texture::BindGroupCache;
use super::RenderCtx;

/// How far and how often the blur diffuses the mask.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlurParameters {
    pub iterations: u32,
    /// Sample offset of the first iteration, in texels.
    pub base_offset: f32,
    /// Added to the offset on every further iteration.
    pub offset_step: f32,
}

impl Default for BlurParameters {
    fn default() -> Self {
        Self {
            iterations: 3,
            base_offset: 1.0,
            offset_step: 1.0,
        }
    }
}

impl BlurParameters {
    /// Offset used by iteration `i` (zero-based).
    #[inline]
    pub fn step_offset(&self, i: u32) -> f32 {
        self.base_offset + self.offset_step * i as f32
    }

    /// Offsets must be finite and non-decreasing from a non-negative start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_offset.is_finite() || self.base_offset < 0.0 {
            return Err(ConfigError::invalid(
                "blur.base_offset",
                format!("must be finite and >= 0, got {}", self.base_offset),
            ));
        }
        if !self.offset_step.is_finite() || self.offset_step < 0.0 {
            return Err(ConfigError::invalid(
                "blur.offset_step",
                format!("must be finite and >= 0, got {}", self.offset_step),
            ));
        }
        Ok(())
    }
}

/// Runs the diffusion kernel back and forth between the two buffers of an
/// [`OffscreenTargetPair`].
pub struct BlurFilter {
    params: BlurParameters,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniform_layout: wgpu::BindGroupLayout,
    uniforms: UniformRing<KawaseUniform>,
    uniform_bind_group: wgpu::BindGroup,
    sources: BindGroupCache,
    triangle: FullscreenTriangle,
}

impl BlurFilter {
    pub fn new(ctx: &RenderCtx<'_>, program: &KawaseProgram, params: BlurParameters) -> Self {
        let pipeline = program.pipeline(ctx.device, OFFSCREEN_FORMAT);
        let uniforms = UniformRing::new(ctx.device, "penumbra kawase uniforms", params.iterations);
        let uniform_bind_group =
            create_uniform_bind_group(ctx.device, &program.uniform_layout, &uniforms);

        Self {
            params,
            pipeline,
            texture_layout: program.texture_layout.clone(),
            uniform_layout: program.uniform_layout.clone(),
            uniforms,
            uniform_bind_group,
            sources: BindGroupCache::default(),
            triangle: FullscreenTriangle,
        }
    }

    pub fn params(&self) -> &BlurParameters {
        &self.params
    }

    /// Encodes `iteration_count` passes starting from `source` and returns
    /// the slot holding the result, `source.advance(iteration_count)`.
    ///
    /// Zero iterations encode nothing and return `source`.
    pub fn run(
        &mut self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        pair: &OffscreenTargetPair,
        source: TargetSlot,
        iteration_count: u32,
    ) -> TargetSlot {
        if iteration_count == 0 {
            return source;
        }

        self.prepare(ctx, pair, iteration_count);

        let mut read = source;
        for i in 0..iteration_count {
            read = self.iterate(ctx, encoder, pair, read, i);
        }

        debug_assert_eq!(read, source.advance(iteration_count));
        read
    }

    /// Makes room for `iteration_count` uniform slots and caches the
    /// sampling bind groups of both buffers. Allocates only on first use
    /// or when the count grows.
    pub fn prepare(&mut self, ctx: &RenderCtx<'_>, pair: &OffscreenTargetPair, iteration_count: u32) {
        if self.uniforms.ensure_capacity(ctx.device, iteration_count) {
            self.uniform_bind_group =
                create_uniform_bind_group(ctx.device, &self.uniform_layout, &self.uniforms);
        }

        for slot in [TargetSlot::A, TargetSlot::B] {
            let texture = pair.texture_of(slot);
            debug_assert!(texture.is_linear(), "blur source must be linearly filtered");
            self.sources
                .ensure(ctx.device, &self.texture_layout, texture, "penumbra kawase source bg");
        }
    }

    /// Encodes iteration `i`: samples `read`, clears and writes the other
    /// slot, and returns the slot written. Requires a prior [`prepare`]
    /// covering `i`.
    ///
    /// [`prepare`]: Self::prepare
    pub fn iterate(
        &self,
        ctx: &RenderCtx<'_>,
        encoder: &mut wgpu::CommandEncoder,
        pair: &OffscreenTargetPair,
        read: TargetSlot,
        i: u32,
    ) -> TargetSlot {
        let write = read.other();
        let Some(source_bg) = self.sources.get(pair.texture_of(read).id()) else {
            log::error!("kawase: no bind group for slot {read:?}; skipping iteration {i}");
            return read;
        };

        let offset = self.params.step_offset(i);
        self.uniforms.write(
            ctx.queue,
            i,
            &KawaseUniform {
                tex_size: [pair.width() as f32, pair.height() as f32],
                offset,
                _pad: 0.0,
            },
        );
        log::trace!("kawase iteration {i}: {read:?} -> {write:?}, offset {offset}");

        let mut rpass =
            pair.begin_write(write, encoder, "penumbra kawase pass", Some(ColorRgba::transparent()));
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, source_bg, &[]);
        rpass.set_bind_group(1, &self.uniform_bind_group, &[self.uniforms.offset(i)]);
        self.triangle.draw(&mut rpass);

        write
    }
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    ring: &UniformRing<KawaseUniform>,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("penumbra kawase uniform bg"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: ring.binding(),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{centered_square, gpu_or_skip, offscreen_ctx, pixel, read, upload};

    #[test]
    fn default_offsets_count_up_from_one() {
        let p = BlurParameters::default();
        assert_eq!(p.iterations, 3);
        assert_eq!(p.step_offset(0), 1.0);
        assert_eq!(p.step_offset(1), 2.0);
        assert_eq!(p.step_offset(2), 3.0);
    }

    #[test]
    fn negative_step_is_rejected() {
        let p = BlurParameters {
            offset_step: -0.5,
            ..BlurParameters::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::Invalid { field: "blur.offset_step", .. })));
        assert!(BlurParameters::default().validate().is_ok());
    }

    #[test]
    fn non_finite_base_is_rejected() {
        let p = BlurParameters {
            base_offset: f32::NAN,
            ..BlurParameters::default()
        };
        assert!(p.validate().is_err());
    }

    // ── GPU ───────────────────────────────────────────────────────────────

    fn alpha_coverage(rgba: &[u8]) -> usize {
        rgba.chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    #[test]
    fn zero_iterations_leave_the_source_untouched() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let pair = OffscreenTargetPair::create(&ctx, 16, 16).unwrap();
        let pattern = centered_square(16, 16, 4);
        upload(&gpu, pair.texture_of(TargetSlot::A), &pattern);

        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), BlurParameters::default());
        let mut encoder = gpu.create_encoder("blur identity");
        let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::A, 0);
        gpu.submit_and_wait(encoder).unwrap();

        assert_eq!(result, TargetSlot::A);
        assert_eq!(read(&gpu, pair.texture_of(TargetSlot::A)), pattern);
    }

    #[test]
    fn result_lands_in_parity_slot() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let pair = OffscreenTargetPair::create(&ctx, 16, 16).unwrap();
        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), BlurParameters::default());

        for n in 1..=4 {
            upload(&gpu, pair.texture_of(TargetSlot::A), &centered_square(16, 16, 4));
            upload(&gpu, pair.texture_of(TargetSlot::B), &vec![0u8; 16 * 16 * 4]);

            let mut encoder = gpu.create_encoder("blur parity");
            let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::A, n);
            gpu.submit_and_wait(encoder).unwrap();

            assert_eq!(result, TargetSlot::A.advance(n), "n = {n}");
            assert!(alpha_coverage(&read(&gpu, pair.texture_of(result))) > 16, "n = {n}");
        }
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let pair = OffscreenTargetPair::create(&ctx, 8, 8).unwrap();
        upload(&gpu, pair.texture_of(TargetSlot::A), &[0, 0, 0, 255].repeat(64));

        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), BlurParameters::default());
        let mut encoder = gpu.create_encoder("blur uniform");
        let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::A, 3);
        gpu.submit_and_wait(encoder).unwrap();

        let out = read(&gpu, pair.texture_of(result));
        assert!(out.chunks_exact(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn single_iteration_writes_every_texel() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        // Odd, non-square size: the generated triangle must still cover it all.
        let pair = OffscreenTargetPair::create(&ctx, 13, 7).unwrap();
        upload(&gpu, pair.texture_of(TargetSlot::A), &[255, 0, 0, 255].repeat(13 * 7));
        upload(&gpu, pair.texture_of(TargetSlot::B), &vec![0u8; 13 * 7 * 4]);

        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), BlurParameters::default());
        let mut encoder = gpu.create_encoder("blur coverage");
        let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::A, 1);
        gpu.submit_and_wait(encoder).unwrap();

        assert_eq!(result, TargetSlot::B);
        let out = read(&gpu, pair.texture_of(TargetSlot::B));
        assert!(out.chunks_exact(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn more_iterations_spread_further() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let pair = OffscreenTargetPair::create(&ctx, 32, 32).unwrap();
        let square = centered_square(32, 32, 4);
        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), BlurParameters::default());

        let mut coverage = Vec::new();
        for n in [1, 3] {
            upload(&gpu, pair.texture_of(TargetSlot::A), &square);
            let mut encoder = gpu.create_encoder("blur spread");
            let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::A, n);
            gpu.submit_and_wait(encoder).unwrap();

            let out = read(&gpu, pair.texture_of(result));
            // Softened: the square's center is no longer fully opaque.
            assert!(pixel(&out, 32, 16, 16)[3] < 255, "n = {n}");
            coverage.push(alpha_coverage(&out));
        }

        assert!(coverage[0] > 16);
        assert!(coverage[1] > coverage[0], "{coverage:?}");
    }

    #[test]
    fn ring_grows_past_configured_iterations() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let pair = OffscreenTargetPair::create(&ctx, 8, 8).unwrap();
        let params = BlurParameters {
            iterations: 1,
            ..BlurParameters::default()
        };
        let mut blur = BlurFilter::new(&ctx, &KawaseProgram::new(gpu.device()), params);

        let mut encoder = gpu.create_encoder("blur grow");
        let result = blur.run(&ctx, &mut encoder, &pair, TargetSlot::B, 5);
        gpu.submit_and_wait(encoder).unwrap();

        assert_eq!(result, TargetSlot::A);
        assert!(blur.uniforms.capacity() >= 5);
        assert_eq!(blur.sources.len(), 2);
    }
}
