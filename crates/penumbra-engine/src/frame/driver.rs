use anyhow::{Context, Result};

use crate::device::{HeadlessGpu, HeadlessSurface};
use crate::render::offscreen::TargetSlot;
use crate::render::{RenderCtx, RenderTarget};

use super::FrameState;

/// Where the driver is within the current frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    MaskGeneration,
    /// One-based blur iteration.
    BlurIteration(u32),
    Composite,
    Presented,
}

/// Encodes one frame per call: mask into slot A, the blur loop, then the
/// composite onto the surface.
pub struct FrameDriver {
    state: FrameState,
    stage: FrameStage,
    history: Vec<FrameStage>,
    frames: u64,
}

impl FrameDriver {
    pub fn new(state: FrameState) -> Self {
        let history = Vec::with_capacity(state.blur_iterations() as usize + 3);
        Self {
            state,
            stage: FrameStage::Idle,
            history,
            frames: 0,
        }
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Stages entered since the start of the last encoded frame.
    pub fn stages(&self) -> &[FrameStage] {
        &self.history
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Encodes the whole frame on `target.encoder`. Nothing is submitted.
    pub fn encode(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        self.history.clear();
        let frame = self.frames;
        let state = &mut self.state;

        enter(&mut self.stage, &mut self.history, frame, FrameStage::MaskGeneration);
        state
            .mask
            .render(ctx, target.encoder, &state.sprite, &state.pair, TargetSlot::A);

        let iterations = state.blur.params().iterations;
        state.blur.prepare(ctx, &state.pair, iterations);
        let mut read = TargetSlot::A;
        for i in 0..iterations {
            enter(&mut self.stage, &mut self.history, frame, FrameStage::BlurIteration(i + 1));
            read = state.blur.iterate(ctx, target.encoder, &state.pair, read, i);
        }

        enter(&mut self.stage, &mut self.history, frame, FrameStage::Composite);
        let shadow_transform = state.shadow_transform();
        let sprite_model = state.sprite_model();
        state.composite.render(
            ctx,
            target,
            &state.sprite,
            state.pair.texture_of(read),
            shadow_transform,
            sprite_model,
        );
    }

    /// Records that the encoded frame was submitted and presented.
    pub fn mark_presented(&mut self) {
        enter(&mut self.stage, &mut self.history, self.frames, FrameStage::Presented);
        self.frames += 1;
    }

    /// Encodes, submits and reads back one frame on a headless surface.
    /// Returns tightly packed RGBA8 rows, top row first.
    pub fn render_offscreen(
        &mut self,
        gpu: &HeadlessGpu,
        surface: &HeadlessSurface,
    ) -> Result<Vec<u8>> {
        let ctx = gpu.render_ctx(surface);
        let mut encoder = gpu.create_encoder("penumbra headless frame");
        {
            let mut target = RenderTarget::new(&mut encoder, surface.view());
            self.encode(&ctx, &mut target);
        }
        gpu.submit_and_wait(encoder)
            .context("headless frame did not complete")?;
        self.mark_presented();
        surface.read_rgba8(gpu)
    }

    /// Tears down the frame state.
    pub fn release(self) {
        log::debug!("driver released after {} frames", self.frames);
        self.state.release();
    }
}

fn enter(stage: &mut FrameStage, history: &mut Vec<FrameStage>, frame: u64, next: FrameStage) {
    log::trace!("frame {frame}: {next:?}");
    *stage = next;
    history.push(next);
}
