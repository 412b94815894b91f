use glam::Mat4;

use crate::coords::Vec2;
use crate::render::blur::BlurFilter;
use crate::render::common::QuadMesh;
use crate::render::composite::CompositePass;
use crate::render::mask::MaskPass;
use crate::render::offscreen::{scaled_size, OffscreenTargetPair};
use crate::render::program::{KawaseProgram, TintProgram};
use crate::render::shadow::{shadow_transform, sprite_model, ShadowStyle};
use crate::render::texture::{load_sprite, Texture2D};
use crate::render::{RenderCtx, RenderError};

use super::PipelineConfig;

/// GPU objects that live for the whole run: programs, passes, the sprite
/// texture and the offscreen pair, plus the scene parameters.
///
/// Built once, reused every frame, released once.
pub struct FrameState {
    pub(super) sprite: Texture2D,
    pub(super) pair: OffscreenTargetPair,
    pub(super) mask: MaskPass,
    pub(super) blur: BlurFilter,
    pub(super) composite: CompositePass,
    position: Vec2,
    shadow: ShadowStyle,
}

impl FrameState {
    /// Loads the configured sprite (transparent fallback on failure) and
    /// builds everything around it.
    pub fn create(ctx: &RenderCtx<'_>, config: &PipelineConfig) -> Result<Self, RenderError> {
        let sprite = load_sprite(ctx, &config.sprite.path, config.sprite.fallback_size)?;
        Self::with_sprite(ctx, config, sprite)
    }

    /// Like [`create`](Self::create) with an already uploaded sprite.
    pub fn with_sprite(
        ctx: &RenderCtx<'_>,
        config: &PipelineConfig,
        sprite: Texture2D,
    ) -> Result<Self, RenderError> {
        let tint = TintProgram::new(ctx.device);
        let kawase = KawaseProgram::new(ctx.device);
        let quad = QuadMesh::new(ctx.device);

        let (pw, ph) = scaled_size(sprite.size(), config.sprite.mask_scale);
        let pair = OffscreenTargetPair::create(ctx, pw, ph)?;

        let mask = MaskPass::new(ctx.device, &tint, quad.clone());
        let blur = BlurFilter::new(ctx, &kawase, config.blur);
        let composite = CompositePass::new(
            ctx.device,
            &tint,
            quad,
            ctx.surface_format,
            config.background,
            config.shadow.alpha,
        );

        log::info!(
            "frame state ready: sprite {}x{} at ({}, {}), mask {pw}x{ph}, {} blur iterations",
            sprite.width(),
            sprite.height(),
            config.sprite.position.x,
            config.sprite.position.y,
            config.blur.iterations
        );

        Ok(Self {
            sprite,
            pair,
            mask,
            blur,
            composite,
            position: config.sprite.position,
            shadow: config.shadow,
        })
    }

    pub fn sprite(&self) -> &Texture2D {
        &self.sprite
    }

    pub fn pair(&self) -> &OffscreenTargetPair {
        &self.pair
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn shadow_style(&self) -> &ShadowStyle {
        &self.shadow
    }

    pub fn blur_iterations(&self) -> u32 {
        self.blur.params().iterations
    }

    /// Shadow model matrix for the current sprite placement.
    pub fn shadow_transform(&self) -> Mat4 {
        let (w, h) = self.sprite.size();
        shadow_transform(&self.shadow, self.position, w as f32, h as f32)
    }

    pub fn sprite_model(&self) -> Mat4 {
        let (w, h) = self.sprite.size();
        sprite_model(self.position, w as f32, h as f32)
    }

    /// Frees the offscreen pair and the sprite texture.
    pub fn release(self) {
        self.pair.release();
        self.sprite.release();
        log::debug!("frame state released");
    }
}
