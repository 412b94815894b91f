//! Ping-pong pair of offscreen color targets.

use crate::coords::ColorRgba;

use super::texture::Texture2D;
use super::{RenderCtx, RenderError};

/// Color format of both offscreen buffers. Only the alpha channel carries
/// information (the mask is black), so 8-bit unorm is enough.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// One of the two buffers in an [`OffscreenTargetPair`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TargetSlot {
    A,
    B,
}

impl TargetSlot {
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }

    /// The slot a pass reading `self` writes to.
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Slot holding the result after `passes` ping-pong passes starting here,
    /// i.e. `(index + passes) mod 2`.
    #[inline]
    pub const fn advance(self, passes: u32) -> Self {
        if passes % 2 == 0 { self } else { self.other() }
    }
}

/// Render target with exactly one color attachment.
pub struct OffscreenBuffer {
    color: Texture2D,
}

impl OffscreenBuffer {
    fn new(ctx: &RenderCtx<'_>, label: &'static str, width: u32, height: u32) -> Result<Self, RenderError> {
        let color = Texture2D::render_target(ctx.device, label, width, height, OFFSCREEN_FORMAT)?;
        Ok(Self { color })
    }

    pub fn texture(&self) -> &Texture2D {
        &self.color
    }

    /// Opens a render pass writing this buffer with the viewport covering it
    /// entirely. `clear = None` keeps the existing contents.
    pub fn begin_write<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &'static str,
        clear: Option<ColorRgba>,
    ) -> wgpu::RenderPass<'e> {
        let load = match clear {
            Some(c) => wgpu::LoadOp::Clear(c.to_wgpu()),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (w, h) = self.color.size();
        rpass.set_viewport(0.0, 0.0, w as f32, h as f32, 0.0, 1.0);
        rpass
    }
}

/// Two same-sized offscreen buffers for ping-pong filtering.
///
/// Single owner of both buffers. [`release`](Self::release) consumes the
/// pair, so releasing twice does not compile; a pair dropped without an
/// explicit release (early return, panic during setup) is released by `Drop`.
pub struct OffscreenTargetPair {
    buffers: [OffscreenBuffer; 2],
    width: u32,
    height: u32,
    released: bool,
}

impl OffscreenTargetPair {
    /// Allocates both buffers with linear-filtered, edge-clamped textures.
    ///
    /// Fails with [`RenderError::ResourceCreation`] for a zero-area size or
    /// one the device cannot allocate.
    pub fn create(ctx: &RenderCtx<'_>, width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::resource(
                "offscreen target pair",
                format!("zero-area target ({width}x{height})"),
            ));
        }

        // If B fails, A drops here and frees itself.
        let a = OffscreenBuffer::new(ctx, "penumbra offscreen A", width, height)?;
        let b = OffscreenBuffer::new(ctx, "penumbra offscreen B", width, height)?;

        log::debug!("offscreen pair created: {width}x{height} {OFFSCREEN_FORMAT:?}");

        Ok(Self {
            buffers: [a, b],
            width,
            height,
            released: false,
        })
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

    pub fn buffer(&self, slot: TargetSlot) -> &OffscreenBuffer {
        &self.buffers[slot.index()]
    }

    /// Sampling handle for `slot`.
    pub fn texture_of(&self, slot: TargetSlot) -> &Texture2D {
        self.buffers[slot.index()].texture()
    }

    /// Makes `slot` the active render destination; viewport set to the pair size.
    pub fn begin_write<'e>(
        &self,
        slot: TargetSlot,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &'static str,
        clear: Option<ColorRgba>,
    ) -> wgpu::RenderPass<'e> {
        self.buffers[slot.index()].begin_write(encoder, label, clear)
    }

    /// Frees both buffers.
    pub fn release(mut self) {
        self.destroy();
    }

    fn destroy(&mut self) {
        if self.released {
            return;
        }
        for buffer in &self.buffers {
            buffer.color.texture().destroy();
        }
        self.released = true;
        #[cfg(test)]
        tests::PAIRS_DESTROYED.with(|n| n.set(n.get() + 1));
        log::debug!("offscreen pair released");
    }
}

impl Drop for OffscreenTargetPair {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Offscreen size for a sprite: each axis scaled by `scale`, truncated,
/// and kept at least one pixel.
pub fn scaled_size(sprite: (u32, u32), scale: f32) -> (u32, u32) {
    let axis = |v: u32| ((v as f32 * scale) as u32).max(1);
    (axis(sprite.0), axis(sprite.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{gpu_or_skip, offscreen_ctx};

    // ── slot arithmetic ───────────────────────────────────────────────────

    #[test]
    fn slot_index_round_trips() {
        assert_eq!(TargetSlot::from_index(0), Some(TargetSlot::A));
        assert_eq!(TargetSlot::from_index(1), Some(TargetSlot::B));
        assert_eq!(TargetSlot::from_index(2), None);
        assert_eq!(TargetSlot::B.index(), 1);
    }

    #[test]
    fn advance_follows_parity() {
        for source in [TargetSlot::A, TargetSlot::B] {
            for n in 0..9u32 {
                let expected = (source.index() + n as usize) % 2;
                assert_eq!(source.advance(n).index(), expected, "source {source:?}, n {n}");
            }
        }
    }

    #[test]
    fn other_is_an_involution() {
        assert_eq!(TargetSlot::A.other(), TargetSlot::B);
        assert_eq!(TargetSlot::A.other().other(), TargetSlot::A);
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn half_scale_matches_integer_halving() {
        assert_eq!(scaled_size((256, 256), 0.5), (128, 128));
        assert_eq!(scaled_size((100, 100), 0.5), (50, 50));
        assert_eq!(scaled_size((301, 77), 0.5), (150, 38));
    }

    #[test]
    fn tiny_sprites_keep_one_pixel() {
        assert_eq!(scaled_size((1, 1), 0.5), (1, 1));
    }

    // ── GPU ───────────────────────────────────────────────────────────────

    thread_local! {
        pub(super) static PAIRS_DESTROYED: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
    }

    fn destroyed() -> usize {
        PAIRS_DESTROYED.with(|n| n.get())
    }

    #[test]
    fn dropped_pair_frees_its_buffers() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);

        let before = destroyed();
        {
            let _pair = OffscreenTargetPair::create(&ctx, 8, 8).unwrap();
            assert_eq!(destroyed(), before);
        }
        assert_eq!(destroyed(), before + 1);
    }

    #[test]
    fn released_pair_is_not_destroyed_again_on_drop() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);

        let before = destroyed();
        let pair = OffscreenTargetPair::create(&ctx, 8, 8).unwrap();
        // `release` consumes the pair, so its own `Drop` runs right after.
        pair.release();
        assert_eq!(destroyed(), before + 1);
    }

    #[test]
    fn failed_create_destroys_nothing() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);

        let before = destroyed();
        assert!(OffscreenTargetPair::create(&ctx, 0, 8).is_err());
        assert_eq!(destroyed(), before);
    }

    #[test]
    fn zero_size_pair_is_rejected() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);

        for (w, h) in [(0, 16), (16, 0), (0, 0)] {
            let err = OffscreenTargetPair::create(&ctx, w, h).err();
            assert!(
                matches!(err, Some(RenderError::ResourceCreation { .. })),
                "{w}x{h} should fail"
            );
        }
    }

    #[test]
    fn oversized_pair_is_rejected() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);
        let too_big = gpu.device().limits().max_texture_dimension_2d + 1;

        let err = OffscreenTargetPair::create(&ctx, too_big, 4).err();
        assert!(matches!(err, Some(RenderError::ResourceCreation { .. })));
    }

    #[test]
    fn pair_buffers_share_size_and_differ() {
        let Some(gpu) = gpu_or_skip() else { return };
        let ctx = offscreen_ctx(&gpu);

        let pair = OffscreenTargetPair::create(&ctx, 64, 32).unwrap();
        let a = pair.texture_of(TargetSlot::A);
        let b = pair.texture_of(TargetSlot::B);
        assert_eq!(a.size(), (64, 32));
        assert_eq!(b.size(), (64, 32));
        assert_ne!(a.id(), b.id());
        assert!(a.is_linear() && b.is_linear());
        pair.release();
    }
}
