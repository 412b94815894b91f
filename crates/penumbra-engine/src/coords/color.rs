use serde::Deserialize;

/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Used for clear colors and the `color_mod` tint multiplier; the tint is
/// applied per channel in the fragment stage, so `(0,0,0,a)` keeps only the
/// alpha shape and `(1,1,1,1)` leaves a texel untouched.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn transparent() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Decodes sRGB-encoded RGB channels to linear light; alpha is kept.
    ///
    /// Needed when a value authored for a plain UNORM target is written to an
    /// sRGB target, which re-encodes on store.
    pub fn srgb_to_linear(self) -> Self {
        fn decode(c: f32) -> f32 {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        Self::new(decode(self.r), decode(self.g), decode(self.b), self.a)
    }

    #[inline]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl From<[f32; 4]> for ColorRgba {
    #[inline]
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_decode_keeps_endpoints_and_alpha() {
        let c = ColorRgba::new(0.0, 1.0, 0.5, 0.25).srgb_to_linear();
        assert_eq!((c.r, c.g, c.a), (0.0, 1.0, 0.25));
        assert!((c.b - 0.2140).abs() < 1e-3, "{}", c.b);
    }
}
