//! Placement of the shadow quad and the sprite quad on screen.
//!
//! The shadow is the blurred mask laid flat behind the sprite: squashed
//! vertically, sheared along X, and anchored near the sprite's base.

use glam::{Mat4, Vec3, Vec4};
use serde::Deserialize;

use crate::coords::Vec2;
use crate::frame::ConfigError;

/// Tunable look of the projected shadow.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    /// Horizontal shift from the sprite position, in px.
    pub offset_x: f32,
    /// Vertical shift as a fraction of the sprite height.
    pub offset_y_factor: f32,
    /// X shear per unit of Y.
    pub shear: f32,
    /// Vertical scale applied to the sprite height.
    pub squash: f32,
    /// Shadow opacity at full mask coverage.
    pub alpha: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            offset_x: 40.0,
            offset_y_factor: 0.9,
            shear: 1.2,
            squash: 0.5,
            alpha: 0.5,
        }
    }
}

impl ShadowStyle {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("shadow.offset_x", self.offset_x),
            ("shadow.offset_y_factor", self.offset_y_factor),
            ("shadow.shear", self.shear),
            ("shadow.squash", self.squash),
        ];
        for (field, v) in fields {
            if !v.is_finite() {
                return Err(ConfigError::invalid(field, format!("must be finite, got {v}")));
            }
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::invalid(
                "shadow.alpha",
                format!("must be within [0, 1], got {}", self.alpha),
            ));
        }
        Ok(())
    }
}

/// Shear along X proportional to Y: `x' = x + k·y`.
fn shear_x(k: f32) -> Mat4 {
    Mat4::from_cols(Vec4::X, Vec4::new(k, 1.0, 0.0, 0.0), Vec4::Z, Vec4::W)
}

/// Model matrix of the shadow quad:
/// `translate(pos + (offset_x, offset_y_factor·h)) · shear_x(shear) · scale(w, h·squash)`.
pub fn shadow_transform(style: &ShadowStyle, pos: Vec2, w: f32, h: f32) -> Mat4 {
    let origin = Vec3::new(pos.x + style.offset_x, pos.y + style.offset_y_factor * h, 0.0);
    Mat4::from_translation(origin)
        * shear_x(style.shear)
        * Mat4::from_scale(Vec3::new(w, h * style.squash, 1.0))
}

/// Model matrix of the sprite quad: `translate(pos) · scale(w, h)`.
pub fn sprite_model(pos: Vec2, w: f32, h: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(pos.x, pos.y, 0.0)) * Mat4::from_scale(Vec3::new(w, h, 1.0))
}
