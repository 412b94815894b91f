use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::coords::{ColorRgba, Vec2};
use crate::render::blur::BlurParameters;
use crate::render::shadow::ShadowStyle;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {origin}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Window / surface settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            title: "penumbra".to_string(),
        }
    }
}

/// What to draw and where.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    pub path: PathBuf,
    /// Top-left corner on screen, in px.
    pub position: Vec2,
    /// Size of the transparent stand-in used when the image cannot be loaded.
    pub fallback_size: (u32, u32),
    /// Offscreen pair size relative to the sprite.
    pub mask_scale: f32,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("2.png"),
            position: Vec2::new(300.0, 200.0),
            fallback_size: (100, 100),
            mask_scale: 0.5,
        }
    }
}

/// Everything the renderer needs to build a [`FrameState`](super::FrameState).
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub surface: SurfaceConfig,
    pub sprite: SpriteConfig,
    pub blur: BlurParameters,
    pub shadow: ShadowStyle,
    pub background: ColorRgba,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceConfig::default(),
            sprite: SpriteConfig::default(),
            blur: BlurParameters::default(),
            shadow: ShadowStyle::default(),
            background: ColorRgba::new(0.6, 0.7, 0.8, 1.0),
        }
    }
}

impl PipelineConfig {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, &path.display().to_string())?;
        log::debug!("config loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<string>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.surface;
        if s.width == 0 || s.height == 0 {
            return Err(ConfigError::invalid(
                "surface",
                format!("size must be non-zero, got {}x{}", s.width, s.height),
            ));
        }

        let sp = &self.sprite;
        if !sp.position.is_finite() {
            return Err(ConfigError::invalid("sprite.position", "must be finite"));
        }
        if sp.fallback_size.0 == 0 || sp.fallback_size.1 == 0 {
            return Err(ConfigError::invalid(
                "sprite.fallback_size",
                format!("must be non-zero, got {:?}", sp.fallback_size),
            ));
        }
        if !(sp.mask_scale > 0.0 && sp.mask_scale <= 1.0) {
            return Err(ConfigError::invalid(
                "sprite.mask_scale",
                format!("must be within (0, 1], got {}", sp.mask_scale),
            ));
        }

        if !self.background.is_finite() {
            return Err(ConfigError::invalid("background", "must be finite"));
        }

        self.blur.validate()?;
        self.shadow.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.surface.width, 1920);
        assert_eq!(config.sprite.path, PathBuf::from("2.png"));
        assert_eq!(config.background, ColorRgba::new(0.6, 0.7, 0.8, 1.0));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let text = r#"
            background = [0.0, 0.0, 0.0, 1.0]

            [sprite]
            path = "hero.png"
            position = [10.0, 20.0]

            [blur]
            iterations = 5

            [shadow]
            alpha = 0.25
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();

        assert_eq!(config.sprite.path, PathBuf::from("hero.png"));
        assert_eq!(config.sprite.position, Vec2::new(10.0, 20.0));
        assert_eq!(config.sprite.mask_scale, 0.5);
        assert_eq!(config.blur.iterations, 5);
        assert_eq!(config.blur.step_offset(0), 1.0);
        assert_eq!(config.shadow.alpha, 0.25);
        assert_eq!(config.shadow.shear, 1.2);
        assert_eq!(config.background, ColorRgba::black());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = PipelineConfig::from_toml_str("[blur\niterations = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn validation_runs_after_parse() {
        let err = PipelineConfig::from_toml_str("[blur]\noffset_step = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "blur.offset_step", .. }));

        let err = PipelineConfig::from_toml_str("[surface]\nwidth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "surface", .. }));

        let err = PipelineConfig::from_toml_str("[sprite]\nmask_scale = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "sprite.mask_scale", .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::load(Path::new("definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
