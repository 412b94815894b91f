use std::path::PathBuf;

/// Failures raised by the render core.
///
/// `ResourceCreation` is fatal and aborts startup. `AssetLoad` is recovered
/// by the caller (fallback sprite) and only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },

    #[error("failed to load sprite {}: {reason}", path.display())]
    AssetLoad { path: PathBuf, reason: String },
}

impl RenderError {
    pub(crate) fn resource(what: &'static str, reason: impl Into<String>) -> Self {
        Self::ResourceCreation {
            what,
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceCreation { .. })
    }
}
