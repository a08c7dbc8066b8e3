//! Error types for scene handling

use thiserror::Error;

/// Result type alias using [`SceneError`]
pub type Result<T> = std::result::Result<T, SceneError>;

/// Errors raised while loading or validating a scene
#[derive(Error, Debug)]
pub enum SceneError {
    /// A node parameter is out of range (non-positive radius, NaN, ...)
    #[error("invalid parameter at {path}: {message}")]
    InvalidParameter { path: String, message: String },

    /// The scene description is not valid JSON for a [`crate::Scene`]
    #[error("scene description error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SceneError {
    pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
