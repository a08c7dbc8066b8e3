//! Error types for the render pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`RenderError`]
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors raised while building or running the pipeline
#[derive(Error, Debug)]
pub enum RenderError {
    /// A shader or scene file could not be read
    #[error("failed to read {}: {source}", path.display())]
    ResourceLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source text did not compile (WGSL parse error or invalid scene)
    #[error("{stage} failed to compile:\n{message}")]
    Compile { stage: String, message: String },

    /// A compiled program failed validation or pipeline creation
    #[error("{program} program failed to link: {message}")]
    Link { program: String, message: String },

    /// Renderer construction failed; nothing was kept
    #[error("renderer creation failed: {0}")]
    Creation(#[source] Box<RenderError>),

    /// Adapter, device, surface or resource allocation failure
    #[error("graphics device error: {0}")]
    Device(String),
}

impl RenderError {
    pub(crate) fn compile(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub(crate) fn link(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Link {
            program: program.into(),
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`RenderError::Creation`]
    pub fn root_cause(&self) -> &RenderError {
        match self {
            Self::Creation(inner) => inner.root_cause(),
            other => other,
        }
    }
}
