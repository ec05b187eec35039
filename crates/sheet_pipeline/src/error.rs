//! Error type shared by every pipeline stage

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Filesystem failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image could not be decoded or encoded
    #[error("image error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Identifier does not follow the `<section>-<index>` convention
    #[error("invalid identifier {0:?}: expected <roman section>-<index>, e.g. \"I-4\"")]
    InvalidIdentifier(String),

    /// Region table or label table violates an invariant
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text recognition engine failed for one attempt
    #[error("recognition failed: {0}")]
    Recognition(String),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }
}
