use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures that cross the boundary of the classification core.
///
/// `Configuration` only happens while the pipeline is being assembled.
/// Everything else belongs to a single request.
#[derive(Debug, Error)]
pub enum WasteError {
    #[error("configuration error: {what} at {}: {reason}", path.display())]
    Configuration {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("detector failed: {0:#}")]
    Detector(anyhow::Error),

    #[error("classifier failed: {0:#}")]
    Classifier(anyhow::Error),

    #[error("unsupported upload type: {0:?} (expected jpg, jpeg or png)")]
    UnsupportedUpload(String),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WasteError {
    pub(crate) fn configuration(
        what: &'static str,
        path: impl AsRef<Path>,
        reason: impl ToString,
    ) -> Self {
        WasteError::Configuration {
            what,
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        WasteError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for failures caused by one request's input rather than by a
    /// broken startup configuration.
    pub fn is_request_error(&self) -> bool {
        !matches!(self, WasteError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, WasteError>;
