use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, WasteError};
use crate::models::PredictionResponse;
use crate::pipeline::Pipeline;

const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// An uploaded image persisted for the duration of one request.
///
/// The file is removed when the value is dropped, so it is cleaned up on
/// every exit path including errors and panics that unwind.
#[derive(Debug)]
pub struct ScopedUpload {
    path: PathBuf,
}

impl ScopedUpload {
    /// Write `bytes` to `<dir>/<uuid>.<ext>`, taking the extension from the
    /// client-supplied `file_name`.
    pub fn persist(dir: impl AsRef<Path>, file_name: &str, bytes: &[u8]) -> Result<Self> {
        Self::persist_from(dir, file_name, bytes)
    }

    /// Like [`ScopedUpload::persist`], streaming the body from `reader`.
    /// A partially written file is removed when the copy fails.
    pub fn persist_from(
        dir: impl AsRef<Path>,
        file_name: &str,
        mut reader: impl Read,
    ) -> Result<Self> {
        let extension = accepted_extension(file_name)?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| WasteError::io(dir, e))?;

        let upload = Self {
            path: dir.join(format!("{}.{extension}", uuid::Uuid::new_v4())),
        };
        let mut file = File::create(&upload.path).map_err(|e| WasteError::io(&upload.path, e))?;
        let size = std::io::copy(&mut reader, &mut file)
            .map_err(|e| WasteError::io(&upload.path, e))?;
        drop(file);
        tracing::debug!(path = %upload.path.display(), size, "upload persisted");

        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove upload");
            }
        }
    }
}

/// Persist an upload, run the pipeline on it and remove it again.
pub fn classify_upload(
    pipeline: &Pipeline,
    dir: impl AsRef<Path>,
    file_name: &str,
    bytes: &[u8],
) -> Result<PredictionResponse> {
    let upload = ScopedUpload::persist(dir, file_name, bytes)?;
    let predictions = pipeline.run(upload.path())?;
    Ok(PredictionResponse::from(&predictions))
}

fn accepted_extension(file_name: &str) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(WasteError::UnsupportedUpload(extension))
    }
}
