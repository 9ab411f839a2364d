//! Integration tests for scoped upload handling.
//!
//! Uploaded files must be gone after the request, whether the pipeline
//! succeeded or failed.

mod common;

use wastesort::upload::{classify_upload, ScopedUpload};

use common::*;

/// Yields `prefix` and then fails, like a connection dropped mid-upload.
struct BrokenReader {
    prefix: &'static [u8],
}

impl std::io::Read for BrokenReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.prefix.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away"));
        }
        let n = self.prefix.len().min(buf.len());
        buf[..n].copy_from_slice(&self.prefix[..n]);
        self.prefix = &self.prefix[n..];
        Ok(n)
    }
}

fn dir_is_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir).map(|mut e| e.next().is_none()).unwrap_or(true)
}

#[test]
fn test_upload_removed_on_drop() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let uploads = dir.path().join("temp_uploads");

    let path = {
        let upload = ScopedUpload::persist(&uploads, "photo.JPG", b"bytes")?;
        assert!(upload.path().exists());
        assert_eq!(upload.path().extension().unwrap(), "jpg");
        upload.path().to_path_buf()
    };

    assert!(!path.exists());
    assert!(dir_is_empty(&uploads));

    Ok(())
}

#[test]
fn test_classify_upload_success_cleans_up() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let bytes = png_bytes(&scene(40, 40, &[((0, 0, 20, 20), RED)]));
    let (pipeline, _detector, _classifier) =
        channel_pipeline(vec![BoundingBox::new(0, 0, 20, 20)]);

    let response = classify_upload(&pipeline, dir.path(), "bottle.png", &bytes)?;

    assert_eq!(response.predictions.len(), 1);
    assert_eq!(response.predictions[0].prediction, "plastic");
    assert_eq!(response.predictions[0].bbox, Some([0, 0, 20, 20]));
    assert!(dir_is_empty(dir.path()));

    Ok(())
}

#[test]
fn test_classify_upload_failure_cleans_up() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let (pipeline, _detector, _classifier) = channel_pipeline(vec![]);

    let err = classify_upload(&pipeline, dir.path(), "broken.jpg", b"not a jpeg").unwrap_err();

    assert!(matches!(err, WasteError::Decode { .. }));
    assert!(dir_is_empty(dir.path()));

    Ok(())
}

#[test]
fn test_empty_detection_is_successful_response() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let bytes = png_bytes(&scene(16, 16, &[]));
    let (pipeline, _detector, _classifier) = channel_pipeline(vec![]);

    let response = classify_upload(&pipeline, dir.path(), "blank.png", &bytes)?;

    assert_eq!(response.predictions, vec![PredictionEntry::sentinel()]);

    Ok(())
}

#[test]
fn test_rejects_unsupported_extension() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    for name in ["document.pdf", "noextension", "image.gif"] {
        let err = ScopedUpload::persist(dir.path(), name, b"bytes").unwrap_err();
        assert!(matches!(err, WasteError::UnsupportedUpload(_)), "{name}");
    }
    assert!(dir_is_empty(dir.path()));

    Ok(())
}

#[test]
fn test_failed_write_leaves_no_partial_file() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let uploads = dir.path().join("temp_uploads");

    let err = ScopedUpload::persist_from(&uploads, "photo.png", BrokenReader { prefix: b"\x89PNG" })
        .unwrap_err();

    assert!(matches!(err, WasteError::Io { .. }));
    assert!(dir_is_empty(&uploads));

    Ok(())
}
