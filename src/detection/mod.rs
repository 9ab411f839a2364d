pub mod contours;
pub mod preprocessing;
pub mod yolo;

use image::DynamicImage;

use crate::models::Detection;

pub use contours::ContourDetector;
pub use yolo::{YoloDetector, YoloParams};

/// Object localization backend.
///
/// `detect` returns boxes in the pixel space of `image`, in whatever order
/// the backend produces them. Callers must not treat that order as a
/// ranking. Implementations are shared between requests and must not keep
/// per-call state.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>>;

    /// Human-readable backend name (used in logs).
    fn name(&self) -> &str;
}
