use image::{DynamicImage, GenericImageView};

use crate::models::BoundingBox;

/// Sub-image cut out for one detection.
#[derive(Debug, Clone)]
pub struct Crop {
    pub image: DynamicImage,
    /// The box as the detector reported it, before clipping.
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `x2 <= x1` or `y2 <= y1`.
    Inverted,
    /// The box lies entirely outside the image.
    Empty,
}

#[derive(Debug, Clone)]
pub enum CropOutcome {
    Crop(Crop),
    Skip(SkipReason),
}

impl CropOutcome {
    pub fn into_crop(self) -> Option<Crop> {
        match self {
            CropOutcome::Crop(crop) => Some(crop),
            CropOutcome::Skip(_) => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, CropOutcome::Skip(_))
    }
}

/// Cut the region covered by `bbox` out of `image`.
///
/// The region is clipped to the image bounds. Boxes that are inverted or
/// that cover no pixel after clipping are skipped rather than reported as
/// errors.
pub fn extract(image: &DynamicImage, bbox: &BoundingBox) -> CropOutcome {
    if bbox.is_degenerate() {
        return CropOutcome::Skip(SkipReason::Inverted);
    }

    let (width, height) = image.dimensions();
    let x1 = clamp_coord(bbox.x1, width);
    let y1 = clamp_coord(bbox.y1, height);
    let x2 = clamp_coord(bbox.x2, width);
    let y2 = clamp_coord(bbox.y2, height);

    if x2 <= x1 || y2 <= y1 {
        return CropOutcome::Skip(SkipReason::Empty);
    }

    CropOutcome::Crop(Crop {
        image: image.crop_imm(x1, y1, x2 - x1, y2 - y1),
        bbox: *bbox,
    })
}

fn clamp_coord(value: i32, limit: u32) -> u32 {
    (value.max(0) as u32).min(limit)
}
