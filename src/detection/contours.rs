use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::BTreeMap;

use super::{preprocessing, Detector};
use crate::models::{BoundingBox, Detection};

/// Extent of one connected edge region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Contour {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Fraction of the bounding rectangle covered by edge pixels.
    pub fn density(&self) -> f32 {
        self.pixel_count as f32 / (self.width() * self.height()) as f32
    }
}

/// Find contours in binary edge image using connected components.
///
/// Contours come back ordered by component label, which keeps the result
/// stable across runs.
pub fn find_contours(edges: &GrayImage, min_area: u32) -> Vec<Contour> {
    let labeled = connected_components(edges, Connectivity::Eight, Luma([0]));

    let mut regions: BTreeMap<u32, (u32, u32, u32, u32, u32)> = BTreeMap::new();

    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // background
        }

        regions
            .entry(label_val)
            .and_modify(|(min_x, min_y, max_x, max_y, count)| {
                *min_x = (*min_x).min(x);
                *min_y = (*min_y).min(y);
                *max_x = (*max_x).max(x);
                *max_y = (*max_y).max(y);
                *count += 1;
            })
            .or_insert((x, y, x, y, 1));
    }

    regions
        .into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, count))| Contour {
            label,
            min_x,
            min_y,
            max_x,
            max_y,
            pixel_count: count,
        })
        .filter(|c| c.pixel_count >= min_area)
        .collect()
}

/// Model-free detector that proposes one box per strong edge region.
///
/// Useful without detector weights and as a deterministic fixture backend.
/// A flat image has no edges and therefore no detections.
#[derive(Debug, Clone)]
pub struct ContourDetector {
    pub blur_sigma: f32,
    pub low_threshold: f32,
    pub high_threshold: f32,
    pub min_area: u32,
    pub padding: u32,
}

impl Default for ContourDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            low_threshold: 50.0,
            high_threshold: 100.0,
            min_area: 40,
            padding: 4,
        }
    }
}

impl ContourDetector {
    pub fn new(min_area: u32, padding: u32) -> Self {
        Self {
            min_area,
            padding,
            ..Self::default()
        }
    }
}

impl Detector for ContourDetector {
    fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        let (img_width, img_height) = image.dimensions();
        if img_width == 0 || img_height == 0 {
            return Ok(Vec::new());
        }

        let gray = preprocessing::to_grayscale(image);
        let blurred = preprocessing::apply_blur(&gray, self.blur_sigma);
        let edges = preprocessing::detect_edges(&blurred, self.low_threshold, self.high_threshold);
        let contours = find_contours(&edges, self.min_area);

        tracing::debug!(contours = contours.len(), "edge regions found");

        let detections = contours
            .into_iter()
            .map(|contour| {
                // Padded box clamped to the image; x2/y2 are exclusive.
                let x1 = contour.min_x.saturating_sub(self.padding);
                let y1 = contour.min_y.saturating_sub(self.padding);
                let x2 = (contour.max_x + 1 + self.padding).min(img_width);
                let y2 = (contour.max_y + 1 + self.padding).min(img_height);

                Detection {
                    bbox: BoundingBox::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32),
                    score: contour.density().min(1.0),
                    class_id: 0,
                }
            })
            .collect();

        Ok(detections)
    }

    fn name(&self) -> &str {
        "contour"
    }
}
