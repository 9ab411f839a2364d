use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::path::Path;

use super::preprocessing::{self, Letterbox};
use super::Detector;
use crate::models::{BoundingBox, Detection};

#[derive(Debug, Clone, PartialEq)]
pub struct YoloParams {
    /// Side length of the square model input.
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Candidate box in source-image float coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

impl RawBox {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// YOLOv8-style detector running on rten.
///
/// Expects a single `[1, 4 + classes, candidates]` output where the first
/// four rows are `cx, cy, w, h` in input pixels and the rest are per-class
/// scores.
pub struct YoloDetector {
    model: Model,
    params: YoloParams,
}

impl YoloDetector {
    pub fn load(path: impl AsRef<Path>, params: YoloParams) -> Result<Self> {
        let path = path.as_ref();
        let model = Model::load_file(path)
            .with_context(|| format!("failed to load detector model {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            input_size = params.input_size,
            conf_threshold = params.conf_threshold,
            "detector model loaded"
        );

        Ok(Self { model, params })
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "image has no pixels");

        let size = self.params.input_size as usize;
        let (input, letterbox) = preprocessing::letterbox(&image.to_rgb8(), self.params.input_size);
        let tensor = NdTensor::from_data([1, 3, size, size], preprocessing::to_chw(&input, None));

        let output: NdTensor<f32, 3> = self
            .model
            .run_one(tensor.view().into(), None)
            .context("detector forward pass failed")?
            .try_into()
            .context("detector output is not a rank-3 f32 tensor")?;

        let [_, rows, candidates] = output.shape();
        let values = output.to_vec();
        let detections = decode_yolo_output(
            &values,
            rows,
            candidates,
            &letterbox,
            (width, height),
            &self.params,
        )?;

        tracing::debug!(candidates, kept = detections.len(), "detector output decoded");
        Ok(detections)
    }

    fn name(&self) -> &str {
        "yolo"
    }
}

/// Turn a flattened `[4 + classes, candidates]` output into detections in
/// source-image coordinates.
///
/// Boxes are filtered by score, suppressed per class, clipped to the image
/// and returned by descending score.
pub fn decode_yolo_output(
    values: &[f32],
    rows: usize,
    candidates: usize,
    letterbox: &Letterbox,
    (width, height): (u32, u32),
    params: &YoloParams,
) -> Result<Vec<Detection>> {
    ensure!(rows > 4, "detector output has {rows} rows, expected at least 5");
    ensure!(
        values.len() == rows * candidates,
        "detector output has {} values, expected {rows}x{candidates}",
        values.len()
    );

    let at = |row: usize, i: usize| values[row * candidates + i];
    let (max_x, max_y) = (width as f32, height as f32);

    let mut boxes = Vec::new();
    for i in 0..candidates {
        let (class_id, score) = (4..rows)
            .map(|row| (row - 4, at(row, i)))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score.is_nan() || score <= params.conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let (x1, y1) = letterbox.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_source(cx + w / 2.0, cy + h / 2.0);

        boxes.push(RawBox {
            x1: x1.clamp(0.0, max_x),
            y1: y1.clamp(0.0, max_y),
            x2: x2.clamp(0.0, max_x),
            y2: y2.clamp(0.0, max_y),
            score,
            class_id,
        });
    }

    let mut kept = non_max_suppression(boxes, params.iou_threshold);
    kept.truncate(params.max_detections);

    Ok(kept
        .into_iter()
        .map(|b| Detection {
            bbox: BoundingBox::from_xyxy(b.x1, b.y1, b.x2, b.y2),
            score: b.score,
            class_id: b.class_id,
        })
        .collect())
}

/// Greedy per-class non-maximum suppression. Output is sorted by score,
/// highest first; ties keep their input order.
pub fn non_max_suppression(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<RawBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection over union of two boxes.
pub fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
