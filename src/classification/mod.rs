pub mod resnet;

use anyhow::{anyhow, ensure};

use crate::crop::Crop;
use crate::labels::LabelMap;
use crate::models::Classification;

pub use resnet::{Normalization, RtenClassifier};

/// Single-crop image classifier.
pub trait Classifier: Send + Sync {
    fn classify(&self, crop: &Crop) -> anyhow::Result<Classification>;

    fn name(&self) -> &str;

    /// Optional check run once at startup, before any request.
    fn warm_up(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and value of the largest element; first one wins on ties.
pub fn top1(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

/// Map one crop's raw logits to its top-1 labelled classification.
///
/// The logits must be finite and there must be exactly one per label.
pub fn classify_logits(labels: &LabelMap, logits: &[f32]) -> anyhow::Result<Classification> {
    ensure!(
        logits.len() == labels.len(),
        "classifier produced {} logits for {} labels",
        logits.len(),
        labels.len()
    );
    ensure!(
        logits.iter().all(|l| l.is_finite()),
        "classifier produced non-finite logits"
    );

    let probabilities = softmax(logits);
    let (class_index, confidence) =
        top1(&probabilities).ok_or_else(|| anyhow!("classifier produced no logits"))?;
    let category = labels
        .get(class_index)
        .ok_or_else(|| anyhow!("class index {class_index} has no label"))?
        .to_string();

    Ok(Classification {
        category,
        class_index,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Fails unless a classifier with `width` outputs matches `labels`.
pub fn check_output_width(labels: &LabelMap, width: usize) -> anyhow::Result<()> {
    ensure!(
        width == labels.len(),
        "classifier has {width} outputs but the label map has {} entries",
        labels.len()
    );
    Ok(())
}
