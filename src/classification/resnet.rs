use anyhow::{Context, Result};
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use serde::Deserialize;
use std::path::Path;

use super::{check_output_width, classify_logits, Classifier};
use crate::crop::Crop;
use crate::detection::preprocessing::{self, ChannelStats};
use crate::labels::LabelMap;
use crate::models::{BoundingBox, Classification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// ImageNet mean/std, as used when the classifier head was trained.
    #[default]
    Imagenet,
    /// Pixels scaled to `[0, 1]` only.
    None,
}

impl Normalization {
    fn stats(&self) -> Option<&'static ChannelStats> {
        match self {
            Normalization::Imagenet => Some(&ChannelStats::IMAGENET),
            Normalization::None => None,
        }
    }
}

/// ResNet-style classifier running on rten.
///
/// The model takes `[1, 3, S, S]` RGB input and returns `[1, classes]`
/// logits where `classes` equals the label map size.
pub struct RtenClassifier {
    model: Model,
    labels: LabelMap,
    input_size: u32,
    normalization: Normalization,
}

impl RtenClassifier {
    pub fn load(
        path: impl AsRef<Path>,
        labels: LabelMap,
        input_size: u32,
        normalization: Normalization,
    ) -> Result<Self> {
        let path = path.as_ref();
        let model = Model::load_file(path)
            .with_context(|| format!("failed to load classifier model {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            classes = labels.len(),
            input_size,
            "classifier model loaded"
        );

        Ok(Self {
            model,
            labels,
            input_size,
            normalization,
        })
    }

    fn logits(&self, crop: &Crop) -> Result<Vec<f32>> {
        let size = self.input_size;
        let rgb = crop.image.to_rgb8();
        let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);
        let data = preprocessing::to_chw(&resized, self.normalization.stats());
        let tensor = NdTensor::from_data([1, 3, size as usize, size as usize], data);

        let output: NdTensor<f32, 2> = self
            .model
            .run_one(tensor.view().into(), None)
            .context("classifier forward pass failed")?
            .try_into()
            .context("classifier output is not a rank-2 f32 tensor")?;

        Ok(output.to_vec())
    }
}

impl Classifier for RtenClassifier {
    fn classify(&self, crop: &Crop) -> Result<Classification> {
        let logits = self.logits(crop)?;
        classify_logits(&self.labels, &logits)
    }

    fn name(&self) -> &str {
        "rten-resnet"
    }

    /// Run one blank crop through the model to check the output width
    /// against the label map.
    fn warm_up(&self) -> Result<()> {
        let blank = Crop {
            image: image::DynamicImage::new_rgb8(self.input_size, self.input_size),
            bbox: BoundingBox::new(0, 0, self.input_size as i32, self.input_size as i32),
        };
        let logits = self.logits(&blank)?;
        check_output_width(&self.labels, logits.len())
    }
}
