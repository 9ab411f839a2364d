use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classification::Normalization;
use crate::detection::{ContourDetector, YoloParams};
use crate::error::{Result, WasteError};
use crate::pipeline::OutputOrder;

const DEFAULT_LABELS_PATH: &str = "utils/label_map.json";
const DEFAULT_DETECTOR_MODEL: &str = "models/yolov8m.rten";
const DEFAULT_CLASSIFIER_MODEL: &str = "models/waste_classifier.rten";

/// Startup configuration. Every field has a default so a config file only
/// needs to name what differs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub labels: PathBuf,
    pub detector: DetectorConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            labels: PathBuf::from(DEFAULT_LABELS_PATH),
            detector: DetectorConfig::default(),
            classifier: ClassifierConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectorBackend {
    #[default]
    Yolo,
    Contour,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub backend: DetectorBackend,
    pub model: PathBuf,
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Minimum edge pixels per region (contour backend).
    pub min_area: u32,
    /// Pixels added around each region (contour backend).
    pub padding: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let yolo = YoloParams::default();
        let contour = ContourDetector::default();
        Self {
            backend: DetectorBackend::default(),
            model: PathBuf::from(DEFAULT_DETECTOR_MODEL),
            input_size: yolo.input_size,
            conf_threshold: yolo.conf_threshold,
            iou_threshold: yolo.iou_threshold,
            max_detections: yolo.max_detections,
            min_area: contour.min_area,
            padding: contour.padding,
        }
    }
}

impl DetectorConfig {
    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.input_size,
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            max_detections: self.max_detections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub model: PathBuf,
    pub input_size: u32,
    pub normalization: Normalization,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from(DEFAULT_CLASSIFIER_MODEL),
            input_size: 224,
            normalization: Normalization::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub order: OutputOrder,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WasteError::configuration("config file", path, e))?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            WasteError::Configuration { what, reason, .. } => WasteError::Configuration {
                what,
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| WasteError::configuration("config file", "<inline>", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(WasteError::configuration("config file", "<inline>", reason));

        if self.detector.input_size == 0 {
            return invalid("detector.input_size must be positive");
        }
        if self.classifier.input_size == 0 {
            return invalid("classifier.input_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.detector.conf_threshold) {
            return invalid("detector.conf_threshold must lie in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return invalid("detector.iou_threshold must lie in [0, 1]");
        }
        Ok(())
    }
}
