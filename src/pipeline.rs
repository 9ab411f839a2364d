use image::{DynamicImage, GenericImageView, ImageReader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span};

use crate::classification::{Classifier, RtenClassifier};
use crate::config::{Config, DetectorBackend};
use crate::crop::{self, CropOutcome};
use crate::detection::{ContourDetector, Detector, YoloDetector};
use crate::error::{Result, WasteError};
use crate::labels::LabelMap;
use crate::models::{Prediction, PredictionSet};

/// Order of entries in a non-empty `PredictionSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputOrder {
    /// The order the detector emitted its boxes in.
    #[default]
    Detection,
    /// Classifier confidence, highest first. Equal confidences keep
    /// detection order.
    Confidence,
}

/// Where debug crops go; each run takes the next numbered subdirectory.
#[derive(Clone, Debug)]
struct DebugConfig {
    output_dir: PathBuf,
    runs: Arc<AtomicUsize>,
}

/// Settings shared by every run of a pipeline.
#[derive(Clone, Debug, Default)]
struct PipelineContext {
    order: OutputOrder,
    debug: Option<DebugConfig>,
}

/// Detector → crop → classifier orchestration for one image at a time.
///
/// Models are injected at construction and shared read-only, so a
/// `Pipeline` can be cloned into as many request handlers as needed.
#[derive(Clone)]
pub struct Pipeline {
    detector: Arc<dyn Detector>,
    classifier: Arc<dyn Classifier>,
    context: PipelineContext,
}

impl Pipeline {
    pub fn new(detector: Arc<dyn Detector>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            detector,
            classifier,
            context: PipelineContext::default(),
        }
    }

    /// Build the pipeline described by `config`.
    ///
    /// This is the startup phase: a missing or unusable label map, detector
    /// or classifier fails here with `WasteError::Configuration`.
    pub fn load(config: &Config) -> Result<Self> {
        let labels = LabelMap::load(&config.labels)?;

        let detector: Arc<dyn Detector> = match config.detector.backend {
            DetectorBackend::Yolo => {
                let path = &config.detector.model;
                require_file("detector model", path)?;
                let detector = YoloDetector::load(path, config.detector.yolo_params())
                    .map_err(|e| WasteError::configuration("detector model", path, format!("{e:#}")))?;
                Arc::new(detector)
            }
            DetectorBackend::Contour => Arc::new(ContourDetector::new(
                config.detector.min_area,
                config.detector.padding,
            )),
        };

        let path = &config.classifier.model;
        require_file("classifier model", path)?;
        let classifier = RtenClassifier::load(
            path,
            labels,
            config.classifier.input_size,
            config.classifier.normalization,
        )
        .map_err(|e| WasteError::configuration("classifier model", path, format!("{e:#}")))?;
        classifier
            .warm_up()
            .map_err(|e| WasteError::configuration("classifier model", path, format!("{e:#}")))?;

        info!(
            detector = detector.name(),
            classifier = classifier.name(),
            order = ?config.pipeline.order,
            "pipeline ready"
        );

        Ok(Self::new(detector, Arc::new(classifier)).with_order(config.pipeline.order))
    }

    pub fn with_order(mut self, order: OutputOrder) -> Self {
        self.context.order = order;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let mut entries =
                std::fs::read_dir(&output_dir).map_err(|e| WasteError::io(&output_dir, e))?;
            if entries.next().is_some() {
                return Err(WasteError::io(
                    &output_dir,
                    std::io::Error::other("debug directory is not empty"),
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir).map_err(|e| WasteError::io(&output_dir, e))?;
        }

        self.context.debug = Some(DebugConfig {
            output_dir,
            runs: Arc::new(AtomicUsize::new(0)),
        });

        Ok(self)
    }

    /// Classify every object found in the image at `image_path`.
    ///
    /// Fails with `NotFound` before touching any model when the path does
    /// not name a file, and with `Decode` when the bytes are not an image.
    /// Finding nothing is not a failure: the sentinel set is returned.
    pub fn run(&self, image_path: impl AsRef<Path>) -> Result<PredictionSet> {
        let path = image_path.as_ref();
        let _span = info_span!("run", path = %path.display()).entered();

        if !path.is_file() {
            return Err(WasteError::NotFound(path.to_path_buf()));
        }

        let image = decode_image(path)?;
        self.run_image(&image)
    }

    /// Same as [`Pipeline::run`] for an image that is already decoded.
    pub fn run_image(&self, image: &DynamicImage) -> Result<PredictionSet> {
        let (width, height) = image.dimensions();
        let detections = self.detector.detect(image).map_err(WasteError::Detector)?;
        info!(
            detector = self.detector.name(),
            width,
            height,
            boxes = detections.len(),
            "detection finished"
        );

        let debug_dir = self.next_debug_dir()?;
        let mut predictions = Vec::with_capacity(detections.len());

        for (index, detection) in detections.iter().enumerate() {
            let crop = match crop::extract(image, &detection.bbox) {
                CropOutcome::Crop(crop) => crop,
                CropOutcome::Skip(reason) => {
                    debug!(index, bbox = ?detection.bbox, ?reason, "skipping box");
                    continue;
                }
            };

            let classification = self
                .classifier
                .classify(&crop)
                .map_err(WasteError::Classifier)?;
            debug!(
                index,
                bbox = ?detection.bbox,
                category = %classification.category,
                confidence = classification.confidence,
                "crop classified"
            );

            if let Some(dir) = &debug_dir {
                let file = dir.join(format!(
                    "{:02}_{}.png",
                    index + 1,
                    classification.category.replace(|c: char| !c.is_alphanumeric(), "_")
                ));
                crop.image
                    .save(&file)
                    .map_err(|e| WasteError::io(&file, std::io::Error::other(e)))?;
            }

            predictions.push(Prediction::from_classification(detection.bbox, classification));
        }

        if self.context.order == OutputOrder::Confidence {
            predictions.sort_by(|a, b| {
                let (a, b) = (a.confidence.unwrap_or(0.0), b.confidence.unwrap_or(0.0));
                b.total_cmp(&a)
            });
        }

        info!(predictions = predictions.len(), "run finished");
        Ok(PredictionSet::from_predictions(predictions))
    }

    /// Per-run subdirectory for debug crops, e.g. `<debug>/001`.
    fn next_debug_dir(&self) -> Result<Option<PathBuf>> {
        let Some(debug) = &self.context.debug else {
            return Ok(None);
        };

        let run = debug.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = debug.output_dir.join(format!("{run:03}"));
        std::fs::create_dir_all(&dir).map_err(|e| WasteError::io(&dir, e))?;
        Ok(Some(dir))
    }
}

/// Decode an image file, sniffing the format from its content first.
pub fn decode_image(path: &Path) -> Result<DynamicImage> {
    let open_error = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WasteError::NotFound(path.to_path_buf())
        } else {
            WasteError::Decode {
                path: path.to_path_buf(),
                source: image::ImageError::IoError(e),
            }
        }
    };

    ImageReader::open(path)
        .map_err(open_error)?
        .with_guessed_format()
        .map_err(open_error)?
        .decode()
        .map_err(|source| WasteError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn require_file(what: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(WasteError::configuration(what, path, "file not found"))
    }
}
