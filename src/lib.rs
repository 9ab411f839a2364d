pub mod annotate;
pub mod classification;
pub mod config;
pub mod crop;
pub mod detection;
pub mod error;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod upload;

pub use classification::Classifier;
pub use config::Config;
pub use crop::{Crop, CropOutcome, SkipReason};
pub use detection::Detector;
pub use error::WasteError;
pub use labels::LabelMap;
pub use models::{
    BoundingBox, Classification, Detection, Prediction, PredictionEntry, PredictionResponse,
    PredictionSet, NO_OBJECT_DETECTED,
};
pub use pipeline::{OutputOrder, Pipeline};
