#![allow(dead_code, unused_imports)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from wastesort for tests
pub use wastesort::{
    BoundingBox, Config, CropOutcome, LabelMap, OutputOrder, Pipeline, PredictionEntry,
    PredictionResponse, PredictionSet, SkipReason, WasteError, NO_OBJECT_DETECTED,
};
