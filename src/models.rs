use serde::{Deserialize, Serialize};

/// Category reported when the detector finds nothing worth classifying.
pub const NO_OBJECT_DETECTED: &str = "no object detected";

/// Axis-aligned box in pixel coordinates of the source image.
///
/// `x2`/`y2` are exclusive. A box is only usable when `x2 > x1` and
/// `y2 > y1`; detectors may still emit boxes that violate this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Convert float corner coordinates, truncating toward zero.
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1 as i32,
            y1: y1 as i32,
            x2: x2 as i32,
            y2: y2 as i32,
        }
    }

    /// Saturates at `i32::MAX` for boxes wider than `i32` can express.
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One object proposal as emitted by a detector backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence. Used for ranking inside the detector only.
    pub score: f32,
    pub class_id: usize,
}

/// Output of the classifier for a single crop.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub class_index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub bbox: BoundingBox,
    pub category: String,
    pub confidence: Option<f32>,
}

impl Prediction {
    pub fn from_classification(bbox: BoundingBox, classification: Classification) -> Self {
        Self {
            bbox,
            category: classification.category,
            confidence: Some(classification.confidence),
        }
    }
}

/// Everything the pipeline reports for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionSet {
    Objects(Vec<Prediction>),
    NoObjectDetected,
}

impl PredictionSet {
    /// Wrap accumulated predictions, falling back to the sentinel when empty.
    pub fn from_predictions(predictions: Vec<Prediction>) -> Self {
        if predictions.is_empty() {
            PredictionSet::NoObjectDetected
        } else {
            PredictionSet::Objects(predictions)
        }
    }

    pub fn predictions(&self) -> &[Prediction] {
        match self {
            PredictionSet::Objects(predictions) => predictions,
            PredictionSet::NoObjectDetected => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PredictionSet::NoObjectDetected)
    }

    /// Number of entries in the serialized form; the sentinel counts as one.
    pub fn len(&self) -> usize {
        match self {
            PredictionSet::Objects(predictions) => predictions.len(),
            PredictionSet::NoObjectDetected => 1,
        }
    }

    pub fn entries(&self) -> Vec<PredictionEntry> {
        match self {
            PredictionSet::Objects(predictions) => {
                predictions.iter().map(PredictionEntry::from).collect()
            }
            PredictionSet::NoObjectDetected => vec![PredictionEntry::sentinel()],
        }
    }
}

impl Serialize for PredictionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries().serialize(serializer)
    }
}

/// Wire form of one result entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[i32; 4]>,
    #[serde(alias = "category")]
    pub prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl PredictionEntry {
    pub fn sentinel() -> Self {
        Self {
            bbox: None,
            prediction: NO_OBJECT_DETECTED.to_string(),
            confidence: Some(0.0),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.bbox.is_none() && self.prediction == NO_OBJECT_DETECTED
    }
}

impl From<&Prediction> for PredictionEntry {
    fn from(prediction: &Prediction) -> Self {
        Self {
            bbox: Some(prediction.bbox.to_array()),
            prediction: prediction.category.clone(),
            confidence: prediction.confidence,
        }
    }
}

/// Response body handed to the request layer: `{"predictions": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: Vec<PredictionEntry>,
}

impl From<&PredictionSet> for PredictionResponse {
    fn from(set: &PredictionSet) -> Self {
        Self {
            predictions: set.entries(),
        }
    }
}
