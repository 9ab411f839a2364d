use image::{ImageBuffer, Rgb, RgbImage};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wastesort::classification::{softmax, top1};
use wastesort::{
    BoundingBox, Classification, Classifier, Crop, Detection, Detector, LabelMap, Pipeline,
};

/// Labels used by `ChannelClassifier`: dominant red, green, blue.
pub const CHANNEL_LABELS: [&str; 3] = ["plastic", "glass", "metal"];

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Creates a black image with the given rectangles filled in.
/// Rectangles are `(x1, y1, x2, y2)` with exclusive ends.
pub fn scene(width: u32, height: u32, rects: &[((u32, u32, u32, u32), Rgb<u8>)]) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        rects
            .iter()
            .rev()
            .find(|((x1, y1, x2, y2), _)| x >= *x1 && x < *x2 && y >= *y1 && y < *y2)
            .map(|(_, color)| *color)
            .unwrap_or(Rgb([0, 0, 0]))
    })
}

/// Saves `img` as PNG under `dir` and returns the path.
pub fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Encodes `img` as PNG in memory.
pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

/// Writes a label map JSON file in the training-script format.
pub fn write_label_map(dir: &Path, labels: &[&str]) -> PathBuf {
    let table: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .enumerate()
        .map(|(i, name)| (i.to_string(), serde_json::Value::from(*name)))
        .collect();
    let path = dir.join("label_map.json");
    std::fs::write(&path, serde_json::to_string(&table).unwrap()).expect("Failed to write labels");
    path
}

/// Detector that returns a fixed list of boxes and counts its calls.
pub struct FixedDetector {
    boxes: Vec<BoundingBox>,
    pub calls: AtomicUsize,
}

impl FixedDetector {
    pub fn new(boxes: Vec<BoundingBox>) -> Arc<Self> {
        Arc::new(Self {
            boxes,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &image::DynamicImage) -> anyhow::Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .boxes
            .iter()
            .map(|bbox| Detection {
                bbox: *bbox,
                score: 0.9,
                class_id: 0,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _image: &image::DynamicImage) -> anyhow::Result<Vec<Detection>> {
        anyhow::bail!("no output tensor")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Classifies a crop by its dominant colour channel.
///
/// Channel means scaled to `[0, 8]` act as logits, so a saturated red crop
/// comes out as `plastic` with confidence close to 1.
pub struct ChannelClassifier {
    labels: LabelMap,
    pub calls: AtomicUsize,
}

impl ChannelClassifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            labels: LabelMap::from_names(CHANNEL_LABELS),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for ChannelClassifier {
    fn classify(&self, crop: &Crop) -> anyhow::Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rgb = crop.image.to_rgb8();
        let count = (rgb.width() * rgb.height()) as f32;
        let mut sums = [0f32; 3];
        for pixel in rgb.pixels() {
            for c in 0..3 {
                sums[c] += pixel[c] as f32;
            }
        }
        let logits: Vec<f32> = sums.iter().map(|s| s / count / 255.0 * 8.0).collect();

        let (class_index, confidence) = top1(&softmax(&logits)).expect("three logits");
        Ok(Classification {
            category: self.labels.get(class_index).unwrap().to_string(),
            class_index,
            confidence,
        })
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Returns the given confidences in call order, always as `glass`.
pub struct ScriptedClassifier {
    confidences: Mutex<VecDeque<f32>>,
}

impl ScriptedClassifier {
    pub fn new(confidences: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            confidences: Mutex::new(confidences.iter().copied().collect()),
        })
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&self, _crop: &Crop) -> anyhow::Result<Classification> {
        let confidence = self
            .confidences
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
        Ok(Classification {
            category: "glass".to_string(),
            class_index: 1,
            confidence,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _crop: &Crop) -> anyhow::Result<Classification> {
        anyhow::bail!("forward pass failed")
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Pipeline over a fixed detector and the channel classifier. The mocks are
/// returned too so tests can inspect call counts.
pub fn channel_pipeline(
    boxes: Vec<BoundingBox>,
) -> (Pipeline, Arc<FixedDetector>, Arc<ChannelClassifier>) {
    let detector = FixedDetector::new(boxes);
    let classifier = ChannelClassifier::new();
    let pipeline = Pipeline::new(detector.clone(), classifier.clone());
    (pipeline, detector, classifier)
}
