use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;

/// Grey level used to pad letterboxed inputs.
pub const LETTERBOX_FILL: u8 = 114;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Detect edges using Canny edge detector
pub fn detect_edges(img: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(img, low_threshold, high_threshold)
}

/// Mapping between source-image and letterboxed-input coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    pub fn for_size(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((target as f32 - scaled_h) / 2.0).floor(),
        }
    }

    /// Map a point from model input space back onto the source image.
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize preserving aspect ratio and centre the result on a square canvas.
pub fn letterbox(img: &RgbImage, target: u32) -> (RgbImage, Letterbox) {
    let (width, height) = img.dimensions();
    let lb = Letterbox::for_size(width, height, target);

    let scaled_w = ((width as f32 * lb.scale).round() as u32).clamp(1, target);
    let scaled_h = ((height as f32 * lb.scale).round() as u32).clamp(1, target);
    let scaled = imageops::resize(img, scaled_w, scaled_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(target, target, Rgb([LETTERBOX_FILL; 3]));
    imageops::overlay(&mut canvas, &scaled, lb.pad_x as i64, lb.pad_y as i64);

    (canvas, lb)
}

/// Per-channel normalization applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl ChannelStats {
    pub const IMAGENET: ChannelStats = ChannelStats {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };
}

/// Flatten an RGB image into planar CHW `f32` data scaled to `[0, 1]`,
/// optionally normalized with `stats`.
pub fn to_chw(img: &RgbImage, stats: Option<&ChannelStats>) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for c in 0..3 {
            let mut value = pixel[c] as f32 / 255.0;
            if let Some(stats) = stats {
                value = (value - stats.mean[c]) / stats.std[c];
            }
            data[c * plane + offset] = value;
        }
    }

    data
}
