use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;

use crate::error::{Result, WasteError};
use crate::models::PredictionSet;

const BOX_COLOR: Rgb<u8> = Rgb([0, 200, 83]);
const BOX_THICKNESS: i32 = 2;

/// Copy of `image` with every predicted box outlined.
pub fn draw_predictions(image: &DynamicImage, predictions: &PredictionSet) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (width, height) = canvas.dimensions();
    let max_x = i32::try_from(width).unwrap_or(i32::MAX).saturating_add(BOX_THICKNESS);
    let max_y = i32::try_from(height).unwrap_or(i32::MAX).saturating_add(BOX_THICKNESS);

    for prediction in predictions.predictions() {
        // Clamp to one stroke outside the canvas; off-canvas edges are not drawn.
        let bbox = prediction.bbox;
        let (x1, x2) = (bbox.x1.clamp(-BOX_THICKNESS, max_x), bbox.x2.clamp(-BOX_THICKNESS, max_x));
        let (y1, y2) = (bbox.y1.clamp(-BOX_THICKNESS, max_y), bbox.y2.clamp(-BOX_THICKNESS, max_y));

        for inset in 0..BOX_THICKNESS {
            let w = x2.saturating_sub(x1) - 2 * inset;
            let h = y2.saturating_sub(y1) - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32),
                BOX_COLOR,
            );
        }
    }

    canvas
}

/// Draw the predictions and save the result; the format follows the
/// extension of `output`.
pub fn save_annotated(
    image: &DynamicImage,
    predictions: &PredictionSet,
    output: impl AsRef<Path>,
) -> Result<()> {
    let output = output.as_ref();
    draw_predictions(image, predictions)
        .save(output)
        .map_err(|e| WasteError::io(output, std::io::Error::other(e)))?;
    tracing::info!(path = %output.display(), "annotated image written");
    Ok(())
}
