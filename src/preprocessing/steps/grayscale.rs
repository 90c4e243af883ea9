use crate::error::PipelineError;
use image::{DynamicImage, GrayImage, Luma};

/// Flatten onto a white background and reduce to 8-bit luma.
///
/// Rendered pages can carry transparent regions; Tesseract reads those as
/// black unless they are composited first.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, PipelineError> {
    if !image.color().has_alpha() {
        return Ok(DynamicImage::ImageLuma8(image.into_luma8()));
    }

    let rgba = image.into_rgba8();
    let flattened = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let alpha = a as f32 / 255.0;
        Luma([(luma * alpha + 255.0 * (1.0 - alpha)).round() as u8])
    });

    Ok(DynamicImage::ImageLuma8(flattened))
}
