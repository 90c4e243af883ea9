use crate::error::PipelineError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

const BLUR_SIGMA: f32 = 1.0;
const AMOUNT: f32 = 1.5;

/// Unsharp mask: add back the difference between the image and its blur
pub fn apply(image: DynamicImage) -> Result<DynamicImage, PipelineError> {
    let gray = image.into_luma8();
    let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);

    let sharpened = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let original = gray.get_pixel(x, y).0[0] as f32;
        let soft = blurred.get_pixel(x, y).0[0] as f32;
        Luma([(original + AMOUNT * (original - soft)).clamp(0.0, 255.0) as u8])
    });

    Ok(DynamicImage::ImageLuma8(sharpened))
}
