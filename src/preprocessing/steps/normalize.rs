use crate::error::PipelineError;
use image::{DynamicImage, GrayImage, Luma};

/// Share of darkest and lightest pixels ignored when picking the stretch range
const CLIP_FRACTION: f32 = 0.005;

/// Stretch contrast so the bulk of the histogram covers 0-255.
///
/// A few stray pixels (scanner dust, anti-aliasing) should not pin the range,
/// so the limits come from clipped percentiles rather than the extremes.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, PipelineError> {
    let gray = image.into_luma8();
    let (low, high) = percentile_range(&gray, CLIP_FRACTION);
    if high <= low {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    let scale = 255.0 / (high - low) as f32;
    let stretched = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0].clamp(low, high);
        Luma([((value - low) as f32 * scale).round() as u8])
    });

    Ok(DynamicImage::ImageLuma8(stretched))
}

fn percentile_range(img: &GrayImage, clip: f32) -> (u8, u8) {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let cutoff = (total as f32 * clip) as u64;

    let mut seen = 0;
    let low = histogram
        .iter()
        .position(|&count| {
            seen += count;
            seen > cutoff
        })
        .unwrap_or(0) as u8;

    seen = 0;
    let high = 255
        - histogram
            .iter()
            .rev()
            .position(|&count| {
                seen += count;
                seen > cutoff
            })
            .unwrap_or(0) as u8;

    (low, high)
}
