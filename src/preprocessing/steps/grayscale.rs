use crate::types::{GrayscaleImage, RawImage};
use image::{DynamicImage, GrayImage, Luma};

/// BT.601 luma weights for red, green and blue
const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Convert to single-channel 8-bit grayscale
/// This is the foundation for every other preprocessing step.
///
/// 8-bit grayscale input passes through untouched. Color input uses BT.601
/// luma; transparent pixels are composited over a white page.
pub fn to_grayscale(raw: &RawImage) -> GrayscaleImage {
    if let DynamicImage::ImageLuma8(gray) = raw.as_dynamic() {
        return GrayscaleImage::new(gray.clone());
    }

    let rgba = raw.as_dynamic().to_rgba8();
    let gray = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma =
            LUMA_WEIGHTS[0] * r as f32 + LUMA_WEIGHTS[1] * g as f32 + LUMA_WEIGHTS[2] * b as f32;
        let alpha = a as f32 / 255.0;
        let composited = luma * alpha + 255.0 * (1.0 - alpha);
        Luma([composited.round().clamp(0.0, 255.0) as u8])
    });
    GrayscaleImage::new(gray)
}
