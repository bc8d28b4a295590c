use crate::types::GrayscaleImage;
use imageproc::filter::filter3x3;

/// Laplacian sharpening kernel: center 5, direct neighbors -1
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Apply Laplacian-based sharpening
/// Steepens glyph edges so thresholding separates strokes more cleanly.
pub fn sharpen(image: &GrayscaleImage) -> GrayscaleImage {
    GrayscaleImage::new(filter3x3(image.as_gray(), &SHARPEN_KERNEL))
}
