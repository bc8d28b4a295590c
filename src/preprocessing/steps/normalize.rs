use crate::error::Result;
use crate::histogram::Histogram;
use crate::options::TargetRange;
use crate::types::GrayscaleImage;
use image::{GrayImage, Luma};

/// Normalize image contrast using histogram stretching
/// Maps the darkest pixel to `target.low` and the lightest to `target.high`.
///
/// A uniform image has no range to stretch and is returned unchanged.
pub fn normalize(image: &GrayscaleImage, target: TargetRange) -> Result<GrayscaleImage> {
    target.validate()?;

    let hist = Histogram::of(image);
    let (min_val, max_val) = match (hist.min(), hist.max()) {
        (Some(min), Some(max)) if max > min => (min, max),
        // Avoid division by zero
        _ => return Ok(image.clone()),
    };

    let source_range = (max_val - min_val) as f32;
    let target_span = (target.high - target.low) as f32;
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| {
            let v = v.clamp(min_val, max_val);
            let scaled = (v - min_val) as f32 / source_range * target_span;
            (target.low as f32 + scaled).round() as u8
        })
        .collect();

    let gray = image.as_gray();
    let normalized = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([lut[gray.get_pixel(x, y).0[0] as usize]])
    });

    Ok(GrayscaleImage::new(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnhanceError;

    fn low_contrast() -> GrayscaleImage {
        // Values 50-185
        GrayscaleImage::new(GrayImage::from_fn(10, 10, |x, _| {
            Luma([50 + (x as u8 * 15)])
        }))
    }

    #[test]
    fn test_normalize_stretches_histogram() {
        let result = normalize(&low_contrast(), TargetRange::FULL).unwrap();
        let hist = Histogram::of(&result);

        // After normalization, min should be 0 and max should be 255
        assert_eq!(hist.min(), Some(0));
        assert_eq!(hist.max(), Some(255));
    }

    #[test]
    fn test_normalize_into_narrow_range() {
        let target = TargetRange::new(30, 220).unwrap();
        let result = normalize(&low_contrast(), target).unwrap();
        let hist = Histogram::of(&result);
        assert_eq!(hist.min(), Some(30));
        assert_eq!(hist.max(), Some(220));
    }

    #[test]
    fn test_normalize_preserves_order() {
        let result = normalize(&low_contrast(), TargetRange::FULL).unwrap();
        for x in 1..10 {
            assert!(result.get(x, 0) > result.get(x - 1, 0));
        }
    }

    #[test]
    fn test_normalize_handles_uniform_image() {
        // Uniform image (all same value)
        let img = GrayscaleImage::from_pixel(10, 10, 128);

        let result = normalize(&img, TargetRange::FULL).unwrap();

        // Should return unchanged (no division by zero)
        assert_eq!(result, img);
    }

    #[test]
    fn test_normalize_rejects_empty_range() {
        let target = TargetRange { low: 100, high: 100 };
        assert!(matches!(
            normalize(&low_contrast(), target),
            Err(EnhanceError::ConfigurationError(_))
        ));
    }
}
