use crate::error::Result;
use crate::options::{validate_denoise_strength, DenoiseFilter};
use crate::types::GrayscaleImage;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::{gaussian_blur_f32, median_filter};

/// Single-channel image of unrounded intensities
pub type LevelImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smooth noise with a `strength x strength` neighborhood.
///
/// `strength` must be odd and positive; 1 leaves the image untouched. Pixels
/// past the border take the value of the nearest edge pixel, so dimensions
/// never change.
pub fn denoise(
    image: &GrayscaleImage,
    strength: u32,
    filter: DenoiseFilter,
) -> Result<GrayscaleImage> {
    validate_denoise_strength(strength)?;
    if strength == 1 {
        return Ok(image.clone());
    }

    let radius = strength / 2;
    let denoised = match filter {
        // Median filter preserves edges better than Gaussian blur
        DenoiseFilter::Median => median_filter(image.as_gray(), radius, radius),
        DenoiseFilter::Gaussian => {
            let blurred = blur_levels(image.as_gray(), gaussian_sigma(strength));
            GrayImage::from_fn(image.width(), image.height(), |x, y| {
                Luma([blurred.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
            })
        }
    };
    Ok(GrayscaleImage::new(denoised))
}

/// Gaussian blur computed and kept in f32. Rounding happens at most once, in
/// the caller, so flat regions keep their level.
pub fn blur_levels(image: &GrayImage, sigma: f32) -> LevelImage {
    let levels = LevelImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[0] as f32])
    });
    gaussian_blur_f32(&levels, sigma)
}

/// Sigma matching a Gaussian kernel of width `strength`
pub fn gaussian_sigma(strength: u32) -> f32 {
    0.3 * ((strength as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnhanceError;

    fn noisy() -> GrayImage {
        let mut img = GrayImage::from_pixel(10, 10, Luma([128]));
        img.put_pixel(5, 5, Luma([0])); // "pepper" noise
        img.put_pixel(6, 5, Luma([255])); // "salt" noise
        img
    }

    #[test]
    fn test_denoise_reduces_salt_pepper_noise() {
        let img = noisy();
        let result = denoise(
            &GrayscaleImage::new(img.clone()),
            3,
            DenoiseFilter::Median,
        )
        .unwrap();

        // Isolated outliers vanish under a 3x3 median
        assert_eq!(result.get(5, 5), 128);
        assert_eq!(result.get(6, 5), 128);
        assert!(calculate_variance(result.as_gray()) < calculate_variance(&img));
    }

    #[test]
    fn test_gaussian_reduces_variance() {
        let img = noisy();
        let result = denoise(
            &GrayscaleImage::new(img.clone()),
            5,
            DenoiseFilter::Gaussian,
        )
        .unwrap();
        assert!(calculate_variance(result.as_gray()) < calculate_variance(&img));
    }

    #[test]
    fn test_denoise_keeps_dimensions_and_borders() {
        let img = GrayscaleImage::from_pixel(7, 3, 90);
        for filter in [DenoiseFilter::Median, DenoiseFilter::Gaussian] {
            let result = denoise(&img, 9, filter).unwrap();
            assert_eq!(result.dimensions(), (7, 3));
            assert_eq!(result.get(0, 0), 90);
            assert_eq!(result.get(6, 2), 90);
        }
    }

    #[test]
    fn test_gaussian_keeps_flat_regions_level() {
        for (width, height, strength) in [(40, 40, 9), (20, 5, 7), (7, 3, 9), (12, 12, 3)] {
            let img = GrayscaleImage::from_pixel(width, height, 90);
            let result = denoise(&img, strength, DenoiseFilter::Gaussian).unwrap();
            assert!(
                result.as_gray().pixels().all(|p| p.0[0] == 90),
                "{}x{} strength {} shifted a flat image",
                width,
                height,
                strength
            );
        }
    }

    #[test]
    fn test_blur_levels_preserves_mean_of_flat_image() {
        let img = GrayImage::from_pixel(15, 9, Luma([201]));
        let blurred = blur_levels(&img, gaussian_sigma(11));
        assert!(blurred.pixels().all(|p| (p.0[0] - 201.0).abs() < 1e-3));
    }

    #[test]
    fn test_strength_one_is_identity() {
        let img = GrayscaleImage::new(noisy());
        assert_eq!(denoise(&img, 1, DenoiseFilter::Median).unwrap(), img);
    }

    #[test]
    fn test_even_strength_rejected() {
        let img = GrayscaleImage::new(noisy());
        for strength in [0, 2, 4] {
            assert!(matches!(
                denoise(&img, strength, DenoiseFilter::Median),
                Err(EnhanceError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn test_gaussian_sigma_grows_with_strength() {
        assert!((gaussian_sigma(3) - 0.8).abs() < 1e-6);
        assert!(gaussian_sigma(7) > gaussian_sigma(3));
    }

    fn calculate_variance(img: &GrayImage) -> f64 {
        let pixels: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pixels.len() as f64
    }
}
