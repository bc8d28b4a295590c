use crate::error::{EnhanceError, Result};
use crate::histogram::Histogram;
use crate::options::{AdaptiveWeighting, Binarization};
use crate::preprocessing::steps::denoise::{blur_levels, gaussian_sigma};
use crate::types::{BinaryImage, GrayscaleImage, BACKGROUND, INK};
use image::{GrayImage, Luma};

/// Sauvola sensitivity
const SAUVOLA_K: f64 = 0.2;
/// Dynamic range of the standard deviation for 8-bit images
const SAUVOLA_R: f64 = 128.0;

/// Reduce a grayscale image to ink and background.
///
/// Every method marks a pixel as ink when it is at or below its threshold,
/// then the result is oriented so that ink is the minority class (see
/// [`BinaryImage`]). Running any method on its own output returns the same
/// image.
pub fn binarize(image: &GrayscaleImage, method: &Binarization) -> Result<BinaryImage> {
    method.validate()?;
    match *method {
        Binarization::None => Err(EnhanceError::config(
            "binarization method 'none' produces no binary image",
        )),
        Binarization::Global => threshold_at(image, global_threshold(image)),
        Binarization::Fixed { threshold } => threshold_at(image, threshold),
        Binarization::Adaptive {
            block_size,
            offset,
            weighting,
        } => adaptive_threshold(image, block_size, offset, weighting),
    }
}

/// Otsu threshold of the image's intensity histogram
pub fn global_threshold(image: &GrayscaleImage) -> u8 {
    Histogram::of(image).otsu_threshold()
}

/// Pixels at or below `threshold` become ink
pub fn threshold_at(image: &GrayscaleImage, threshold: u8) -> Result<BinaryImage> {
    let gray = image.as_gray();
    let out = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] <= threshold {
            Luma([INK])
        } else {
            Luma([BACKGROUND])
        }
    });
    wrap(out, || format!("threshold={}", threshold))
}

/// Per-pixel threshold from the `block_size` neighborhood around each pixel.
///
/// Windows are clipped at the image border. The threshold is clamped to
/// 0..=255 before comparison.
pub fn adaptive_threshold(
    image: &GrayscaleImage,
    block_size: u32,
    offset: i32,
    weighting: AdaptiveWeighting,
) -> Result<BinaryImage> {
    Binarization::Adaptive {
        block_size,
        offset,
        weighting,
    }
    .validate()?;

    let gray = image.as_gray();
    let (width, height) = gray.dimensions();
    let shift = offset as f64;

    let out = match weighting {
        AdaptiveWeighting::Mean | AdaptiveWeighting::Sauvola => {
            let integrals = IntegralImages::of(gray);
            let half_window = block_size / 2;
            GrayImage::from_fn(width, height, |x, y| {
                let (mean, std_dev) = integrals.window_stats(x, y, half_window);
                let threshold = match weighting {
                    AdaptiveWeighting::Sauvola => {
                        mean * (1.0 + SAUVOLA_K * (std_dev / SAUVOLA_R - 1.0)) - shift
                    }
                    _ => mean - shift,
                };
                classify(gray.get_pixel(x, y).0[0], threshold)
            })
        }
        AdaptiveWeighting::Gaussian => {
            let blurred = blur_levels(gray, gaussian_sigma(block_size));
            GrayImage::from_fn(width, height, |x, y| {
                let threshold = blurred.get_pixel(x, y).0[0] as f64 - shift;
                classify(gray.get_pixel(x, y).0[0], threshold)
            })
        }
    };

    wrap(out, || {
        format!(
            "block_size={} offset={} weighting={:?}",
            block_size, offset, weighting
        )
    })
}

fn classify(value: u8, threshold: f64) -> Luma<u8> {
    if value as f64 <= threshold.clamp(0.0, 255.0) {
        Luma([INK])
    } else {
        Luma([BACKGROUND])
    }
}

fn wrap(image: GrayImage, params: impl FnOnce() -> String) -> Result<BinaryImage> {
    BinaryImage::from_thresholded(image).ok_or_else(|| EnhanceError::ProcessingError {
        stage: "binarize".to_string(),
        params: params(),
        message: "thresholded image contains a third intensity level".to_string(),
    })
}

/// Summed-area tables of values and squared values, one row/column of
/// zero padding on the top and left
struct IntegralImages {
    stride: usize,
    width: u32,
    height: u32,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImages {
    fn of(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0u64; stride * (height as usize + 1)];
        let mut sum_sq = vec![0u64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width as usize {
                let val = img.get_pixel(x as u32, y as u32).0[0] as u64;
                row += val;
                row_sq += val * val;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }

        Self {
            stride,
            width,
            height,
            sum,
            sum_sq,
        }
    }

    /// Mean and standard deviation of the window centered on (x, y)
    fn window_stats(&self, x: u32, y: u32, half_window: u32) -> (f64, f64) {
        let x1 = x.saturating_sub(half_window) as usize;
        let y1 = y.saturating_sub(half_window) as usize;
        let x2 = (x + half_window).min(self.width - 1) as usize + 1;
        let y2 = (y + half_window).min(self.height - 1) as usize + 1;
        let area = ((x2 - x1) * (y2 - y1)) as f64;

        let rect = |table: &[u64]| {
            (table[y2 * self.stride + x2] + table[y1 * self.stride + x1]) as f64
                - (table[y1 * self.stride + x2] + table[y2 * self.stride + x1]) as f64
        };

        let mean = rect(&self.sum) / area;
        let variance = rect(&self.sum_sq) / area - mean * mean;
        (mean, variance.max(0.0).sqrt())
    }
}
