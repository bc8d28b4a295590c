use crate::error::{EnhanceError, Result};
use crate::histogram::Histogram;
use crate::types::{GrayscaleImage, SkewAngle, MAX_SKEW_DEGREES};
use image::{imageops, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Coarse and fine search increments, in degrees
const COARSE_STEP: f32 = 0.5;
const FINE_STEP: f32 = 0.1;
/// Below this intensity spread the page is treated as blank
const MIN_CONTRAST: u8 = 32;
const MIN_INK_PIXELS: usize = 50;
/// The best profile must beat the sweep average by this factor
const MIN_PEAK_RATIO: f64 = 1.25;
/// Ink pixels beyond this are subsampled
const MAX_SAMPLES: usize = 250_000;
/// Rotations smaller than this are not worth resampling for
const NEGLIGIBLE_DEGREES: f32 = 0.05;
/// Largest canvas `correct` will allocate
const MAX_CANVAS_PIXELS: u64 = 400_000_000;

/// Estimate the dominant text-line rotation using projection profiles.
///
/// Ink pixels are projected onto rows for each candidate angle; aligned text
/// lines give the most uneven row counts, so the angle with the highest
/// profile variance wins. The 0.5° sweep always covers the whole plausible
/// range of ±[`MAX_SKEW_DEGREES`], so a page skewed past `max_angle` is
/// recognized as such instead of matching a weaker side peak. The winner is
/// refined in 0.1° steps without leaving `±max_angle`.
///
/// Falls back to [`SkewAngle::ZERO`] for near-blank pages, profiles with no
/// distinct peak, winners on the edge of the sweep, and winners outside
/// `±max_angle`.
pub fn estimate_skew(image: &GrayscaleImage, max_angle: f32) -> SkewAngle {
    let max_angle = if max_angle.is_nan() {
        0.0
    } else {
        max_angle.clamp(0.0, MAX_SKEW_DEGREES)
    };

    let Some(ink) = ink_points(image) else {
        tracing::debug!("Skew estimation skipped: page is blank or has too little ink");
        return SkewAngle::ZERO;
    };

    let (width, height) = image.dimensions();
    let half_diagonal = ((width as f32).hypot(height as f32) / 2.0).ceil() as usize + 1;

    let steps = (MAX_SKEW_DEGREES / COARSE_STEP).floor() as i32;
    let sweep: Vec<(f32, f64)> = (-steps..=steps)
        .map(|i| {
            let angle = i as f32 * COARSE_STEP;
            (angle, projection_variance(&ink, angle, half_diagonal))
        })
        .collect();

    let sweep_mean = sweep.iter().map(|&(_, v)| v).sum::<f64>() / sweep.len() as f64;
    let (mut best_angle, mut best_variance) = sweep[0];
    for &(angle, variance) in &sweep[1..] {
        if variance > best_variance {
            best_angle = angle;
            best_variance = variance;
        }
    }

    if best_variance <= 0.0 || best_variance < sweep_mean * MIN_PEAK_RATIO {
        tracing::debug!(
            "Skew estimation ambiguous (peak {:.1} vs mean {:.1}), assuming no skew",
            best_variance,
            sweep_mean
        );
        return SkewAngle::ZERO;
    }

    if best_angle.abs() >= steps as f32 * COARSE_STEP {
        tracing::debug!(
            "Skew estimate {:.1} deg sits on the search boundary, assuming no skew",
            best_angle
        );
        return SkewAngle::ZERO;
    }

    if best_angle.abs() > max_angle {
        tracing::debug!(
            "Skew estimate {:.1} deg is beyond the {:.1} deg limit, assuming no skew",
            best_angle,
            max_angle
        );
        return SkewAngle::ZERO;
    }

    // Refine search around best angle
    let coarse_angle = best_angle;
    for i in -5..=5 {
        let angle = coarse_angle + i as f32 * FINE_STEP;
        if angle.abs() > max_angle {
            continue;
        }
        let variance = projection_variance(&ink, angle, half_diagonal);
        if variance > best_variance {
            best_variance = variance;
            best_angle = angle;
        }
    }

    SkewAngle::from_degrees(best_angle).unwrap_or(SkewAngle::ZERO)
}

/// Rotate by the negative of `angle` so text lines become horizontal.
///
/// The canvas grows to the rotated bounding box, so nothing is clipped; new
/// area takes the page's background level.
pub fn correct(image: &GrayscaleImage, angle: SkewAngle) -> Result<GrayscaleImage> {
    if angle.degrees().abs() < NEGLIGIBLE_DEGREES {
        return Ok(image.clone());
    }

    let (width, height) = image.dimensions();
    let theta = angle.radians();
    let (sin, cos) = (theta.sin().abs() as f64, theta.cos().abs() as f64);
    let out_width = (width as f64 * cos + height as f64 * sin).ceil() as u64 + 2;
    let out_height = (width as f64 * sin + height as f64 * cos).ceil() as u64 + 2;
    let canvas_width = out_width.max(width as u64);
    let canvas_height = out_height.max(height as u64);

    if canvas_width * canvas_height > MAX_CANVAS_PIXELS {
        return Err(EnhanceError::ProcessingError {
            stage: "deskew".to_string(),
            params: format!("angle={:.2}", angle.degrees()),
            message: format!(
                "rotated canvas {}x{} exceeds {} pixels",
                canvas_width, canvas_height, MAX_CANVAS_PIXELS
            ),
        });
    }
    let (canvas_width, canvas_height) = (canvas_width as u32, canvas_height as u32);
    let (out_width, out_height) = (out_width as u32, out_height as u32);

    let background = Luma([Histogram::of(image).background_level()]);
    let mut canvas = GrayImage::from_pixel(canvas_width, canvas_height, background);
    imageops::replace(
        &mut canvas,
        image.as_gray(),
        ((canvas_width - width) / 2) as i64,
        ((canvas_height - height) / 2) as i64,
    );

    let rotated = rotate_about_center(&canvas, -theta, Interpolation::Bilinear, background);
    let cropped = imageops::crop_imm(
        &rotated,
        (canvas_width - out_width) / 2,
        (canvas_height - out_height) / 2,
        out_width,
        out_height,
    )
    .to_image();

    Ok(GrayscaleImage::new(cropped))
}

/// Ink pixel coordinates relative to the image center.
///
/// Ink is the minority side of the Otsu split. `None` when the page has too
/// little contrast or ink to estimate from.
fn ink_points(image: &GrayscaleImage) -> Option<Vec<(f32, f32)>> {
    let hist = Histogram::of(image);
    let (min, max) = (hist.min()?, hist.max()?);
    if max - min < MIN_CONTRAST {
        return None;
    }

    let threshold = hist.otsu_threshold();
    let dark: u64 = hist.counts()[..=threshold as usize].iter().sum();
    let ink_is_dark = dark * 2 <= hist.total();
    let ink_count = if ink_is_dark {
        dark
    } else {
        hist.total() - dark
    } as usize;
    if ink_count < MIN_INK_PIXELS {
        return None;
    }

    let stride = ink_count.div_ceil(MAX_SAMPLES).max(1);
    let (width, height) = image.dimensions();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;

    let points = image
        .as_gray()
        .enumerate_pixels()
        .filter(|(_, _, p)| (p.0[0] <= threshold) == ink_is_dark)
        .step_by(stride)
        .map(|(x, y, _)| (x as f32 - cx, y as f32 - cy))
        .collect();
    Some(points)
}

/// Compute variance of the row projection profile at `angle` degrees
/// Higher variance indicates better aligned text lines.
fn projection_variance(points: &[(f32, f32)], angle: f32, half_diagonal: usize) -> f64 {
    let (sin_a, cos_a) = angle.to_radians().sin_cos();
    let mut row_counts = vec![0u32; half_diagonal * 2 + 1];

    for &(dx, dy) in points {
        let row = (dy * cos_a - dx * sin_a + half_diagonal as f32).floor();
        if row >= 0.0 && (row as usize) < row_counts.len() {
            row_counts[row as usize] += 1;
        }
    }

    let n = row_counts.len() as f64;
    let mean = row_counts.iter().map(|&c| c as f64).sum::<f64>() / n;
    row_counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / n
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White page with six dashed "text lines"
    fn text_lines(width: u32, height: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([255]));
        for line in 0..6 {
            let top = 30 + line * 25;
            for y in top..top + 3 {
                for x in 30..width - 30 {
                    // Gaps between "words"
                    if x % 40 < 32 {
                        img.put_pixel(x, y, Luma([0]));
                    }
                }
            }
        }
        img
    }

    fn rotated_lines(degrees: f32) -> GrayscaleImage {
        let img = text_lines(300, 200);
        GrayscaleImage::new(rotate_about_center(
            &img,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Luma([255]),
        ))
    }

    fn dark_pixels(img: &GrayscaleImage) -> usize {
        img.as_gray().pixels().filter(|p| p.0[0] < 128).count()
    }

    #[test]
    fn test_deskew_detects_zero_angle_for_straight_image() {
        // Create a simple horizontal line pattern (straight text)
        let mut img = GrayImage::from_pixel(100, 50, Luma([255]));
        for x in 10..90 {
            img.put_pixel(x, 25, Luma([0])); // horizontal line
        }

        let angle = estimate_skew(&GrayscaleImage::new(img), 15.0);

        assert!(
            angle.degrees().abs() < 0.5,
            "Expected near-zero angle, got {} degrees",
            angle.degrees()
        );
    }

    #[test]
    fn test_recovers_clockwise_rotation() {
        let angle = estimate_skew(&rotated_lines(3.0), 15.0);
        assert!(
            (angle.degrees() - 3.0).abs() <= 1.0,
            "Expected ~3 degrees, got {}",
            angle.degrees()
        );
    }

    #[test]
    fn test_recovers_counter_clockwise_rotation() {
        let angle = estimate_skew(&rotated_lines(-4.5), 15.0);
        assert!(
            (angle.degrees() + 4.5).abs() <= 1.0,
            "Expected ~-4.5 degrees, got {}",
            angle.degrees()
        );
    }

    #[test]
    fn test_correction_straightens_lines() {
        let skewed = rotated_lines(5.0);
        let angle = estimate_skew(&skewed, 15.0);
        let corrected = correct(&skewed, angle).unwrap();

        let residual = estimate_skew(&corrected, 15.0);
        assert!(
            residual.degrees().abs() <= 1.0,
            "Residual skew {} after correcting {}",
            residual.degrees(),
            angle.degrees()
        );
    }

    #[test]
    fn test_blank_page_falls_back_to_zero() {
        let blank = GrayscaleImage::from_pixel(120, 80, 255);
        assert_eq!(estimate_skew(&blank, 15.0), SkewAngle::ZERO);

        let faint = GrayscaleImage::new(GrayImage::from_fn(120, 80, |x, _| {
            Luma([230 + (x % 10) as u8])
        }));
        assert_eq!(estimate_skew(&faint, 15.0), SkewAngle::ZERO);
    }

    #[test]
    fn test_too_little_ink_falls_back_to_zero() {
        let mut img = GrayImage::from_pixel(120, 80, Luma([255]));
        for x in 10..20 {
            img.put_pixel(x, 40, Luma([0]));
        }
        assert_eq!(estimate_skew(&GrayscaleImage::new(img), 15.0), SkewAngle::ZERO);
    }

    #[test]
    fn test_rotation_invariant_blob_is_ambiguous() {
        // A disc projects the same way at every angle
        let img = GrayImage::from_fn(120, 120, |x, y| {
            let (dx, dy) = (x as f32 - 60.0, y as f32 - 60.0);
            if dx * dx + dy * dy <= 100.0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        assert_eq!(estimate_skew(&GrayscaleImage::new(img), 15.0), SkewAngle::ZERO);
    }

    #[test]
    fn test_skew_beyond_limit_falls_back_to_zero() {
        assert_eq!(estimate_skew(&rotated_lines(25.0), 15.0), SkewAngle::ZERO);
        assert_eq!(estimate_skew(&rotated_lines(20.0), 15.0), SkewAngle::ZERO);
        assert_eq!(estimate_skew(&rotated_lines(20.0), 10.0), SkewAngle::ZERO);
        assert_eq!(estimate_skew(&rotated_lines(-20.0), 10.0), SkewAngle::ZERO);
    }

    #[test]
    fn test_wide_limit_recovers_large_skew() {
        let angle = estimate_skew(&rotated_lines(20.0), 30.0);
        assert!(
            (angle.degrees() - 20.0).abs() <= 1.0,
            "Expected ~20 degrees, got {}",
            angle.degrees()
        );
    }

    #[test]
    fn test_refined_angle_stays_within_limit() {
        for limit in [0.0, 0.2, 0.3] {
            let angle = estimate_skew(&rotated_lines(0.4), limit);
            assert!(
                angle.degrees().abs() <= limit,
                "limit {} exceeded by {}",
                limit,
                angle.degrees()
            );
        }
    }

    #[test]
    fn test_correct_with_zero_angle_is_noop() {
        let img = GrayscaleImage::new(text_lines(100, 200));
        let result = correct(&img, SkewAngle::ZERO).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_correct_expands_canvas_without_clipping() {
        // Ink blocks in every corner
        let mut img = GrayImage::from_pixel(100, 50, Luma([255]));
        for (cx, cy) in [(0, 0), (94, 0), (0, 44), (94, 44)] {
            for y in cy..cy + 6 {
                for x in cx..cx + 6 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let img = GrayscaleImage::new(img);
        let before = dark_pixels(&img);

        let angle = SkewAngle::from_degrees(10.0).unwrap();
        let result = correct(&img, angle).unwrap();

        assert!(result.width() > 100);
        assert!(result.height() > 50);
        let after = dark_pixels(&result);
        assert!(
            after * 10 >= before * 8,
            "Corner ink clipped: {} dark pixels before, {} after",
            before,
            after
        );
        // New area is filled with the page color
        assert_eq!(result.get(0, 0), 255);
    }
}
