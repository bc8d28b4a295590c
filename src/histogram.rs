//! Intensity histogram and the statistics derived from it

use crate::types::GrayscaleImage;
use serde::Serialize;

/// 256-bin intensity histogram of a grayscale image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    counts: Vec<u64>,
    total: u64,
}

impl Histogram {
    pub fn of(image: &GrayscaleImage) -> Self {
        let mut counts = vec![0u64; 256];
        for p in image.as_gray().pixels() {
            counts[p.0[0] as usize] += 1;
        }
        let total = counts.iter().sum();
        Self { counts, total }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Counts scaled so the most frequent intensity is 1.0
    pub fn normalized(&self) -> Vec<f64> {
        let peak = self.counts.iter().copied().max().unwrap_or(0);
        if peak == 0 {
            return vec![0.0; 256];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / peak as f64)
            .collect()
    }

    pub fn min(&self) -> Option<u8> {
        self.counts.iter().position(|&c| c > 0).map(|i| i as u8)
    }

    pub fn max(&self) -> Option<u8> {
        self.counts.iter().rposition(|&c| c > 0).map(|i| i as u8)
    }

    pub fn mean(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum();
        sum / self.total as f64
    }

    /// Otsu's threshold: the cut `t` that maximizes between-class variance
    /// for the classes `[0, t]` and `(t, 255]`.
    ///
    /// Ties keep the lowest `t`. An image with a single intensity returns
    /// that intensity, which puts every pixel in the lower class.
    pub fn otsu_threshold(&self) -> u8 {
        let total = self.total as f64;
        let sum_all: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum();

        let mut best_t = None;
        let mut best_variance = -1.0f64;
        let mut weight_low = 0.0f64;
        let mut sum_low = 0.0f64;

        for t in 0..256usize {
            weight_low += self.counts[t] as f64;
            sum_low += t as f64 * self.counts[t] as f64;
            let weight_high = total - weight_low;
            if weight_low == 0.0 || weight_high == 0.0 {
                continue;
            }
            let mean_low = sum_low / weight_low;
            let mean_high = (sum_all - sum_low) / weight_high;
            let variance = weight_low * weight_high * (mean_low - mean_high).powi(2);
            if variance > best_variance {
                best_variance = variance;
                best_t = Some(t as u8);
            }
        }

        best_t.or_else(|| self.max()).unwrap_or(0)
    }

    /// Mean intensity of the larger Otsu class, i.e. the page color
    pub fn background_level(&self) -> u8 {
        let t = self.otsu_threshold() as usize;
        let (low, high) = self.counts.split_at(t + 1);
        let class_mean = |bins: &[u64], offset: usize| {
            let n: u64 = bins.iter().sum();
            let s: f64 = bins
                .iter()
                .enumerate()
                .map(|(i, &c)| (i + offset) as f64 * c as f64)
                .sum();
            (n, if n == 0 { 0.0 } else { s / n as f64 })
        };
        let (n_low, mean_low) = class_mean(low, 0);
        let (n_high, mean_high) = class_mean(high, t + 1);
        let level = if n_high >= n_low { mean_high } else { mean_low };
        level.round().clamp(0.0, 255.0) as u8
    }
}
