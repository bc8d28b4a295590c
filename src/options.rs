//! Pipeline configuration
//!
//! [`PipelineOptions`] is a plain value: build it, validate it, hand it to
//! [`enhance`](crate::enhance). It serializes to JSON so a run's options can
//! be stored next to its output and loaded back from a file.

use crate::error::{EnhanceError, Result};
use crate::types::MAX_SKEW_DEGREES;
use serde::{Deserialize, Serialize};

/// Largest denoise kernel accepted
pub const MAX_DENOISE_STRENGTH: u32 = 31;

/// Smoothing filter used by the denoise stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseFilter {
    /// Preserves edges, best against salt-and-pepper noise
    #[default]
    Median,
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseOptions {
    pub enabled: bool,
    /// Kernel width in pixels; odd and positive
    pub strength: u32,
    pub filter: DenoiseFilter,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 3,
            filter: DenoiseFilter::Median,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewOptions {
    pub enabled: bool,
    /// Largest rotation searched for, in degrees
    pub max_angle: f32,
}

impl Default for SkewOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_angle: 15.0,
        }
    }
}

/// Inclusive intensity range for contrast normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRange {
    pub low: u8,
    pub high: u8,
}

impl TargetRange {
    pub const FULL: TargetRange = TargetRange { low: 0, high: 255 };

    pub fn new(low: u8, high: u8) -> Result<Self> {
        let range = Self { low, high };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.low >= self.high {
            return Err(EnhanceError::config(format!(
                "target range low ({}) must be below high ({})",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

impl Default for TargetRange {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastOptions {
    pub enabled: bool,
    pub target_range: TargetRange,
}

impl Default for ContrastOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            target_range: TargetRange::FULL,
        }
    }
}

/// How the local threshold of adaptive binarization is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveWeighting {
    /// Plain neighborhood mean minus the offset
    #[default]
    Mean,
    /// Gaussian-weighted neighborhood mean minus the offset
    Gaussian,
    /// Sauvola: mean scaled by the local standard deviation
    Sauvola,
}

/// Binarization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Binarization {
    /// Keep grayscale output
    None,
    /// Otsu threshold computed from the histogram
    #[default]
    Global,
    /// Caller-chosen global threshold; pixels at or below it are ink
    Fixed { threshold: u8 },
    /// Per-pixel threshold from a `block_size` neighborhood
    Adaptive {
        block_size: u32,
        #[serde(default = "default_adaptive_offset")]
        offset: i32,
        #[serde(default)]
        weighting: AdaptiveWeighting,
    },
}

fn default_adaptive_offset() -> i32 {
    10
}

impl Binarization {
    /// Adaptive mean thresholding with the usual offset of 10
    pub fn adaptive(block_size: u32) -> Self {
        Self::Adaptive {
            block_size,
            offset: default_adaptive_offset(),
            weighting: AdaptiveWeighting::Mean,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Thresholds that would turn a page's background into ink are rejected,
    /// which keeps every method idempotent.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::None | Self::Global => {}
            Self::Fixed { threshold } => {
                if threshold == u8::MAX {
                    return Err(EnhanceError::config(
                        "fixed threshold must be below 255, or every pixel becomes ink",
                    ));
                }
            }
            Self::Adaptive {
                block_size,
                offset,
                weighting,
            } => {
                if block_size <= 1 || block_size % 2 == 0 {
                    return Err(EnhanceError::config(format!(
                        "adaptive block size must be odd and greater than 1, got {}",
                        block_size
                    )));
                }
                let min_offset = match weighting {
                    AdaptiveWeighting::Sauvola => 0,
                    AdaptiveWeighting::Mean | AdaptiveWeighting::Gaussian => 1,
                };
                if !(min_offset..=255).contains(&offset) {
                    return Err(EnhanceError::config(format!(
                        "adaptive offset for {:?} weighting must be in {}..=255, got {}",
                        weighting, min_offset, offset
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Morphological clean-up applied to the binarized image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Morphology {
    #[default]
    None,
    /// Thicken ink strokes by one pixel
    Bold,
    /// Remove ink specks smaller than the structuring element
    Open { radius: u8 },
    /// Fill gaps in ink strokes smaller than the structuring element
    Close { radius: u8 },
    OpenClose { radius: u8 },
    CloseOpen { radius: u8 },
}

impl Morphology {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    fn radius(&self) -> Option<u8> {
        match *self {
            Self::Open { radius }
            | Self::Close { radius }
            | Self::OpenClose { radius }
            | Self::CloseOpen { radius } => Some(radius),
            Self::None | Self::Bold => None,
        }
    }
}

/// Which stages run and with which parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub denoise: DenoiseOptions,
    pub skew_correction: SkewOptions,
    pub contrast_normalization: ContrastOptions,
    pub sharpen: bool,
    pub binarization: Binarization,
    pub morphology: Morphology,
}

impl PipelineOptions {
    /// Every optional stage disabled: the output is the grayscale image
    pub fn grayscale_only() -> Self {
        Self {
            denoise: DenoiseOptions {
                enabled: false,
                ..Default::default()
            },
            skew_correction: SkewOptions {
                enabled: false,
                ..Default::default()
            },
            contrast_normalization: ContrastOptions {
                enabled: false,
                ..Default::default()
            },
            sharpen: false,
            binarization: Binarization::None,
            morphology: Morphology::None,
        }
    }

    pub fn with_binarization(mut self, binarization: Binarization) -> Self {
        self.binarization = binarization;
        self
    }

    pub fn with_morphology(mut self, morphology: Morphology) -> Self {
        self.morphology = morphology;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| EnhanceError::config(format!("invalid options JSON: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values no stage can run with
    pub fn validate(&self) -> Result<()> {
        if self.denoise.enabled {
            validate_denoise_strength(self.denoise.strength)?;
        }

        if self.skew_correction.enabled {
            let max = self.skew_correction.max_angle;
            if !(max > 0.0 && max <= MAX_SKEW_DEGREES) {
                return Err(EnhanceError::config(format!(
                    "max skew angle must be in (0, {}], got {}",
                    MAX_SKEW_DEGREES, max
                )));
            }
        }

        if self.contrast_normalization.enabled {
            self.contrast_normalization.target_range.validate()?;
        }

        self.binarization.validate()?;

        if self.morphology.is_enabled() && !self.binarization.is_enabled() {
            return Err(EnhanceError::config(
                "morphology requires binarization to be enabled",
            ));
        }
        if self.morphology.radius() == Some(0) {
            return Err(EnhanceError::config("morphology radius must be positive"));
        }

        Ok(())
    }
}

pub(crate) fn validate_denoise_strength(strength: u32) -> Result<()> {
    if strength == 0 || strength % 2 == 0 || strength > MAX_DENOISE_STRENGTH {
        return Err(EnhanceError::config(format!(
            "denoise strength must be an odd integer in 1..={}, got {}",
            MAX_DENOISE_STRENGTH, strength
        )));
    }
    Ok(())
}
