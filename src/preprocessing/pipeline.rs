use crate::error::{EnhanceError, Result};
use crate::options::{Binarization, DenoiseFilter, Morphology, PipelineOptions, TargetRange};
use crate::types::{BinaryImage, EnhancedImage, GrayscaleImage, Provenance, RawImage, SkewAngle};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Instant;

use super::steps;

/// Record of a single stage that ran
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub name: String,
    /// Configured parameters plus values discovered while running
    pub params: Map<String, Value>,
    pub time_ms: u64,
}

/// State a stage can report back to the pipeline
#[derive(Debug, Default)]
pub struct StageContext {
    /// Values found while running, merged into the stage's record
    pub effective: Map<String, Value>,
    pub skew_angle: Option<SkewAngle>,
    /// Set once a stage has reduced the image to ink and background
    pub binary: bool,
}

/// One grayscale-to-grayscale transform
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Configured parameters, recorded in provenance
    fn params(&self) -> Map<String, Value>;

    fn apply(&self, image: GrayscaleImage, ctx: &mut StageContext) -> Result<GrayscaleImage>;
}

pub struct DenoiseStage {
    pub strength: u32,
    pub filter: DenoiseFilter,
}

impl Stage for DenoiseStage {
    fn name(&self) -> &'static str {
        "denoise"
    }

    fn params(&self) -> Map<String, Value> {
        object(&json!({ "strength": self.strength, "filter": self.filter }))
    }

    fn apply(&self, image: GrayscaleImage, _ctx: &mut StageContext) -> Result<GrayscaleImage> {
        steps::denoise::denoise(&image, self.strength, self.filter)
    }
}

pub struct DeskewStage {
    pub max_angle: f32,
}

impl Stage for DeskewStage {
    fn name(&self) -> &'static str {
        "deskew"
    }

    fn params(&self) -> Map<String, Value> {
        object(&json!({ "max_angle": self.max_angle }))
    }

    fn apply(&self, image: GrayscaleImage, ctx: &mut StageContext) -> Result<GrayscaleImage> {
        let angle = steps::deskew::estimate_skew(&image, self.max_angle);
        ctx.effective
            .insert("estimated_angle".to_string(), json!(angle.degrees()));
        ctx.skew_angle = Some(angle);
        steps::deskew::correct(&image, angle)
    }
}

pub struct NormalizeStage {
    pub target: TargetRange,
}

impl Stage for NormalizeStage {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn params(&self) -> Map<String, Value> {
        object(&json!({ "low": self.target.low, "high": self.target.high }))
    }

    fn apply(&self, image: GrayscaleImage, _ctx: &mut StageContext) -> Result<GrayscaleImage> {
        steps::normalize::normalize(&image, self.target)
    }
}

pub struct SharpenStage;

impl Stage for SharpenStage {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn apply(&self, image: GrayscaleImage, _ctx: &mut StageContext) -> Result<GrayscaleImage> {
        Ok(steps::sharpen::sharpen(&image))
    }
}

pub struct BinarizeStage {
    pub method: Binarization,
}

impl Stage for BinarizeStage {
    fn name(&self) -> &'static str {
        "binarize"
    }

    fn params(&self) -> Map<String, Value> {
        object(&self.method)
    }

    fn apply(&self, image: GrayscaleImage, ctx: &mut StageContext) -> Result<GrayscaleImage> {
        let binary = match self.method {
            Binarization::Global => {
                let threshold = steps::threshold::global_threshold(&image);
                ctx.effective
                    .insert("threshold".to_string(), json!(threshold));
                steps::threshold::threshold_at(&image, threshold)?
            }
            method => steps::threshold::binarize(&image, &method)?,
        };
        ctx.binary = true;
        Ok(binary.into_grayscale())
    }
}

pub struct MorphologyStage {
    pub operation: Morphology,
}

impl Stage for MorphologyStage {
    fn name(&self) -> &'static str {
        "morphology"
    }

    fn params(&self) -> Map<String, Value> {
        object(&self.operation)
    }

    fn apply(&self, image: GrayscaleImage, _ctx: &mut StageContext) -> Result<GrayscaleImage> {
        let binary = BinaryImage::from_levels(image.into_gray()).ok_or_else(|| {
            EnhanceError::ProcessingError {
                stage: "morphology".to_string(),
                params: format!("{:?}", self.operation),
                message: "input is not a binary image".to_string(),
            }
        })?;
        Ok(steps::morphology::apply(&binary, self.operation)?.into_grayscale())
    }
}

/// Stages applied in order after grayscale conversion
pub struct Pipeline {
    options: Option<PipelineOptions>,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Build the fixed stage sequence for `options`, skipping disabled
    /// stages. Options are validated here so a run never starts with
    /// values a later stage would reject.
    pub fn from_options(options: &PipelineOptions) -> Result<Self> {
        options.validate()?;

        let mut stages: Vec<Box<dyn Stage>> = Vec::new();
        if options.denoise.enabled {
            stages.push(Box::new(DenoiseStage {
                strength: options.denoise.strength,
                filter: options.denoise.filter,
            }));
        }
        if options.skew_correction.enabled {
            stages.push(Box::new(DeskewStage {
                max_angle: options.skew_correction.max_angle,
            }));
        }
        if options.contrast_normalization.enabled {
            stages.push(Box::new(NormalizeStage {
                target: options.contrast_normalization.target_range,
            }));
        }
        if options.sharpen {
            stages.push(Box::new(SharpenStage));
        }
        if options.binarization.is_enabled() {
            stages.push(Box::new(BinarizeStage {
                method: options.binarization,
            }));
        }
        if options.morphology.is_enabled() {
            stages.push(Box::new(MorphologyStage {
                operation: options.morphology,
            }));
        }

        Ok(Self {
            options: Some(*options),
            stages,
        })
    }

    /// Assemble a pipeline from arbitrary stages
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            options: None,
            stages,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage on `raw`. The first failing stage aborts the run.
    pub fn run(&self, raw: &RawImage) -> Result<EnhancedImage> {
        let start = Instant::now();
        let mut records = Vec::with_capacity(self.stages.len() + 1);

        let step_start = Instant::now();
        let mut image = steps::grayscale::to_grayscale(raw);
        records.push(StageRecord {
            name: "grayscale".to_string(),
            params: object(&json!({
                "source_channels": raw.channels(),
                "source_bit_depth": raw.bit_depth(),
            })),
            time_ms: step_start.elapsed().as_millis() as u64,
        });

        let mut ctx = StageContext::default();
        for stage in &self.stages {
            let step_start = Instant::now();
            image = stage.apply(image, &mut ctx).inspect_err(|e| {
                tracing::debug!("Stage '{}' failed: {}", stage.name(), e);
            })?;

            let mut params = stage.params();
            params.append(&mut ctx.effective);
            let time_ms = step_start.elapsed().as_millis() as u64;
            tracing::debug!("Stage '{}' done in {}ms", stage.name(), time_ms);

            records.push(StageRecord {
                name: stage.name().to_string(),
                params,
                time_ms,
            });
        }

        let binary = ctx.binary && image.is_two_level();
        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Enhanced {}x{} image to {}x{} in {}ms ({} stages)",
            raw.width(),
            raw.height(),
            image.width(),
            image.height(),
            total_time_ms,
            records.len()
        );

        let provenance = Provenance {
            source: raw.describe(),
            options: self.options,
            stages: records,
            skew_angle: ctx.skew_angle,
            total_time_ms,
        };
        Ok(EnhancedImage::new(image, binary, raw.format(), provenance))
    }
}

/// Enhance a decoded image for OCR with the given options
pub fn enhance(raw: &RawImage, options: &PipelineOptions) -> Result<EnhancedImage> {
    Pipeline::from_options(options)?.run(raw)
}

fn object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
