use crate::{Args, FilterArg, MethodArg, MorphologyArg, PipelineFlags, WeightingArg};
use anyhow::bail;
use document_enhancer::engines::EngineOptions;
use document_enhancer::loader::LoadLimits;
use document_enhancer::options::{
    AdaptiveWeighting, Binarization, DenoiseFilter, Morphology, PipelineOptions, TargetRange,
};

/// Block size used by `--binarize adaptive` when none is given
const DEFAULT_BLOCK_SIZE: u32 = 15;
/// Offset used by `--binarize adaptive` when none is given
const DEFAULT_OFFSET: i32 = 10;
/// Radius used by `--morphology` when none is given
const DEFAULT_MORPH_RADIUS: u8 = 1;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Config {
    pub limits: LoadLimits,
    pub engine: EngineOptions,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            limits: LoadLimits {
                max_dimension: args.max_dimension,
            },
            engine: EngineOptions {
                model_dir: args.model_dir.clone(),
            },
        }
    }
}

/// Apply command-line overrides on top of `base`. The result is validated
/// when the pipeline is built.
pub fn pipeline_options(
    flags: &PipelineFlags,
    base: PipelineOptions,
) -> anyhow::Result<PipelineOptions> {
    let mut options = base;

    if flags.no_denoise {
        options.denoise.enabled = false;
    }
    if let Some(strength) = flags.denoise_strength {
        options.denoise.strength = strength;
    }
    if let Some(filter) = flags.denoise_filter {
        options.denoise.filter = match filter {
            FilterArg::Median => DenoiseFilter::Median,
            FilterArg::Gaussian => DenoiseFilter::Gaussian,
        };
    }

    if flags.no_deskew {
        options.skew_correction.enabled = false;
    }
    if let Some(max_angle) = flags.max_skew {
        options.skew_correction.max_angle = max_angle;
    }

    if flags.no_normalize {
        options.contrast_normalization.enabled = false;
    }
    let range = options.contrast_normalization.target_range;
    options.contrast_normalization.target_range = TargetRange {
        low: flags.target_low.unwrap_or(range.low),
        high: flags.target_high.unwrap_or(range.high),
    };

    if flags.sharpen {
        options.sharpen = true;
    }

    if let Some(method) = flags.binarize {
        options.binarization = match (method, options.binarization) {
            (MethodArg::None, _) => Binarization::None,
            (MethodArg::Global, _) => Binarization::Global,
            (MethodArg::Fixed, current @ Binarization::Fixed { .. }) => current,
            (MethodArg::Fixed, _) => match flags.threshold {
                Some(threshold) => Binarization::Fixed { threshold },
                None => bail!("--binarize fixed needs --threshold"),
            },
            (MethodArg::Adaptive, current @ Binarization::Adaptive { .. }) => current,
            (MethodArg::Adaptive, _) => Binarization::Adaptive {
                block_size: DEFAULT_BLOCK_SIZE,
                offset: DEFAULT_OFFSET,
                weighting: AdaptiveWeighting::Mean,
            },
        };
    }
    options.binarization = binarization_overrides(flags, options.binarization)?;

    if let Some(operation) = flags.morphology {
        let radius = flags.morph_radius.unwrap_or(DEFAULT_MORPH_RADIUS);
        options.morphology = match operation {
            MorphologyArg::None => Morphology::None,
            MorphologyArg::Bold => Morphology::Bold,
            MorphologyArg::Open => Morphology::Open { radius },
            MorphologyArg::Close => Morphology::Close { radius },
            MorphologyArg::OpenClose => Morphology::OpenClose { radius },
            MorphologyArg::CloseOpen => Morphology::CloseOpen { radius },
        };
    } else if let Some(radius) = flags.morph_radius {
        options.morphology = match options.morphology {
            Morphology::Open { .. } => Morphology::Open { radius },
            Morphology::Close { .. } => Morphology::Close { radius },
            Morphology::OpenClose { .. } => Morphology::OpenClose { radius },
            Morphology::CloseOpen { .. } => Morphology::CloseOpen { radius },
            Morphology::None | Morphology::Bold => {
                bail!("--morph-radius has no effect without an open or close morphology")
            }
        };
    }

    Ok(options)
}

/// Apply the per-method binarization flags to whichever method is active
fn binarization_overrides(
    flags: &PipelineFlags,
    method: Binarization,
) -> anyhow::Result<Binarization> {
    let adaptive_flags =
        flags.block_size.is_some() || flags.offset.is_some() || flags.weighting.is_some();

    match method {
        Binarization::Fixed { threshold } => {
            if adaptive_flags {
                bail!("--block-size, --offset and --weighting need adaptive binarization");
            }
            Ok(Binarization::Fixed {
                threshold: flags.threshold.unwrap_or(threshold),
            })
        }
        Binarization::Adaptive {
            block_size,
            offset,
            weighting,
        } => {
            if flags.threshold.is_some() {
                bail!("--threshold needs fixed binarization");
            }
            Ok(Binarization::Adaptive {
                block_size: flags.block_size.unwrap_or(block_size),
                offset: flags.offset.unwrap_or(offset),
                weighting: flags.weighting.map(adaptive_weighting).unwrap_or(weighting),
            })
        }
        Binarization::None | Binarization::Global => {
            if adaptive_flags || flags.threshold.is_some() {
                bail!("binarization parameters need fixed or adaptive binarization");
            }
            Ok(method)
        }
    }
}

fn adaptive_weighting(arg: WeightingArg) -> AdaptiveWeighting {
    match arg {
        WeightingArg::Mean => AdaptiveWeighting::Mean,
        WeightingArg::Gaussian => AdaptiveWeighting::Gaussian,
        WeightingArg::Sauvola => AdaptiveWeighting::Sauvola,
    }
}
