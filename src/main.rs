use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use document_enhancer::engines::EngineRegistry;
use document_enhancer::histogram::Histogram;
use document_enhancer::loader;
use document_enhancer::preprocessing::steps::grayscale::to_grayscale;
use document_enhancer::search::{BestImageSearch, DEFAULT_MIN_WORD_RETENTION};
use document_enhancer::{enhance, EnhancedImage, PipelineOptions, RawImage};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "document-enhancer")]
#[command(about = "Enhance document images for OCR")]
#[command(version)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Largest accepted image width or height
    #[arg(long, env = "DOC_ENHANCE_MAX_DIMENSION", default_value = "10000", global = true)]
    pub max_dimension: u32,

    /// Directory holding OCR models (defaults to the user cache directory)
    #[arg(long, env = "DOC_ENHANCE_MODEL_DIR", global = true)]
    pub model_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the enhancement pipeline on one image
    Enhance {
        input: PathBuf,

        /// Where to write the enhanced image; the format follows the extension
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with pipeline options; flags override its values
        #[arg(long)]
        options: Option<PathBuf>,

        /// Write the run's provenance as JSON to this file
        #[arg(long)]
        provenance: Option<PathBuf>,

        /// Recognize the enhanced image and print the text
        #[arg(long)]
        ocr: bool,

        #[command(flatten)]
        pipeline: PipelineFlags,
    },

    /// Try many enhancements and keep the one OCR reads best
    Best {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Known transcription; scores candidates by word accuracy
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Parallel workers (defaults to the number of CPUs)
        #[arg(long)]
        workers: Option<usize>,

        /// Share of baseline words a candidate must keep
        #[arg(long, default_value_t = DEFAULT_MIN_WORD_RETENTION)]
        min_retention: f64,
    },

    /// Print the grayscale intensity histogram as JSON
    Histogram { input: PathBuf },
}

/// Per-stage overrides for `enhance`
#[derive(clap::Args, Debug, Default)]
pub struct PipelineFlags {
    #[arg(long)]
    pub no_denoise: bool,

    /// Odd denoise kernel width
    #[arg(long)]
    pub denoise_strength: Option<u32>,

    #[arg(long, value_enum)]
    pub denoise_filter: Option<FilterArg>,

    #[arg(long)]
    pub no_deskew: bool,

    /// Largest skew searched for, in degrees
    #[arg(long)]
    pub max_skew: Option<f32>,

    #[arg(long)]
    pub no_normalize: bool,

    #[arg(long)]
    pub target_low: Option<u8>,

    #[arg(long)]
    pub target_high: Option<u8>,

    #[arg(long)]
    pub sharpen: bool,

    #[arg(long, value_enum)]
    pub binarize: Option<MethodArg>,

    /// Threshold for fixed binarization
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Window for adaptive binarization
    #[arg(long)]
    pub block_size: Option<u32>,

    /// Offset subtracted from the local threshold
    #[arg(long)]
    pub offset: Option<i32>,

    #[arg(long, value_enum)]
    pub weighting: Option<WeightingArg>,

    #[arg(long, value_enum)]
    pub morphology: Option<MorphologyArg>,

    /// Structuring element radius; also applies to a morphology from `--options`
    #[arg(long)]
    pub morph_radius: Option<u8>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterArg {
    Median,
    Gaussian,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodArg {
    None,
    Global,
    Fixed,
    Adaptive,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightingArg {
    Mean,
    Gaussian,
    Sauvola,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphologyArg {
    None,
    Bold,
    Open,
    Close,
    OpenClose,
    CloseOpen,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from(&args);

    match args.command {
        Command::Enhance {
            input,
            output,
            options,
            provenance,
            ocr,
            pipeline,
        } => {
            let base = match options {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    PipelineOptions::from_json(&json)
                        .with_context(|| format!("Invalid options in {}", path.display()))?
                }
                None => PipelineOptions::default(),
            };
            let options = config::pipeline_options(&pipeline, base)?;

            let raw = load(&input, &config)?;
            let enhanced = enhance(&raw, &options).context("Enhancement failed")?;
            write_image(&enhanced, &output)?;

            if let Some(path) = provenance {
                let json = serde_json::to_string_pretty(enhanced.provenance())?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }

            if ocr {
                let registry = EngineRegistry::new(&config.engine)?;
                let result = registry.default_engine().recognize(enhanced.pixels())?;
                for warning in &result.warnings {
                    tracing::warn!("{}", warning);
                }
                tracing::info!("OCR confidence {:.2}", result.confidence);
                println!("{}", result.text);
            }
        }

        Command::Best {
            input,
            output,
            reference,
            workers,
            min_retention,
        } => {
            let reference = reference
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .transpose()?;

            let raw = load(&input, &config)?;
            let registry = EngineRegistry::new(&config.engine)?;
            let engine = registry.default_engine();

            let mut search =
                BestImageSearch::new(engine.as_ref()).with_min_word_retention(min_retention);
            if let Some(reference) = reference.as_deref() {
                search = search.with_reference(reference);
            }
            if let Some(workers) = workers {
                search = search.with_workers(workers);
            }

            let Some(best) = search.run(&raw)? else {
                bail!("No candidate kept enough of the recognized words");
            };
            write_image(&best.image, &output)?;
            println!(
                "{}\t{:.3}\t({} candidates evaluated)",
                best.label, best.score, best.evaluated
            );
        }

        Command::Histogram { input } => {
            let raw = load(&input, &config)?;
            let histogram = Histogram::of(&to_grayscale(&raw));
            let report = serde_json::json!({
                "counts": histogram.counts(),
                "normalized": histogram.normalized(),
                "total": histogram.total(),
                "min": histogram.min(),
                "max": histogram.max(),
                "mean": histogram.mean(),
                "otsu_threshold": histogram.otsu_threshold(),
                "background_level": histogram.background_level(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load(path: &Path, config: &Config) -> anyhow::Result<RawImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    loader::load(&bytes, config.limits)
        .with_context(|| format!("Failed to load {}", path.display()))
}

/// Encode by the output extension, or in the source format when the
/// extension is unknown
fn write_image(image: &EnhancedImage, path: &Path) -> anyhow::Result<()> {
    let bytes = match ImageFormat::from_path(path) {
        Ok(format) => image.encode(format)?,
        Err(_) => image.encode_as_source()?,
    };
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
