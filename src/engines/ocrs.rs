//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use super::quality::text_confidence;
use super::EngineOptions;
use crate::engine::{OcrEngine, OcrResult, WordConfidence};
use crate::error::{EnhanceError, Result};
use image::{DynamicImage, GrayImage};
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// Cache subdirectory used when no model directory is configured
const CACHE_DIR_NAME: &str = "document-enhancer";

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Load the detection and recognition models, downloading them if needed
    pub fn new(options: &EngineOptions) -> Result<Self> {
        tracing::info!("Initializing ocrs OCR engine...");

        let model_dir = model_dir(options.model_dir.as_deref())?;
        let detection_model = load_model(&model_dir, DETECTION_MODEL_URL, "text-detection.rten")?;
        let recognition_model =
            load_model(&model_dir, RECOGNITION_MODEL_URL, "text-recognition.rten")?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            EnhanceError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");
        Ok(Self { engine })
    }

    /// Recognized lines, each a list of words
    fn read_lines(&self, image: &GrayImage) -> Result<Vec<Vec<String>>> {
        // ocrs expects HWC RGB bytes
        let rgb = DynamicImage::ImageLuma8(image.clone()).into_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| ocr_error("create image source", e))?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| ocr_error("prepare input", e))?;
        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|e| ocr_error("detect words", e))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|e| ocr_error("recognize text", e))?;

        Ok(lines
            .iter()
            .flatten()
            .map(|line| line.words().map(|word| word.to_string()).collect())
            .collect())
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &GrayImage) -> Result<OcrResult> {
        let lines = self.read_lines(image)?;

        let text = lines
            .iter()
            .map(|words| words.join(" "))
            .collect::<Vec<_>>()
            .join("\n");
        let words = lines
            .into_iter()
            .flatten()
            .map(|text| WordConfidence {
                text,
                confidence: None,
            })
            .collect();

        let mut warnings = Vec::new();
        if text.trim().is_empty() {
            warnings.push("No text recognized".to_string());
        }

        Ok(OcrResult {
            confidence: text_confidence(&text),
            text,
            words,
            warnings,
        })
    }
}

fn ocr_error(action: &str, err: impl std::fmt::Display) -> EnhanceError {
    EnhanceError::OcrError(format!("Failed to {}: {}", action, err))
}

fn init_error(action: &str, err: impl std::fmt::Display) -> EnhanceError {
    EnhanceError::InitializationError(format!("Failed to {}: {}", action, err))
}

/// Configured model directory, or the user cache directory
fn model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = match configured {
        Some(dir) => dir.to_path_buf(),
        None => dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME),
    };

    std::fs::create_dir_all(&dir).map_err(|e| {
        EnhanceError::InitializationError(format!(
            "Failed to create model directory {:?}: {}",
            dir, e
        ))
    })?;
    Ok(dir)
}

fn load_model(dir: &Path, url: &str, filename: &str) -> Result<Model> {
    let path = dir.join(filename);

    if !path.exists() {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &path)?;
        tracing::info!("Downloaded {} to {:?}", filename, path);
    } else {
        tracing::info!("Using cached model from {:?}", path);
    }

    Model::load_file(&path).map_err(|e| {
        EnhanceError::InitializationError(format!("Failed to load {}: {}", filename, e))
    })
}

/// Writes to a `.part` file and renames it into place once complete
fn download_file(url: &str, path: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| init_error("download model", e))?;
    let buffer = response
        .into_body()
        .read_to_vec()
        .map_err(|e| init_error("read response body", e))?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| init_error("create model file", e))?;
    file.write_all(&buffer)
        .map_err(|e| init_error("write model file", e))?;
    std::fs::rename(&partial, path).map_err(|e| init_error("move model file", e))?;

    Ok(())
}
