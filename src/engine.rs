use crate::error::Result;
use image::GrayImage;
use serde::Serialize;

/// One recognized word
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordConfidence {
    pub text: String,
    /// Engine confidence in 0..=1, if the engine reports one per word
    pub confidence: Option<f32>,
}

/// Text recognized from a single image
#[derive(Debug, Clone, Serialize)]
pub struct OcrResult {
    pub text: String,
    /// Document confidence in 0..=1
    pub confidence: f32,
    pub words: Vec<WordConfidence>,
    pub warnings: Vec<String>,
}

impl OcrResult {
    /// Build a result from plain text, one word entry per whitespace-split
    /// token
    pub fn from_text(text: impl Into<String>, confidence: f32) -> Self {
        let text = text.into();
        let words = text
            .split_whitespace()
            .map(|w| WordConfidence {
                text: w.to_string(),
                confidence: None,
            })
            .collect();
        Self {
            text,
            confidence,
            words,
            warnings: Vec::new(),
        }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize the text in an enhanced page
    fn recognize(&self, image: &GrayImage) -> Result<OcrResult>;
}
