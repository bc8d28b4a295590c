use thiserror::Error;

/// Errors raised while loading, enhancing or recognizing a document image
#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Invalid image dimensions: {width}x{height} (max: {max})")]
    InvalidDimensionsError { width: u32, height: u32, max: u32 },

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Stage '{stage}' failed ({params}): {message}")]
    ProcessingError {
        stage: String,
        params: String,
        message: String,
    },

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),
}

impl EnhanceError {
    /// Shorthand for a `ConfigurationError`
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError(message.into())
    }

    /// Name of the stage that failed, for `ProcessingError`
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::ProcessingError { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EnhanceError>;
