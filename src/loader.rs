//! Decoding raw bytes into a [`RawImage`]

use crate::error::{EnhanceError, Result};
use crate::types::RawImage;
use image::ImageReader;
use std::io::Cursor;

/// Default upper bound for width and height
pub const DEFAULT_MAX_DIMENSION: u32 = 10_000;

/// Limits applied while loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLimits {
    pub max_dimension: u32,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Decode an in-memory image.
///
/// The header is inspected first so that images beyond `limits` are rejected
/// before any pixel buffer is allocated.
pub fn load(bytes: &[u8], limits: LoadLimits) -> Result<RawImage> {
    if bytes.is_empty() {
        return Err(EnhanceError::DecodeError("empty input".to_string()));
    }

    let format = guessed_reader(bytes)?
        .format()
        .ok_or_else(|| EnhanceError::DecodeError("unrecognized image format".to_string()))?;

    let (width, height) = guessed_reader(bytes)?
        .into_dimensions()
        .map_err(|e| EnhanceError::DecodeError(e.to_string()))?;

    if width == 0 || height == 0 || width > limits.max_dimension || height > limits.max_dimension
    {
        return Err(EnhanceError::InvalidDimensionsError {
            width,
            height,
            max: limits.max_dimension,
        });
    }

    let image = guessed_reader(bytes)?
        .decode()
        .map_err(|e| EnhanceError::DecodeError(e.to_string()))?;

    tracing::debug!(
        "Loaded {:?} image {}x{} ({:?})",
        format,
        width,
        height,
        image.color()
    );

    Ok(RawImage::new(image, Some(format)))
}

fn guessed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EnhanceError::DecodeError(e.to_string()))
}
