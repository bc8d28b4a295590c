//! Document image enhancement for OCR
//!
//! Load an image with [`loader::load`], run it through [`enhance`] with a set
//! of [`PipelineOptions`], and hand [`EnhancedImage::pixels`] to an OCR
//! engine. [`search::BestImageSearch`] tries many option sets against an
//! engine and keeps the one it reads best.

pub mod accuracy;
pub mod engine;
pub mod engines;
pub mod error;
pub mod histogram;
pub mod loader;
pub mod options;
pub mod preprocessing;
pub mod search;
pub mod types;

pub use error::{EnhanceError, Result};
pub use options::PipelineOptions;
pub use preprocessing::enhance;
pub use types::{BinaryImage, EnhancedImage, GrayscaleImage, RawImage, SkewAngle};
