//! Individual enhancement steps, each a pure function over image values

pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod morphology;
pub mod normalize;
pub mod sharpen;
pub mod threshold;
