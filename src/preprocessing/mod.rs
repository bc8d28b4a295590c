//! Image enhancement for OCR
//!
//! [`Pipeline`] runs the steps in a fixed order and records what each one
//! did. Steps are also usable on their own through [`steps`].

pub mod pipeline;
pub mod steps;

pub use pipeline::{enhance, Pipeline, Stage, StageContext, StageRecord};
