//! OCR engine implementations
//!
//! This module contains implementations of the OcrEngine trait. Engines are
//! conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;
pub mod quality;

use crate::engine::OcrEngine;
use crate::error::{EnhanceError, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Settings shared by engine constructors
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Where models are stored; the user cache directory when unset
    pub model_dir: Option<PathBuf>,
}

/// Information about an available engine
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Registry of available OCR engines
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
}

impl EngineRegistry {
    /// Create a new engine registry with all compiled-in engines initialized
    pub fn new(options: &EngineOptions) -> Result<Self> {
        #[allow(unused_mut)]
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        {
            tracing::info!("Initializing ocrs engine...");
            engines.push(Arc::new(ocrs::OcrsEngine::new(options)?));
        }
        #[cfg(not(feature = "engine-ocrs"))]
        let _ = options;

        Self::with_engines(engines)
    }

    /// Registry over the given engines; the first one is the default
    pub fn with_engines(engines: Vec<Arc<dyn OcrEngine>>) -> Result<Self> {
        if engines.is_empty() {
            return Err(EnhanceError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs".to_string(),
            ));
        }
        Ok(Self { engines })
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default_engine(&self) -> Arc<dyn OcrEngine> {
        Arc::clone(&self.engines[0])
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Get info about all available engines
    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
            })
            .collect()
    }
}
