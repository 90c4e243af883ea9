//! OCR engine implementations

pub mod tesseract;

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::PipelineError;

/// Build the recognition engine, failing fast when it is not installed
pub fn from_config(config: &Config) -> Result<Box<dyn OcrEngine>, PipelineError> {
    tracing::info!("Initializing tesseract engine...");
    let engine = tesseract::TesseractEngine::new(config)?;
    tracing::debug!(
        "{} ({}) languages: {:?}",
        engine.name(),
        engine.description(),
        engine.supported_languages()
    );
    Ok(Box::new(engine))
}
