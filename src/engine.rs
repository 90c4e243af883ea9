use crate::error::PipelineError;
use std::path::Path;

/// Recognized text of one document page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number in the merged document
    pub page: usize,
    pub text: String,
}

/// Trait that all OCR engines must implement
pub trait OcrEngine {
    /// Returns the engine identifier (e.g., "tesseract")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize the text in an image file
    fn recognize(&self, image: &Path) -> Result<String, PipelineError>;

    /// Languages the engine can currently recognize
    fn supported_languages(&self) -> Vec<String>;
}
