use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Template document '{}' is unavailable: {detail}", path.display())]
    MissingInputFile { path: PathBuf, detail: String },

    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("{fields} fields do not fit on one page (capacity: {capacity})")]
    Overflow { fields: usize, capacity: usize },

    #[error("Failed to compose document: {0}")]
    Composition(String),

    #[error("Failed to rasterize page {page}: {detail}")]
    Rasterization { page: usize, detail: String },

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = PipelineError::MissingInputFile {
            path: PathBuf::from("template.pdf"),
            detail: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Template document 'template.pdf' is unavailable: not found"
        );

        let err = PipelineError::io(
            "out.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("I/O failure on 'out.pdf'"));
    }

    #[test]
    fn test_overflow_message() {
        let err = PipelineError::Overflow {
            fields: 36,
            capacity: 35,
        };
        assert_eq!(
            err.to_string(),
            "36 fields do not fit on one page (capacity: 35)"
        );
    }
}
