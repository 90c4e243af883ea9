//! Tesseract engine implementation
//!
//! Drives the `tesseract` command-line program at the configured path. The
//! binary and the requested language packs are checked once at start-up so a
//! misconfigured installation fails before any work is done.

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::PipelineError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Tesseract OCR engine
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    tessdata_path: Option<PathBuf>,
    psm: Option<u8>,
    languages: Vec<String>,
}

impl TesseractEngine {
    /// Verify the binary and language packs, then build the engine
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let binary = config.tesseract_path.clone();

        let version = run(&binary, &["--version"])?;
        if !version.status.success() {
            return Err(PipelineError::MissingDependency(format!(
                "'{} --version' exited with {}",
                binary.display(),
                version.status
            )));
        }
        // Tesseract 3 prints its banner on stderr, later releases on stdout
        let banner = first_line(&version.stdout)
            .or_else(|| first_line(&version.stderr))
            .unwrap_or_else(|| "unknown version".to_string());

        let mut list_args = vec!["--list-langs".to_string()];
        if let Some(dir) = &config.tessdata_path {
            list_args.push("--tessdata-dir".to_string());
            list_args.push(dir.display().to_string());
        }
        let listing = run(&binary, &list_args[..])?;
        let mut languages = parse_language_list(&String::from_utf8_lossy(&listing.stdout));
        if languages.is_empty() {
            languages = parse_language_list(&String::from_utf8_lossy(&listing.stderr));
        }

        if languages.is_empty() {
            tracing::warn!("Could not read Tesseract language list, skipping language check");
        } else {
            let missing = missing_languages(&config.language, &languages);
            if !missing.is_empty() {
                return Err(PipelineError::MissingDependency(format!(
                    "Tesseract language pack(s) not installed: {} (available: {})",
                    missing.join(", "),
                    languages.join(", ")
                )));
            }
        }

        tracing::info!(
            "Tesseract engine initialized ({}, binary: {:?}, language: {})",
            banner,
            binary,
            config.language
        );

        Ok(Self {
            binary,
            language: config.language.clone(),
            tessdata_path: config.tessdata_path.clone(),
            psm: config.psm,
            languages,
        })
    }

    /// Arguments for recognizing `image`, writing the text to stdout
    fn recognize_args(&self, image: &Path) -> Vec<String> {
        let mut args = vec![
            image.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        if let Some(dir) = &self.tessdata_path {
            args.push("--tessdata-dir".to_string());
            args.push(dir.display().to_string());
        }
        if let Some(psm) = self.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR command-line engine"
    }

    fn recognize(&self, image: &Path) -> Result<String, PipelineError> {
        let args = self.recognize_args(image);
        let output = run(&self.binary, &args[..])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Recognition(format!(
                "tesseract exited with {} for {:?}: {}",
                output.status,
                image,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        tracing::debug!("Recognized {} chars from {:?}", text.len(), image);
        Ok(text.trim_end().to_string())
    }

    fn supported_languages(&self) -> Vec<String> {
        self.languages.clone()
    }
}

/// Run the binary; a binary that cannot be started is a missing dependency
fn run<S: AsRef<std::ffi::OsStr>>(binary: &Path, args: &[S]) -> Result<Output, PipelineError> {
    Command::new(binary).args(args).output().map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::NotFound => "not found".to_string(),
            ErrorKind::PermissionDenied => "not executable".to_string(),
            _ => e.to_string(),
        };
        PipelineError::MissingDependency(format!(
            "Tesseract binary '{}' is {} (set --tesseract-path or TESSERACT_PATH)",
            binary.display(),
            reason
        ))
    })
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Parse `tesseract --list-langs` output (a banner line, then one code per line)
pub fn parse_language_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .filter(|line| !line.contains(' '))
        .map(str::to_string)
        .collect()
}

/// Requested languages (`eng+deu` style) that are not installed
fn missing_languages(requested: &str, available: &[String]) -> Vec<String> {
    requested
        .split('+')
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !available.iter().any(|a| a == lang))
        .map(str::to_string)
        .collect()
}
