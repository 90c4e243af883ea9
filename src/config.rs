use crate::error::PipelineError;
use crate::preprocessing::Preset;
use crate::raster::RasterizerKind;
use crate::render::OverflowPolicy;
use crate::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_TEMPLATE: &str = "template.pdf";
pub const DEFAULT_OUTPUT: &str = "output_with_data.pdf";
pub const DEFAULT_WORK_DIR: &str = "ocr_output";
pub const DEFAULT_DATA_PAGE: &str = "temp_data.pdf";
pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_DPI: u32 = 300;

/// Resolved pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub template: PathBuf,
    pub output: PathBuf,
    pub work_dir: PathBuf,
    pub data_page: PathBuf,
    pub tesseract_path: PathBuf,
    pub tessdata_path: Option<PathBuf>,
    pub language: String,
    pub psm: Option<u8>,
    pub rasterizer: RasterizerKind,
    pub pdfium_library: Option<PathBuf>,
    pub dpi: u32,
    pub preprocess: Preset,
    pub overflow: OverflowPolicy,
}

/// Settings read from the JSON config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub template: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub data_page: Option<PathBuf>,
    pub tesseract_path: Option<PathBuf>,
    pub tessdata_path: Option<PathBuf>,
    pub language: Option<String>,
    pub psm: Option<u8>,
    pub rasterizer: Option<RasterizerKind>,
    pub pdfium_library: Option<PathBuf>,
    pub dpi: Option<u32>,
    pub preprocess: Option<Preset>,
    pub overflow: Option<OverflowPolicy>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&raw).map_err(|e| {
            PipelineError::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

/// `<config dir>/pdf-form-ocr/config.json`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pdf-form-ocr").join("config.json"))
}

/// Where Tesseract lives when nothing else says otherwise
pub fn platform_default_tesseract() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
    } else {
        PathBuf::from("/usr/bin/tesseract")
    }
}

impl Config {
    /// Build the configuration from CLI/env arguments and the config file.
    ///
    /// An explicit `--config` path must exist; the default location is only
    /// read when present.
    pub fn load(args: Args) -> Result<Self, PipelineError> {
        let file = match &args.config {
            Some(path) => ConfigFile::read(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    tracing::debug!("Reading config file {:?}", path);
                    ConfigFile::read(&path)?
                }
                _ => ConfigFile::default(),
            },
        };

        Self::resolve(args, file)
    }

    /// Merge arguments over file settings over built-in defaults
    pub fn resolve(args: Args, file: ConfigFile) -> Result<Self, PipelineError> {
        let language = args
            .language
            .or(file.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        if language.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "OCR language must not be empty".to_string(),
            ));
        }

        let dpi = args.dpi.or(file.dpi).unwrap_or(DEFAULT_DPI);
        if !(72..=1200).contains(&dpi) {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be between 72 and 1200, got {}",
                dpi
            )));
        }

        let psm = args.psm.or(file.psm);
        if let Some(mode) = psm {
            if mode > 13 {
                return Err(PipelineError::InvalidConfig(format!(
                    "Page segmentation mode must be 0-13, got {}",
                    mode
                )));
            }
        }

        Ok(Self {
            template: args
                .template
                .or(file.template)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
            output: args
                .output
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            work_dir: args
                .work_dir
                .or(file.work_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            data_page: args
                .data_page
                .or(file.data_page)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PAGE)),
            tesseract_path: args
                .tesseract_path
                .or(file.tesseract_path)
                .unwrap_or_else(platform_default_tesseract),
            tessdata_path: args.tessdata_path.or(file.tessdata_path),
            language,
            psm,
            rasterizer: args.rasterizer.or(file.rasterizer).unwrap_or_default(),
            pdfium_library: args.pdfium_library.or(file.pdfium_library),
            dpi,
            preprocess: args.preprocess.or(file.preprocess).unwrap_or_default(),
            overflow: args.overflow.or(file.overflow).unwrap_or_default(),
        })
    }
}
