use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod engine;
mod engines;
mod error;
mod input;
mod merge;
mod pdf;
mod preprocessing;
mod raster;
mod recover;
mod render;
mod workflow;

use preprocessing::Preset;
use raster::RasterizerKind;
use render::OverflowPolicy;

#[derive(Parser, Debug)]
#[command(name = "pdf-form-ocr")]
#[command(about = "Append entered form data to a template PDF and OCR the result")]
#[command(version)]
pub struct Args {
    /// Template PDF the data page is appended to [default: template.pdf]
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Where the merged PDF is written [default: output_with_data.pdf]
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Folder for transient page images [default: ocr_output]
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Where the rendered data page is written before merging [default: temp_data.pdf]
    #[arg(long)]
    pub data_page: Option<PathBuf>,

    /// Path to the tesseract binary
    #[arg(long, env = "TESSERACT_PATH")]
    pub tesseract_path: Option<PathBuf>,

    /// Path to tessdata directory
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<PathBuf>,

    /// OCR language(s), e.g. "eng" or "eng+deu" [default: eng]
    #[arg(long, env = "OCR_LANGUAGE")]
    pub language: Option<String>,

    /// Tesseract page segmentation mode (0-13)
    #[arg(long)]
    pub psm: Option<u8>,

    /// How pages are turned into images [default: pdfium]
    #[arg(long, value_enum)]
    pub rasterizer: Option<RasterizerKind>,

    /// Path to the pdfium shared library (system library if not set)
    #[arg(long, env = "PDFIUM_LIBRARY_PATH")]
    pub pdfium_library: Option<PathBuf>,

    /// Render resolution for OCR [default: 300]
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Image preprocessing before recognition [default: minimal]
    #[arg(long, value_enum)]
    pub preprocess: Option<Preset>,

    /// Behavior when the fields do not fit on one page [default: error]
    #[arg(long, value_enum)]
    pub overflow: Option<OverflowPolicy>,

    /// JSON config file (defaults to <config dir>/pdf-form-ocr/config.json)
    #[arg(long, env = "PDF_FORM_OCR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the prompts and the report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting pdf-form-ocr v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load(args)?;
    tracing::debug!("Resolved configuration: {:?}", config);

    let report = workflow::run(&config)?;
    tracing::info!(
        "Done: {} field(s), {} of {} page(s) recognized",
        report.fields,
        report.pages.len(),
        report.merge.total_pages()
    );

    Ok(())
}
