//! Page rasterizers
//!
//! A rasterizer walks a PDF page by page and hands each page's raster to a
//! visitor, so only one page image is held in memory at a time.

pub mod embedded;
pub mod pdfium;

use crate::config::Config;
use crate::error::PipelineError;
use clap::ValueEnum;
use image::DynamicImage;
use serde::Deserialize;
use std::path::Path;

/// Raster of one page; `None` when the page has no visual content to offer
pub struct PageRaster {
    /// 1-based page number
    pub number: usize,
    pub image: Option<DynamicImage>,
}

/// Callback receiving each page raster in page order
pub type PageVisitor<'a> = dyn FnMut(PageRaster) -> Result<(), PipelineError> + 'a;

pub trait PageRasterizer {
    fn name(&self) -> &'static str;

    /// Visit every page of `pdf` in order; returns the number of pages visited
    fn rasterize(&self, pdf: &Path, visit: &mut PageVisitor<'_>) -> Result<usize, PipelineError>;
}

/// Available rasterizer implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    /// Render whole pages with the pdfium library
    #[default]
    Pdfium,
    /// Use the largest image embedded in each page (no native library)
    Embedded,
}

/// Build the configured rasterizer, verifying its native dependencies
pub fn from_config(config: &Config) -> Result<Box<dyn PageRasterizer>, PipelineError> {
    let rasterizer: Box<dyn PageRasterizer> = match config.rasterizer {
        RasterizerKind::Pdfium => Box::new(pdfium::PdfiumRasterizer::new(config)?),
        RasterizerKind::Embedded => Box::new(embedded::EmbeddedImageRasterizer),
    };
    tracing::info!("Using {} rasterizer", rasterizer.name());
    Ok(rasterizer)
}
