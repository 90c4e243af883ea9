//! Full-page rendering through pdfium.
//!
//! Every page is rendered, vector text included, so the recognition engine
//! sees exactly what a reader would.

use super::{PageRaster, PageRasterizer, PageVisitor};
use crate::config::Config;
use crate::error::PipelineError;
use pdfium_render::prelude::*;
use std::path::Path;

/// Points per inch in PDF user space
const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    dpi: u32,
}

impl PdfiumRasterizer {
    /// Bind to the configured pdfium library, or the system one
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let bindings = match &config.pdfium_library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| {
            PipelineError::MissingDependency(format!(
                "pdfium library could not be loaded ({:?}); set --pdfium-library or PDFIUM_LIBRARY_PATH, or use --rasterizer embedded",
                e
            ))
        })?;

        tracing::debug!("Bound pdfium (dpi: {})", config.dpi);
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            dpi: config.dpi,
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn rasterize(&self, pdf: &Path, visit: &mut PageVisitor<'_>) -> Result<usize, PipelineError> {
        let document = self.pdfium.load_pdf_from_file(pdf, None).map_err(|e| {
            PipelineError::Rasterization {
                page: 0,
                detail: format!("Failed to open {:?}: {:?}", pdf, e),
            }
        })?;

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / POINTS_PER_INCH);

        let pages = document.pages();
        tracing::info!("Rendering {} page(s) at {} dpi", pages.len(), self.dpi);

        let mut visited = 0;
        for (index, page) in pages.iter().enumerate() {
            let number = index + 1;
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PipelineError::Rasterization {
                    page: number,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            tracing::debug!(
                "Rendered page {} -> {}x{} px",
                number,
                image.width(),
                image.height()
            );

            visit(PageRaster {
                number,
                image: Some(image),
            })?;
            visited += 1;
        }

        Ok(visited)
    }
}
