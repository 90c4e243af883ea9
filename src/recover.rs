//! Page-text recovery: rasterize each page, recognize it, keep page order

use crate::engine::{OcrEngine, PageText};
use crate::error::PipelineError;
use crate::preprocessing::Pipeline;
use crate::raster::{PageRaster, PageRasterizer};
use image::{DynamicImage, ImageFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A page image on disk for the duration of one recognition call.
///
/// The file is removed when the guard is dropped, whichever way the call ends.
pub struct PageImage {
    file: NamedTempFile,
}

impl PageImage {
    /// Write `image` as `page_<n>_<random>.png` inside `dir`
    pub fn write(dir: &Path, page: usize, image: &DynamicImage) -> Result<Self, PipelineError> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("page_{}_", page))
            .suffix(".png")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::io(dir, e))?;

        image
            .write_to(&mut file, ImageFormat::Png)
            .map_err(|e| PipelineError::io(file.path(), std::io::Error::other(e.to_string())))?;
        file.flush()
            .map_err(|e| PipelineError::io(file.path(), e))?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting failures instead of ignoring them
    pub fn remove(self) -> Result<(), PipelineError> {
        let path = self.file.path().to_path_buf();
        self.file.close().map_err(|e| PipelineError::io(path, e))
    }
}

/// Runs rasterizer, preprocessing and engine over a whole document
pub struct TextRecovery<'a> {
    rasterizer: &'a dyn PageRasterizer,
    engine: &'a dyn OcrEngine,
    preprocess: Pipeline,
    work_dir: PathBuf,
}

impl<'a> TextRecovery<'a> {
    pub fn new(
        rasterizer: &'a dyn PageRasterizer,
        engine: &'a dyn OcrEngine,
        preprocess: Pipeline,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            rasterizer,
            engine,
            preprocess,
            work_dir: work_dir.into(),
        }
    }

    /// Recognized text for every page of `pdf`, one entry per page, in order
    pub fn recover(&self, pdf: &Path) -> Result<Vec<PageText>, PipelineError> {
        std::fs::create_dir_all(&self.work_dir)
            .map_err(|e| PipelineError::io(&self.work_dir, e))?;

        let mut pages = Vec::new();
        let visited = self.rasterizer.rasterize(pdf, &mut |raster: PageRaster| {
            let text = self.recognize_page(raster)?;
            pages.push(text);
            Ok(())
        })?;

        if visited != pages.len() {
            return Err(PipelineError::Rasterization {
                page: visited,
                detail: format!(
                    "rasterizer reported {} page(s) but produced {}",
                    visited,
                    pages.len()
                ),
            });
        }

        tracing::info!(
            "Recovered text for {} page(s) with {} via {}",
            pages.len(),
            self.engine.name(),
            self.rasterizer.name()
        );
        Ok(pages)
    }

    fn recognize_page(&self, raster: PageRaster) -> Result<PageText, PipelineError> {
        let page = raster.number;
        let Some(image) = raster.image else {
            tracing::warn!("Page {} has no raster content, recording empty text", page);
            return Ok(PageText {
                page,
                text: String::new(),
            });
        };

        let prepared = self.preprocess.process(image)?;
        let page_image = PageImage::write(&self.work_dir, page, &prepared.image)?;

        let text = self
            .engine
            .recognize(page_image.path())
            .map_err(|e| match e {
                PipelineError::Recognition(detail) => {
                    PipelineError::Recognition(format!("page {}: {}", page, detail))
                }
                other => other,
            })?;
        page_image.remove()?;

        tracing::debug!("Page {}: {} chars recognized", page, text.len());
        Ok(PageText { page, text })
    }
}
