//! The linear pipeline: collect fields, render, merge, recover text, report

use crate::config::Config;
use crate::engine::{OcrEngine, PageText};
use crate::engines;
use crate::error::PipelineError;
use crate::input::collect_fields;
use crate::merge::{self, MergeSummary};
use crate::preprocessing::Pipeline;
use crate::raster::{self, PageRasterizer};
use crate::recover::TextRecovery;
use crate::render::render_form;
use std::fmt::Display;
use std::io::{BufRead, Write};

/// What a completed run produced
#[derive(Debug)]
pub struct Report {
    pub fields: usize,
    pub merge: MergeSummary,
    pub pages: Vec<PageText>,
}

/// Run the interactive pipeline on stdin/stdout.
///
/// The template and the external engines are checked before the user is asked
/// for anything.
pub fn run(config: &Config) -> Result<Report, PipelineError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    say(&mut out, "Welcome to the PDF Data Integration and OCR tool.")?;

    merge::load_template(&config.template)?;
    let rasterizer = raster::from_config(config)?;
    let engine = engines::from_config(config)?;

    Workflow::new(config, rasterizer.as_ref(), engine.as_ref()).execute(stdin.lock(), &mut out)
}

pub struct Workflow<'a> {
    config: &'a Config,
    rasterizer: &'a dyn PageRasterizer,
    engine: &'a dyn OcrEngine,
}

impl<'a> Workflow<'a> {
    pub fn new(
        config: &'a Config,
        rasterizer: &'a dyn PageRasterizer,
        engine: &'a dyn OcrEngine,
    ) -> Self {
        Self {
            config,
            rasterizer,
            engine,
        }
    }

    pub fn execute<R: BufRead, W: Write>(
        &self,
        mut input: R,
        out: &mut W,
    ) -> Result<Report, PipelineError> {
        let config = self.config;

        say(out, "Enter data to integrate into the PDF. Type 'done' when finished.")?;
        let fields = collect_fields(&mut input, &mut *out)?;

        merge::load_template(&config.template)?;

        say(out, "Creating a PDF with your data...")?;
        let rendered = render_form(&fields, &config.data_page, config.overflow)?;

        say(out, "Merging the data PDF with the template PDF...")?;
        let merged = merge::merge_documents(&config.template, &rendered.path, &config.output);
        // The data page is only an intermediate, whether or not the merge worked
        if let Err(e) = std::fs::remove_file(&rendered.path) {
            tracing::warn!("Could not remove data page {:?}: {}", rendered.path, e);
        }
        let summary = merged?;
        if summary.appended_pages != rendered.pages {
            tracing::warn!(
                "Rendered {} data page(s) but {} were appended",
                rendered.pages,
                summary.appended_pages
            );
        }
        say(
            out,
            format!(
                "PDF with integrated data saved as '{}'.",
                config.output.display()
            ),
        )?;

        say(out, "Performing OCR on the output PDF...")?;
        let recovery = TextRecovery::new(
            self.rasterizer,
            self.engine,
            Pipeline::new(config.preprocess),
            &config.work_dir,
        );
        let pages = recovery.recover(&config.output)?;
        if pages.len() != summary.total_pages() {
            tracing::warn!(
                "Recovered {} page(s) but the merged document has {}",
                pages.len(),
                summary.total_pages()
            );
        }

        say(out, "OCR Text Extraction Complete:")?;
        for page in &pages {
            say(out, format!("Page {} Text:", page.page))?;
            say(out, &page.text)?;
        }
        say(out, "Process completed successfully.")?;

        Ok(Report {
            fields: fields.len(),
            merge: summary,
            pages,
        })
    }
}

fn say<W: Write>(out: &mut W, line: impl Display) -> Result<(), PipelineError> {
    writeln!(out, "{}", line).map_err(|e| PipelineError::io("<stdout>", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{testing, ConfigFile};
    use crate::raster::embedded::EmbeddedImageRasterizer;
    use crate::raster::RasterizerKind;
    use lopdf::content::Content;
    use lopdf::{dictionary, Document, Object, Stream};
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    /// Reports the width of the page image, which the template encodes per page
    struct WidthEngine;

    impl OcrEngine for WidthEngine {
        fn name(&self) -> &'static str {
            "width"
        }

        fn description(&self) -> &'static str {
            "reports image width"
        }

        fn recognize(&self, image: &Path) -> Result<String, PipelineError> {
            let img = image::open(image)
                .map_err(|e| PipelineError::Recognition(e.to_string()))?;
            Ok(format!("width {}", img.width()))
        }

        fn supported_languages(&self) -> Vec<String> {
            Vec::new()
        }
    }

    /// Template whose page `i` draws a gray image `widths[i]` pixels wide
    fn write_template(path: &Path, widths: &[u32]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for &width in widths {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => 4,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![200u8; width as usize * 4],
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Resources" => dictionary! { "XObject" => dictionary! { "Im1" => image_id } },
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
    }

    fn fixture(widths: &[u32]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| -> PathBuf { dir.path().join(name) };
        write_template(&path("template.pdf"), widths);

        let config = testing::config_with(ConfigFile {
            template: Some(path("template.pdf")),
            output: Some(path("output_with_data.pdf")),
            work_dir: Some(path("ocr_output")),
            data_page: Some(path("temp_data.pdf")),
            rasterizer: Some(RasterizerKind::Embedded),
            ..ConfigFile::default()
        });
        Fixture { dir, config }
    }

    fn execute(config: &Config, script: &str) -> (Result<Report, PipelineError>, String) {
        let mut out = Vec::new();
        let result = Workflow::new(config, &EmbeddedImageRasterizer, &WidthEngine)
            .execute(Cursor::new(script), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    fn last_page_lines(path: &Path) -> Vec<String> {
        let doc = Document::load(path).unwrap();
        let last = *doc.get_pages().values().last().unwrap();
        Content::decode(&doc.get_page_content(last).unwrap())
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match &op.operands[0] {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_alice_scenario() {
        let f = fixture(&[10, 20]);

        let (result, console) = execute(&f.config, "Name\nAlice\nDate\n2024-01-01\ndone\n");
        let report = result.unwrap();

        assert_eq!(report.fields, 2);
        assert_eq!(report.merge.total_pages(), 3);
        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.pages[0].text, "width 10");
        assert_eq!(report.pages[1].text, "width 20");
        assert_eq!(report.pages[2].text, "");

        assert_eq!(
            last_page_lines(&f.config.output),
            vec!["Integrated Data:", "Name: Alice", "Date: 2024-01-01"]
        );

        let page_1 = console.find("Page 1 Text:").unwrap();
        let page_3 = console.find("Page 3 Text:").unwrap();
        assert!(page_1 < page_3);
        assert!(console.trim_end().ends_with("Process completed successfully."));
    }

    #[test]
    fn test_empty_field_set_still_merges() {
        let f = fixture(&[10]);

        let (result, _) = execute(&f.config, "done\n");
        let report = result.unwrap();

        assert_eq!(report.fields, 0);
        assert_eq!(report.merge.total_pages(), 2);
        assert_eq!(last_page_lines(&f.config.output), vec!["Integrated Data:"]);
    }

    #[test]
    fn test_missing_template_leaves_no_output() {
        let f = fixture(&[10]);
        std::fs::remove_file(&f.config.template).unwrap();

        let (result, console) = execute(&f.config, "Name\nAlice\ndone\n");

        assert!(matches!(result, Err(PipelineError::MissingInputFile { .. })));
        assert!(!f.config.output.exists());
        assert!(!console.contains("Performing OCR"));
    }

    #[test]
    fn test_missing_template_is_detected_before_rendering() {
        let f = fixture(&[10]);
        std::fs::remove_file(&f.config.template).unwrap();

        let (result, console) = execute(&f.config, "Name\nAlice\ndone\n");

        assert!(matches!(result, Err(PipelineError::MissingInputFile { .. })));
        assert!(!f.config.data_page.exists());
        assert!(!console.contains("Creating a PDF"));
    }

    #[test]
    fn test_failed_merge_removes_data_page() {
        let mut f = fixture(&[10]);
        f.config.output = f.dir.path().join("missing").join("output_with_data.pdf");

        let (result, console) = execute(&f.config, "Name\nAlice\ndone\n");

        assert!(matches!(result, Err(PipelineError::Io { .. })));
        assert!(console.contains("Merging the data PDF"));
        assert!(!f.config.data_page.exists());
        assert!(!f.config.output.exists());
    }

    #[test]
    fn test_cleans_up_intermediate_files() {
        let f = fixture(&[10, 12]);

        execute(&f.config, "Name\nAlice\ndone\n").0.unwrap();

        assert!(!f.config.data_page.exists());
        let leftovers = std::fs::read_dir(&f.config.work_dir).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(f.dir.path().join("output_with_data.pdf").exists());
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let f = fixture(&[10, 20]);
        let script = "Name\nAlice\nDate\n2024-01-01\ndone\n";

        let first = execute(&f.config, script).0.unwrap();
        let first_bytes = std::fs::read(&f.config.output).unwrap();
        let second = execute(&f.config, script).0.unwrap();
        let second_bytes = std::fs::read(&f.config.output).unwrap();

        assert_eq!(first_bytes, second_bytes);
        assert_eq!(first.pages, second.pages);
    }

    #[test]
    fn test_overflow_aborts_before_merge() {
        let f = fixture(&[10]);
        let script: String = (0..36)
            .map(|i| format!("Field{}\nValue{}\n", i, i))
            .chain(std::iter::once("done\n".to_string()))
            .collect();

        let (result, _) = execute(&f.config, &script);

        assert!(matches!(result, Err(PipelineError::Overflow { .. })));
        assert!(!f.config.output.exists());
    }
}
