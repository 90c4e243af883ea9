//! Document merger: template pages followed by the rendered data page(s)

use crate::error::PipelineError;
use crate::pdf;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// Page counts of a finished merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub template_pages: usize,
    pub appended_pages: usize,
}

impl MergeSummary {
    pub fn total_pages(&self) -> usize {
        self.template_pages + self.appended_pages
    }
}

/// Load the template, mapping absence and parse failures to `MissingInputFile`
pub fn load_template(path: &Path) -> Result<Document, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingInputFile {
            path: path.to_path_buf(),
            detail: "file does not exist".to_string(),
        });
    }

    let doc = Document::load(path).map_err(|e| PipelineError::MissingInputFile {
        path: path.to_path_buf(),
        detail: format!("not a readable PDF ({})", e),
    })?;

    pdf::root_pages_id(&doc).map_err(|e| PipelineError::MissingInputFile {
        path: path.to_path_buf(),
        detail: format!("no page tree ({})", e),
    })?;

    Ok(doc)
}

/// Append every page of `data` after the pages of `template` and write the
/// result to `output`.
///
/// Nothing is written unless both inputs load. The output is replaced
/// atomically.
pub fn merge_documents(
    template: &Path,
    data: &Path,
    output: &Path,
) -> Result<MergeSummary, PipelineError> {
    let mut merged = load_template(template)?;
    let template_pages = merged.get_pages().len();

    let data_doc = Document::load(data).map_err(|e| {
        PipelineError::Composition(format!(
            "Failed to load data page '{}': {}",
            data.display(),
            e
        ))
    })?;

    let appended_pages = append_pages(&mut merged, data_doc)
        .map_err(|e| PipelineError::Composition(format!("Failed to append pages: {}", e)))?;

    write_atomically(&mut merged, output)?;

    let summary = MergeSummary {
        template_pages,
        appended_pages,
    };
    tracing::info!(
        "Merged {} template page(s) and {} data page(s) into {:?}",
        summary.template_pages,
        summary.appended_pages,
        output
    );
    Ok(summary)
}

/// Move all pages of `source` to the end of `target`'s root page tree node
fn append_pages(target: &mut Document, mut source: Document) -> lopdf::Result<usize> {
    source.renumber_objects_with(target.max_id + 1);

    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    for &page_id in &source_pages {
        pdf::flatten_inherited(&mut source, page_id)?;
        pdf::pin_inherited(&mut source, page_id)?;
    }

    let target_root = pdf::root_pages_id(target)?;

    let mut max_id = target.max_id;
    for (id, object) in source.objects {
        if pdf::has_type(&object, b"Catalog") || pdf::has_type(&object, b"Pages") {
            continue;
        }
        max_id = max_id.max(id.0);
        target.objects.insert(id, object);
    }
    target.max_id = max_id;

    for &page_id in &source_pages {
        target
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Parent", target_root);
    }

    let root = target.get_object_mut(target_root)?.as_dict_mut()?;
    let count = root.get(b"Count").and_then(|c| c.as_i64()).unwrap_or(0);
    root.get_mut(b"Kids")?
        .as_array_mut()?
        .extend(source_pages.iter().map(|&id| Object::Reference(id)));
    root.set("Count", Object::Integer(count + source_pages.len() as i64));

    Ok(source_pages.len())
}

/// Save next to the destination, then rename over it
fn write_atomically(doc: &mut Document, output: &Path) -> Result<(), PipelineError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".merge-")
        .suffix(".pdf.part")
        .tempfile_in(dir)
        .map_err(|e| PipelineError::io(dir, e))?;

    doc.save_to(&mut staged)
        .map_err(|e| PipelineError::io(output, std::io::Error::other(e.to_string())))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| PipelineError::io(output, e))?;
    staged
        .persist(output)
        .map_err(|e| PipelineError::io(output, e.error))?;

    Ok(())
}
