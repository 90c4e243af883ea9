//! Form renderer: prints the field set onto a new PDF page
//!
//! Layout is fixed: US Letter, Helvetica 12pt, a header line followed by one
//! line per field at a constant spacing. The document is built directly with
//! lopdf so the bytes only depend on the field set.

use crate::error::PipelineError;
use crate::input::FieldSet;
use clap::ValueEnum;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;
pub const LEFT_MARGIN: i64 = 100;
pub const HEADER_Y: i64 = 750;
pub const FIRST_LINE_Y: i64 = 730;
pub const LINE_SPACING: i64 = 20;
pub const BOTTOM_MARGIN: i64 = 50;
pub const FONT_SIZE: i64 = 12;
pub const HEADER: &str = "Integrated Data:";

/// Number of field lines that fit between the first line and the bottom margin
pub const fn page_capacity() -> usize {
    ((FIRST_LINE_Y - BOTTOM_MARGIN) / LINE_SPACING + 1) as usize
}

/// What to do when the fields do not fit on one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Refuse to render and report the overflow
    #[default]
    Error,
    /// Continue on additional pages, each with its own header
    Paginate,
}

/// A data-page document written to disk
#[derive(Debug, Clone)]
pub struct RenderedForm {
    pub path: PathBuf,
    pub pages: usize,
}

/// Render `fields` to `path`, replacing any existing file.
pub fn render_form(
    fields: &FieldSet,
    path: &Path,
    overflow: OverflowPolicy,
) -> Result<RenderedForm, PipelineError> {
    let lines = fields.lines();
    let capacity = page_capacity();

    if lines.len() > capacity && overflow == OverflowPolicy::Error {
        return Err(PipelineError::Overflow {
            fields: lines.len(),
            capacity,
        });
    }

    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![lines.as_slice()]
    } else {
        lines.chunks(capacity).collect()
    };

    let mut doc = build_document(&chunks)?;
    doc.compress();
    doc.save(path)
        .map_err(|e| PipelineError::io(path, std::io::Error::other(e.to_string())))?;

    tracing::info!(
        "Rendered {} field(s) on {} page(s) to {:?}",
        lines.len(),
        chunks.len(),
        path
    );

    Ok(RenderedForm {
        path: path.to_path_buf(),
        pages: chunks.len(),
    })
}

fn build_document(pages: &[&[String]]) -> Result<Document, PipelineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for lines in pages {
        let page_id = add_page(&mut doc, pages_id, resources_id, lines)?;
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

    Ok(doc)
}

fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    resources: ObjectId,
    lines: &[String],
) -> Result<ObjectId, PipelineError> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE)]),
    ];
    push_line(&mut operations, HEADER_Y, HEADER);

    for (index, line) in lines.iter().enumerate() {
        let y = FIRST_LINE_Y - LINE_SPACING * index as i64;
        push_line(&mut operations, y, line);
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations }
        .encode()
        .map_err(|e| PipelineError::Composition(format!("Failed to encode page content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    // Resources and MediaBox live on the page so it survives re-parenting.
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Resources" => resources,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Contents" => content_id,
    }))
}

/// Position the text matrix absolutely, then show the string
fn push_line(operations: &mut Vec<Operation>, y: i64, text: &str) {
    operations.push(Operation::new(
        "Tm",
        vec![
            1.into(),
            0.into(),
            0.into(),
            1.into(),
            Object::Integer(LEFT_MARGIN),
            Object::Integer(y),
        ],
    ));
    operations.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
    ));
}

/// Encode text for a WinAnsiEncoding simple font.
///
/// Latin-1 maps directly; a few common typographic characters use their
/// cp1252 slots; anything else becomes `?`. Control characters become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            c if c.is_control() => b' ',
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
