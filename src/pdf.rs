//! Small lopdf helpers shared by the merger and the embedded-image rasterizer

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page trees deeper than this are treated as cyclic
const MAX_TREE_DEPTH: usize = 64;

/// Follow a reference, or return the object itself when it is direct
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

/// Look up a page attribute, walking up `Parent` links for inherited values
pub fn page_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> lopdf::Result<Option<&'a Object>> {
    let mut node: &Dictionary = doc.get_object(page_id)?.as_dict()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(value));
        }
        match node.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => node = doc.get_object(parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }

    tracing::warn!("Page tree above {:?} is too deep or cyclic", page_id);
    Ok(None)
}

/// Copy inherited attributes onto the page itself so it can be re-parented
pub fn flatten_inherited(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    for key in INHERITABLE {
        if doc.get_object(page_id)?.as_dict()?.has(key) {
            continue;
        }
        let inherited = page_attribute(doc, page_id, key)?.cloned();
        if let Some(value) = inherited {
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set(key.to_vec(), value);
        }
    }
    Ok(())
}

/// Give the page an explicit value for every inheritable attribute.
///
/// Run after [`flatten_inherited`] on a page that is about to move into
/// another page tree: attributes the page did not have resolve to their
/// defaults instead of whatever the new ancestors carry.
pub fn pin_inherited(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

    if !page.has(b"Resources") {
        page.set("Resources", Dictionary::new());
    }
    if !page.has(b"MediaBox") {
        page.set(
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        );
    }
    if !page.has(b"CropBox") {
        let media_box = page.get(b"MediaBox")?.clone();
        page.set("CropBox", media_box);
    }
    if !page.has(b"Rotate") {
        page.set("Rotate", Object::Integer(0));
    }
    Ok(())
}

/// Object id of the root `Pages` node
pub fn root_pages_id(doc: &Document) -> lopdf::Result<ObjectId> {
    doc.catalog()?.get(b"Pages")?.as_reference()
}

/// Whether a dictionary (or stream dictionary) has the given `/Type`
pub fn has_type(object: &Object, type_name: &[u8]) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return false,
    };
    matches!(dict.get(b"Type").and_then(|t| t.as_name()), Ok(name) if name == type_name)
}
