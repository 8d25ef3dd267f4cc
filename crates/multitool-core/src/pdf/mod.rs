//! PDF manipulation on top of lopdf.
//!
//! Every operation that produces a new page sequence goes through
//! [`assemble_pages`]: the document's page tree is replaced by a single flat
//! node listing the chosen pages, and whatever is no longer reachable is
//! pruned before saving.

mod convert;
mod merge;
mod rearrange;
mod split;
mod text;

pub use convert::{ConvertToPdf, PDF_IMAGE_EXTENSIONS};
pub use merge::{MergeParams, PdfMerger};
pub use rearrange::{PdfRearranger, RearrangeParams};
pub use split::{PdfSplitter, SplitParams};
pub use text::{PdfTextExtractor, TextParams};

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::ToolError;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

pub(crate) fn load_document(path: &Path) -> Result<Document, ToolError> {
    Ok(Document::load(path)?)
}

/// Page object IDs in document order
pub(crate) fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

fn pages_root_id(doc: &Document) -> Result<ObjectId, ToolError> {
    Ok(doc.catalog()?.get(b"Pages")?.as_reference()?)
}

/// Replace the page tree of `doc` with exactly `pages`, in order.
///
/// Inherited attributes are copied onto each page first so that pages keep
/// their resources and geometry once their original ancestors are gone.
pub(crate) fn assemble_pages(doc: &mut Document, pages: &[ObjectId]) -> Result<(), ToolError> {
    let root_id = pages_root_id(doc)?;

    let mut inherited = Vec::with_capacity(pages.len());
    for &page_id in pages {
        inherited.push((page_id, inherited_attributes(doc, page_id)?));
    }

    for (page_id, attributes) in inherited {
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        for (key, value) in attributes {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(root_id));
    }

    let root = doc.get_object_mut(root_id)?.as_dict_mut()?;
    root.remove(b"Parent");
    for key in INHERITABLE {
        root.remove(key);
    }
    root.set(
        "Kids",
        Object::Array(pages.iter().map(|&id| Object::Reference(id)).collect()),
    );
    root.set("Count", Object::Integer(pages.len() as i64));

    let pruned = doc.prune_objects();
    debug!("Assembled {} pages, pruned {} objects", pages.len(), pruned.len());
    doc.compress();
    Ok(())
}

/// Attributes the page lacks but one of its ancestors defines, nearest
/// ancestor first.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Result<Vec<(Vec<u8>, Object)>, ToolError> {
    let page = doc.get_object(page_id)?.as_dict()?;
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut found = Vec::new();
    let mut visited = HashSet::from([page_id]);
    let mut node: &Dictionary = page;

    for _ in 0..MAX_TREE_DEPTH {
        if missing.is_empty() {
            break;
        }
        let Ok(parent_id) = node.get(b"Parent").and_then(Object::as_reference) else {
            break;
        };
        if !visited.insert(parent_id) {
            break;
        }
        node = doc.get_object(parent_id)?.as_dict()?;

        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
    }

    Ok(found)
}

/// Shift every reference inside `obj` by `offset`.
pub(crate) fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, offset)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dict(stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dict(mut dict: Dictionary, offset: u32) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_object_refs(value.clone(), offset);
    }
    dict
}

pub(crate) fn save_document(doc: &mut Document, path: &Path) -> Result<(), ToolError> {
    let mut writer = BufWriter::new(File::create(path)?);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    Ok(())
}
