//! Merging tagged chunks back into one document.
//!
//! Pages are appended in input order. Each chunk's structure tree is
//! re-parented under a single merged StructTreeRoot, and the chunks'
//! ParentTree number trees are renumbered with a per-chunk offset so
//! StructParent keys stay unique; `/StructParents` and `/StructParent`
//! entries on copied pages and annotations are shifted to match.

use super::copy::ObjectCopier;
use crate::document::{Document, ObjectId};
use crate::error::{PdfError, Result};
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject};

/// Merge `chunks` in order into a new document.
pub fn merge_documents(chunks: &[Document]) -> Result<Document> {
    if chunks.is_empty() {
        return Err(PdfError::InvalidInput("nothing to merge".to_string()));
    }

    let mut dst = Document::new();
    let pages_root = dst.pages_root_id()?;
    let merged_root_id = dst.reserve_id();

    let mut all_kids = PdfArray::new();
    let mut merged_root_kids = PdfArray::new();
    // (key, value) pairs of the merged ParentTree.
    let mut merged_nums: Vec<(i64, PdfObject)> = Vec::new();
    let mut key_offset: i64 = 0;

    for chunk in chunks {
        let mut copier = ObjectCopier::new();
        if let Some(chunk_root) = chunk.struct_tree_root_id() {
            // References to the chunk's StructTreeRoot (element /P links)
            // must land on the merged root.
            copier.seed(chunk_root, merged_root_id);
        }

        // Pages, in chunk order.
        for src_page in chunk.page_ids() {
            let mut page_dict = chunk
                .get_dict(src_page)
                .ok_or_else(|| {
                    PdfError::InvalidObjectReference(src_page.number, src_page.generation)
                })?
                .clone();
            page_dict.remove("Parent");
            let dst_page = dst.reserve_id();
            copier.seed(src_page, dst_page);
            let mut copied =
                match copier.copy_value(chunk, &mut dst, &PdfObject::Dictionary(page_dict)) {
                    PdfObject::Dictionary(d) => d,
                    _ => unreachable!("dictionary copy yields a dictionary"),
                };
            copied.insert(
                "Parent",
                PdfObject::Reference(pages_root.number, pages_root.generation),
            );
            for key in ["MediaBox", "Resources", "Rotate"] {
                if !copied.contains_key(key) {
                    if let Some(value) = chunk.page_attribute(src_page, key) {
                        let value = value.clone();
                        copied.insert(key, copier.copy_value(chunk, &mut dst, &value));
                    }
                }
            }
            dst.set(dst_page, PdfObject::Dictionary(copied));
            all_kids.push(PdfObject::Reference(dst_page.number, dst_page.generation));
        }

        // Structure kids under the merged root.
        if let Some(chunk_root) = chunk.struct_tree_root_id() {
            if let Some(kids) = chunk.get_dict(chunk_root).and_then(|d| d.get("K")) {
                let kids = kids.clone();
                match chunk.resolve(&kids) {
                    PdfObject::Array(arr) => {
                        for kid in arr.clone().iter() {
                            merged_root_kids.push(copier.copy_value(chunk, &mut dst, kid));
                        }
                    }
                    _ => {
                        merged_root_kids.push(copier.copy_value(chunk, &mut dst, &kids));
                    }
                }
            }

            // ParentTree entries, renumbered.
            let pairs = parent_tree_pairs(chunk, chunk_root);
            let mut max_key: i64 = -1;
            for (key, value) in pairs {
                max_key = max_key.max(key);
                let copied = copier.copy_value(chunk, &mut dst, &value);
                merged_nums.push((key + key_offset, copied));
            }

            // Shift StructParent keys on everything this chunk brought in.
            if key_offset > 0 {
                let copied_ids: Vec<ObjectId> =
                    copier.mappings().map(|(_, dst_id)| dst_id).collect();
                shift_struct_parents(&mut dst, &copied_ids, key_offset);
            }
            key_offset += max_key + 1;
        }
    }

    let total_pages = all_kids.len() as i64;
    if let Some(pages) = dst.get_dict_mut(pages_root) {
        pages.insert("Kids", PdfObject::Array(all_kids));
        pages.insert("Count", PdfObject::Integer(total_pages));
    }

    // Assemble the merged structure tree root.
    merged_nums.sort_by_key(|&(key, _)| key);
    let mut nums = PdfArray::new();
    for (key, value) in merged_nums {
        nums.push(PdfObject::Integer(key));
        nums.push(value);
    }
    let mut parent_tree = PdfDictionary::new();
    parent_tree.insert("Nums", PdfObject::Array(nums));

    let mut root = PdfDictionary::new();
    root.insert("Type", PdfObject::name("StructTreeRoot"));
    root.insert("K", PdfObject::Array(merged_root_kids));
    root.insert("ParentTree", PdfObject::Dictionary(parent_tree));
    root.insert("ParentTreeNextKey", PdfObject::Integer(key_offset));
    dst.set(merged_root_id, PdfObject::Dictionary(root));
    dst.set_catalog_entry(
        "StructTreeRoot",
        PdfObject::Reference(merged_root_id.number, merged_root_id.generation),
    )?;
    let mut mark_info = PdfDictionary::new();
    mark_info.insert("Marked", PdfObject::Boolean(true));
    dst.set_catalog_entry("MarkInfo", PdfObject::Dictionary(mark_info))?;

    // First chunk wins for language and info, as with any concatenation.
    if let Some(lang) = chunks[0]
        .catalog()
        .ok()
        .and_then(|c| c.get("Lang"))
        .cloned()
    {
        dst.set_catalog_entry("Lang", lang)?;
    }
    Ok(dst)
}

/// Flat (key, value) pairs of a chunk's ParentTree, Kids included.
fn parent_tree_pairs(doc: &Document, struct_root: ObjectId) -> Vec<(i64, PdfObject)> {
    let mut pairs = Vec::new();
    let root = match doc
        .get_dict(struct_root)
        .and_then(|d| d.get("ParentTree"))
        .map(|p| doc.resolve(p))
    {
        Some(PdfObject::Dictionary(d)) => d.clone(),
        _ => return pairs,
    };
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(PdfObject::Array(nums)) = node.get("Nums").map(|n| doc.resolve(n)) {
            for pair in nums.0.chunks(2) {
                if let (Some(key), Some(value)) = (
                    pair.first().and_then(|k| doc.resolve(k).as_integer()),
                    pair.get(1),
                ) {
                    pairs.push((key, value.clone()));
                }
            }
        }
        if let Some(PdfObject::Array(kids)) = node.get("Kids").map(|k| doc.resolve(k)) {
            for kid in kids.iter() {
                if let Some(kid_dict) = doc.resolve_dict(kid) {
                    stack.push(kid_dict.clone());
                }
            }
        }
    }
    pairs
}

/// Add `offset` to `/StructParents` (pages) and `/StructParent`
/// (annotations) on the given objects.
fn shift_struct_parents(doc: &mut Document, ids: &[ObjectId], offset: i64) {
    for &id in ids {
        let Some(dict) = doc.get_dict_mut(id) else {
            continue;
        };
        for key in ["StructParents", "StructParent"] {
            if let Some(PdfObject::Integer(value)) = dict.get(key) {
                let shifted = value + offset;
                dict.insert(key, PdfObject::Integer(shifted));
            }
        }
    }
}
