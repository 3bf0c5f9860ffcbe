//! Page-range chunking for autotag submission.
//!
//! Large documents are split into contiguous page-range chunks so the
//! autotagging vendor never sees more than `max_pages_per_chunk` pages at
//! once. Each chunk is a standalone PDF: the selected pages plus every
//! object they transitively reference, renumbered.

use super::copy::ObjectCopier;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::parser::objects::{PdfArray, PdfObject};
use crate::services::PageRange;

/// Contiguous chunk ranges covering `page_count` pages in order; the last
/// chunk may be short.
pub fn chunk_ranges(page_count: usize, max_pages_per_chunk: usize) -> Vec<PageRange> {
    let max = max_pages_per_chunk.max(1);
    let mut ranges = Vec::new();
    let mut first = 1usize;
    while first <= page_count {
        let last = (first + max - 1).min(page_count);
        ranges.push(PageRange::new(first as u32, last as u32));
        first = last + 1;
    }
    ranges
}

/// Extract a 1-based page range into a standalone document.
pub fn extract_page_range(doc: &Document, range: PageRange) -> Result<Document> {
    let page_ids = doc.page_ids();
    if range.is_empty()
        || range.first == 0
        || range.last as usize > page_ids.len()
    {
        return Err(PdfError::InvalidInput(format!(
            "page range {}-{} out of bounds (document has {} pages)",
            range.first,
            range.last,
            page_ids.len()
        )));
    }

    let mut dst = Document::new();
    let pages_root = dst.pages_root_id()?;
    let mut copier = ObjectCopier::new();
    let mut kids = PdfArray::new();

    for &src_page in &page_ids[(range.first as usize - 1)..(range.last as usize)] {
        let mut page_dict = doc
            .get_dict(src_page)
            .ok_or_else(|| {
                PdfError::InvalidObjectReference(src_page.number, src_page.generation)
            })?
            .clone();
        // The parent link belongs to the source page tree; the new tree
        // provides its own.
        page_dict.remove("Parent");

        let dst_page = dst.reserve_id();
        copier.seed(src_page, dst_page);
        let mut copied = match copier.copy_value(doc, &mut dst, &PdfObject::Dictionary(page_dict))
        {
            PdfObject::Dictionary(d) => d,
            _ => unreachable!("dictionary copy yields a dictionary"),
        };
        copied.insert(
            "Parent",
            PdfObject::Reference(pages_root.number, pages_root.generation),
        );
        // Inheritable attributes must survive leaving the source tree.
        for key in ["MediaBox", "Resources", "Rotate"] {
            if !copied.contains_key(key) {
                if let Some(value) = doc.page_attribute(src_page, key) {
                    let value = value.clone();
                    copied.insert(key, copier.copy_value(doc, &mut dst, &value));
                }
            }
        }
        dst.set(dst_page, PdfObject::Dictionary(copied));
        kids.push(PdfObject::Reference(dst_page.number, dst_page.generation));
    }

    let count = kids.len() as i64;
    if let Some(pages) = dst.get_dict_mut(pages_root) {
        pages.insert("Kids", PdfObject::Array(kids));
        pages.insert("Count", PdfObject::Integer(count));
    }

    // Carry document info over so chunk metadata survives a merge.
    if doc.info().is_some() {
        let info = doc.trailer.get("Info").cloned();
        if let Some(info) = info {
            let copied = copier.copy_value(doc, &mut dst, &info);
            dst.trailer.insert("Info", copied);
        }
    }
    Ok(dst)
}
