//! Untagged-annotation pruning.
//!
//! An annotation that is not anchored into the structure tree is invisible
//! to assistive technology but still steals keyboard focus. Any page
//! annotation whose `/StructParent` is missing, or absent from the
//! ParentTree, is removed. The check is purely structural; the
//! annotation's visual content is never inspected.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::parser::objects::{PdfArray, PdfObject};
use crate::structure::ParentTree;

use super::StepReport;

pub struct UntaggedAnnotationRemediator;

impl UntaggedAnnotationRemediator {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let parent_tree = ParentTree::read(doc);
        let mut removed = 0usize;

        for page_id in doc.page_ids() {
            cancel.check()?;
            let annot_ids = doc.page_annotation_ids(page_id);
            if annot_ids.is_empty() {
                continue;
            }
            let mut kept = PdfArray::new();
            let mut dropped = Vec::new();
            for annot_id in annot_ids {
                let struct_parent = doc
                    .get_dict(annot_id)
                    .and_then(|d| d.get("StructParent"))
                    .and_then(|v| doc.resolve(v).as_integer());
                let anchored = match struct_parent {
                    Some(key) => parent_tree.contains(key),
                    None => false,
                };
                if anchored {
                    kept.push(PdfObject::Reference(annot_id.number, annot_id.generation));
                } else {
                    dropped.push(annot_id);
                }
            }
            if dropped.is_empty() {
                continue;
            }
            removed += dropped.len();
            if let Some(page) = doc.get_dict_mut(page_id) {
                if kept.is_empty() {
                    page.remove("Annots");
                } else {
                    page.insert("Annots", PdfObject::Array(kept));
                }
            }
            for annot_id in dropped {
                doc.remove(annot_id);
            }
        }

        if removed == 0 {
            Ok(StepReport::skipped("no untagged annotations"))
        } else {
            Ok(StepReport::applied(format!(
                "removed {removed} untagged annotation(s)"
            )))
        }
    }
}

impl Default for UntaggedAnnotationRemediator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ObjectId;
    use crate::parser::objects::PdfDictionary;

    /// Document with a ParentTree containing `keys` and one page carrying
    /// the given annotations (struct-parent value per annotation).
    fn doc_with_annots(keys: &[i64], annots: &[Option<i64>]) -> (Document, Vec<ObjectId>) {
        let mut doc = Document::new();
        let page_id = doc.add_page(PdfDictionary::new()).unwrap();

        let mut annot_refs = PdfArray::new();
        let mut annot_ids = Vec::new();
        for struct_parent in annots {
            let mut annot = PdfDictionary::new();
            annot.insert("Type", PdfObject::name("Annot"));
            annot.insert("Subtype", PdfObject::name("Link"));
            if let Some(key) = struct_parent {
                annot.insert("StructParent", PdfObject::Integer(*key));
            }
            let id = doc.add(PdfObject::Dictionary(annot));
            annot_ids.push(id);
            annot_refs.push(PdfObject::Reference(id.number, id.generation));
        }
        doc.get_dict_mut(page_id)
            .unwrap()
            .insert("Annots", PdfObject::Array(annot_refs));

        let mut pairs = PdfArray::new();
        for key in keys {
            pairs.push(PdfObject::Integer(*key));
            pairs.push(PdfObject::Null);
        }
        let mut parent_tree = PdfDictionary::new();
        parent_tree.insert("Nums", PdfObject::Array(pairs));
        let mut tree_root = PdfDictionary::new();
        tree_root.insert("Type", PdfObject::name("StructTreeRoot"));
        tree_root.insert("ParentTree", PdfObject::Dictionary(parent_tree));
        tree_root.insert("K", PdfObject::Array(PdfArray::new()));
        let root_id = doc.add(PdfObject::Dictionary(tree_root));
        doc.set_catalog_entry(
            "StructTreeRoot",
            PdfObject::Reference(root_id.number, root_id.generation),
        )
        .unwrap();
        (doc, annot_ids)
    }

    #[test]
    fn test_removes_annotation_without_struct_parent() {
        let (mut doc, _) = doc_with_annots(&[0], &[None]);
        let report = UntaggedAnnotationRemediator::new()
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert!(report.applied);
        let page_id = doc.page_ids()[0];
        assert!(doc.page_annotation_ids(page_id).is_empty());
        assert!(doc.get_dict(page_id).unwrap().get("Annots").is_none());
    }

    #[test]
    fn test_removes_annotation_with_unknown_struct_parent() {
        let (mut doc, ids) = doc_with_annots(&[0, 1], &[Some(0), Some(99)]);
        UntaggedAnnotationRemediator::new()
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        let page_id = doc.page_ids()[0];
        assert_eq!(doc.page_annotation_ids(page_id), vec![ids[0]]);
        assert!(doc.get(ids[1]).is_none());
    }

    #[test]
    fn test_keeps_anchored_annotations() {
        let (mut doc, ids) = doc_with_annots(&[3, 7], &[Some(3), Some(7)]);
        let report = UntaggedAnnotationRemediator::new()
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert!(!report.applied);
        let page_id = doc.page_ids()[0];
        assert_eq!(doc.page_annotation_ids(page_id), ids);
    }
}
