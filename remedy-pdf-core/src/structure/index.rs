//! Role-scoped content lookups over the structure tree.
//!
//! Maps `(page, mcid)` and `(page, object ref)` back to the owning
//! structure element for a set of target roles. Built once per document
//! and consulted by the figure and link alt-text pipelines while they walk
//! page content.

use super::tree::{StructKid, StructTree};
use crate::document::ObjectId;
use std::collections::HashMap;

/// Lookup tables from rendered content back to structure elements.
#[derive(Debug, Default)]
pub struct StructureIndex {
    by_mcid: HashMap<(ObjectId, i32), ObjectId>,
    by_objref: HashMap<(ObjectId, ObjectId), ObjectId>,
}

impl StructureIndex {
    /// Build the index for elements whose resolved role satisfies `pred`.
    ///
    /// Duplicates are first-writer-wins: when two elements claim the same
    /// content, the one earlier in document order keeps it.
    pub fn build(tree: &StructTree<'_>, pred: impl Fn(&str) -> bool) -> Self {
        let mut index = Self::default();
        for visit in tree.elements() {
            let role = match tree.role_of(visit.id) {
                Some(role) => role,
                None => continue,
            };
            if !pred(&role) {
                continue;
            }
            for kid in tree.kids_of(visit.id, visit.page) {
                match kid {
                    StructKid::Mcid {
                        page: Some(page),
                        mcid,
                    } => {
                        index.by_mcid.entry((page, mcid)).or_insert(visit.id);
                    }
                    StructKid::ObjRef {
                        page: Some(page),
                        target,
                    } => {
                        index.by_objref.entry((page, target)).or_insert(visit.id);
                    }
                    _ => {}
                }
            }
        }
        index
    }

    /// The element owning a marked-content section on a page.
    pub fn element_for_mcid(&self, page: ObjectId, mcid: i32) -> Option<ObjectId> {
        self.by_mcid.get(&(page, mcid)).copied()
    }

    /// The element owning an object reference on a page.
    pub fn element_for_object(&self, page: ObjectId, target: ObjectId) -> Option<ObjectId> {
        self.by_objref.get(&(page, target)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mcid.is_empty() && self.by_objref.is_empty()
    }
}
