//! Logical structure tree (Tagged PDF, ISO 32000-1 §14.7).
//!
//! Read-side model of StructTreeRoot / StructElem used by the remediation
//! steps: role-mapped traversal in document order, role-scoped content
//! lookups, and the ParentTree number tree.

mod index;
mod parent_tree;
mod tree;

pub use index::StructureIndex;
pub use parent_tree::ParentTree;
pub use tree::{ElementVisit, StructKid, StructTree};

/// Bookmark level for a heading role: `H` maps to 1, `H1`..`H6` to 1..6.
pub fn heading_level(role: &str) -> Option<u8> {
    match role {
        "H" => Some(1),
        _ => {
            let rest = role.strip_prefix('H')?;
            let level: u8 = rest.parse().ok()?;
            (1..=6).contains(&level).then_some(level)
        }
    }
}
