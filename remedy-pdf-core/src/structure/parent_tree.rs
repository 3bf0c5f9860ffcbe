//! ParentTree number tree.
//!
//! The ParentTree maps StructParent / StructParents indices to structure
//! elements (or arrays of them). Annotation pruning only needs to know
//! which keys exist, so the whole tree is read once into a key set.

use crate::document::{Document, ObjectId};
use crate::parser::objects::PdfObject;
use std::collections::HashSet;

/// The set of StructParent keys present in a document's ParentTree.
#[derive(Debug, Default)]
pub struct ParentTree {
    keys: HashSet<i64>,
}

impl ParentTree {
    /// Read the ParentTree of `doc`'s StructTreeRoot. Missing or malformed
    /// trees read as empty.
    pub fn read(doc: &Document) -> Self {
        let mut keys = HashSet::new();
        let root = doc
            .struct_tree_root_id()
            .and_then(|id| doc.get_dict(id))
            .and_then(|d| d.get("ParentTree"))
            .map(|p| doc.resolve(p));
        if let Some(PdfObject::Dictionary(root_dict)) = root {
            // Number trees nest through /Kids; walk iteratively.
            let mut stack = vec![root_dict.clone()];
            let mut visited: HashSet<ObjectId> = HashSet::new();
            while let Some(node) = stack.pop() {
                if let Some(nums) = node.get("Nums").map(|n| doc.resolve(n)) {
                    if let PdfObject::Array(pairs) = nums {
                        // Pairs of (key, value); values are irrelevant here.
                        for pair in pairs.0.chunks(2) {
                            if let Some(key) = pair.first().and_then(|k| doc.resolve(k).as_integer())
                            {
                                keys.insert(key);
                            }
                        }
                    }
                }
                if let Some(PdfObject::Array(kids)) = node.get("Kids").map(|k| doc.resolve(k)) {
                    for kid in kids.iter() {
                        if let Some(id) = doc.reference_target(kid) {
                            if !visited.insert(id) {
                                continue;
                            }
                        }
                        if let Some(kid_dict) = doc.resolve_dict(kid) {
                            stack.push(kid_dict.clone());
                        }
                    }
                }
            }
        }
        Self { keys }
    }

    pub fn contains(&self, key: i64) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfDictionary};

    fn doc_with_parent_tree(nums: Vec<(i64, PdfObject)>) -> Document {
        let mut doc = Document::new();
        let mut pairs = PdfArray::new();
        for (key, value) in nums {
            pairs.push(PdfObject::Integer(key));
            pairs.push(value);
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
        doc
    }

    #[test]
    fn test_flat_nums() {
        let doc = doc_with_parent_tree(vec![
            (0, PdfObject::Null),
            (3, PdfObject::Null),
            (7, PdfObject::Null),
        ]);
        let tree = ParentTree::read(&doc);
        assert_eq!(tree.len(), 3);
        assert!(tree.contains(0));
        assert!(tree.contains(3));
        assert!(tree.contains(7));
        assert!(!tree.contains(1));
    }

    #[test]
    fn test_kids_nesting() {
        let mut doc = Document::new();
        // Leaf node with Nums [5 null].
        let mut leaf = PdfDictionary::new();
        let mut pairs = PdfArray::new();
        pairs.push(PdfObject::Integer(5));
        pairs.push(PdfObject::Null);
        leaf.insert("Nums", PdfObject::Array(pairs));
        let leaf_id = doc.add(PdfObject::Dictionary(leaf));

        let mut root_node = PdfDictionary::new();
        let kids: PdfArray = vec![PdfObject::Reference(leaf_id.number, leaf_id.generation)]
            .into_iter()
            .collect();
        root_node.insert("Kids", PdfObject::Array(kids));

        let mut tree_root = PdfDictionary::new();
        tree_root.insert("Type", PdfObject::name("StructTreeRoot"));
        tree_root.insert("ParentTree", PdfObject::Dictionary(root_node));
        tree_root.insert("K", PdfObject::Array(PdfArray::new()));
        let root_id = doc.add(PdfObject::Dictionary(tree_root));
        doc.set_catalog_entry(
            "StructTreeRoot",
            PdfObject::Reference(root_id.number, root_id.generation),
        )
        .unwrap();

        let tree = ParentTree::read(&doc);
        assert!(tree.contains(5));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_untagged_is_empty() {
        let doc = Document::new();
        let tree = ParentTree::read(&doc);
        assert!(tree.is_empty());
    }
}
