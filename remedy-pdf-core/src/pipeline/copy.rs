//! Cross-document object copying.
//!
//! Deep-copies objects from one document into another, renumbering every
//! indirect reference through a source-to-target id map. The map doubles
//! as the cycle guard: a reference already mapped is rewritten without
//! revisiting its target, so cyclic graphs (Pg backlinks, parent chains)
//! copy safely. Targets are processed through an explicit worklist, not
//! recursion, since reference chains can be long.

use crate::document::{Document, ObjectId};
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject, PdfStream};
use std::collections::HashMap;

pub(crate) struct ObjectCopier {
    map: HashMap<ObjectId, ObjectId>,
    queue: Vec<(ObjectId, ObjectId)>,
}

impl ObjectCopier {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            queue: Vec::new(),
        }
    }

    /// Pre-seed a mapping so references to `src` rewrite to `dst` without
    /// copying the source object (used for pages created by the caller
    /// and for re-parenting structure roots).
    pub fn seed(&mut self, src: ObjectId, dst: ObjectId) {
        self.map.insert(src, dst);
    }

    /// All mappings established so far.
    pub fn mappings(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.map.iter().map(|(&s, &d)| (s, d))
    }

    /// Copy `value` (with all transitively referenced objects) from `src`
    /// into `dst`, returning the rewritten value.
    pub fn copy_value(
        &mut self,
        src: &Document,
        dst: &mut Document,
        value: &PdfObject,
    ) -> PdfObject {
        let rewritten = self.rewrite(dst, value);
        while let Some((src_id, dst_id)) = self.queue.pop() {
            let source = src.get(src_id).cloned().unwrap_or(PdfObject::Null);
            let copied = self.rewrite(dst, &source);
            dst.set(dst_id, copied);
        }
        rewritten
    }

    /// Structurally rewrite one value, mapping references and queueing
    /// unvisited targets. Direct nesting depth in real PDFs is shallow;
    /// the worklist handles the reference dimension.
    fn rewrite(&mut self, dst: &mut Document, value: &PdfObject) -> PdfObject {
        match value {
            PdfObject::Reference(num, gen) => {
                let src_id = ObjectId::new(*num, *gen);
                let dst_id = match self.map.get(&src_id) {
                    Some(&mapped) => mapped,
                    None => {
                        let reserved = dst.reserve_id();
                        self.map.insert(src_id, reserved);
                        self.queue.push((src_id, reserved));
                        reserved
                    }
                };
                PdfObject::Reference(dst_id.number, dst_id.generation)
            }
            PdfObject::Array(arr) => PdfObject::Array(
                arr.iter()
                    .map(|item| self.rewrite(dst, item))
                    .collect::<PdfArray>(),
            ),
            PdfObject::Dictionary(dict) => PdfObject::Dictionary(self.rewrite_dict(dst, dict)),
            PdfObject::Stream(stream) => PdfObject::Stream(PdfStream {
                dict: self.rewrite_dict(dst, &stream.dict),
                data: stream.data.clone(),
            }),
            other => other.clone(),
        }
    }

    fn rewrite_dict(&mut self, dst: &mut Document, dict: &PdfDictionary) -> PdfDictionary {
        let mut out = PdfDictionary::new();
        for (key, value) in dict.iter() {
            out.insert(key.as_str(), self.rewrite(dst, value));
        }
        out
    }
}
