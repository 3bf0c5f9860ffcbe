//! StructElem traversal over the document's object table.

use crate::document::{Document, ObjectId};
use crate::parser::objects::PdfObject;
use std::collections::{HashMap, HashSet};

/// A classified kid of a structure element.
#[derive(Debug, Clone, PartialEq)]
pub enum StructKid {
    /// A nested structure element (always an indirect object in practice)
    Element(ObjectId),
    /// A marked-content id on a page
    Mcid { page: Option<ObjectId>, mcid: i32 },
    /// An object reference (annotation, XObject)
    ObjRef {
        page: Option<ObjectId>,
        target: ObjectId,
    },
}

/// One element in document order, with its inherited default page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementVisit {
    pub id: ObjectId,
    /// The element's `/Pg`, or the nearest ancestor's
    pub page: Option<ObjectId>,
}

/// Read-only facade over a document's structure tree.
pub struct StructTree<'a> {
    doc: &'a Document,
    root_id: ObjectId,
    role_map: HashMap<String, String>,
}

impl<'a> StructTree<'a> {
    /// Open the structure tree, or `None` when the document is untagged.
    pub fn open(doc: &'a Document) -> Option<Self> {
        let root_id = doc.struct_tree_root_id()?;
        let mut role_map = HashMap::new();
        if let Some(map_dict) = doc
            .get_dict(root_id)
            .and_then(|d| d.get("RoleMap"))
            .and_then(|m| doc.resolve_dict(m))
        {
            for (key, value) in map_dict.iter() {
                if let Some(name) = value.as_name() {
                    role_map.insert(key.as_str().to_string(), name.to_string());
                }
            }
        }
        Some(Self {
            doc,
            root_id,
            role_map,
        })
    }

    pub fn root_id(&self) -> ObjectId {
        self.root_id
    }

    /// Map a role through the RoleMap, at most 5 hops (cycles stop early).
    pub fn resolve_role(&self, role: &str) -> String {
        let mut current = role;
        for _ in 0..5 {
            match self.role_map.get(current) {
                Some(mapped) if mapped != current => current = mapped,
                _ => break,
            }
        }
        current.to_string()
    }

    /// The element's resolved role.
    pub fn role_of(&self, elem_id: ObjectId) -> Option<String> {
        let raw = self
            .doc
            .get_dict(elem_id)?
            .get("S")
            .and_then(|s| self.doc.resolve(s).as_name())?;
        Some(self.resolve_role(raw))
    }

    /// The element's `/Alt` text, when present.
    pub fn alt_of(&self, elem_id: ObjectId) -> Option<String> {
        self.doc
            .get_dict(elem_id)?
            .get("Alt")
            .and_then(|a| self.doc.resolve(a).as_string())
            .map(|s| s.to_text())
    }

    /// Classify the kids of an element (or of the root), resolving the
    /// inherited default page for MCID and object-reference kids.
    pub fn kids_of(&self, elem_id: ObjectId, inherited_page: Option<ObjectId>) -> Vec<StructKid> {
        let dict = match self.doc.get_dict(elem_id) {
            Some(d) => d,
            None => return Vec::new(),
        };
        // The element's own /Pg becomes the default for its kids.
        let own_page = dict
            .get("Pg")
            .and_then(|p| self.doc.reference_target(p))
            .or(inherited_page);

        let kids_obj = match dict.get("K") {
            Some(k) => k,
            None => return Vec::new(),
        };
        let mut kids = Vec::new();
        match self.doc.resolve(kids_obj) {
            PdfObject::Array(arr) => {
                for kid in arr.iter() {
                    self.classify_kid(kid, own_page, &mut kids);
                }
            }
            _ => self.classify_kid(kids_obj, own_page, &mut kids),
        }
        kids
    }

    fn classify_kid(
        &self,
        kid: &PdfObject,
        default_page: Option<ObjectId>,
        out: &mut Vec<StructKid>,
    ) {
        match kid {
            PdfObject::Integer(mcid) => out.push(StructKid::Mcid {
                page: default_page,
                mcid: *mcid as i32,
            }),
            PdfObject::Reference(num, gen) => {
                let id = ObjectId::new(*num, *gen);
                match self.doc.get_dict(id) {
                    // An indirect MCR/OBJR is rare but legal.
                    Some(dict) if dict.get_type() == Some("MCR") => {
                        self.classify_content_dict(dict, default_page, out)
                    }
                    Some(dict) if dict.get_type() == Some("OBJR") => {
                        self.classify_content_dict(dict, default_page, out)
                    }
                    Some(_) => out.push(StructKid::Element(id)),
                    None => {}
                }
            }
            PdfObject::Dictionary(dict) => {
                // Direct dicts are marked-content or object references;
                // direct structure-element kids cannot be addressed (no
                // object id) and are skipped.
                self.classify_content_dict(dict, default_page, out)
            }
            _ => {}
        }
    }

    fn classify_content_dict(
        &self,
        dict: &crate::parser::objects::PdfDictionary,
        default_page: Option<ObjectId>,
        out: &mut Vec<StructKid>,
    ) {
        let page = dict
            .get("Pg")
            .and_then(|p| self.doc.reference_target(p))
            .or(default_page);
        match dict.get_type() {
            Some("MCR") => {
                if let Some(mcid) = dict.get("MCID").and_then(|m| self.doc.resolve(m).as_integer())
                {
                    out.push(StructKid::Mcid {
                        page,
                        mcid: mcid as i32,
                    });
                }
            }
            Some("OBJR") => {
                if let Some(target) = dict.get("Obj").and_then(|o| self.doc.reference_target(o)) {
                    out.push(StructKid::ObjRef { page, target });
                }
            }
            _ => {
                // A typeless dict with an MCID is treated as an MCR.
                if let Some(mcid) = dict.get("MCID").and_then(|m| self.doc.resolve(m).as_integer())
                {
                    out.push(StructKid::Mcid {
                        page,
                        mcid: mcid as i32,
                    });
                }
            }
        }
    }

    /// All structure elements in document order (depth-first,
    /// left-to-right). Iterative with a visited set: structure trees can be
    /// arbitrarily deep and the object graph can be malformed into cycles.
    pub fn elements(&self) -> Vec<ElementVisit> {
        let mut visits = Vec::new();
        let mut visited = HashSet::new();
        // Stack of (element id, page inherited from the parent).
        let mut stack: Vec<(ObjectId, Option<ObjectId>)> = Vec::new();

        for kid in self.kids_of(self.root_id, None).into_iter().rev() {
            if let StructKid::Element(id) = kid {
                stack.push((id, None));
            }
        }

        while let Some((id, inherited_page)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let own_page = self
                .doc
                .get_dict(id)
                .and_then(|d| d.get("Pg"))
                .and_then(|p| self.doc.reference_target(p))
                .or(inherited_page);
            visits.push(ElementVisit { id, page: own_page });
            for kid in self.kids_of(id, inherited_page).into_iter().rev() {
                if let StructKid::Element(child) = kid {
                    stack.push((child, own_page));
                }
            }
        }
        visits
    }

    /// Elements whose resolved role satisfies `pred`, in document order.
    pub fn elements_with_role(&self, pred: impl Fn(&str) -> bool) -> Vec<ElementVisit> {
        self.elements()
            .into_iter()
            .filter(|visit| {
                self.role_of(visit.id)
                    .map(|role| pred(&role))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// All `(page, mcid)` content references under an element, including
    /// nested elements, in document order.
    pub fn content_refs(&self, elem_id: ObjectId, inherited_page: Option<ObjectId>) -> Vec<(ObjectId, i32)> {
        let mut refs = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(elem_id, inherited_page)];
        // Collect in DFS order; the stack reversal keeps kids left-to-right.
        let mut ordered: Vec<(ObjectId, Option<ObjectId>)> = Vec::new();
        while let Some((id, page)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            ordered.push((id, page));
            let own_page = self
                .doc
                .get_dict(id)
                .and_then(|d| d.get("Pg"))
                .and_then(|p| self.doc.reference_target(p))
                .or(page);
            for kid in self.kids_of(id, page).into_iter().rev() {
                if let StructKid::Element(child) = kid {
                    stack.push((child, own_page));
                }
            }
        }
        for (id, page) in ordered {
            for kid in self.kids_of(id, page) {
                if let StructKid::Mcid {
                    page: Some(page),
                    mcid,
                } = kid
                {
                    refs.push((page, mcid));
                }
            }
        }
        refs
    }
}
