//! Mutable in-memory PDF document.
//!
//! The document owns every object in a `BTreeMap` keyed by indirect
//! reference; all cross-object links stay as `Reference` objects and are
//! resolved on demand. The PDF object graph is cyclic (ParentTree ↔
//! StructTreeRoot, StructElem ↔ Pg), so nothing here models ownership
//! between nodes — remediation steps read what they need, build their
//! mutations, then write them back through the table.

use crate::error::{PdfError, Result};
use crate::geometry::Rect;
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject};
use crate::parser::{load_document, ParseOptions};
use std::collections::{BTreeMap, HashSet};

/// An indirect object identifier: object number and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub number: u32,
    pub generation: u16,
}

impl ObjectId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

static NULL_OBJECT: PdfObject = PdfObject::Null;

/// A parsed PDF document, mutable in place.
pub struct Document {
    pub(crate) version: String,
    pub(crate) objects: BTreeMap<ObjectId, PdfObject>,
    pub(crate) trailer: PdfDictionary,
    next_object_number: u32,
}

impl Document {
    /// Parse a document from a byte stream with default (lenient) options.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, &ParseOptions::default())
    }

    /// Parse a document from a byte stream.
    pub fn from_bytes_with_options(data: &[u8], options: &ParseOptions) -> Result<Self> {
        let loaded = load_document(data, options)?;
        let mut objects = BTreeMap::new();
        for ((number, generation), obj) in loaded.objects {
            objects.insert(ObjectId::new(number, generation), obj);
        }
        let next_object_number = objects
            .keys()
            .map(|id| id.number)
            .max()
            .unwrap_or(0)
            + 1;
        let doc = Self {
            version: loaded.version,
            objects,
            trailer: loaded.trailer,
            next_object_number,
        };
        // A document without a resolvable catalog is not workable.
        doc.catalog_id()?;
        Ok(doc)
    }

    /// Create an empty document with a catalog and empty page tree.
    pub fn new() -> Self {
        let mut doc = Self {
            version: "1.7".to_string(),
            objects: BTreeMap::new(),
            trailer: PdfDictionary::new(),
            next_object_number: 1,
        };
        let pages_id = doc.reserve_id();
        let mut pages = PdfDictionary::new();
        pages.insert("Type", PdfObject::name("Pages"));
        pages.insert("Kids", PdfObject::Array(PdfArray::new()));
        pages.insert("Count", PdfObject::Integer(0));
        doc.set(pages_id, PdfObject::Dictionary(pages));

        let mut catalog = PdfDictionary::new();
        catalog.insert("Type", PdfObject::name("Catalog"));
        catalog.insert(
            "Pages",
            PdfObject::Reference(pages_id.number, pages_id.generation),
        );
        let catalog_id = doc.add(PdfObject::Dictionary(catalog));
        doc.trailer.insert(
            "Root",
            PdfObject::Reference(catalog_id.number, catalog_id.generation),
        );
        doc
    }

    /// Serialize the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        crate::writer::write_document(self)
    }

    /// The header version of the source file, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    // --- object table ---

    /// Allocate a fresh object id without storing anything yet.
    pub fn reserve_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_object_number, 0);
        self.next_object_number += 1;
        id
    }

    /// Store a new object and return its id.
    pub fn add(&mut self, obj: PdfObject) -> ObjectId {
        let id = self.reserve_id();
        self.objects.insert(id, obj);
        id
    }

    /// Store (or replace) the object at `id`.
    pub fn set(&mut self, id: ObjectId, obj: PdfObject) {
        if id.number >= self.next_object_number {
            self.next_object_number = id.number + 1;
        }
        self.objects.insert(id, obj);
    }

    pub fn get(&self, id: ObjectId) -> Option<&PdfObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut PdfObject> {
        self.objects.get_mut(&id)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<PdfObject> {
        self.objects.remove(&id)
    }

    /// The dictionary stored at `id`, if it is one (streams included).
    pub fn get_dict(&self, id: ObjectId) -> Option<&PdfDictionary> {
        self.get(id).and_then(|o| o.as_dict())
    }

    pub fn get_dict_mut(&mut self, id: ObjectId) -> Option<&mut PdfDictionary> {
        self.get_mut(id).and_then(|o| o.as_dict_mut())
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    /// Follow reference chains to the stored object. Missing targets and
    /// reference cycles resolve to Null.
    pub fn resolve<'a>(&'a self, obj: &'a PdfObject) -> &'a PdfObject {
        let mut current = obj;
        for _ in 0..32 {
            match current {
                PdfObject::Reference(num, gen) => {
                    match self.get(ObjectId::new(*num, *gen)) {
                        Some(target) => current = target,
                        None => return &NULL_OBJECT,
                    }
                }
                other => return other,
            }
        }
        &NULL_OBJECT
    }

    /// Resolve an object that may be a reference to a dictionary.
    pub fn resolve_dict<'a>(&'a self, obj: &'a PdfObject) -> Option<&'a PdfDictionary> {
        self.resolve(obj).as_dict()
    }

    /// The id a reference points at, when `obj` is a reference.
    pub fn reference_target(&self, obj: &PdfObject) -> Option<ObjectId> {
        obj.as_reference().map(|(num, gen)| ObjectId::new(num, gen))
    }

    // --- catalog and info ---

    /// The id of the document catalog from the trailer `/Root`.
    pub fn catalog_id(&self) -> Result<ObjectId> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| PdfError::InvalidStructure("trailer has no /Root".to_string()))?;
        let id = self
            .reference_target(root)
            .ok_or_else(|| PdfError::InvalidStructure("/Root is not a reference".to_string()))?;
        if self.get_dict(id).is_none() {
            return Err(PdfError::InvalidObjectReference(id.number, id.generation));
        }
        Ok(id)
    }

    pub fn catalog(&self) -> Result<&PdfDictionary> {
        let id = self.catalog_id()?;
        self.get_dict(id)
            .ok_or_else(|| PdfError::InvalidObjectReference(id.number, id.generation))
    }

    /// Set one catalog entry in place.
    pub fn set_catalog_entry(&mut self, key: &str, value: PdfObject) -> Result<()> {
        let id = self.catalog_id()?;
        let dict = self
            .get_dict_mut(id)
            .ok_or_else(|| PdfError::InvalidObjectReference(id.number, id.generation))?;
        dict.insert(key, value);
        Ok(())
    }

    /// The document information dictionary, when present.
    pub fn info(&self) -> Option<&PdfDictionary> {
        let info = self.trailer.get("Info")?;
        self.resolve_dict(info)
    }

    /// The info dictionary, created empty if the document has none.
    pub fn ensure_info_id(&mut self) -> ObjectId {
        if let Some(id) = self
            .trailer
            .get("Info")
            .and_then(|o| o.as_reference())
            .map(|(n, g)| ObjectId::new(n, g))
        {
            if self.get_dict(id).is_some() {
                return id;
            }
        }
        let id = self.add(PdfObject::Dictionary(PdfDictionary::new()));
        self.trailer
            .insert("Info", PdfObject::Reference(id.number, id.generation));
        id
    }

    // --- pages ---

    /// Page ids in page order: an iterative left-to-right walk of the page
    /// tree, safe against Kids cycles.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        let mut pages = Vec::new();
        let root = match self
            .catalog()
            .ok()
            .and_then(|c| c.get("Pages"))
            .and_then(|p| p.as_reference())
        {
            Some((num, gen)) => ObjectId::new(num, gen),
            None => return pages,
        };

        let mut stack = vec![root];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let dict = match self.get_dict(id) {
                Some(d) => d,
                None => continue,
            };
            match dict.get_type() {
                Some("Pages") => {
                    if let Some(kids) = dict.get("Kids").map(|k| self.resolve(k)) {
                        if let Some(kids) = kids.as_array() {
                            // Push in reverse so the leftmost kid pops first.
                            for kid in kids.iter().rev() {
                                if let Some((num, gen)) = kid.as_reference() {
                                    stack.push(ObjectId::new(num, gen));
                                }
                            }
                        }
                    }
                }
                // Some producers omit /Type on leaf pages.
                Some("Page") | None => pages.push(id),
                Some(_) => {}
            }
        }
        pages
    }

    pub fn page_count(&self) -> usize {
        self.page_ids().len()
    }

    /// The id of the root `/Pages` node.
    pub fn pages_root_id(&self) -> Result<ObjectId> {
        self.catalog()?
            .get("Pages")
            .and_then(|p| self.reference_target(p))
            .ok_or_else(|| PdfError::InvalidStructure("catalog has no /Pages".to_string()))
    }

    /// Append a page dictionary to the root page tree, wiring `/Parent`,
    /// `/Kids` and `/Count`. Returns the new page's id.
    pub fn add_page(&mut self, mut page: PdfDictionary) -> Result<ObjectId> {
        let pages_id = self.pages_root_id()?;
        page.insert("Type", PdfObject::name("Page"));
        page.insert(
            "Parent",
            PdfObject::Reference(pages_id.number, pages_id.generation),
        );
        let page_id = self.add(PdfObject::Dictionary(page));
        let count = self.page_count() as i64 + 1;
        let pages = self
            .get_dict_mut(pages_id)
            .ok_or_else(|| PdfError::InvalidObjectReference(pages_id.number, pages_id.generation))?;
        let kids = match pages.get("Kids") {
            Some(PdfObject::Array(arr)) => {
                let mut arr = arr.clone();
                arr.push(PdfObject::Reference(page_id.number, page_id.generation));
                arr
            }
            _ => vec![PdfObject::Reference(page_id.number, page_id.generation)]
                .into_iter()
                .collect(),
        };
        pages.insert("Kids", PdfObject::Array(kids));
        pages.insert("Count", PdfObject::Integer(count));
        Ok(page_id)
    }

    /// Look up a page attribute, walking `/Parent` for inheritable keys
    /// (MediaBox, Resources, Rotate).
    pub fn page_attribute<'a>(&'a self, page_id: ObjectId, key: &str) -> Option<&'a PdfObject> {
        let mut current = page_id;
        let mut hops = 0;
        loop {
            let dict = self.get_dict(current)?;
            if let Some(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get("Parent")?.as_reference()?;
            current = ObjectId::new(parent.0, parent.1);
            hops += 1;
            if hops > 64 {
                return None;
            }
        }
    }

    /// The page media box, defaulting to US Letter when absent or bad.
    pub fn page_media_box(&self, page_id: ObjectId) -> Rect {
        let values: Option<Vec<f64>> = self
            .page_attribute(page_id, "MediaBox")
            .map(|o| self.resolve(o))
            .and_then(|o| o.as_array())
            .map(|arr| arr.iter().filter_map(|v| self.resolve(v).as_number()).collect());
        match values {
            Some(v) if v.len() == 4 => Rect::from_points(v[0], v[1], v[2], v[3]),
            _ => Rect::from_points(0.0, 0.0, 612.0, 792.0),
        }
    }

    /// Ids of the page's annotations. Direct (non-reference) entries are
    /// skipped; in practice annotations are always indirect.
    pub fn page_annotation_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        if let Some(annots) = self
            .get_dict(page_id)
            .and_then(|d| d.get("Annots"))
            .map(|a| self.resolve(a))
            .and_then(|a| a.as_array())
        {
            for entry in annots.iter() {
                if let Some((num, gen)) = entry.as_reference() {
                    ids.push(ObjectId::new(num, gen));
                }
            }
        }
        ids
    }

    /// Decoded page content: all content streams concatenated in order.
    /// ISO 32000-1 treats multiple streams as one with whitespace between
    /// them, so a newline separates the parts.
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let dict = self
            .get_dict(page_id)
            .ok_or_else(|| PdfError::InvalidObjectReference(page_id.number, page_id.generation))?;
        let contents = match dict.get("Contents") {
            Some(c) => self.resolve(c),
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::new();
        match contents {
            PdfObject::Stream(stream) => {
                out = stream.decode().map_err(PdfError::from)?;
            }
            PdfObject::Array(parts) => {
                for part in parts.iter() {
                    if let Some(stream) = self.resolve(part).as_stream() {
                        if !out.is_empty() {
                            out.push(b'\n');
                        }
                        out.extend(stream.decode().map_err(PdfError::from)?);
                    }
                }
            }
            _ => {}
        }
        Ok(out)
    }

    /// The page resource dictionary (inheritable).
    pub fn page_resources(&self, page_id: ObjectId) -> Option<&PdfDictionary> {
        self.page_attribute(page_id, "Resources")
            .and_then(|r| self.resolve_dict(r))
    }

    // --- structure tree ---

    /// The id of the StructTreeRoot, when the catalog has one.
    pub fn struct_tree_root_id(&self) -> Option<ObjectId> {
        let root = self.catalog().ok()?.get("StructTreeRoot")?;
        let id = self.reference_target(root)?;
        self.get_dict(id).map(|_| id)
    }

    /// Whether the document carries a structure tree with any kids.
    pub fn is_tagged(&self) -> bool {
        let id = match self.struct_tree_root_id() {
            Some(id) => id,
            None => return false,
        };
        self.get_dict(id)
            .and_then(|d| d.get("K"))
            .map(|k| match self.resolve(k) {
                PdfObject::Null => false,
                PdfObject::Array(arr) => !arr.is_empty(),
                _ => true,
            })
            .unwrap_or(false)
    }

    /// A "trivially tagged" document has a StructTreeRoot whose only kid is
    /// a Document-role element with no element children. Autotagging treats
    /// these as untagged.
    pub fn is_trivially_tagged(&self) -> bool {
        let root_id = match self.struct_tree_root_id() {
            Some(id) => id,
            None => return false,
        };
        let root = match self.get_dict(root_id) {
            Some(d) => d,
            None => return false,
        };
        let kids = match root.get("K") {
            Some(k) => k,
            None => return false,
        };
        let only_kid = match self.resolve(kids) {
            PdfObject::Dictionary(d) => d,
            PdfObject::Array(arr) if arr.len() == 1 => {
                match arr.get(0).map(|k| self.resolve(k)) {
                    Some(PdfObject::Dictionary(d)) => d,
                    _ => return false,
                }
            }
            _ => return false,
        };
        if only_kid.get("S").and_then(|s| self.resolve(s).as_name()) != Some("Document") {
            return false;
        }
        // Any structure element child makes it meaningfully tagged.
        let has_elem_child = match only_kid.get("K").map(|k| self.resolve(k)) {
            None => false,
            Some(PdfObject::Dictionary(_)) => true,
            Some(PdfObject::Array(arr)) => arr
                .iter()
                .any(|k| matches!(self.resolve(k), PdfObject::Dictionary(_))),
            Some(_) => false,
        };
        !has_elem_child
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
