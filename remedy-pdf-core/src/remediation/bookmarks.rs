//! Outline (bookmark) building from heading structure elements.
//!
//! Headings (`H`, `H1`..`H6` after role mapping) become a nested outline
//! with explicit destinations at each heading's top edge. Runs only when
//! the document does not already have an outline with entries.

use crate::cancel::CancelToken;
use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::geometry::Rect;
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject, PdfString};
use crate::scanner;
use crate::structure::{heading_level, StructTree};
use crate::text_util::{is_blank, normalize_whitespace, truncate_chars};
use std::collections::HashMap;

use super::config::{MAX_BOOKMARKS, MAX_BOOKMARK_TITLE_CHARS};
use super::StepReport;

pub struct BookmarkBuilder;

#[derive(Debug)]
struct Heading {
    level: u8,
    title: String,
    page: ObjectId,
    top_y: Option<f64>,
}

#[derive(Debug)]
struct OutlineNode {
    heading: Heading,
    children: Vec<usize>,
}

impl BookmarkBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        if has_existing_outline(doc) {
            return Ok(StepReport::skipped("document already has an outline"));
        }

        let headings = collect_headings(doc, cancel)?;
        if headings.is_empty() {
            return Ok(StepReport::skipped("no headings in structure tree"));
        }
        let count = headings.len();

        let (roots, nodes) = nest_by_level(headings);
        write_outline(doc, &roots, &nodes)?;
        Ok(StepReport::applied(format!("built {count} bookmark(s)")))
    }
}

impl Default for BookmarkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn has_existing_outline(doc: &Document) -> bool {
    doc.catalog()
        .ok()
        .and_then(|catalog| catalog.get("Outlines"))
        .and_then(|o| doc.resolve_dict(o))
        .map(|outlines| outlines.contains_key("First"))
        .unwrap_or(false)
}

/// Walk the structure tree in document order collecting heading records
/// with resolved titles and top edges.
fn collect_headings(doc: &Document, cancel: &CancelToken) -> Result<Vec<Heading>> {
    let tree = match StructTree::open(doc) {
        Some(tree) => tree,
        None => return Ok(Vec::new()),
    };

    // MCID text tables are built once per page on first use.
    let mut page_texts: HashMap<ObjectId, HashMap<i32, (String, Option<Rect>)>> = HashMap::new();
    let mut headings = Vec::new();

    for visit in tree.elements() {
        cancel.check()?;
        if headings.len() >= MAX_BOOKMARKS {
            tracing::warn!("bookmark cap of {} reached, remaining headings dropped", MAX_BOOKMARKS);
            break;
        }
        let role = match tree.role_of(visit.id) {
            Some(role) => role,
            None => continue,
        };
        let level = match heading_level(&role) {
            Some(level) => level,
            None => continue,
        };

        let refs = tree.content_refs(visit.id, visit.page);
        let mut title = String::new();
        let mut top_y: Option<f64> = None;
        let mut page = refs.first().map(|(page, _)| *page).or(visit.page);
        for (ref_page, mcid) in &refs {
            let table = match page_texts.entry(*ref_page) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let table = scanner::mcid_text_map(doc, *ref_page).unwrap_or_default();
                    e.insert(table)
                }
            };
            if let Some((text, bounds)) = table.get(mcid) {
                if !text.is_empty() {
                    if !title.is_empty() && !title.ends_with(char::is_whitespace) {
                        title.push(' ');
                    }
                    title.push_str(text);
                }
                if let Some(bounds) = bounds {
                    top_y = Some(match top_y {
                        Some(y) => y.max(bounds.ury),
                        None => bounds.ury,
                    });
                }
            }
        }

        let mut title = normalize_whitespace(&title);
        if title.is_empty() {
            title = fallback_title(doc, visit.id);
        }
        if is_blank(&title) {
            continue;
        }
        let page = match page.take() {
            Some(page) => page,
            None => continue,
        };
        headings.push(Heading {
            level,
            title: truncate_chars(&title, MAX_BOOKMARK_TITLE_CHARS),
            page,
            top_y,
        });
    }
    Ok(headings)
}

/// A heading without visible MCID text still gets a title from its /T,
/// /ActualText or /Alt entry.
fn fallback_title(doc: &Document, elem_id: ObjectId) -> String {
    let dict = match doc.get_dict(elem_id) {
        Some(d) => d,
        None => return String::new(),
    };
    for key in ["T", "ActualText", "Alt"] {
        if let Some(text) = dict
            .get(key)
            .and_then(|t| doc.resolve(t).as_string())
            .map(|s| s.to_text())
        {
            let text = normalize_whitespace(&text);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Fold the flat heading list into a tree with a level stack: pop while
/// the stack top's level is not shallower than the incoming heading, then
/// attach to the new top (or the root).
fn nest_by_level(headings: Vec<Heading>) -> (Vec<usize>, Vec<OutlineNode>) {
    let mut nodes: Vec<OutlineNode> = Vec::with_capacity(headings.len());
    let mut roots = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    for heading in headings {
        let index = nodes.len();
        let level = heading.level;
        nodes.push(OutlineNode {
            heading,
            children: Vec::new(),
        });
        while let Some(&top) = stack.last() {
            if nodes[top].heading.level >= level {
                stack.pop();
            } else {
                break;
            }
        }
        match stack.last() {
            Some(&parent) => nodes[parent].children.push(index),
            None => roots.push(index),
        }
        stack.push(index);
    }
    (roots, nodes)
}

/// Materialize the outline object graph and hang it off the catalog.
fn write_outline(doc: &mut Document, roots: &[usize], nodes: &[OutlineNode]) -> Result<()> {
    let outline_root_id = doc.reserve_id();
    let ids: Vec<ObjectId> = nodes.iter().map(|_| doc.reserve_id()).collect();

    write_items(doc, outline_root_id, roots, nodes, &ids);

    let mut root = PdfDictionary::new();
    root.insert("Type", PdfObject::name("Outlines"));
    if let (Some(&first), Some(&last)) = (roots.first(), roots.last()) {
        root.insert("First", PdfObject::Reference(ids[first].number, ids[first].generation));
        root.insert("Last", PdfObject::Reference(ids[last].number, ids[last].generation));
    }
    root.insert("Count", PdfObject::Integer(descendant_count(roots, nodes) as i64));
    doc.set(outline_root_id, PdfObject::Dictionary(root));
    doc.set_catalog_entry(
        "Outlines",
        PdfObject::Reference(outline_root_id.number, outline_root_id.generation),
    )
}

/// Recursion is bounded by heading depth (at most six levels).
fn write_items(
    doc: &mut Document,
    parent_id: ObjectId,
    siblings: &[usize],
    nodes: &[OutlineNode],
    ids: &[ObjectId],
) {
    for (position, &index) in siblings.iter().enumerate() {
        let node = &nodes[index];
        let mut item = PdfDictionary::new();
        item.insert(
            "Title",
            PdfObject::String(PdfString::from_text(&node.heading.title)),
        );
        item.insert(
            "Parent",
            PdfObject::Reference(parent_id.number, parent_id.generation),
        );
        item.insert("Dest", destination(&node.heading));
        if position > 0 {
            let prev = ids[siblings[position - 1]];
            item.insert("Prev", PdfObject::Reference(prev.number, prev.generation));
        }
        if position + 1 < siblings.len() {
            let next = ids[siblings[position + 1]];
            item.insert("Next", PdfObject::Reference(next.number, next.generation));
        }
        if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
            item.insert(
                "First",
                PdfObject::Reference(ids[first].number, ids[first].generation),
            );
            item.insert(
                "Last",
                PdfObject::Reference(ids[last].number, ids[last].generation),
            );
            item.insert(
                "Count",
                PdfObject::Integer(descendant_count(&node.children, nodes) as i64),
            );
        }
        doc.set(ids[index], PdfObject::Dictionary(item));
        write_items(doc, ids[index], &node.children, nodes, ids);
    }
}

fn descendant_count(siblings: &[usize], nodes: &[OutlineNode]) -> usize {
    siblings
        .iter()
        .map(|&i| 1 + descendant_count(&nodes[i].children, nodes))
        .sum()
}

/// An explicit destination: top of the heading when its geometry is
/// known, whole page otherwise.
fn destination(heading: &Heading) -> PdfObject {
    let page_ref = PdfObject::Reference(heading.page.number, heading.page.generation);
    let dest: PdfArray = match heading.top_y {
        Some(top) => vec![
            page_ref,
            PdfObject::name("FitH"),
            PdfObject::Real(top),
        ]
        .into_iter()
        .collect(),
        None => vec![page_ref, PdfObject::name("Fit")].into_iter().collect(),
    };
    PdfObject::Array(dest)
}
