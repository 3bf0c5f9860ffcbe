//! Table remediation: layout-table demotion and summary attributes.
//!
//! Two passes over Table structure elements. Demotion retags small
//! header-less tables as `Div` (they are almost always layout scaffolding
//! that screen readers should not announce as data). Summarization makes
//! sure every remaining table carries a Table-owned `/Summary` attribute,
//! synthesized from its shape and header labels when the author provided
//! none.

use crate::cancel::CancelToken;
use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::geometry::Rect;
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject, PdfString};
use crate::scanner;
use crate::structure::{StructKid, StructTree};
use crate::text_util::{is_blank, normalize_whitespace, truncate_chars};
use std::collections::HashMap;

use super::config::RemediationConfig;
use super::StepReport;

/// Maximum characters of one header label in a synthesized summary.
const MAX_HEADER_LABEL_CHARS: usize = 80;
/// Maximum header labels listed in a synthesized summary.
const MAX_HEADER_LABELS: usize = 6;
/// Maximum characters of a synthesized summary.
const MAX_SUMMARY_CHARS: usize = 300;

/// Shape of one table: its rows and their cell roles.
struct TableShape {
    /// Per row: ids of TH/TD cells with a flag for TH
    rows: Vec<Vec<(ObjectId, bool)>>,
}

impl TableShape {
    fn has_header_cells(&self) -> bool {
        self.rows
            .iter()
            .any(|row| row.iter().any(|&(_, is_th)| is_th))
    }

    fn max_cells_per_row(&self) -> usize {
        self.rows.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    fn header_cell_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.rows
            .iter()
            .flatten()
            .filter(|&&(_, is_th)| is_th)
            .map(|&(id, _)| id)
    }
}

/// Collect a table's row/cell shape by walking its subtree.
fn table_shape(tree: &StructTree<'_>, table_id: ObjectId, page: Option<ObjectId>) -> TableShape {
    let mut rows = Vec::new();
    // Rows may be nested under THead/TBody/TFoot grouping elements.
    let mut stack: Vec<(ObjectId, Option<ObjectId>)> = vec![(table_id, page)];
    let mut seen = std::collections::HashSet::new();
    while let Some((id, pg)) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for kid in tree.kids_of(id, pg) {
            if let StructKid::Element(child) = kid {
                match tree.role_of(child).as_deref() {
                    Some("TR") => rows.push(collect_row_cells(tree, child, pg)),
                    Some("Table") => {}
                    _ => stack.push((child, pg)),
                }
            }
        }
    }
    TableShape { rows }
}

fn collect_row_cells(
    tree: &StructTree<'_>,
    row_id: ObjectId,
    page: Option<ObjectId>,
) -> Vec<(ObjectId, bool)> {
    let mut cells = Vec::new();
    for kid in tree.kids_of(row_id, page) {
        if let StructKid::Element(cell) = kid {
            match tree.role_of(cell).as_deref() {
                Some("TH") => cells.push((cell, true)),
                Some("TD") => cells.push((cell, false)),
                _ => {}
            }
        }
    }
    cells
}

/// Demotes small header-less tables to `Div`.
pub struct LayoutTableDemoter<'a> {
    config: &'a RemediationConfig,
}

impl<'a> LayoutTableDemoter<'a> {
    pub fn new(config: &'a RemediationConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        if !self.config.demote_small_tables_without_headers {
            return Ok(StepReport::skipped("layout-table demotion disabled"));
        }

        let mut to_demote = Vec::new();
        if let Some(tree) = StructTree::open(doc) {
            for visit in tree.elements_with_role(|r| r == "Table") {
                cancel.check()?;
                let shape = table_shape(&tree, visit.id, visit.page);
                if shape.has_header_cells() {
                    continue;
                }
                let small = shape.rows.len() <= self.config.max_layout_table_rows
                    || shape.max_cells_per_row() <= self.config.max_layout_table_cells_per_row;
                if small {
                    to_demote.push(visit.id);
                }
            }
        }

        let count = to_demote.len();
        for table_id in to_demote {
            if let Some(elem) = doc.get_dict_mut(table_id) {
                elem.insert("S", PdfObject::name("Div"));
            }
        }
        if count == 0 {
            Ok(StepReport::skipped("no layout tables found"))
        } else {
            Ok(StepReport::applied(format!("demoted {count} layout table(s) to Div")))
        }
    }
}

/// Ensures every table carries a Table-owned `/Summary`.
pub struct TableSummarizer;

impl TableSummarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        // (table id, summary text) pairs computed before mutation.
        let mut pending: Vec<(ObjectId, String)> = Vec::new();

        if let Some(tree) = StructTree::open(doc) {
            let mut page_texts: HashMap<ObjectId, HashMap<i32, (String, Option<Rect>)>> =
                HashMap::new();
            for visit in tree.elements_with_role(|r| r == "Table") {
                cancel.check()?;
                let attrs = attribute_dicts(doc, visit.id);
                if table_owned_summary(&attrs).is_some() {
                    continue;
                }
                let summary = match any_summary(&attrs) {
                    // Promote an ownerless summary to a Table-owned entry.
                    Some(existing) => existing,
                    None => synthesize_summary(
                        doc,
                        &tree,
                        visit.id,
                        visit.page,
                        &mut page_texts,
                    ),
                };
                if is_blank(&summary) {
                    continue;
                }
                pending.push((visit.id, summary));
            }
        }

        let count = pending.len();
        for (table_id, summary) in pending {
            write_table_summary(doc, table_id, &summary);
        }
        if count == 0 {
            Ok(StepReport::skipped("all tables already have summaries"))
        } else {
            Ok(StepReport::applied(format!("wrote {count} table summar(ies)")))
        }
    }
}

impl Default for TableSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a structure element's `/A` entry into its attribute dicts.
/// `/A` may be one dict, an array of dicts (with revision numbers mixed
/// in), or references to either.
fn attribute_dicts(doc: &Document, elem_id: ObjectId) -> Vec<PdfDictionary> {
    let mut dicts = Vec::new();
    let attr = match doc.get_dict(elem_id).and_then(|d| d.get("A")) {
        Some(a) => doc.resolve(a),
        None => return dicts,
    };
    match attr {
        PdfObject::Dictionary(d) => dicts.push(d.clone()),
        PdfObject::Array(arr) => {
            for entry in arr.iter() {
                if let Some(d) = doc.resolve_dict(entry) {
                    dicts.push(d.clone());
                }
            }
        }
        _ => {}
    }
    dicts
}

fn summary_text(dict: &PdfDictionary) -> Option<String> {
    dict.get("Summary")
        .and_then(|s| s.as_string())
        .map(|s| s.to_text())
        .filter(|s| !is_blank(s))
}

fn table_owned_summary(attrs: &[PdfDictionary]) -> Option<String> {
    attrs
        .iter()
        .filter(|d| d.get("O").and_then(|o| o.as_name()) == Some("Table"))
        .find_map(summary_text)
}

fn any_summary(attrs: &[PdfDictionary]) -> Option<String> {
    attrs.iter().find_map(summary_text)
}

/// Build "Table with R row(s) and C column(s). Column headers: …." from
/// the table's shape, resolving header labels through their MCID text.
fn synthesize_summary(
    doc: &Document,
    tree: &StructTree<'_>,
    table_id: ObjectId,
    page: Option<ObjectId>,
    page_texts: &mut HashMap<ObjectId, HashMap<i32, (String, Option<Rect>)>>,
) -> String {
    let shape = table_shape(tree, table_id, page);
    let rows = shape.rows.len();
    let columns = shape.max_cells_per_row();

    let mut headers: Vec<String> = Vec::new();
    for cell_id in shape.header_cell_ids() {
        if headers.len() >= MAX_HEADER_LABELS {
            break;
        }
        let mut label = String::new();
        for (ref_page, mcid) in tree.content_refs(cell_id, page) {
            let table = page_texts.entry(ref_page).or_insert_with(|| {
                scanner::mcid_text_map(doc, ref_page).unwrap_or_default()
            });
            if let Some((text, _)) = table.get(&mcid) {
                if !label.is_empty() && !label.ends_with(char::is_whitespace) {
                    label.push(' ');
                }
                label.push_str(text);
            }
        }
        let label = truncate_chars(&normalize_whitespace(&label), MAX_HEADER_LABEL_CHARS);
        if label.is_empty() {
            continue;
        }
        let duplicate = headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(&label));
        if !duplicate {
            headers.push(label);
        }
    }

    let mut summary = format!("Table with {rows} row(s) and {columns} column(s).");
    if !headers.is_empty() {
        summary.push_str(" Column headers: ");
        summary.push_str(&headers.join(", "));
        summary.push('.');
    }
    truncate_chars(&summary, MAX_SUMMARY_CHARS)
}

/// Attach a Table-owned summary attribute, wrapping any existing `/A`
/// value into an array as needed.
fn write_table_summary(doc: &mut Document, table_id: ObjectId, summary: &str) {
    let mut entry = PdfDictionary::new();
    entry.insert("O", PdfObject::name("Table"));
    entry.insert(
        "Summary",
        PdfObject::String(PdfString::from_text_utf16be(summary)),
    );

    let existing = doc.get_dict(table_id).and_then(|d| d.get("A")).cloned();
    let new_attr = match existing {
        None | Some(PdfObject::Null) => PdfObject::Dictionary(entry),
        Some(PdfObject::Array(mut arr)) => {
            arr.push(PdfObject::Dictionary(entry));
            PdfObject::Array(arr)
        }
        Some(other) => {
            let arr: PdfArray = vec![other, PdfObject::Dictionary(entry)].into_iter().collect();
            PdfObject::Array(arr)
        }
    };
    if let Some(elem) = doc.get_dict_mut(table_id) {
        elem.insert("A", new_attr);
    }
}
