//! Link alt-text pipeline (feature-gated).
//!
//! Matches link annotations to their Link structure elements, picks the
//! visible anchor text by geometry, extracts the link target, and asks the
//! generator for a description. Off by default
//! (`generate_link_alt_text`).

use crate::cancel::CancelToken;
use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::geometry::Rect;
use crate::parser::objects::PdfObject;
use crate::scanner::{page_text, TextChunk};
use crate::services::GenerationProvider;
use crate::structure::{StructTree, StructureIndex};
use crate::text_util::{is_blank, loose_eq, normalize_whitespace};

use super::config::RemediationConfig;
use super::figures::write_alt;
use super::StepReport;

/// Overlap tolerance between a text chunk and the link rectangle.
const OVERLAP_TOLERANCE_PT: f64 = 1.0;

pub struct LinkAltPipeline<'a> {
    config: &'a RemediationConfig,
    generation: &'a dyn GenerationProvider,
}

struct LinkJob {
    elem: ObjectId,
    target: Option<String>,
    link_text: String,
    context_before: String,
    context_after: String,
}

impl<'a> LinkAltPipeline<'a> {
    pub fn new(config: &'a RemediationConfig, generation: &'a dyn GenerationProvider) -> Self {
        Self { config, generation }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let jobs = self.collect_jobs(doc, cancel)?;
        if jobs.is_empty() {
            return Ok(StepReport::skipped("no links need alt text"));
        }

        let mut written = 0usize;
        for job in &jobs {
            cancel.check()?;
            match self.generation.alt_text_for_link(
                job.target.as_deref(),
                &job.link_text,
                &job.context_before,
                &job.context_after,
            ) {
                Ok(alt) if !is_blank(&alt) => {
                    write_alt(doc, job.elem, &alt);
                    written += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("link alt generation failed for {}: {}", job.elem, err);
                }
            }
        }
        Ok(StepReport::applied(format!("wrote alt text on {written} link(s)")))
    }

    fn collect_jobs(&self, doc: &Document, cancel: &CancelToken) -> Result<Vec<LinkJob>> {
        let tree = match StructTree::open(doc) {
            Some(tree) => tree,
            None => return Ok(Vec::new()),
        };
        let index = StructureIndex::build(&tree, |role| role == "Link");
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        for page_id in doc.page_ids() {
            cancel.check()?;
            let links: Vec<(ObjectId, Rect)> = doc
                .page_annotation_ids(page_id)
                .into_iter()
                .filter_map(|annot_id| {
                    let dict = doc.get_dict(annot_id)?;
                    if dict.get("Subtype").and_then(|s| s.as_name()) != Some("Link") {
                        return None;
                    }
                    Some((annot_id, annotation_rect(doc, annot_id)?))
                })
                .collect();
            if links.is_empty() {
                continue;
            }

            let acc = match page_text(doc, page_id) {
                Ok(acc) => acc,
                Err(err) => {
                    tracing::warn!("page {} text scan failed: {}", page_id, err);
                    continue;
                }
            };

            for (annot_id, rect) in links {
                let elem = match index.element_for_object(page_id, annot_id) {
                    Some(elem) => elem,
                    None => continue,
                };
                let existing = tree.alt_of(elem);
                let missing = match existing {
                    None => true,
                    Some(text) => {
                        is_blank(&text) || loose_eq(&text, &self.config.link_alt_sentinel)
                    }
                };
                if !missing {
                    continue;
                }

                let (link_text, range) = visible_link_text(acc.chunks(), acc.text(), &rect);
                let (start, end) = range.unwrap_or((0, 0));
                jobs.push(LinkJob {
                    elem,
                    target: link_target(doc, annot_id),
                    link_text,
                    context_before: acc.context_before(start, self.config.alt_context_chars),
                    context_after: acc.context_after(end, self.config.alt_context_chars),
                });
            }
        }
        Ok(jobs)
    }
}

/// The text a sighted reader would consider the link's anchor: chunks
/// overlapping the link rectangle (joined in content order), else the
/// nearest chunk by center distance, else nothing.
fn visible_link_text(
    chunks: &[TextChunk],
    full_text: &str,
    rect: &Rect,
) -> (String, Option<(usize, usize)>) {
    let overlapping: Vec<&TextChunk> = chunks
        .iter()
        .filter(|chunk| {
            chunk
                .bounds
                .map(|b| b.intersects(rect, OVERLAP_TOLERANCE_PT))
                .unwrap_or(false)
        })
        .collect();

    let selected: Vec<&TextChunk> = if !overlapping.is_empty() {
        overlapping
    } else {
        match chunks
            .iter()
            .filter(|chunk| chunk.bounds.is_some())
            .min_by(|a, b| {
                let da = a.bounds.unwrap().center_distance(rect);
                let db = b.bounds.unwrap().center_distance(rect);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            }) {
            Some(nearest) => vec![nearest],
            None => return (String::new(), None),
        }
    };

    let start = selected.iter().map(|c| c.start).min().unwrap_or(0);
    let end = selected.iter().map(|c| c.end).max().unwrap_or(0);
    let text: String = selected
        .iter()
        .map(|chunk| {
            full_text
                .chars()
                .skip(chunk.start)
                .take(chunk.end - chunk.start)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ");
    (normalize_whitespace(&text), Some((start, end)))
}

fn annotation_rect(doc: &Document, annot_id: ObjectId) -> Option<Rect> {
    let values: Vec<f64> = doc
        .get_dict(annot_id)?
        .get("Rect")
        .map(|r| doc.resolve(r))?
        .as_array()?
        .iter()
        .filter_map(|v| doc.resolve(v).as_number())
        .collect();
    if values.len() == 4 {
        Some(Rect::from_points(values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

/// The link's destination as text: the action's /URI when present, else
/// a textual rendering of the destination, else nothing.
fn link_target(doc: &Document, annot_id: ObjectId) -> Option<String> {
    let dict = doc.get_dict(annot_id)?;
    if let Some(action) = dict.get("A").and_then(|a| doc.resolve_dict(a)) {
        if let Some(uri) = action
            .get("URI")
            .and_then(|u| doc.resolve(u).as_string())
            .map(|s| s.to_text())
        {
            return Some(uri);
        }
        if let Some(dest) = action.get("D") {
            return destination_text(doc, dest);
        }
    }
    dict.get("Dest").and_then(|d| destination_text(doc, d))
}

fn destination_text(doc: &Document, dest: &PdfObject) -> Option<String> {
    match doc.resolve(dest) {
        PdfObject::String(s) => Some(s.to_text()),
        PdfObject::Name(n) => Some(n.as_str().to_string()),
        PdfObject::Array(arr) => {
            let page_ref = arr.get(0)?.as_reference()?;
            let target = ObjectId::new(page_ref.0, page_ref.1);
            let page_number = doc
                .page_ids()
                .iter()
                .position(|&id| id == target)
                .map(|i| i + 1)?;
            Some(format!("page {page_number}"))
        }
        _ => None,
    }
}
