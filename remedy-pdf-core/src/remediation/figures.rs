//! Figure alt-text pipeline.
//!
//! Two passes per document. Raster figures: every image XObject drawn on a
//! page is matched back to its Figure element (object reference first,
//! then MCID) and sent to the generator with surrounding page text as
//! context. Vector figures: Figure elements with no matched raster image
//! get their drawing operations' union bounding box rasterized, cropped
//! and PNG-encoded; identical crops share one generator call through a
//! content-hash dedupe. A final fallback pass guarantees that no Figure
//! leaves the engine without `/Alt`.

use crate::cancel::CancelToken;
use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::geometry::Rect;
use crate::parser::objects::{PdfObject, PdfString};
use crate::scanner::{PageScanner, ScanEvent, TextAccumulator};
use crate::services::{sniff_image_mime, GenerationProvider, PageBitmap, PageRasterizer};
use crate::structure::{StructTree, StructureIndex};
use crate::text_util::{is_blank, loose_eq};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use super::config::RemediationConfig;
use super::StepReport;

/// Padding in PDF points added around a vector figure's bounds.
const CROP_PAD_PT: f64 = 2.0;
/// Minimum crop edge in pixels; smaller crops are expanded around center.
const MIN_CROP_PX: u32 = 64;

pub struct FigureAltPipeline<'a> {
    config: &'a RemediationConfig,
    generation: &'a dyn GenerationProvider,
    rasterizer: Option<&'a dyn PageRasterizer>,
}

/// A pending generator call for a raster image occurrence.
struct RasterJob {
    elem: ObjectId,
    image: Vec<u8>,
    mime: &'static str,
    context_before: String,
    context_after: String,
}

/// A pending rasterize-and-generate for a vector figure.
struct VectorJob {
    elem: ObjectId,
    page_number: u32,
    page_rect: Rect,
    bounds: Rect,
    context_before: String,
    context_after: String,
}

impl<'a> FigureAltPipeline<'a> {
    pub fn new(
        config: &'a RemediationConfig,
        generation: &'a dyn GenerationProvider,
        rasterizer: Option<&'a dyn PageRasterizer>,
    ) -> Self {
        Self {
            config,
            generation,
            rasterizer,
        }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let (raster_jobs, vector_jobs) = self.collect_jobs(doc, cancel)?;
        if raster_jobs.is_empty() && vector_jobs.is_empty() {
            return Ok(StepReport::skipped("no figures need alt text"));
        }

        let mut raster_written = 0usize;
        for job in &raster_jobs {
            cancel.check()?;
            match self.generation.alt_text_for_image(
                &job.image,
                job.mime,
                &job.context_before,
                &job.context_after,
            ) {
                Ok(alt) if !is_blank(&alt) => {
                    write_alt(doc, job.elem, &alt);
                    raster_written += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("alt text generation failed for {}: {}", job.elem, err);
                }
            }
        }

        let (vector_written, dedupe_hits) = self.run_vector_jobs(doc, vector_jobs, cancel)?;
        Ok(StepReport::applied(format!(
            "alt text: {raster_written} raster, {vector_written} vector ({dedupe_hits} dedupe hit(s))"
        )))
    }

    /// Immutable pass: scan each page, match images to figures, compute
    /// vector-figure bounds and context windows.
    fn collect_jobs(
        &self,
        doc: &Document,
        cancel: &CancelToken,
    ) -> Result<(Vec<RasterJob>, Vec<VectorJob>)> {
        let tree = match StructTree::open(doc) {
            Some(tree) => tree,
            None => return Ok((Vec::new(), Vec::new())),
        };
        let index = StructureIndex::build(&tree, |role| role == "Figure");

        // Figures whose alt is missing or a sentinel placeholder.
        let mut needs_alt: HashSet<ObjectId> = HashSet::new();
        let mut figure_order: Vec<ObjectId> = Vec::new();
        for visit in tree.elements_with_role(|r| r == "Figure") {
            if self.alt_missing(tree.alt_of(visit.id)) {
                needs_alt.insert(visit.id);
                figure_order.push(visit.id);
            }
        }
        if needs_alt.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let page_ids = doc.page_ids();
        let page_numbers: HashMap<ObjectId, u32> = page_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32 + 1))
            .collect();

        let mut raster_jobs: Vec<RasterJob> = Vec::new();
        let mut matched_raster: HashSet<ObjectId> = HashSet::new();
        // Per page: accumulated text and the scan events, kept for the
        // vector pass.
        let mut page_scans: HashMap<ObjectId, (TextAccumulator, Vec<ScanEvent>)> = HashMap::new();

        for &page_id in &page_ids {
            cancel.check()?;
            let events = match PageScanner::new(doc).scan(page_id) {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!("page {} scan failed: {}", page_id, err);
                    continue;
                }
            };
            let mut acc = TextAccumulator::new();
            // (xobject id, mcid, char index) per image occurrence, in
            // content order.
            let mut occurrences: Vec<(Option<ObjectId>, Option<i32>, usize)> = Vec::new();
            for event in &events {
                match event {
                    ScanEvent::TextRun {
                        mcid,
                        text,
                        ascent,
                        descent,
                    } => {
                        let bounds = ascent.bounds().union(&descent.bounds());
                        acc.push(text, Some(bounds), *mcid);
                    }
                    ScanEvent::Image { mcid, xobject, .. } => {
                        occurrences.push((*xobject, *mcid, acc.char_len()));
                    }
                    ScanEvent::Path { .. } => {}
                }
            }

            for (xobject, mcid, char_at) in occurrences {
                let elem = xobject
                    .and_then(|x| index.element_for_object(page_id, x))
                    .or_else(|| {
                        mcid.and_then(|m| index.element_for_mcid(page_id, m))
                    });
                let elem = match elem {
                    Some(elem) if needs_alt.contains(&elem) && !matched_raster.contains(&elem) => {
                        elem
                    }
                    _ => continue,
                };
                let (image, mime) = match xobject.and_then(|x| extract_image_bytes(doc, x)) {
                    Some(pair) => pair,
                    None => continue,
                };
                matched_raster.insert(elem);
                raster_jobs.push(RasterJob {
                    elem,
                    image,
                    mime,
                    context_before: acc.context_before(char_at, self.config.alt_context_chars),
                    context_after: acc.context_after(char_at, self.config.alt_context_chars),
                });
            }
            page_scans.insert(page_id, (acc, events));
        }

        // Vector candidates: figures not matched to any raster image,
        // located by unioning tagged drawing bounds per page.
        let mut vector_jobs: Vec<VectorJob> = Vec::new();
        for &fig in &figure_order {
            if matched_raster.contains(&fig) {
                continue;
            }
            cancel.check()?;
            let mut mcids_by_page: HashMap<ObjectId, HashSet<i32>> = HashMap::new();
            for (page, mcid) in tree.content_refs(fig, None) {
                mcids_by_page.entry(page).or_default().insert(mcid);
            }
            // Pages visited in page order so the chosen crop is stable.
            for &page_id in &page_ids {
                let mcids = match mcids_by_page.get(&page_id) {
                    Some(mcids) => mcids,
                    None => continue,
                };
                let page_number = match page_numbers.get(&page_id) {
                    Some(&n) => n,
                    None => continue,
                };
                let (acc, events) = match page_scans.get(&page_id) {
                    Some(scan) => scan,
                    None => continue,
                };
                let mut bounds: Option<Rect> = None;
                for event in events {
                    let event_bounds = match event {
                        ScanEvent::Path {
                            mcid: Some(mcid),
                            clipping_only: false,
                            bounds: Some(b),
                            ..
                        } if mcids.contains(mcid) => *b,
                        ScanEvent::TextRun {
                            mcid: Some(mcid),
                            ascent,
                            descent,
                            ..
                        } if mcids.contains(mcid) => ascent.bounds().union(&descent.bounds()),
                        _ => continue,
                    };
                    bounds = Some(match bounds {
                        Some(existing) => existing.union(&event_bounds),
                        None => event_bounds,
                    });
                }
                let bounds = match bounds {
                    Some(b) if b.width() > 0.0 || b.height() > 0.0 => b,
                    _ => continue,
                };
                // Context around the figure's first text chunk, or the
                // page start when its content is purely graphical.
                let at = acc
                    .chunks()
                    .iter()
                    .find(|chunk| chunk.mcid.map(|m| mcids.contains(&m)).unwrap_or(false))
                    .map(|chunk| chunk.start)
                    .unwrap_or(0);
                vector_jobs.push(VectorJob {
                    elem: fig,
                    page_number,
                    page_rect: doc.page_media_box(page_id),
                    bounds,
                    context_before: acc.context_before(at, self.config.alt_context_chars),
                    context_after: acc.context_after(at, self.config.alt_context_chars),
                });
                // One crop per figure is enough.
                break;
            }
        }

        Ok((raster_jobs, vector_jobs))
    }

    /// Rasterize, crop, dedupe and generate for the vector candidates.
    fn run_vector_jobs(
        &self,
        doc: &mut Document,
        jobs: Vec<VectorJob>,
        cancel: &CancelToken,
    ) -> Result<(usize, usize)> {
        if jobs.is_empty() {
            return Ok((0, 0));
        }
        let rasterizer = match self.rasterizer {
            Some(rasterizer) => rasterizer,
            None => {
                tracing::debug!("no rasterizer configured; vector figures left to fallback");
                return Ok((0, 0));
            }
        };

        // The handle is opened once for the document and dropped at the
        // end of this scope.
        let bytes = doc.to_bytes()?;
        let mut session = match rasterizer.open(&bytes, self.config.vector_figure_dpi) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!("rasterizer open failed: {}", err);
                return Ok((0, 0));
            }
        };

        let scale = self.config.vector_figure_dpi as f64 / 72.0;
        let mut page_cache: HashMap<u32, PageBitmap> = HashMap::new();
        let mut seen_crops: HashMap<[u8; 32], String> = HashMap::new();
        let mut written = 0usize;
        let mut dedupe_hits = 0usize;

        for job in jobs {
            cancel.check()?;
            let bitmap = match page_cache.entry(job.page_number) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    match session.render_page(job.page_number) {
                        Ok(bitmap) => e.insert(bitmap),
                        Err(err) => {
                            tracing::warn!("render of page {} failed: {}", job.page_number, err);
                            continue;
                        }
                    }
                }
            };

            let (x, y, w, h) =
                crop_pixels(&job.page_rect, &job.bounds, scale, bitmap.width, bitmap.height);
            let crop = bitmap.crop(x, y, w, h);
            let png = match crop.to_png() {
                Ok(png) => png,
                Err(err) => {
                    tracing::warn!("crop encode failed for {}: {}", job.elem, err);
                    continue;
                }
            };

            let mut hasher = Sha256::new();
            hasher.update(&png);
            let hash: [u8; 32] = hasher.finalize().into();

            let alt = match seen_crops.get(&hash) {
                Some(alt) => {
                    dedupe_hits += 1;
                    tracing::debug!("vector figure crop dedupe hit for {}", job.elem);
                    alt.clone()
                }
                None => {
                    let alt = match self.generation.alt_text_for_image(
                        &png,
                        "image/png",
                        &job.context_before,
                        &job.context_after,
                    ) {
                        Ok(alt) if !is_blank(&alt) => alt,
                        Ok(_) => continue,
                        Err(err) => {
                            tracing::warn!("alt text generation failed for {}: {}", job.elem, err);
                            continue;
                        }
                    };
                    seen_crops.insert(hash, alt.clone());
                    alt
                }
            };
            write_alt(doc, job.elem, &alt);
            written += 1;
        }
        Ok((written, dedupe_hits))
    }

    fn alt_missing(&self, alt: Option<String>) -> bool {
        match alt {
            None => true,
            Some(text) => {
                is_blank(&text) || loose_eq(&text, &self.config.image_alt_sentinel)
            }
        }
    }
}

/// Convert a figure's padded PDF-point bounds into a pixel crop rectangle
/// on the rendered page (top-left origin), enforcing the minimum size.
fn crop_pixels(
    page: &Rect,
    bounds: &Rect,
    scale: f64,
    bitmap_width: u32,
    bitmap_height: u32,
) -> (u32, u32, u32, u32) {
    let padded = bounds.padded(CROP_PAD_PT).clamped_to(page);
    // PDF origin is bottom-left; bitmaps are top-down.
    let x0 = (padded.llx - page.llx) * scale;
    let y0 = (page.ury - padded.ury) * scale;
    let mut x = x0.floor().max(0.0) as i64;
    let mut y = y0.floor().max(0.0) as i64;
    let mut w = (padded.width() * scale).ceil().max(1.0) as i64;
    let mut h = (padded.height() * scale).ceil().max(1.0) as i64;

    let min = MIN_CROP_PX as i64;
    if w < min {
        x -= (min - w) / 2;
        w = min;
    }
    if h < min {
        y -= (min - h) / 2;
        h = min;
    }
    let max_w = bitmap_width as i64;
    let max_h = bitmap_height as i64;
    x = x.clamp(0, (max_w - 1).max(0));
    y = y.clamp(0, (max_h - 1).max(0));
    if x + w > max_w {
        x = (max_w - w).max(0);
        w = w.min(max_w);
    }
    if y + h > max_h {
        y = (max_h - h).max(0);
        h = h.min(max_h);
    }
    (x as u32, y as u32, w as u32, h as u32)
}

/// Raw image bytes plus their sniffed MIME type. Filtered formats whose
/// stored bytes already are the interchange format (JPEG, JPEG 2000) are
/// passed through; anything else is decoded and sniffed.
fn extract_image_bytes(doc: &Document, xobject_id: ObjectId) -> Option<(Vec<u8>, &'static str)> {
    let stream = doc.get(xobject_id)?.as_stream()?;
    let filters: Vec<&str> = match stream.dict.get("Filter") {
        Some(PdfObject::Name(name)) => vec![name.as_str()],
        Some(PdfObject::Array(arr)) => arr.iter().filter_map(|o| o.as_name()).collect(),
        _ => Vec::new(),
    };
    if filters.contains(&"DCTDecode") {
        return Some((stream.data.clone(), "image/jpeg"));
    }
    if filters.contains(&"JPXDecode") {
        return Some((stream.data.clone(), "image/jp2"));
    }
    let data = stream.decode().ok()?;
    let mime = sniff_image_mime(&data);
    Some((data, mime))
}

pub(crate) fn write_alt(doc: &mut Document, elem: ObjectId, alt: &str) {
    if let Some(dict) = doc.get_dict_mut(elem) {
        dict.insert("Alt", PdfObject::String(PdfString::from_text_utf16be(alt)));
    }
}

/// Safety net: after the per-page passes, any Figure (and Link, when link
/// alt generation is on) still without alt text receives the sentinel so
/// the post-remediation invariant holds.
pub struct AltFallback<'a> {
    config: &'a RemediationConfig,
}

impl<'a> AltFallback<'a> {
    pub fn new(config: &'a RemediationConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let mut pending: Vec<(ObjectId, String)> = Vec::new();
        if let Some(tree) = StructTree::open(doc) {
            for visit in tree.elements() {
                cancel.check()?;
                let role = match tree.role_of(visit.id) {
                    Some(role) => role,
                    None => continue,
                };
                let sentinel = match role.as_str() {
                    "Figure" => &self.config.image_alt_sentinel,
                    "Link" if self.config.generate_link_alt_text => {
                        &self.config.link_alt_sentinel
                    }
                    _ => continue,
                };
                let missing = match tree.alt_of(visit.id) {
                    None => true,
                    Some(text) => is_blank(&text),
                };
                if missing {
                    pending.push((visit.id, sentinel.clone()));
                }
            }
        }

        let count = pending.len();
        for (elem, sentinel) in pending {
            write_alt(doc, elem, &sentinel);
        }
        if count == 0 {
            Ok(StepReport::skipped("no figures without alt text"))
        } else {
            Ok(StepReport::applied(format!("wrote {count} fallback alt text(s)")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_pixels_flips_origin() {
        // Letter page at 1 px/pt for easy numbers.
        let page = Rect::from_points(0.0, 0.0, 612.0, 792.0);
        let bounds = Rect::from_points(100.0, 600.0, 300.0, 700.0);
        let (x, y, w, h) = crop_pixels(&page, &bounds, 1.0, 612, 792);
        // Padded by 2pt: llx 98, ury 702 -> top edge at 792-702 = 90.
        assert_eq!(x, 98);
        assert_eq!(y, 90);
        assert_eq!(w, 204);
        assert_eq!(h, 104);
    }

    #[test]
    fn test_crop_pixels_enforces_minimum() {
        let page = Rect::from_points(0.0, 0.0, 612.0, 792.0);
        let bounds = Rect::from_points(300.0, 400.0, 305.0, 404.0);
        let (_, _, w, h) = crop_pixels(&page, &bounds, 1.0, 612, 792);
        assert_eq!(w, 64);
        assert_eq!(h, 64);
    }

    #[test]
    fn test_crop_pixels_clamped_to_bitmap() {
        let page = Rect::from_points(0.0, 0.0, 612.0, 792.0);
        let bounds = Rect::from_points(600.0, 780.0, 612.0, 792.0);
        let (x, y, w, h) = crop_pixels(&page, &bounds, 1.0, 612, 792);
        assert!(x + w <= 612);
        assert!(y + h <= 792);
        assert!(w >= 64);
        assert!(h >= 64);
    }

    #[test]
    fn test_extract_jpeg_passthrough() {
        let mut doc = Document::new();
        let mut dict = crate::parser::objects::PdfDictionary::new();
        dict.insert("Subtype", PdfObject::name("Image"));
        dict.insert("Filter", PdfObject::name("DCTDecode"));
        let jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x01];
        let id = doc.add(PdfObject::Stream(crate::parser::objects::PdfStream {
            dict,
            data: jpeg.clone(),
        }));
        let (bytes, mime) = extract_image_bytes(&doc, id).unwrap();
        assert_eq!(bytes, jpeg);
        assert_eq!(mime, "image/jpeg");
    }
}
