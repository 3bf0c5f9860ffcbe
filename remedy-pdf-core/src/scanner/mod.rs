//! Content-stream scanning.
//!
//! Walks a page's content stream and emits ordered events — text runs,
//! raster images and painted paths — annotated with the current
//! marked-content id and transformation matrix. The remediation steps
//! correlate these events back to structure elements: bookmark titles and
//! table headers need MCID text, the figure pipeline needs image and path
//! geometry, the link pipeline needs text chunk bounds.
//!
//! Glyph metrics are deliberately approximate (no font program parsing):
//! advances assume half an em per character, ascent 0.8 em, descent 0.2 em.
//! That is conservative enough for navigation targets and overlap tests,
//! which is all the engine derives from geometry.

pub mod accumulator;
pub mod content;

pub use accumulator::{TextAccumulator, TextChunk};
pub use content::{ContentOp, ContentParser, TextItem};

use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::geometry::{Matrix, Rect};
use crate::parser::objects::{PdfDictionary, PdfObject, PdfString};
use std::collections::HashMap;

/// A straight line segment in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl Line {
    pub fn bounds(&self) -> Rect {
        Rect::from_points(self.start.0, self.start.1, self.end.0, self.end.1)
    }
}

/// An ordered event produced by scanning a page.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A shown text run. `text` is the ActualText override when the
    /// enclosing marked content carries one, else the decoded raw bytes.
    TextRun {
        mcid: Option<i32>,
        text: String,
        ascent: Line,
        descent: Line,
    },
    /// An image XObject invocation.
    Image {
        mcid: Option<i32>,
        name: String,
        xobject: Option<ObjectId>,
        ctm: Matrix,
    },
    /// A painted (or clipping-only) path.
    Path {
        mcid: Option<i32>,
        ctm: Matrix,
        clipping_only: bool,
        bounds: Option<Rect>,
    },
}

impl ScanEvent {
    pub fn mcid(&self) -> Option<i32> {
        match self {
            ScanEvent::TextRun { mcid, .. }
            | ScanEvent::Image { mcid, .. }
            | ScanEvent::Path { mcid, .. } => *mcid,
        }
    }
}

/// Scans page content streams into event lists.
pub struct PageScanner<'a> {
    doc: &'a Document,
}

impl<'a> PageScanner<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// Scan one page. A page without content yields no events.
    pub fn scan(&self, page_id: ObjectId) -> Result<Vec<ScanEvent>> {
        let content = self.doc.page_content(page_id)?;
        let resources = self.doc.page_resources(page_id);
        let mut interp = Interpreter {
            doc: self.doc,
            events: Vec::new(),
            ctm: Matrix::identity(),
            gs_stack: Vec::new(),
            text: TextState::default(),
            mc_stack: Vec::new(),
            path_points: Vec::new(),
            pending_clip: false,
        };
        interp.exec(&content, resources, 0)?;
        Ok(interp.events)
    }
}

/// Text-positioning state per ISO 32000-1 §9.3.
struct TextState {
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f64,
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Horizontal scaling as a fraction (Tz operand / 100)
    horizontal_scale: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
        }
    }
}

/// One open marked-content scope.
struct MarkedContentScope {
    mcid: Option<i32>,
    /// ActualText override not yet consumed by a text run
    pending_actual_text: Option<String>,
    /// Whether this scope had an ActualText at all (later runs stay empty)
    had_actual_text: bool,
}

/// Approximate glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f64 = 0.5;
/// TJ offsets larger than this (thousandths of an em) read as word gaps.
const TJ_SPACE_THRESHOLD: f64 = 180.0;

struct Interpreter<'a> {
    doc: &'a Document,
    events: Vec<ScanEvent>,
    ctm: Matrix,
    gs_stack: Vec<Matrix>,
    text: TextState,
    mc_stack: Vec<MarkedContentScope>,
    path_points: Vec<(f64, f64)>,
    pending_clip: bool,
}

impl<'a> Interpreter<'a> {
    fn exec(
        &mut self,
        content: &[u8],
        resources: Option<&PdfDictionary>,
        depth: usize,
    ) -> Result<()> {
        let ops = ContentParser::parse(content)?;
        for op in ops {
            self.step(op, resources, depth)?;
        }
        Ok(())
    }

    fn step(&mut self, op: ContentOp, resources: Option<&PdfDictionary>, depth: usize) -> Result<()> {
        match op {
            ContentOp::BeginText => {
                self.text.text_matrix = Matrix::identity();
                self.text.line_matrix = Matrix::identity();
            }
            ContentOp::EndText => {}

            ContentOp::SetCharSpacing(v) => self.text.char_spacing = v,
            ContentOp::SetWordSpacing(v) => self.text.word_spacing = v,
            ContentOp::SetHorizontalScaling(v) => self.text.horizontal_scale = v / 100.0,
            ContentOp::SetLeading(v) => self.text.leading = v,
            ContentOp::SetFont(_, size) => self.text.font_size = size,
            ContentOp::SetTextRise(v) => self.text.rise = v,

            ContentOp::MoveText(tx, ty) => self.move_text(tx, ty),
            ContentOp::MoveTextSetLeading(tx, ty) => {
                self.text.leading = -ty;
                self.move_text(tx, ty);
            }
            ContentOp::SetTextMatrix(a, b, c, d, e, f) => {
                let m = Matrix::from_parts(a, b, c, d, e, f);
                self.text.text_matrix = m;
                self.text.line_matrix = m;
            }
            ContentOp::NextLine => self.next_line(),

            ContentOp::ShowText(bytes) => self.show_text(&[TextItem::Text(bytes)]),
            ContentOp::NextLineShowText(bytes) => {
                self.next_line();
                self.show_text(&[TextItem::Text(bytes)]);
            }
            ContentOp::SetSpacingNextLineShowText(word, char_sp, bytes) => {
                self.text.word_spacing = word;
                self.text.char_spacing = char_sp;
                self.next_line();
                self.show_text(&[TextItem::Text(bytes)]);
            }
            ContentOp::ShowTextArray(items) => self.show_text(&items),

            ContentOp::SaveState => self.gs_stack.push(self.ctm),
            ContentOp::RestoreState => {
                if let Some(ctm) = self.gs_stack.pop() {
                    self.ctm = ctm;
                }
            }
            ContentOp::Transform(a, b, c, d, e, f) => {
                self.ctm = Matrix::from_parts(a, b, c, d, e, f).multiply(&self.ctm);
            }

            ContentOp::MoveTo(x, y) | ContentOp::LineTo(x, y) => self.add_path_point(x, y),
            ContentOp::CurveTo(x1, y1, x2, y2, x3, y3) => {
                self.add_path_point(x1, y1);
                self.add_path_point(x2, y2);
                self.add_path_point(x3, y3);
            }
            ContentOp::CurveToV(x2, y2, x3, y3) | ContentOp::CurveToY(x2, y2, x3, y3) => {
                self.add_path_point(x2, y2);
                self.add_path_point(x3, y3);
            }
            ContentOp::Rectangle(x, y, w, h) => {
                self.add_path_point(x, y);
                self.add_path_point(x + w, y);
                self.add_path_point(x + w, y + h);
                self.add_path_point(x, y + h);
            }
            ContentOp::ClosePath => {}

            ContentOp::Clip => self.pending_clip = true,
            ContentOp::PaintPath => self.finish_path(false),
            ContentOp::EndPathNoPaint => {
                // `W n` establishes a clip without painting; a bare `n`
                // just discards the path.
                let clipping = self.pending_clip;
                if clipping {
                    self.finish_path(true);
                } else {
                    self.path_points.clear();
                }
                self.pending_clip = false;
            }

            ContentOp::InvokeXObject(name) => self.invoke_xobject(&name, resources, depth)?,

            ContentOp::BeginMarkedContent(_) => self.mc_stack.push(MarkedContentScope {
                mcid: None,
                pending_actual_text: None,
                had_actual_text: false,
            }),
            ContentOp::BeginMarkedContentProps(_, props) => {
                let dict = self.resolve_mc_props(&props, resources);
                let mcid = dict
                    .as_ref()
                    .and_then(|d| d.get("MCID"))
                    .and_then(|m| self.doc.resolve(m).as_integer())
                    .map(|m| m as i32);
                let actual_text = dict
                    .as_ref()
                    .and_then(|d| d.get("ActualText"))
                    .and_then(|a| self.doc.resolve(a).as_string())
                    .map(|s| s.to_text());
                self.mc_stack.push(MarkedContentScope {
                    mcid,
                    had_actual_text: actual_text.is_some(),
                    pending_actual_text: actual_text,
                });
            }
            ContentOp::EndMarkedContent => {
                // An ActualText never consumed by a text run still needs
                // surfacing; emit it as a zero-extent run at the current
                // text position.
                if let Some(scope) = self.mc_stack.pop() {
                    if let Some(text) = scope.pending_actual_text {
                        if !text.is_empty() {
                            let origin = self.text_render_matrix().transform_point(0.0, 0.0);
                            let line = Line {
                                start: origin,
                                end: origin,
                            };
                            self.events.push(ScanEvent::TextRun {
                                mcid: scope.mcid.or_else(|| self.current_mcid()),
                                text,
                                ascent: line,
                                descent: line,
                            });
                        }
                    }
                }
            }

            ContentOp::Other(_) => {}
        }
        Ok(())
    }

    fn current_mcid(&self) -> Option<i32> {
        self.mc_stack.iter().rev().find_map(|scope| scope.mcid)
    }

    fn move_text(&mut self, tx: f64, ty: f64) {
        self.text.line_matrix = Matrix::translation(tx, ty).multiply(&self.text.line_matrix);
        self.text.text_matrix = self.text.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.text.leading;
        self.move_text(0.0, -leading);
    }

    /// The matrix mapping text space to device space for the current run.
    fn text_render_matrix(&self) -> Matrix {
        self.text.text_matrix.multiply(&self.ctm)
    }

    fn show_text(&mut self, items: &[TextItem]) {
        // Decode and measure the whole run first, in text-space units.
        let mut raw_text = String::new();
        let mut advance = 0.0;
        let fs = self.text.font_size;
        let scale = self.text.horizontal_scale;
        for item in items {
            match item {
                TextItem::Text(bytes) => {
                    let decoded = decode_show_bytes(bytes);
                    for c in decoded.chars() {
                        advance += (GLYPH_WIDTH_EM * fs + self.text.char_spacing) * scale;
                        if c == ' ' {
                            advance += self.text.word_spacing * scale;
                        }
                    }
                    raw_text.push_str(&decoded);
                }
                TextItem::Offset(off) => {
                    advance -= off / 1000.0 * fs * scale;
                    // A large negative adjustment is an implicit word gap.
                    if *off < -TJ_SPACE_THRESHOLD && !raw_text.ends_with(' ') {
                        raw_text.push(' ');
                    }
                }
            }
        }

        // ActualText replaces the raw bytes for the whole scope; only the
        // first run in the scope carries it.
        let text = match self
            .mc_stack
            .iter_mut()
            .rev()
            .find(|scope| scope.had_actual_text)
        {
            Some(scope) => scope.pending_actual_text.take().unwrap_or_default(),
            None => raw_text,
        };

        let trm = self.text_render_matrix();
        let ascent_y = self.text.rise + 0.8 * fs;
        let descent_y = self.text.rise - 0.2 * fs;
        let ascent = Line {
            start: trm.transform_point(0.0, ascent_y),
            end: trm.transform_point(advance, ascent_y),
        };
        let descent = Line {
            start: trm.transform_point(0.0, descent_y),
            end: trm.transform_point(advance, descent_y),
        };
        self.events.push(ScanEvent::TextRun {
            mcid: self.current_mcid(),
            text,
            ascent,
            descent,
        });

        // Advance the text matrix past the run.
        self.text.text_matrix = Matrix::translation(advance, 0.0).multiply(&self.text.text_matrix);
    }

    fn add_path_point(&mut self, x: f64, y: f64) {
        self.path_points.push(self.ctm.transform_point(x, y));
    }

    fn finish_path(&mut self, clipping_only: bool) {
        let bounds = self
            .path_points
            .iter()
            .map(|&(x, y)| Rect::from_points(x, y, x, y))
            .reduce(|a, b| a.union(&b));
        if bounds.is_some() {
            self.events.push(ScanEvent::Path {
                mcid: self.current_mcid(),
                ctm: self.ctm,
                clipping_only,
                bounds,
            });
        }
        self.path_points.clear();
        self.pending_clip = false;
    }

    fn invoke_xobject(
        &mut self,
        name: &str,
        resources: Option<&PdfDictionary>,
        depth: usize,
    ) -> Result<()> {
        let entry = resources
            .and_then(|r| r.get("XObject"))
            .and_then(|x| self.doc.resolve_dict(x))
            .and_then(|xobjects| xobjects.get(name));
        let (xobject_id, stream) = match entry {
            Some(obj) => {
                let id = self.doc.reference_target(obj);
                match self.doc.resolve(obj).as_stream() {
                    Some(stream) => (id, stream),
                    None => return Ok(()),
                }
            }
            None => return Ok(()),
        };

        match stream.dict.get("Subtype").and_then(|s| s.as_name()) {
            Some("Image") => {
                self.events.push(ScanEvent::Image {
                    mcid: self.current_mcid(),
                    name: name.to_string(),
                    xobject: xobject_id,
                    ctm: self.ctm,
                });
            }
            Some("Form") if depth < 6 => {
                // Execute the form body under its matrix, with its own
                // resources falling back to the caller's.
                let saved_ctm = self.ctm;
                if let Some(values) = stream
                    .dict
                    .get("Matrix")
                    .and_then(|m| self.doc.resolve(m).as_array())
                {
                    let v: Vec<f64> = values.iter().filter_map(|o| o.as_number()).collect();
                    if v.len() == 6 {
                        self.ctm =
                            Matrix::from_parts(v[0], v[1], v[2], v[3], v[4], v[5]).multiply(&self.ctm);
                    }
                }
                let form_resources = stream
                    .dict
                    .get("Resources")
                    .and_then(|r| self.doc.resolve_dict(r));
                let content = match stream.decode() {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::debug!("skipping undecodable form XObject {}: {}", name, err);
                        self.ctm = saved_ctm;
                        return Ok(());
                    }
                };
                self.exec(&content, form_resources.or(resources), depth + 1)?;
                self.ctm = saved_ctm;
            }
            _ => {}
        }
        Ok(())
    }

    /// BDC properties are either an inline dictionary or a name into the
    /// resource dictionary's /Properties.
    fn resolve_mc_props(
        &self,
        props: &PdfObject,
        resources: Option<&PdfDictionary>,
    ) -> Option<PdfDictionary> {
        match props {
            PdfObject::Dictionary(dict) => Some(dict.clone()),
            PdfObject::Name(name) => resources
                .and_then(|r| r.get("Properties"))
                .and_then(|p| self.doc.resolve_dict(p))
                .and_then(|properties| properties.get(name.as_str()))
                .and_then(|entry| self.doc.resolve_dict(entry))
                .cloned(),
            _ => None,
        }
    }
}

/// Decode shown-text bytes without font information: UTF-16BE when a BOM
/// or embedded NULs suggest two-byte codes, Latin-1 otherwise.
fn decode_show_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && (bytes[0] == 0xfe && bytes[1] == 0xff) {
        return PdfString::new(bytes.to_vec()).to_text();
    }
    if bytes.len() >= 2 && bytes.len() % 2 == 0 && bytes.iter().step_by(2).all(|&b| b == 0) {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Accumulate the full text of a page with per-chunk bounds and MCIDs.
pub fn page_text(doc: &Document, page_id: ObjectId) -> Result<TextAccumulator> {
    let events = PageScanner::new(doc).scan(page_id)?;
    let mut acc = TextAccumulator::new();
    for event in &events {
        if let ScanEvent::TextRun {
            mcid,
            text,
            ascent,
            descent,
        } = event
        {
            let bounds = ascent.bounds().union(&descent.bounds());
            acc.push(text, Some(bounds), *mcid);
        }
    }
    Ok(acc)
}

/// Per-MCID text and union bounds for one page.
pub fn mcid_text_map(
    doc: &Document,
    page_id: ObjectId,
) -> Result<HashMap<i32, (String, Option<Rect>)>> {
    let events = PageScanner::new(doc).scan(page_id)?;
    let mut map: HashMap<i32, (String, Option<Rect>)> = HashMap::new();
    for event in &events {
        if let ScanEvent::TextRun {
            mcid: Some(mcid),
            text,
            ascent,
            descent,
        } = event
        {
            let run_bounds = ascent.bounds().union(&descent.bounds());
            let entry = map.entry(*mcid).or_insert_with(|| (String::new(), None));
            if !text.is_empty() {
                if !entry.0.is_empty()
                    && !entry.0.ends_with(char::is_whitespace)
                    && !text.starts_with(char::is_whitespace)
                {
                    entry.0.push(' ');
                }
                entry.0.push_str(text);
            }
            entry.1 = Some(match entry.1 {
                Some(existing) => existing.union(&run_bounds),
                None => run_bounds,
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfStream;

    /// A single-page document with the given content stream and resources.
    fn page_with_content(content: &[u8], resources: Option<PdfDictionary>) -> (Document, ObjectId) {
        let mut doc = Document::new();
        let mut stream_dict = PdfDictionary::new();
        stream_dict.insert("Length", PdfObject::Integer(content.len() as i64));
        let content_id = doc.add(PdfObject::Stream(PdfStream {
            dict: stream_dict,
            data: content.to_vec(),
        }));
        let mut page = PdfDictionary::new();
        page.insert("Type", PdfObject::name("Page"));
        page.insert(
            "Contents",
            PdfObject::Reference(content_id.number, content_id.generation),
        );
        if let Some(resources) = resources {
            page.insert("Resources", PdfObject::Dictionary(resources));
        }
        let page_id = doc.add(PdfObject::Dictionary(page));
        (doc, page_id)
    }

    #[test]
    fn test_text_run_with_mcid() {
        let (doc, page_id) = page_with_content(
            b"/P <</MCID 2>> BDC BT /F1 12 Tf 72 700 Td (Hi) Tj ET EMC",
            None,
        );
        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ScanEvent::TextRun {
                mcid,
                text,
                ascent,
                descent,
            } => {
                assert_eq!(*mcid, Some(2));
                assert_eq!(text, "Hi");
                // Baseline starts at (72, 700); ascent above, descent below.
                assert!(ascent.start.1 > 700.0);
                assert!(descent.start.1 < 700.0);
                assert!((ascent.start.0 - 72.0).abs() < 1e-9);
            }
            other => panic!("expected TextRun, got {other:?}"),
        }
    }

    #[test]
    fn test_actual_text_override() {
        let (doc, page_id) = page_with_content(
            b"/Span <</MCID 0 /ActualText (Ligature)>> BDC BT (L\x01g) Tj (x) Tj ET EMC",
            None,
        );
        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        let texts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::TextRun { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Ligature", ""]);
    }

    #[test]
    fn test_image_event_resolved_from_resources() {
        let mut doc = Document::new();
        let mut image_dict = PdfDictionary::new();
        image_dict.insert("Subtype", PdfObject::name("Image"));
        image_dict.insert("Width", PdfObject::Integer(1));
        image_dict.insert("Height", PdfObject::Integer(1));
        let image_id = doc.add(PdfObject::Stream(PdfStream {
            dict: image_dict,
            data: vec![0u8],
        }));

        let mut xobjects = PdfDictionary::new();
        xobjects.insert(
            "Im1",
            PdfObject::Reference(image_id.number, image_id.generation),
        );
        let mut resources = PdfDictionary::new();
        resources.insert("XObject", PdfObject::Dictionary(xobjects));

        let content = b"/Figure <</MCID 5>> BDC q 100 0 0 80 50 600 cm /Im1 Do Q EMC";
        let mut stream_dict = PdfDictionary::new();
        stream_dict.insert("Length", PdfObject::Integer(content.len() as i64));
        let content_id = doc.add(PdfObject::Stream(PdfStream {
            dict: stream_dict,
            data: content.to_vec(),
        }));
        let mut page = PdfDictionary::new();
        page.insert("Type", PdfObject::name("Page"));
        page.insert(
            "Contents",
            PdfObject::Reference(content_id.number, content_id.generation),
        );
        page.insert("Resources", PdfObject::Dictionary(resources));
        let page_id = doc.add(PdfObject::Dictionary(page));

        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ScanEvent::Image {
                mcid,
                name,
                xobject,
                ctm,
            } => {
                assert_eq!(*mcid, Some(5));
                assert_eq!(name, "Im1");
                assert_eq!(*xobject, Some(image_id));
                assert_eq!(ctm.e, 50.0);
                assert_eq!(ctm.f, 600.0);
            }
            other => panic!("expected Image, got {other:?}"),
        }
    }

    #[test]
    fn test_clip_only_path_flagged() {
        let (doc, page_id) =
            page_with_content(b"0 0 100 50 re W n 10 10 m 20 20 l S", None);
        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ScanEvent::Path {
                clipping_only,
                bounds,
                ..
            } => {
                assert!(*clipping_only);
                assert_eq!(bounds.unwrap(), Rect::from_points(0.0, 0.0, 100.0, 50.0));
            }
            other => panic!("expected Path, got {other:?}"),
        }
        match &events[1] {
            ScanEvent::Path { clipping_only, .. } => assert!(!*clipping_only),
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_n_emits_nothing() {
        let (doc, page_id) = page_with_content(b"0 0 100 50 re n", None);
        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_path_points_transformed_by_ctm() {
        let (doc, page_id) = page_with_content(b"q 2 0 0 2 0 0 cm 0 0 10 10 re f Q", None);
        let events = PageScanner::new(&doc).scan(page_id).unwrap();
        match &events[0] {
            ScanEvent::Path { bounds, .. } => {
                assert_eq!(bounds.unwrap(), Rect::from_points(0.0, 0.0, 20.0, 20.0));
            }
            other => panic!("expected Path, got {other:?}"),
        }
    }

    #[test]
    fn test_tj_kerning_does_not_split_words() {
        let (doc, page_id) =
            page_with_content(b"BT /F1 10 Tf [(Hel) -20 (lo) -400 (world)] TJ ET", None);
        let acc = page_text(&doc, page_id).unwrap();
        assert_eq!(acc.text(), "Hello world");
    }

    #[test]
    fn test_page_text_chunks_and_context() {
        let (doc, page_id) = page_with_content(
            b"BT /F1 10 Tf 10 100 Td (before) Tj 10 50 Td (after) Tj ET",
            None,
        );
        let acc = page_text(&doc, page_id).unwrap();
        assert_eq!(acc.text(), "before after");
        assert_eq!(acc.chunks().len(), 2);
        assert_eq!(acc.context_before(7, 100), "before ");
        assert_eq!(acc.context_after(7, 100), "after");
    }

    #[test]
    fn test_mcid_text_map() {
        let (doc, page_id) = page_with_content(
            b"/H1 <</MCID 0>> BDC BT 10 700 Td (Title) Tj ET EMC /P <</MCID 1>> BDC BT 10 650 Td (Body) Tj ET EMC",
            None,
        );
        let map = mcid_text_map(&doc, page_id).unwrap();
        assert_eq!(map.get(&0).unwrap().0, "Title");
        assert_eq!(map.get(&1).unwrap().0, "Body");
        let title_bounds = map.get(&0).unwrap().1.unwrap();
        assert!(title_bounds.ury > 700.0);
    }

    #[test]
    fn test_form_xobject_recursion() {
        let mut doc = Document::new();
        let form_content = b"BT /F1 12 Tf 0 0 Td (inner) Tj ET";
        let mut form_dict = PdfDictionary::new();
        form_dict.insert("Subtype", PdfObject::name("Form"));
        form_dict.insert("Length", PdfObject::Integer(form_content.len() as i64));
        let form_id = doc.add(PdfObject::Stream(PdfStream {
            dict: form_dict,
            data: form_content.to_vec(),
        }));
        let mut xobjects = PdfDictionary::new();
        xobjects.insert(
            "Fm0",
            PdfObject::Reference(form_id.number, form_id.generation),
        );
        let mut resources = PdfDictionary::new();
        resources.insert("XObject", PdfObject::Dictionary(xobjects));

        let content = b"/Fm0 Do";
        let mut stream_dict = PdfDictionary::new();
        stream_dict.insert("Length", PdfObject::Integer(content.len() as i64));
        let content_id = doc.add(PdfObject::Stream(PdfStream {
            dict: stream_dict,
            data: content.to_vec(),
        }));
        let mut page = PdfDictionary::new();
        page.insert("Type", PdfObject::name("Page"));
        page.insert(
            "Contents",
            PdfObject::Reference(content_id.number, content_id.generation),
        );
        page.insert("Resources", PdfObject::Dictionary(resources));
        let page_id = doc.add(PdfObject::Dictionary(page));

        let acc = page_text(&doc, page_id).unwrap();
        assert_eq!(acc.text(), "inner");
    }
}
