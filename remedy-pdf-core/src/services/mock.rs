//! Deterministic in-memory providers.
//!
//! Used by the test suite and local runs. Every provider counts its calls
//! so tests can assert on invocation behavior (chunk submissions, dedupe
//! hits, skipped autotagging).

use super::{
    AccessibilityChecker, AutotagOutput, AutotagProvider, CheckOutput, GenerationProvider,
    PageBitmap, PageRange, PageRasterizer, RasterizedDocument,
};
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::parser::objects::{PdfArray, PdfDictionary, PdfObject};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Autotagger that attaches a minimal structure tree (a Document element
/// with one P per page) to its input.
#[derive(Default)]
pub struct MockAutotagProvider {
    calls: AtomicUsize,
    /// Page count of each submitted PDF, in submission order
    submitted_page_counts: Mutex<Vec<usize>>,
    /// When set, every call fails (for best-effort path tests)
    fail: bool,
}

impl MockAutotagProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submitted_page_counts(&self) -> Vec<usize> {
        self.submitted_page_counts.lock().unwrap().clone()
    }
}

impl AutotagProvider for MockAutotagProvider {
    fn autotag(&self, pdf: &[u8]) -> Result<AutotagOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PdfError::ExternalService("autotag unavailable".to_string()));
        }
        let mut doc = Document::from_bytes(pdf)?;
        self.submitted_page_counts
            .lock()
            .unwrap()
            .push(doc.page_count());
        attach_minimal_structure(&mut doc)?;
        Ok(AutotagOutput {
            tagged_pdf: doc.to_bytes()?,
            report: b"{\"taggedBy\":\"mock\"}".to_vec(),
        })
    }
}

/// Give the document a Document-rooted structure tree with one paragraph
/// element per page. Replaces any existing tree.
fn attach_minimal_structure(doc: &mut Document) -> Result<()> {
    let page_ids = doc.page_ids();
    let root_id = doc.reserve_id();
    let doc_elem_id = doc.reserve_id();

    let mut kids = PdfArray::new();
    for page_id in &page_ids {
        let mut p = PdfDictionary::new();
        p.insert("Type", PdfObject::name("StructElem"));
        p.insert("S", PdfObject::name("P"));
        p.insert(
            "P",
            PdfObject::Reference(doc_elem_id.number, doc_elem_id.generation),
        );
        p.insert(
            "Pg",
            PdfObject::Reference(page_id.number, page_id.generation),
        );
        p.insert("K", PdfObject::Integer(0));
        let p_id = doc.add(PdfObject::Dictionary(p));
        kids.push(PdfObject::Reference(p_id.number, p_id.generation));
    }

    let mut doc_elem = PdfDictionary::new();
    doc_elem.insert("Type", PdfObject::name("StructElem"));
    doc_elem.insert("S", PdfObject::name("Document"));
    doc_elem.insert(
        "P",
        PdfObject::Reference(root_id.number, root_id.generation),
    );
    doc_elem.insert("K", PdfObject::Array(kids));
    doc.set(doc_elem_id, PdfObject::Dictionary(doc_elem));

    let mut tree_root = PdfDictionary::new();
    tree_root.insert("Type", PdfObject::name("StructTreeRoot"));
    tree_root.insert(
        "K",
        PdfObject::Reference(doc_elem_id.number, doc_elem_id.generation),
    );
    tree_root.insert("ParentTree", {
        let mut nums = PdfDictionary::new();
        nums.insert("Nums", PdfObject::Array(PdfArray::new()));
        PdfObject::Dictionary(nums)
    });
    doc.set(root_id, PdfObject::Dictionary(tree_root));
    doc.set_catalog_entry(
        "StructTreeRoot",
        PdfObject::Reference(root_id.number, root_id.generation),
    )?;
    let mut mark_info = PdfDictionary::new();
    mark_info.insert("Marked", PdfObject::Boolean(true));
    doc.set_catalog_entry("MarkInfo", PdfObject::Dictionary(mark_info))?;
    Ok(())
}

/// Checker that returns a canned report.
pub struct MockAccessibilityChecker {
    calls: AtomicUsize,
    report_json: String,
    fail: bool,
}

impl Default for MockAccessibilityChecker {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            report_json: r#"{"Detailed Report":{},"Summary":{"Failed":0,"Passed":0}}"#.to_string(),
            fail: false,
        }
    }
}

impl MockAccessibilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(report_json: impl Into<String>) -> Self {
        Self {
            report_json: report_json.into(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AccessibilityChecker for MockAccessibilityChecker {
    fn check(&self, pdf: &[u8], _page_range: Option<PageRange>) -> Result<CheckOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PdfError::ExternalService("checker unavailable".to_string()));
        }
        Ok(CheckOutput {
            pdf: pdf.to_vec(),
            report_json: self.report_json.clone(),
        })
    }
}

/// Generator with scripted responses and call counters.
pub struct MockGenerationProvider {
    image_alt: String,
    link_alt: String,
    title_response: String,
    image_calls: AtomicUsize,
    link_calls: AtomicUsize,
    title_calls: AtomicUsize,
    /// Every (mime, context_before, context_after) seen by image calls
    image_requests: Mutex<Vec<(String, String, String)>>,
}

impl Default for MockGenerationProvider {
    fn default() -> Self {
        Self {
            image_alt: "A generated description of the image".to_string(),
            link_alt: "A generated description of the link".to_string(),
            title_response: "Generated Document Title".to_string(),
            image_calls: AtomicUsize::new(0),
            link_calls: AtomicUsize::new(0),
            title_calls: AtomicUsize::new(0),
            image_requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockGenerationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title_response: title.into(),
            ..Self::default()
        }
    }

    pub fn with_image_alt(alt: impl Into<String>) -> Self {
        Self {
            image_alt: alt.into(),
            ..Self::default()
        }
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn link_calls(&self) -> usize {
        self.link_calls.load(Ordering::SeqCst)
    }

    pub fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }

    pub fn image_requests(&self) -> Vec<(String, String, String)> {
        self.image_requests.lock().unwrap().clone()
    }
}

impl GenerationProvider for MockGenerationProvider {
    fn alt_text_for_image(
        &self,
        _image: &[u8],
        mime: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.image_requests.lock().unwrap().push((
            mime.to_string(),
            context_before.to_string(),
            context_after.to_string(),
        ));
        Ok(self.image_alt.clone())
    }

    fn alt_text_for_link(
        &self,
        _target: Option<&str>,
        _link_text: &str,
        _context_before: &str,
        _context_after: &str,
    ) -> Result<String> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.link_alt.clone())
    }

    fn title(&self, _current_title: &str, _extracted_text: &str) -> Result<String> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.title_response.clone())
    }
}

/// Rasterizer producing blank white pages at the requested dpi.
#[derive(Default)]
pub struct MockRasterizer {
    open_calls: AtomicUsize,
    rendered_pages: Arc<Mutex<Vec<u32>>>,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Page numbers rendered across all sessions, in order.
    pub fn rendered_pages(&self) -> Vec<u32> {
        self.rendered_pages.lock().unwrap().clone()
    }
}

impl PageRasterizer for MockRasterizer {
    fn open(&self, pdf: &[u8], dpi: u32) -> Result<Box<dyn RasterizedDocument>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let doc = Document::from_bytes(pdf)?;
        let page_sizes: Vec<(f64, f64)> = doc
            .page_ids()
            .iter()
            .map(|&id| {
                let rect = doc.page_media_box(id);
                (rect.width(), rect.height())
            })
            .collect();
        Ok(Box::new(MockRasterSession {
            dpi,
            page_sizes,
            rendered: Arc::clone(&self.rendered_pages),
        }))
    }
}

struct MockRasterSession {
    dpi: u32,
    page_sizes: Vec<(f64, f64)>,
    rendered: Arc<Mutex<Vec<u32>>>,
}

impl RasterizedDocument for MockRasterSession {
    fn render_page(&mut self, page_number: u32) -> Result<PageBitmap> {
        let (w_pt, h_pt) = self
            .page_sizes
            .get((page_number as usize).saturating_sub(1))
            .copied()
            .ok_or(PdfError::InvalidPageNumber(page_number))?;
        self.rendered.lock().unwrap().push(page_number);
        let width = ((w_pt / 72.0) * self.dpi as f64).round().max(1.0) as u32;
        let height = ((h_pt / 72.0) * self.dpi as f64).round().max(1.0) as u32;
        Ok(PageBitmap {
            width,
            height,
            bgra: vec![0xff; (width * height * 4) as usize],
        })
    }
}
