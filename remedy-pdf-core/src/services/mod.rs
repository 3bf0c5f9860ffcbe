//! Backend service providers.
//!
//! The engine talks to four external capabilities through pluggable,
//! synchronous traits: the autotagger, the accessibility checker, the
//! alt-text/title generator, and the page rasterizer. Each has two
//! implementations — a deterministic in-memory one for tests and local
//! runs (`mock`), and an HTTP adapter to the real vendors behind the
//! `remote-services` feature (`remote`). The engine itself never branches
//! on which implementation it holds.

pub mod mock;
#[cfg(feature = "remote-services")]
pub mod remote;

pub use mock::{MockAccessibilityChecker, MockAutotagProvider, MockGenerationProvider, MockRasterizer};

use crate::error::Result;

/// A contiguous 1-based page range, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn len(&self) -> u32 {
        self.last.saturating_sub(self.first) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

/// Result of autotagging a document.
#[derive(Debug, Clone)]
pub struct AutotagOutput {
    /// The input PDF with a generated structure tree
    pub tagged_pdf: Vec<u8>,
    /// Vendor tagging report (opaque)
    pub report: Vec<u8>,
}

/// Result of an accessibility check.
#[derive(Debug, Clone)]
pub struct CheckOutput {
    /// The checked PDF as returned by the vendor (may equal the input)
    pub pdf: Vec<u8>,
    /// Machine-readable report JSON (opaque to the pipeline, parsed only
    /// by the retag decider)
    pub report_json: String,
}

/// Adds a structure tree to an untagged (or poorly tagged) PDF.
///
/// May fail transiently; callers treat failures as best-effort.
pub trait AutotagProvider {
    fn autotag(&self, pdf: &[u8]) -> Result<AutotagOutput>;
}

/// Runs a vendor accessibility rule check over a PDF.
pub trait AccessibilityChecker {
    fn check(&self, pdf: &[u8], page_range: Option<PageRange>) -> Result<CheckOutput>;
}

/// Generates titles and alternative text (an LLM behind the curtain).
pub trait GenerationProvider {
    /// Alt text for a raster image, with page text surrounding its
    /// occurrence for context.
    fn alt_text_for_image(
        &self,
        image: &[u8],
        mime: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String>;

    /// Alt text for a link, given its target and visible text.
    fn alt_text_for_link(
        &self,
        target: Option<&str>,
        link_text: &str,
        context_before: &str,
        context_after: &str,
    ) -> Result<String>;

    /// A document title from the existing title (possibly empty) and
    /// extracted early-page text.
    fn title(&self, current_title: &str, extracted_text: &str) -> Result<String>;
}

/// A rendered page: BGRA32 pixels, row-major, top row first.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pub width: u32,
    pub height: u32,
    pub bgra: Vec<u8>,
}

impl PageBitmap {
    /// Crop to a pixel rectangle, clamped to the bitmap.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> PageBitmap {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x).max(1);
        let height = height.min(self.height - y).max(1);
        let mut bgra = Vec::with_capacity((width * height * 4) as usize);
        for row in y..y + height {
            let start = ((row * self.width + x) * 4) as usize;
            let end = start + (width * 4) as usize;
            bgra.extend_from_slice(&self.bgra[start..end]);
        }
        PageBitmap {
            width,
            height,
            bgra,
        }
    }

    /// Encode as PNG (RGBA under the hood).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        use image::{ImageBuffer, Rgba};
        let mut rgba = self.bgra.clone();
        for pixel in rgba.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let buffer: ImageBuffer<Rgba<u8>, _> =
            ImageBuffer::from_raw(self.width, self.height, rgba).ok_or_else(|| {
                crate::error::PdfError::Rasterization("bitmap size mismatch".to_string())
            })?;
        let mut out = std::io::Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| crate::error::PdfError::Rasterization(format!("png encode: {e}")))?;
        Ok(out.into_inner())
    }
}

/// An open rasterization session for one document. The handle owns any
/// vendor-side state and releases it on drop (scoped acquisition).
pub trait RasterizedDocument {
    /// Render a page (1-based) at the dpi the document was opened with.
    fn render_page(&mut self, page_number: u32) -> Result<PageBitmap>;
}

/// Opens documents for page rasterization.
pub trait PageRasterizer {
    fn open(&self, pdf: &[u8], dpi: u32) -> Result<Box<dyn RasterizedDocument>>;
}

/// Sniff an image MIME type from magic bytes. Unknown data is reported as
/// a generic octet stream rather than guessed.
pub fn sniff_image_mime(data: &[u8]) -> &'static str {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];
    const JP2: &[u8] = &[0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20];
    if data.starts_with(PNG) {
        "image/png"
    } else if data.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if data.starts_with(JP2) || data.starts_with(&[0xff, 0x4f, 0xff, 0x51]) {
        "image/jp2"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_len() {
        assert_eq!(PageRange::new(1, 3).len(), 3);
        assert_eq!(PageRange::new(7, 7).len(), 1);
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_image_mime(&[0x89, b'P', b'N', b'G', 0x0d]), "image/png");
        assert_eq!(sniff_image_mime(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(
            sniff_image_mime(&[0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d]),
            "image/jp2"
        );
        assert_eq!(sniff_image_mime(b"plain bytes"), "application/octet-stream");
    }

    #[test]
    fn test_bitmap_crop_clamps() {
        let bitmap = PageBitmap {
            width: 4,
            height: 4,
            bgra: (0..64).collect(),
        };
        let crop = bitmap.crop(2, 2, 10, 10);
        assert_eq!(crop.width, 2);
        assert_eq!(crop.height, 2);
        assert_eq!(crop.bgra.len(), 16);
        // Top-left pixel of the crop is pixel (2,2) of the source.
        assert_eq!(crop.bgra[0], ((2 * 4 + 2) * 4) as u8);
    }

    #[test]
    fn test_bitmap_png_roundtrip() {
        let bitmap = PageBitmap {
            width: 2,
            height: 2,
            bgra: vec![255; 16],
        };
        let png = bitmap.to_png().unwrap();
        assert_eq!(sniff_image_mime(&png), "image/png");
    }
}
