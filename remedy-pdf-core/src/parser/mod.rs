//! PDF parsing for the remediation engine.
//!
//! A reduced, in-memory PDF parser: the engine always receives the whole
//! document as a byte stream, so everything here works over `&[u8]` slices
//! rather than generic readers. The parser covers what remediation needs to
//! see — the object graph, cross-reference data (classic tables, xref
//! streams and compressed object streams) and page content streams. It does
//! not decrypt, render, or interpret fonts.

pub mod filters;
pub mod lexer;
pub mod objects;
pub mod reader;
pub mod xref;

pub use lexer::{Lexer, Token};
pub use objects::{PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString};
pub use reader::load_document;

use thiserror::Error;

/// Errors produced while parsing PDF syntax.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Invalid PDF header")]
    InvalidHeader,

    #[error("Invalid cross-reference table: {0}")]
    InvalidXref(String),

    #[error("Unsupported stream filter: {0}")]
    UnsupportedFilter(String),

    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    #[error("Invalid object stream: {0}")]
    InvalidObjectStream(String),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Options controlling parser strictness.
///
/// Lenient mode recovers from minor malformations (bad stream lengths,
/// stray tokens) the way real-world PDFs require; strict mode surfaces them.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Recover from recoverable malformations instead of failing
    pub lenient: bool,
    /// Maximum number of objects a single document may declare
    pub max_objects: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            lenient: true,
            max_objects: 1_000_000,
        }
    }
}

impl ParseOptions {
    /// Strict parsing: every malformation is an error.
    pub fn strict() -> Self {
        Self {
            lenient: false,
            ..Self::default()
        }
    }
}
