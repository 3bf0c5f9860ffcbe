//! Whole-document loading.
//!
//! Loads every object reachable through the cross-reference data into an
//! in-memory table. Compressed object streams are expanded eagerly so the
//! rest of the crate never needs to know where an object was stored. When
//! the xref chain is unusable, lenient mode falls back to scanning the file
//! for `N G obj` headers.

use super::lexer::{Lexer, Token};
use super::objects::{PdfDictionary, PdfObject};
use super::xref::{parse_object_stream, parse_xref_chain, XrefEntry};
use super::{ParseError, ParseOptions, ParseResult};
use std::collections::HashMap;

/// Everything the document model needs from the file.
pub struct LoadedDocument {
    pub version: String,
    pub objects: HashMap<(u32, u16), PdfObject>,
    pub trailer: PdfDictionary,
}

/// Parse a PDF byte stream into its object table.
pub fn load_document(data: &[u8], options: &ParseOptions) -> ParseResult<LoadedDocument> {
    let version = find_version(data)?;

    let mut loaded = match find_startxref(data)
        .and_then(|offset| parse_xref_chain(data, offset, options))
    {
        Ok(xref) => load_from_xref(data, xref, options)?,
        Err(err) if options.lenient => {
            tracing::warn!("xref chain unusable ({err}), rebuilding by scanning");
            load_by_scanning(data, options)?
        }
        Err(err) => return Err(err),
    };
    if loaded.objects.is_empty() && options.lenient {
        loaded = load_by_scanning(data, options)?;
    }

    if loaded.objects.is_empty() {
        return Err(ParseError::InvalidXref("document has no objects".to_string()));
    }
    Ok(LoadedDocument {
        version,
        objects: loaded.objects,
        trailer: loaded.trailer,
    })
}

struct LoadedObjects {
    objects: HashMap<(u32, u16), PdfObject>,
    trailer: PdfDictionary,
}

fn find_version(data: &[u8]) -> ParseResult<String> {
    // The header must be near the start but not necessarily at byte 0.
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or(ParseError::InvalidHeader)?;
    let rest = &data[pos + 5..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n' || b == b' ')
        .unwrap_or(rest.len().min(8));
    let version = String::from_utf8_lossy(&rest[..end]).trim().to_string();
    if version.is_empty() {
        return Err(ParseError::InvalidHeader);
    }
    Ok(version)
}

fn find_startxref(data: &[u8]) -> ParseResult<usize> {
    // Search the tail for the last `startxref` keyword.
    let tail_len = data.len().min(2048);
    let tail = &data[data.len() - tail_len..];
    let pos = tail
        .windows(9)
        .rposition(|w| w == b"startxref")
        .ok_or_else(|| ParseError::InvalidXref("startxref not found".to_string()))?;
    let absolute = data.len() - tail_len + pos + 9;
    let mut lexer = Lexer::new_at(data, absolute);
    match lexer.next_token()? {
        Token::Integer(offset) if offset >= 0 => Ok(offset as usize),
        other => Err(ParseError::InvalidXref(format!(
            "invalid startxref value: {other:?}"
        ))),
    }
}

fn load_from_xref(
    data: &[u8],
    xref: super::xref::XrefData,
    options: &ParseOptions,
) -> ParseResult<LoadedObjects> {
    if xref.entries.len() > options.max_objects {
        return Err(ParseError::InvalidXref(format!(
            "document declares {} objects (limit {})",
            xref.entries.len(),
            options.max_objects
        )));
    }

    let mut objects = HashMap::new();
    let mut in_stream: Vec<(u32, u32)> = Vec::new();

    for (&num, &entry) in &xref.entries {
        match entry {
            XrefEntry::Free => {}
            XrefEntry::Offset { offset, generation } => {
                match parse_indirect_object(data, offset, options) {
                    Ok((parsed_num, parsed_gen, obj)) => {
                        // Trust the object header over the xref entry.
                        if parsed_num != num {
                            tracing::debug!(
                                "xref entry {} resolves to object {} at offset {}",
                                num,
                                parsed_num,
                                offset
                            );
                        }
                        objects.insert((parsed_num, parsed_gen), obj);
                    }
                    Err(err) if options.lenient => {
                        tracing::debug!(
                            "skipping unreadable object {} {} at offset {}: {}",
                            num,
                            generation,
                            offset,
                            err
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            XrefEntry::InStream { stream_num, .. } => in_stream.push((num, stream_num)),
        }
    }

    // Expand object streams after their containers are loaded.
    let mut expanded: HashMap<u32, Vec<(u32, PdfObject)>> = HashMap::new();
    for &(_, stream_num) in &in_stream {
        if expanded.contains_key(&stream_num) {
            continue;
        }
        let container = objects.get(&(stream_num, 0)).and_then(|o| o.as_stream());
        let contents = match container {
            Some(stream) => match parse_object_stream(&stream.dict, &stream.data, options) {
                Ok(contents) => contents,
                Err(err) if options.lenient => {
                    tracing::debug!("skipping unreadable object stream {}: {}", stream_num, err);
                    Vec::new()
                }
                Err(err) => return Err(err),
            },
            None => Vec::new(),
        };
        expanded.insert(stream_num, contents);
    }
    for (num, stream_num) in in_stream {
        if let Some(contents) = expanded.get(&stream_num) {
            if let Some((_, obj)) = contents.iter().find(|(n, _)| *n == num) {
                // Compressed objects always have generation 0.
                objects.insert((num, 0), obj.clone());
            }
        }
    }

    // The containers themselves are carriers, not document content.
    objects.retain(|_, obj| {
        !matches!(
            obj.as_dict().and_then(|d| d.get_type()),
            Some("ObjStm") | Some("XRef")
        )
    });

    Ok(LoadedObjects {
        objects,
        trailer: xref.trailer,
    })
}

/// Parse `N G obj ... endobj` at a byte offset.
fn parse_indirect_object(
    data: &[u8],
    offset: usize,
    options: &ParseOptions,
) -> ParseResult<(u32, u16, PdfObject)> {
    if offset >= data.len() {
        return Err(ParseError::SyntaxError {
            position: offset,
            message: "object offset beyond end of file".to_string(),
        });
    }
    let mut lexer = Lexer::new_at(data, offset);
    let num = match lexer.next_token()? {
        Token::Integer(n) if n >= 0 => n as u32,
        other => {
            return Err(ParseError::SyntaxError {
                position: offset,
                message: format!("expected object number, found {other:?}"),
            })
        }
    };
    let gen = match lexer.next_token()? {
        Token::Integer(g) if (0..=65_535).contains(&g) => g as u16,
        other => {
            return Err(ParseError::SyntaxError {
                position: offset,
                message: format!("expected generation number, found {other:?}"),
            })
        }
    };
    if lexer.next_token()? != Token::Obj {
        return Err(ParseError::SyntaxError {
            position: offset,
            message: "expected obj keyword".to_string(),
        });
    }
    let obj = PdfObject::parse(&mut lexer, options)?;
    Ok((num, gen, obj))
}

/// Last-resort recovery: scan the whole file for `N G obj` headers and a
/// trailer dictionary.
fn load_by_scanning(data: &[u8], options: &ParseOptions) -> ParseResult<LoadedObjects> {
    let mut objects = HashMap::new();
    let needle = b" obj";
    let mut i = 0;
    while let Some(found) = data[i..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + i)
    {
        // Walk backwards over "N G" before the keyword.
        let header_start = object_header_start(data, found);
        if let Some(start) = header_start {
            if let Ok((num, gen, obj)) = parse_indirect_object(data, start, options) {
                objects.insert((num, gen), obj);
            }
        }
        i = found + needle.len();
    }

    // Pick up the trailer (or, failing that, synthesize one from a catalog).
    let mut trailer = PdfDictionary::new();
    if let Some(pos) = data
        .windows(7)
        .rposition(|w| w == b"trailer")
    {
        let mut lexer = Lexer::new_at(data, pos + 7);
        if let Ok(PdfObject::Dictionary(dict)) = PdfObject::parse(&mut lexer, options) {
            trailer = dict;
        }
    }
    if !trailer.contains_key("Root") {
        if let Some(((num, gen), _)) = objects.iter().find(|(_, obj)| {
            obj.as_dict()
                .map(|d| d.get_type() == Some("Catalog"))
                .unwrap_or(false)
        }) {
            trailer.insert("Root", PdfObject::Reference(*num, *gen));
        }
    }

    Ok(LoadedObjects { objects, trailer })
}

/// Given the position of `" obj"`, back up over the generation and object
/// numbers to the start of the header.
fn object_header_start(data: &[u8], obj_kw_pos: usize) -> Option<usize> {
    let mut i = obj_kw_pos;
    let mut seen_fields = 0;
    while seen_fields < 2 {
        // Skip whitespace backwards.
        while i > 0 && data[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        let end = i;
        while i > 0 && data[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i == end {
            return None;
        }
        seen_fields += 1;
    }
    Some(i)
}
