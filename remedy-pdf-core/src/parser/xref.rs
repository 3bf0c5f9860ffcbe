//! Cross-reference parsing: classic tables, xref streams and object streams.
//!
//! A document's xref data may be spread over a chain of tables/streams
//! linked by `/Prev`. Entries from newer sections win over older ones.
//! Hybrid-reference files additionally point at an xref stream via
//! `/XRefStm`.

use super::filters::decode_stream_data;
use super::lexer::{Lexer, Token};
use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseOptions, ParseResult};
use std::collections::HashMap;

/// Where an object's bytes live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XrefEntry {
    /// Object starts at this byte offset (generation number attached)
    Offset { offset: usize, generation: u16 },
    /// Object is stored compressed inside an object stream
    InStream { stream_num: u32, index: u32 },
    /// Free entry
    Free,
}

/// Parsed cross-reference data: entry per object number plus the merged
/// trailer dictionary (first trailer in the chain wins for Root/Info).
#[derive(Debug, Default)]
pub struct XrefData {
    pub entries: HashMap<u32, XrefEntry>,
    pub trailer: PdfDictionary,
}

/// Walk the xref chain starting at `start_offset`, merging sections.
pub fn parse_xref_chain(
    data: &[u8],
    start_offset: usize,
    options: &ParseOptions,
) -> ParseResult<XrefData> {
    let mut result = XrefData::default();
    let mut offset = Some(start_offset);
    let mut visited = std::collections::HashSet::new();

    while let Some(at) = offset {
        if !visited.insert(at) {
            // Cycle in the Prev chain.
            break;
        }
        let section = parse_xref_section(data, at, options)?;
        for (num, entry) in section.entries {
            result.entries.entry(num).or_insert(entry);
        }
        // Hybrid files: the classic table points at a parallel xref stream.
        if let Some(xref_stm) = section
            .trailer
            .get("XRefStm")
            .and_then(|o| o.as_integer())
        {
            if visited.insert(xref_stm as usize) {
                if let Ok(hybrid) = parse_xref_section(data, xref_stm as usize, options) {
                    for (num, entry) in hybrid.entries {
                        result.entries.entry(num).or_insert(entry);
                    }
                }
            }
        }
        let prev = section.trailer.get("Prev").and_then(|o| o.as_integer());
        for (key, value) in section.trailer.0 {
            result.trailer.0.entry(key).or_insert(value);
        }
        offset = prev.map(|p| p as usize);
    }

    if result.entries.is_empty() {
        return Err(ParseError::InvalidXref(
            "no cross-reference entries found".to_string(),
        ));
    }
    Ok(result)
}

/// Parse a single xref section (classic table or xref stream) at `offset`.
fn parse_xref_section(
    data: &[u8],
    offset: usize,
    options: &ParseOptions,
) -> ParseResult<XrefData> {
    if offset >= data.len() {
        return Err(ParseError::InvalidXref(format!(
            "xref offset {offset} beyond end of file"
        )));
    }
    let mut lexer = Lexer::new_at(data, offset);
    let token = lexer.next_token()?;
    match token {
        Token::Xref => parse_classic_table(&mut lexer, options),
        Token::Integer(_) => {
            // `N G obj` introducing an xref stream.
            lexer.push_token(token);
            parse_xref_stream(&mut lexer, options)
        }
        other => Err(ParseError::InvalidXref(format!(
            "expected xref table or stream at offset {offset}, found {other:?}"
        ))),
    }
}

fn parse_classic_table(lexer: &mut Lexer<'_>, options: &ParseOptions) -> ParseResult<XrefData> {
    let mut entries = HashMap::new();
    loop {
        let token = lexer.next_token()?;
        match token {
            Token::Trailer => break,
            Token::Integer(start) => {
                let count = match lexer.next_token()? {
                    Token::Integer(c) => c,
                    other => {
                        return Err(ParseError::InvalidXref(format!(
                            "expected subsection count, found {other:?}"
                        )))
                    }
                };
                for i in 0..count {
                    let offset = match lexer.next_token()? {
                        Token::Integer(o) => o,
                        other => {
                            return Err(ParseError::InvalidXref(format!(
                                "expected entry offset, found {other:?}"
                            )))
                        }
                    };
                    let generation = match lexer.next_token()? {
                        Token::Integer(g) => g,
                        other => {
                            return Err(ParseError::InvalidXref(format!(
                                "expected entry generation, found {other:?}"
                            )))
                        }
                    };
                    let kind = match lexer.next_token()? {
                        Token::Keyword(n) => n,
                        other => {
                            return Err(ParseError::InvalidXref(format!(
                                "expected entry type, found {other:?}"
                            )))
                        }
                    };
                    let num = (start + i) as u32;
                    let entry = match kind.as_str() {
                        "n" => XrefEntry::Offset {
                            offset: offset as usize,
                            generation: generation as u16,
                        },
                        "f" => XrefEntry::Free,
                        other => {
                            return Err(ParseError::InvalidXref(format!(
                                "unknown xref entry type '{other}'"
                            )))
                        }
                    };
                    entries.entry(num).or_insert(entry);
                }
            }
            other => {
                return Err(ParseError::InvalidXref(format!(
                    "unexpected token in xref table: {other:?}"
                )))
            }
        }
    }
    let trailer_obj = PdfObject::parse(lexer, options)?;
    let trailer = match trailer_obj {
        PdfObject::Dictionary(d) => d,
        _ => {
            return Err(ParseError::InvalidXref(
                "trailer is not a dictionary".to_string(),
            ))
        }
    };
    Ok(XrefData { entries, trailer })
}

fn parse_xref_stream(lexer: &mut Lexer<'_>, options: &ParseOptions) -> ParseResult<XrefData> {
    // Skip "N G obj".
    let _num = lexer.next_token()?;
    let _gen = lexer.next_token()?;
    let obj_kw = lexer.next_token()?;
    if obj_kw != Token::Obj {
        return Err(ParseError::InvalidXref(
            "expected obj keyword before xref stream".to_string(),
        ));
    }
    let obj = PdfObject::parse(lexer, options)?;
    let stream = obj
        .as_stream()
        .ok_or_else(|| ParseError::InvalidXref("xref object is not a stream".to_string()))?;
    let dict = &stream.dict;
    if dict.get_type() != Some("XRef") {
        return Err(ParseError::InvalidXref(
            "xref stream is not /Type /XRef".to_string(),
        ));
    }

    let w: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| o.as_integer().map(|i| i as usize))
                .collect()
        })
        .ok_or_else(|| ParseError::InvalidXref("xref stream missing /W".to_string()))?;
    if w.len() < 3 {
        return Err(ParseError::InvalidXref(
            "xref stream /W must have 3 fields".to_string(),
        ));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => arr.iter().filter_map(|o| o.as_integer()).collect(),
        None => vec![0, size],
    };

    let decoded = stream.decode()?;
    let row_len: usize = w.iter().sum();
    if row_len == 0 {
        return Err(ParseError::InvalidXref("xref stream /W is all-zero".to_string()));
    }

    let mut entries = HashMap::new();
    let mut rows = decoded.chunks_exact(row_len);
    for pair in index.chunks_exact(2) {
        let (start, count) = (pair[0], pair[1]);
        for i in 0..count {
            let row = match rows.next() {
                Some(r) => r,
                None => break,
            };
            let mut fields = [0u64; 3];
            let mut cursor = 0;
            for (fi, &width) in w.iter().take(3).enumerate() {
                let mut value: u64 = 0;
                for _ in 0..width {
                    value = (value << 8) | row[cursor] as u64;
                    cursor += 1;
                }
                fields[fi] = value;
            }
            // A zero-width type field defaults to type 1.
            let kind = if w[0] == 0 { 1 } else { fields[0] };
            let num = (start + i) as u32;
            let entry = match kind {
                0 => XrefEntry::Free,
                1 => XrefEntry::Offset {
                    offset: fields[1] as usize,
                    generation: fields[2] as u16,
                },
                2 => XrefEntry::InStream {
                    stream_num: fields[1] as u32,
                    index: fields[2] as u32,
                },
                other => {
                    return Err(ParseError::InvalidXref(format!(
                        "unknown xref stream entry type {other}"
                    )))
                }
            };
            entries.entry(num).or_insert(entry);
        }
    }

    Ok(XrefData {
        entries,
        trailer: dict.clone(),
    })
}

/// Expand a compressed object stream (`/Type /ObjStm`) into its objects.
pub fn parse_object_stream(
    stream_dict: &PdfDictionary,
    stream_data: &[u8],
    options: &ParseOptions,
) -> ParseResult<Vec<(u32, PdfObject)>> {
    let n = stream_dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| ParseError::InvalidObjectStream("missing /N".to_string()))?;
    let first = stream_dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| ParseError::InvalidObjectStream("missing /First".to_string()))?
        as usize;

    let decoded = decode_stream_data(stream_dict, stream_data)?;

    // Header: N pairs of (object number, offset relative to /First).
    let mut header = Lexer::new(&decoded);
    let mut locations = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let num = match header.next_token()? {
            Token::Integer(v) => v as u32,
            other => {
                return Err(ParseError::InvalidObjectStream(format!(
                    "expected object number in header, found {other:?}"
                )))
            }
        };
        let offset = match header.next_token()? {
            Token::Integer(v) => v as usize,
            other => {
                return Err(ParseError::InvalidObjectStream(format!(
                    "expected offset in header, found {other:?}"
                )))
            }
        };
        locations.push((num, offset));
    }

    let mut objects = Vec::with_capacity(locations.len());
    for (num, offset) in locations {
        let at = first + offset;
        if at >= decoded.len() {
            if options.lenient {
                tracing::debug!("object {} offset {} beyond object stream end", num, at);
                continue;
            }
            return Err(ParseError::InvalidObjectStream(format!(
                "object {num} offset beyond stream end"
            )));
        }
        let mut lexer = Lexer::new_at(&decoded, at);
        let obj = PdfObject::parse(&mut lexer, options)?;
        objects.push((num, obj));
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_table_roundtrip() {
        let pdf = b"xref\n0 3\n0000000000 65535 f \n0000000017 00000 n \n0000000081 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\n";
        let xref = parse_xref_section(pdf, 0, &ParseOptions::default()).unwrap();
        assert_eq!(xref.entries.get(&0), Some(&XrefEntry::Free));
        assert_eq!(
            xref.entries.get(&1),
            Some(&XrefEntry::Offset {
                offset: 17,
                generation: 0
            })
        );
        assert_eq!(
            xref.trailer.get("Root"),
            Some(&PdfObject::Reference(1, 0))
        );
    }

    #[test]
    fn test_object_stream_expansion() {
        // Two objects: 10 -> 42, 11 -> /Name
        let body = b"42 /Name";
        let header = b"10 0 11 3 ";
        let mut data = header.to_vec();
        data.extend_from_slice(body);
        let mut dict = PdfDictionary::new();
        dict.insert("N", PdfObject::Integer(2));
        dict.insert("First", PdfObject::Integer(header.len() as i64));
        let objs = parse_object_stream(&dict, &data, &ParseOptions::default()).unwrap();
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0], (10, PdfObject::Integer(42)));
        assert_eq!(objs[1], (11, PdfObject::name("Name")));
    }

}
