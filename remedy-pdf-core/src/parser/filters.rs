//! Stream filters.
//!
//! Decoding for the filter chains remediation inputs actually carry:
//! FlateDecode (with TIFF/PNG predictors) and ASCIIHexDecode. Everything
//! else surfaces as `UnsupportedFilter` so callers can skip the stream.

use super::objects::{PdfDictionary, PdfObject};
use super::{ParseError, ParseResult};

/// Decode stream data by applying the declared `/Filter` chain.
///
/// Only the filters remediation inputs actually use are supported:
/// FlateDecode (with PNG predictors) and ASCIIHexDecode. Anything else is
/// an `UnsupportedFilter` error so callers can skip the stream.
pub fn decode_stream_data(dict: &PdfDictionary, data: &[u8]) -> ParseResult<Vec<u8>> {
    let filters = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(PdfObject::Name(name)) => vec![name.as_str().to_string()],
        Some(PdfObject::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        Some(_) => return Ok(data.to_vec()),
    };

    let mut current = data.to_vec();
    for filter in &filters {
        current = match filter.as_str() {
            "FlateDecode" | "Fl" => {
                let inflated = inflate(&current)?;
                apply_predictor(dict, inflated)?
            }
            "ASCIIHexDecode" | "AHx" => ascii_hex_decode(&current)?,
            other => return Err(ParseError::UnsupportedFilter(other.to_string())),
        };
    }
    Ok(current)
}

#[cfg(feature = "compression")]
fn inflate(data: &[u8]) -> ParseResult<Vec<u8>> {
    use std::io::Read;
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ParseError::StreamDecode(format!("flate: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "compression"))]
fn inflate(_data: &[u8]) -> ParseResult<Vec<u8>> {
    Err(ParseError::UnsupportedFilter(
        "FlateDecode (compression feature disabled)".to_string(),
    ))
}

fn ascii_hex_decode(data: &[u8]) -> ParseResult<Vec<u8>> {
    let mut digits = Vec::new();
    for &b in data {
        match b {
            b'>' => break,
            b if b.is_ascii_whitespace() => {}
            b if b.is_ascii_hexdigit() => digits.push(b),
            _ => {
                return Err(ParseError::StreamDecode(
                    "invalid character in ASCIIHexDecode data".to_string(),
                ))
            }
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).expect("hex digits are ASCII");
            u8::from_str_radix(s, 16).expect("validated hex digits")
        })
        .collect())
}

/// Undo a PNG predictor declared in `/DecodeParms`, as used by xref
/// streams and many Flate-compressed streams.
fn apply_predictor(dict: &PdfDictionary, data: Vec<u8>) -> ParseResult<Vec<u8>> {
    let parms = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PdfObject::Dictionary(d)) => d,
        Some(PdfObject::Array(arr)) => match arr.iter().find_map(|o| o.as_dict()) {
            Some(d) => d,
            None => return Ok(data),
        },
        _ => return Ok(data),
    };
    let predictor = parms
        .get("Predictor")
        .and_then(|p| p.as_integer())
        .unwrap_or(1);
    if predictor < 2 {
        return Ok(data);
    }
    let columns = parms
        .get("Columns")
        .and_then(|c| c.as_integer())
        .unwrap_or(1)
        .max(1) as usize;
    let colors = parms
        .get("Colors")
        .and_then(|c| c.as_integer())
        .unwrap_or(1)
        .max(1) as usize;
    let bpc = parms
        .get("BitsPerComponent")
        .and_then(|b| b.as_integer())
        .unwrap_or(8)
        .max(1) as usize;
    let bytes_per_pixel = (colors * bpc).div_ceil(8);
    let row_len = (columns * colors * bpc).div_ceil(8);

    if predictor == 2 {
        // TIFF predictor 2, horizontal differencing on whole bytes.
        let mut out = data;
        for row in out.chunks_mut(row_len) {
            for i in bytes_per_pixel..row.len() {
                row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
            }
        }
        return Ok(out);
    }

    // PNG predictors: each row is prefixed with a filter-type byte.
    let stride = row_len + 1;
    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];
    for chunk in data.chunks(stride) {
        if chunk.is_empty() {
            break;
        }
        let filter = chunk[0];
        let mut row = chunk[1..].to_vec();
        row.resize(row_len, 0);
        for i in 0..row.len() {
            let left = if i >= bytes_per_pixel {
                row[i - bytes_per_pixel]
            } else {
                0
            };
            let up = prev_row[i];
            let up_left = if i >= bytes_per_pixel {
                prev_row[i - bytes_per_pixel]
            } else {
                0
            };
            row[i] = match filter {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(ParseError::StreamDecode(format!(
                        "unknown PNG predictor filter {other}"
                    )))
                }
            };
        }
        out.extend_from_slice(&row);
        prev_row = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
