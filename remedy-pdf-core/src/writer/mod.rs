//! PDF serialization.
//!
//! Writes the document's object table back out as a classic-xref PDF.
//! Output is deterministic: objects in ascending id order, dictionary keys
//! sorted. Stream data is written exactly as stored (filters untouched), so
//! page rendering is byte-preserved across a read/remediate/write cycle.

use crate::document::{Document, ObjectId};
use crate::error::Result;
use crate::parser::objects::{PdfDictionary, PdfName, PdfObject};
use chrono::Utc;
use std::collections::HashMap;

/// Serialize a document. Stamps `/ModDate` in the info dictionary first.
pub fn write_document(doc: &mut Document) -> Result<Vec<u8>> {
    let info_id = doc.ensure_info_id();
    if let Some(info) = doc.get_dict_mut(info_id) {
        info.insert(
            "ModDate",
            PdfObject::text(&format!("D:{}Z", Utc::now().format("%Y%m%d%H%M%S"))),
        );
    }

    let mut writer = Writer::new(doc.version.clone());
    writer.write_all(doc)
}

struct Writer {
    version: String,
    out: Vec<u8>,
    xref_positions: HashMap<ObjectId, usize>,
}

impl Writer {
    fn new(version: String) -> Self {
        Self {
            version,
            out: Vec::new(),
            xref_positions: HashMap::new(),
        }
    }

    fn write_all(mut self, doc: &Document) -> Result<Vec<u8>> {
        self.write_header();
        for (&id, obj) in &doc.objects {
            self.write_object(id, obj);
        }
        let xref_position = self.out.len();
        let size = self.write_xref(doc);
        self.write_trailer(doc, size, xref_position);
        Ok(self.out)
    }

    fn write_header(&mut self) {
        self.out
            .extend_from_slice(format!("%PDF-{}\n", self.version).as_bytes());
        // Binary marker comment so transfer tools treat the file as binary.
        self.out.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");
    }

    fn write_object(&mut self, id: ObjectId, object: &PdfObject) {
        self.xref_positions.insert(id, self.out.len());
        self.out
            .extend_from_slice(format!("{} {} obj\n", id.number, id.generation).as_bytes());
        write_object_value(&mut self.out, object);
        self.out.extend_from_slice(b"\nendobj\n");
    }

    fn write_xref(&mut self, doc: &Document) -> u32 {
        let max_number = doc.objects.keys().map(|id| id.number).max().unwrap_or(0);
        self.out.extend_from_slice(b"xref\n");
        self.out
            .extend_from_slice(format!("0 {}\n", max_number + 1).as_bytes());
        self.out.extend_from_slice(b"0000000000 65535 f \n");
        let mut by_number: HashMap<u32, (u16, usize)> = HashMap::new();
        for (&id, &position) in &self.xref_positions {
            by_number.entry(id.number).or_insert((id.generation, position));
        }
        for number in 1..=max_number {
            match by_number.get(&number) {
                Some(&(generation, position)) => self.out.extend_from_slice(
                    format!("{position:010} {generation:05} n \n").as_bytes(),
                ),
                None => self.out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        max_number + 1
    }

    fn write_trailer(&mut self, doc: &Document, size: u32, xref_position: usize) {
        let mut trailer = PdfDictionary::new();
        trailer.insert("Size", PdfObject::Integer(size as i64));
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = doc.trailer.get(key) {
                trailer.insert(key, value.clone());
            }
        }
        self.out.extend_from_slice(b"trailer\n");
        write_object_value(&mut self.out, &PdfObject::Dictionary(trailer));
        self.out
            .extend_from_slice(format!("\nstartxref\n{xref_position}\n%%EOF\n").as_bytes());
    }
}

fn write_object_value(out: &mut Vec<u8>, object: &PdfObject) {
    match object {
        PdfObject::Null => out.extend_from_slice(b"null"),
        PdfObject::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        PdfObject::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        PdfObject::Real(f) => out.extend_from_slice(format_real(*f).as_bytes()),
        PdfObject::String(s) => write_string(out, s.as_bytes()),
        PdfObject::Name(n) => write_name(out, n),
        PdfObject::Array(arr) => {
            out.push(b'[');
            for (i, obj) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object_value(out, obj);
            }
            out.push(b']');
        }
        PdfObject::Dictionary(dict) => write_dictionary(out, dict),
        PdfObject::Stream(stream) => {
            // /Length is kept accurate when streams are (re)built; trust it
            // only if it matches, otherwise fix it up.
            let mut dict = stream.dict.clone();
            dict.insert("Length", PdfObject::Integer(stream.data.len() as i64));
            write_dictionary(out, &dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.data);
            out.extend_from_slice(b"\nendstream");
        }
        PdfObject::Reference(num, gen) => {
            out.extend_from_slice(format!("{num} {gen} R").as_bytes())
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &PdfDictionary) {
    out.extend_from_slice(b"<<");
    // Sorted keys keep output deterministic run to run.
    let mut entries: Vec<(&PdfName, &PdfObject)> = dict.iter().collect();
    entries.sort_by(|a, b| a.0 .0.cmp(&b.0 .0));
    for (key, value) in entries {
        out.push(b'\n');
        write_name(out, key);
        out.push(b' ');
        write_object_value(out, value);
    }
    out.extend_from_slice(b"\n>>");
}

fn write_name(out: &mut Vec<u8>, name: &PdfName) {
    out.push(b'/');
    for &b in name.as_str().as_bytes() {
        let is_regular = b.is_ascii_graphic()
            && !matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#');
        if is_regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{b:02X}").as_bytes());
        }
    }
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    // Mostly-printable strings stay literal; binary content goes hex.
    let printable = bytes
        .iter()
        .filter(|&&b| (0x20..0x7f).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    if bytes.is_empty() || printable * 4 >= bytes.len() * 3 {
        out.push(b'(');
        for &b in bytes {
            match b {
                b'(' | b')' | b'\\' => {
                    out.push(b'\\');
                    out.push(b);
                }
                b'\r' => out.extend_from_slice(b"\\r"),
                b'\n' => out.extend_from_slice(b"\\n"),
                other => out.push(other),
            }
        }
        out.push(b')');
    } else {
        out.push(b'<');
        for &b in bytes {
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
        out.push(b'>');
    }
}

fn format_real(f: f64) -> String {
    let formatted = format!("{f:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfArray, PdfString};

    fn value_bytes(obj: &PdfObject) -> Vec<u8> {
        let mut out = Vec::new();
        write_object_value(&mut out, obj);
        out
    }

    #[test]
    fn test_format_real_trims_zeros() {
        assert_eq!(format_real(3.14), "3.14");
        assert_eq!(format_real(4.0), "4");
        assert_eq!(format_real(0.0), "0");
        assert_eq!(format_real(-0.5), "-0.5");
    }

    #[test]
    fn test_write_string_literal_escapes() {
        let obj = PdfObject::String(PdfString::new(b"a(b)\\c".to_vec()));
        assert_eq!(value_bytes(&obj), b"(a\\(b\\)\\\\c)");
    }

    #[test]
    fn test_write_binary_string_as_hex() {
        let obj = PdfObject::String(PdfString::new(vec![0xfe, 0xff, 0x00, 0x41]));
        assert_eq!(value_bytes(&obj), b"<FEFF0041>");
    }

    #[test]
    fn test_write_name_escaping() {
        let obj = PdfObject::name("A B#/C");
        assert_eq!(value_bytes(&obj), b"/A#20B#23#2FC");
    }

    #[test]
    fn test_write_array() {
        let arr: PdfArray = vec![
            PdfObject::Integer(1),
            PdfObject::Reference(3, 0),
            PdfObject::name("S"),
        ]
        .into_iter()
        .collect();
        assert_eq!(value_bytes(&PdfObject::Array(arr)), b"[1 3 0 R /S]");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let mut dict = PdfDictionary::new();
        dict.insert("Zebra", PdfObject::Integer(1));
        dict.insert("Alpha", PdfObject::Integer(2));
        let bytes = value_bytes(&PdfObject::Dictionary(dict));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("/Alpha").unwrap() < text.find("/Zebra").unwrap());
    }

    #[test]
    fn test_roundtrip_through_parser() {
        let mut doc = Document::new();
        let mut page = PdfDictionary::new();
        page.insert(
            "MediaBox",
            PdfObject::Array(
                vec![
                    PdfObject::Integer(0),
                    PdfObject::Integer(0),
                    PdfObject::Integer(612),
                    PdfObject::Integer(792),
                ]
                .into_iter()
                .collect(),
            ),
        );
        doc.add_page(page).unwrap();

        let bytes = doc.to_bytes().unwrap();
        let reparsed = Document::from_bytes(&bytes).unwrap();
        assert_eq!(reparsed.page_count(), 1);
        assert!(reparsed.info().unwrap().contains_key("ModDate"));
    }
}
