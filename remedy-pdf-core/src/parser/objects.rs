//! PDF object model and recursive-descent object parser.
//!
//! All data in a PDF file is built from a small set of object types:
//! null, booleans, numbers, strings, names, arrays, dictionaries, streams
//! and indirect references (`N G R`). This module parses them from the
//! token stream and provides the typed accessors the rest of the crate
//! uses to navigate the object graph.

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseOptions, ParseResult};
use std::collections::HashMap;

/// PDF Name object: an atomic symbol such as `/Type` or `/Pages`,
/// stored without the leading slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// PDF String object: arbitrary bytes, written as `(literal)` or `<hex>`.
///
/// Text strings are either PDFDocEncoding or UTF-16BE (with BOM); binary
/// strings carry raw bytes. Decoding is best-effort and never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn new(bytes: Vec<u8>) -> Self {
        PdfString(bytes)
    }

    /// Build a text string, using UTF-16BE with BOM when the text is not
    /// representable in Latin-1.
    pub fn from_text(text: &str) -> Self {
        if text.chars().all(|c| (c as u32) < 0x100) {
            PdfString(text.chars().map(|c| c as u8).collect())
        } else {
            let mut bytes = vec![0xfe, 0xff];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            PdfString(bytes)
        }
    }

    /// Build a text string always encoded as UTF-16BE with BOM. Used where
    /// Unicode round-tripping matters regardless of content (alt text,
    /// table summaries).
    pub fn from_text_utf16be(text: &str) -> Self {
        let mut bytes = vec![0xfe, 0xff];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        PdfString(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode as text: UTF-16BE when the BOM is present, Latin-1 otherwise.
    pub fn to_text(&self) -> String {
        let bytes = &self.0;
        if bytes.len() >= 2 && bytes[0] == 0xfe && bytes[1] == 0xff {
            let units: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

/// PDF Array object: an ordered collection of objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

impl PdfArray {
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    pub fn push(&mut self, obj: PdfObject) {
        self.0.push(obj);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

impl FromIterator<PdfObject> for PdfArray {
    fn from_iter<T: IntoIterator<Item = PdfObject>>(iter: T) -> Self {
        PdfArray(iter.into_iter().collect())
    }
}

/// PDF Dictionary object: name-keyed mapping, the backbone of every
/// structural node (catalog, pages, struct elems, annotations).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub HashMap<PdfName, PdfObject>);

impl PdfDictionary {
    pub fn new() -> Self {
        PdfDictionary(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PdfObject> {
        self.0.remove(&PdfName(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(&PdfName(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PdfName, &PdfObject)> {
        self.0.iter()
    }

    /// The `/Type` entry as a name, when present.
    pub fn get_type(&self) -> Option<&str> {
        match self.get("Type") {
            Some(PdfObject::Name(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// PDF Stream object: a dictionary plus raw (possibly filtered) data.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Decode the stream data by applying the declared filter chain.
    pub fn decode(&self) -> ParseResult<Vec<u8>> {
        super::filters::decode_stream_data(&self.dict, &self.data)
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// The PDF object types.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    /// Indirect reference `(object number, generation number)`
    Reference(u32, u16),
}

impl PdfObject {
    pub fn name(name: impl Into<String>) -> Self {
        PdfObject::Name(PdfName::new(name))
    }

    pub fn text(text: &str) -> Self {
        PdfObject::String(PdfString::from_text(text))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an Integer or Real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PdfObject::Integer(i) => Some(*i as f64),
            PdfObject::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            PdfObject::Reference(num, gen) => Some((*num, *gen)),
            _ => None,
        }
    }

    /// Parse one object from the lexer.
    pub fn parse(lexer: &mut Lexer<'_>, options: &ParseOptions) -> ParseResult<Self> {
        let token = lexer.next_token()?;
        Self::parse_from_token(lexer, token, options)
    }

    /// Parse one object starting from an already-read token.
    pub fn parse_from_token(
        lexer: &mut Lexer<'_>,
        token: Token,
        options: &ParseOptions,
    ) -> ParseResult<Self> {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::String(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::Integer(i) => Self::parse_integer_or_reference(lexer, i),
            Token::ArrayStart => Self::parse_array(lexer, options),
            Token::DictStart => Self::parse_dictionary_or_stream(lexer, options),
            Token::Comment(_) => Self::parse(lexer, options),
            other => Err(ParseError::SyntaxError {
                position: lexer.position(),
                message: format!("unexpected token {other:?} while parsing object"),
            }),
        }
    }

    /// An integer may begin an `N G R` indirect reference. Look ahead two
    /// tokens and push them back if the pattern does not match.
    fn parse_integer_or_reference(lexer: &mut Lexer<'_>, i: i64) -> ParseResult<Self> {
        if !(0..=9_999_999).contains(&i) {
            return Ok(PdfObject::Integer(i));
        }
        let second = lexer.next_token()?;
        if let Token::Integer(gen) = second {
            if (0..=65_535).contains(&gen) {
                let third = lexer.next_token()?;
                if let Token::Keyword(ref n) = third {
                    if n == "R" {
                        return Ok(PdfObject::Reference(i as u32, gen as u16));
                    }
                }
                lexer.push_token(third);
                lexer.push_token(Token::Integer(gen));
                return Ok(PdfObject::Integer(i));
            }
        }
        lexer.push_token(second);
        Ok(PdfObject::Integer(i))
    }

    fn parse_array(lexer: &mut Lexer<'_>, options: &ParseOptions) -> ParseResult<Self> {
        let mut array = PdfArray::new();
        loop {
            let token = lexer.next_token()?;
            match token {
                Token::ArrayEnd => break,
                Token::Eof => return Err(ParseError::UnexpectedEof),
                other => array.push(Self::parse_from_token(lexer, other, options)?),
            }
        }
        Ok(PdfObject::Array(array))
    }

    fn parse_dictionary_or_stream(
        lexer: &mut Lexer<'_>,
        options: &ParseOptions,
    ) -> ParseResult<Self> {
        let mut dict = PdfDictionary::new();
        loop {
            let token = lexer.next_token()?;
            match token {
                Token::DictEnd => break,
                Token::Eof => return Err(ParseError::UnexpectedEof),
                Token::Name(key) => {
                    let value = Self::parse(lexer, options)?;
                    dict.insert(key, value);
                }
                other => {
                    if options.lenient {
                        // Stray token inside a dictionary; skip it.
                        tracing::debug!("skipping stray token in dictionary: {:?}", other);
                        continue;
                    }
                    return Err(ParseError::SyntaxError {
                        position: lexer.position(),
                        message: format!("expected name key in dictionary, found {other:?}"),
                    });
                }
            }
        }

        // A dictionary directly followed by `stream` is a stream object.
        let next = lexer.next_token()?;
        if next != Token::Stream {
            lexer.push_token(next);
            return Ok(PdfObject::Dictionary(dict));
        }
        lexer.skip_stream_eol();

        let data_start = lexer.position();
        let data = match dict.get("Length").and_then(|l| l.as_integer()) {
            Some(len) if len >= 0 => {
                let data = match lexer.read_stream_data(len as usize) {
                    Ok(data) => data,
                    Err(_) if options.lenient => {
                        lexer.seek(data_start);
                        lexer.read_stream_data_until_endstream()?
                    }
                    Err(e) => return Err(e),
                };
                // Verify the keyword actually follows; recover otherwise.
                match lexer.next_token() {
                    Ok(Token::EndStream) => {
                        lexer.push_token(Token::EndStream);
                        data
                    }
                    _ if options.lenient => {
                        lexer.seek(data_start);
                        lexer.read_stream_data_until_endstream()?
                    }
                    _ => {
                        return Err(ParseError::SyntaxError {
                            position: lexer.position(),
                            message: "stream data does not end with endstream".to_string(),
                        })
                    }
                }
            }
            // Indirect or missing /Length: scan for the keyword.
            _ => lexer.read_stream_data_until_endstream()?,
        };

        // Consume `endstream` if we stopped just before it.
        let token = lexer.next_token()?;
        if token != Token::EndStream {
            lexer.push_token(token);
        }
        let mut dict = dict;
        dict.insert("Length", PdfObject::Integer(data.len() as i64));
        Ok(PdfObject::Stream(PdfStream { dict, data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> PdfObject {
        let mut lexer = Lexer::new(input);
        PdfObject::parse(&mut lexer, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse(b"null"), PdfObject::Null);
        assert_eq!(parse(b"true"), PdfObject::Boolean(true));
        assert_eq!(parse(b"42"), PdfObject::Integer(42));
        assert_eq!(parse(b"-1.5"), PdfObject::Real(-1.5));
        assert_eq!(parse(b"/Figure"), PdfObject::name("Figure"));
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse(b"12 0 R"), PdfObject::Reference(12, 0));
    }

    #[test]
    fn test_integer_followed_by_integers_is_not_reference() {
        let mut lexer = Lexer::new(b"1 2 3");
        let opts = ParseOptions::default();
        assert_eq!(
            PdfObject::parse(&mut lexer, &opts).unwrap(),
            PdfObject::Integer(1)
        );
        assert_eq!(
            PdfObject::parse(&mut lexer, &opts).unwrap(),
            PdfObject::Integer(2)
        );
        assert_eq!(
            PdfObject::parse(&mut lexer, &opts).unwrap(),
            PdfObject::Integer(3)
        );
    }

    #[test]
    fn test_parse_array_with_references() {
        let obj = parse(b"[1 0 R 2 0 R 7]");
        let arr = obj.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.get(0), Some(&PdfObject::Reference(1, 0)));
        assert_eq!(arr.get(1), Some(&PdfObject::Reference(2, 0)));
        assert_eq!(arr.get(2), Some(&PdfObject::Integer(7)));
    }

    #[test]
    fn test_parse_dictionary() {
        let obj = parse(b"<< /Type /Page /MediaBox [0 0 612 792] /Parent 2 0 R >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get_type(), Some("Page"));
        assert_eq!(dict.get("Parent"), Some(&PdfObject::Reference(2, 0)));
        assert_eq!(dict.get("MediaBox").unwrap().as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_parse_stream() {
        let obj = parse(b"<< /Length 5 >>\nstream\nhello\nendstream");
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"hello");
    }

    #[test]
    fn test_parse_stream_with_bad_length_recovers() {
        let obj = parse(b"<< /Length 3 >>\nstream\nhello world\nendstream");
        let stream = obj.as_stream().unwrap();
        assert_eq!(stream.data, b"hello world");
    }

    #[test]
    fn test_text_string_roundtrip_latin() {
        let s = PdfString::from_text("Hello PDF");
        assert_eq!(s.to_text(), "Hello PDF");
        assert_eq!(s.as_bytes(), b"Hello PDF");
    }

    #[test]
    fn test_text_string_roundtrip_unicode() {
        let s = PdfString::from_text("Résumé — 2023");
        assert_eq!(s.as_bytes()[..2], [0xfe, 0xff]);
        assert_eq!(s.to_text(), "Résumé — 2023");
    }

    #[test]
    fn test_nested_structures() {
        let obj = parse(b"<< /K [ << /S /Figure /Pg 3 0 R >> 5 ] >>");
        let kids = obj.as_dict().unwrap().get("K").unwrap().as_array().unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(
            kids.get(0).unwrap().as_dict().unwrap().get("S"),
            Some(&PdfObject::name("Figure"))
        );
        assert_eq!(kids.get(1), Some(&PdfObject::Integer(5)));
    }
}
