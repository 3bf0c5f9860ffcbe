//! Content-stream operator parsing.
//!
//! Tokenizes a page content stream into the operator subset the scanner
//! interprets: text, graphics state, path construction/painting, XObject
//! invocation and marked content. Unknown operators are surfaced as
//! `Other` so the interpreter can ignore them without losing its place.

use crate::parser::lexer::{Lexer, Token};
use crate::parser::objects::PdfObject;
use crate::parser::{ParseError, ParseOptions, ParseResult};

/// One element of a `TJ` array: a string or a position adjustment.
#[derive(Debug, Clone, PartialEq)]
pub enum TextItem {
    Text(Vec<u8>),
    /// Thousandths of an em to subtract from the advance
    Offset(f64),
}

/// A parsed content-stream operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOp {
    // Text object
    BeginText,
    EndText,

    // Text state
    SetCharSpacing(f64),
    SetWordSpacing(f64),
    SetHorizontalScaling(f64),
    SetLeading(f64),
    SetFont(String, f64),
    SetTextRise(f64),

    // Text positioning
    MoveText(f64, f64),
    MoveTextSetLeading(f64, f64),
    SetTextMatrix(f64, f64, f64, f64, f64, f64),
    NextLine,

    // Text showing
    ShowText(Vec<u8>),
    ShowTextArray(Vec<TextItem>),
    NextLineShowText(Vec<u8>),
    SetSpacingNextLineShowText(f64, f64, Vec<u8>),

    // Graphics state
    SaveState,
    RestoreState,
    Transform(f64, f64, f64, f64, f64, f64),

    // Path construction
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    CurveToV(f64, f64, f64, f64),
    CurveToY(f64, f64, f64, f64),
    Rectangle(f64, f64, f64, f64),
    ClosePath,

    // Path painting
    /// Any filling and/or stroking operator (S, s, f, F, f*, B, B*, b, b*)
    PaintPath,
    /// `n`: end the path without painting (clipping boundary only)
    EndPathNoPaint,
    /// `W` or `W*`: mark the current path as a clipping path
    Clip,

    // XObjects
    InvokeXObject(String),

    // Marked content
    BeginMarkedContent(String),
    /// Tag plus properties: an inline dictionary or a /Properties name
    BeginMarkedContentProps(String, PdfObject),
    EndMarkedContent,

    /// Operator the scanner does not interpret
    Other(String),
}

/// Parser turning raw content-stream bytes into operations.
pub struct ContentParser;

impl ContentParser {
    /// Parse a decoded content stream. Lenient: unparseable stretches are
    /// skipped, because a half-readable stream still yields useful events.
    pub fn parse(data: &[u8]) -> ParseResult<Vec<ContentOp>> {
        let options = ParseOptions::default();
        let mut lexer = Lexer::new(data);
        let mut ops = Vec::new();
        let mut operands: Vec<PdfObject> = Vec::new();

        loop {
            let token = match lexer.next_token() {
                Ok(t) => t,
                Err(_) => {
                    // Resynchronize on the next whitespace boundary.
                    operands.clear();
                    continue;
                }
            };
            match token {
                Token::Eof => break,
                Token::Comment(_) => {}
                Token::Integer(_)
                | Token::Real(_)
                | Token::String(_)
                | Token::ArrayStart
                | Token::DictStart
                | Token::Boolean(_)
                | Token::Null => {
                    match PdfObject::parse_from_token(&mut lexer, token, &options) {
                        Ok(obj) => operands.push(obj),
                        Err(_) => operands.clear(),
                    }
                }
                Token::Name(name) => operands.push(PdfObject::name(name)),
                Token::Keyword(word) => {
                    let op = map_operator(&word, &operands, &mut lexer)?;
                    ops.push(op);
                    operands.clear();
                }
                // Object-level keywords have no meaning inside content.
                _ => operands.clear(),
            }
        }
        Ok(ops)
    }
}

fn number(operands: &[PdfObject], index: usize) -> f64 {
    operands.get(index).and_then(|o| o.as_number()).unwrap_or(0.0)
}

fn string_bytes(operands: &[PdfObject], index: usize) -> Vec<u8> {
    operands
        .get(index)
        .and_then(|o| o.as_string())
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default()
}

fn operand_name(operands: &[PdfObject], index: usize) -> String {
    operands
        .get(index)
        .and_then(|o| o.as_name())
        .unwrap_or("")
        .to_string()
}

/// Map an operator keyword to an operation.
fn map_operator(
    word: &str,
    operands: &[PdfObject],
    lexer: &mut Lexer<'_>,
) -> ParseResult<ContentOp> {
    let op = match word {
        "BT" => ContentOp::BeginText,
        "ET" => ContentOp::EndText,

        "Tc" => ContentOp::SetCharSpacing(number(operands, 0)),
        "Tw" => ContentOp::SetWordSpacing(number(operands, 0)),
        "Tz" => ContentOp::SetHorizontalScaling(number(operands, 0)),
        "TL" => ContentOp::SetLeading(number(operands, 0)),
        "Tf" => ContentOp::SetFont(operand_name(operands, 0), number(operands, 1)),
        "Ts" => ContentOp::SetTextRise(number(operands, 0)),
        "Tr" => ContentOp::Other("Tr".to_string()),

        "Td" => ContentOp::MoveText(number(operands, 0), number(operands, 1)),
        "TD" => ContentOp::MoveTextSetLeading(number(operands, 0), number(operands, 1)),
        "Tm" => ContentOp::SetTextMatrix(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
            number(operands, 4),
            number(operands, 5),
        ),
        "T*" => ContentOp::NextLine,

        "Tj" => ContentOp::ShowText(string_bytes(operands, 0)),
        "'" => ContentOp::NextLineShowText(string_bytes(operands, 0)),
        "\"" => ContentOp::SetSpacingNextLineShowText(
            number(operands, 0),
            number(operands, 1),
            string_bytes(operands, 2),
        ),
        "TJ" => {
            let mut items = Vec::new();
            if let Some(PdfObject::Array(arr)) = operands.first() {
                for element in arr.iter() {
                    match element {
                        PdfObject::String(s) => items.push(TextItem::Text(s.as_bytes().to_vec())),
                        other => {
                            if let Some(n) = other.as_number() {
                                items.push(TextItem::Offset(n));
                            }
                        }
                    }
                }
            }
            ContentOp::ShowTextArray(items)
        }

        "q" => ContentOp::SaveState,
        "Q" => ContentOp::RestoreState,
        "cm" => ContentOp::Transform(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
            number(operands, 4),
            number(operands, 5),
        ),

        "m" => ContentOp::MoveTo(number(operands, 0), number(operands, 1)),
        "l" => ContentOp::LineTo(number(operands, 0), number(operands, 1)),
        "c" => ContentOp::CurveTo(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
            number(operands, 4),
            number(operands, 5),
        ),
        "v" => ContentOp::CurveToV(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
        ),
        "y" => ContentOp::CurveToY(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
        ),
        "re" => ContentOp::Rectangle(
            number(operands, 0),
            number(operands, 1),
            number(operands, 2),
            number(operands, 3),
        ),
        "h" => ContentOp::ClosePath,

        "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => ContentOp::PaintPath,
        "n" => ContentOp::EndPathNoPaint,
        "W" | "W*" => ContentOp::Clip,

        "Do" => ContentOp::InvokeXObject(operand_name(operands, 0)),

        "BMC" => ContentOp::BeginMarkedContent(operand_name(operands, 0)),
        "BDC" => {
            let tag = operand_name(operands, 0);
            let props = operands.get(1).cloned().unwrap_or(PdfObject::Null);
            ContentOp::BeginMarkedContentProps(tag, props)
        }
        "EMC" => ContentOp::EndMarkedContent,
        // Marked-content points carry no region; nothing to track.
        "MP" | "DP" => ContentOp::Other(word.to_string()),

        "BI" => {
            skip_inline_image(lexer)?;
            ContentOp::Other("BI".to_string())
        }

        // Remaining operators (color, state dicts, shading, text render
        // mode, compatibility sections) do not affect scanning.
        "gs" | "ri" | "i" | "j" | "J" | "M" | "d" | "w" | "cs" | "CS" | "sc" | "scn" | "SC"
        | "SCN" | "g" | "G" | "rg" | "RG" | "k" | "K" | "sh" | "d0" | "d1" | "BX" | "EX" => {
            ContentOp::Other(word.to_string())
        }
        other => ContentOp::Other(other.to_string()),
    };
    Ok(op)
}

/// Skip an inline image: consume key/value pairs to `ID`, then raw binary
/// data to the `EI` keyword.
fn skip_inline_image(lexer: &mut Lexer<'_>) -> ParseResult<()> {
    // Header tokens until the ID keyword.
    loop {
        match lexer.next_token()? {
            Token::Keyword(word) if word == "ID" => break,
            Token::Eof => return Err(ParseError::UnexpectedEof),
            _ => {}
        }
    }
    // Binary data until whitespace-delimited "EI".
    lexer.skip_inline_image_data()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_ops() {
        let ops = ContentParser::parse(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET").unwrap();
        assert_eq!(
            ops,
            vec![
                ContentOp::BeginText,
                ContentOp::SetFont("F1".to_string(), 12.0),
                ContentOp::MoveText(72.0, 700.0),
                ContentOp::ShowText(b"Hello".to_vec()),
                ContentOp::EndText,
            ]
        );
    }

    #[test]
    fn test_parse_tj_array() {
        let ops = ContentParser::parse(b"[(A) -120 (B)] TJ").unwrap();
        assert_eq!(
            ops,
            vec![ContentOp::ShowTextArray(vec![
                TextItem::Text(b"A".to_vec()),
                TextItem::Offset(-120.0),
                TextItem::Text(b"B".to_vec()),
            ])]
        );
    }

    #[test]
    fn test_parse_marked_content_with_mcid() {
        let ops = ContentParser::parse(b"/P <</MCID 3>> BDC (x) Tj EMC").unwrap();
        match &ops[0] {
            ContentOp::BeginMarkedContentProps(tag, props) => {
                assert_eq!(tag, "P");
                assert_eq!(
                    props.as_dict().unwrap().get("MCID"),
                    Some(&PdfObject::Integer(3))
                );
            }
            other => panic!("expected BDC, got {other:?}"),
        }
        assert_eq!(ops[2], ContentOp::EndMarkedContent);
    }

    #[test]
    fn test_parse_bdc_with_properties_name() {
        let ops = ContentParser::parse(b"/Figure /MC0 BDC EMC").unwrap();
        assert_eq!(
            ops[0],
            ContentOp::BeginMarkedContentProps("Figure".to_string(), PdfObject::name("MC0"))
        );
    }

    #[test]
    fn test_parse_path_and_paint() {
        let ops = ContentParser::parse(b"10 20 m 30 40 l 0 0 100 50 re f").unwrap();
        assert_eq!(
            ops,
            vec![
                ContentOp::MoveTo(10.0, 20.0),
                ContentOp::LineTo(30.0, 40.0),
                ContentOp::Rectangle(0.0, 0.0, 100.0, 50.0),
                ContentOp::PaintPath,
            ]
        );
    }

    #[test]
    fn test_parse_clip_only_path() {
        let ops = ContentParser::parse(b"0 0 100 50 re W n").unwrap();
        assert_eq!(
            ops,
            vec![
                ContentOp::Rectangle(0.0, 0.0, 100.0, 50.0),
                ContentOp::Clip,
                ContentOp::EndPathNoPaint,
            ]
        );
    }

    #[test]
    fn test_parse_xobject_and_transform() {
        let ops = ContentParser::parse(b"q 100 0 0 80 50 600 cm /Im1 Do Q").unwrap();
        assert_eq!(
            ops,
            vec![
                ContentOp::SaveState,
                ContentOp::Transform(100.0, 0.0, 0.0, 80.0, 50.0, 600.0),
                ContentOp::InvokeXObject("Im1".to_string()),
                ContentOp::RestoreState,
            ]
        );
    }

    #[test]
    fn test_inline_image_skipped() {
        let ops =
            ContentParser::parse(b"BI /W 1 /H 1 /BPC 8 /CS /G ID \x00\xff\x12 EI (after) Tj")
                .unwrap();
        assert!(ops.contains(&ContentOp::Other("BI".to_string())));
        assert!(ops.contains(&ContentOp::ShowText(b"after".to_vec())));
    }

    #[test]
    fn test_unknown_operator_ignored() {
        let ops = ContentParser::parse(b"1 0 0 1 0 0 cm 0.5 g (t) Tj").unwrap();
        assert_eq!(ops[0], ContentOp::Transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0));
        assert_eq!(ops[1], ContentOp::Other("g".to_string()));
        assert_eq!(ops[2], ContentOp::ShowText(b"t".to_vec()));
    }
}
