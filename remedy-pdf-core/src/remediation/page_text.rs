//! Early-page text extraction shared by the title and language steps.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::scanner;
use crate::text_util::{normalize_whitespace, word_count};

use super::config::EARLY_TEXT_MAX_PAGES;

/// Accumulate normalized text from the first pages of the document,
/// stopping once `min_words` words were gathered or the page window
/// (first five pages) is exhausted. Pages that fail to scan are skipped.
pub fn early_page_text(doc: &Document, min_words: usize, cancel: &CancelToken) -> Result<String> {
    let mut text = String::new();
    for page_id in doc.page_ids().into_iter().take(EARLY_TEXT_MAX_PAGES) {
        cancel.check()?;
        if word_count(&text) >= min_words {
            break;
        }
        match scanner::page_text(doc, page_id) {
            Ok(acc) => {
                let page_text = normalize_whitespace(acc.text());
                if !page_text.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&page_text);
                }
            }
            Err(err) => {
                tracing::debug!("skipping unscannable page {}: {}", page_id, err);
            }
        }
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfDictionary, PdfObject, PdfStream};

    fn doc_with_text_pages(texts: &[&str]) -> Document {
        let mut doc = Document::new();
        for text in texts {
            let content = format!("BT /F1 12 Tf 72 700 Td ({text}) Tj ET");
            let mut stream_dict = PdfDictionary::new();
            stream_dict.insert("Length", PdfObject::Integer(content.len() as i64));
            let content_id = doc.add(PdfObject::Stream(PdfStream {
                dict: stream_dict,
                data: content.into_bytes(),
            }));
            let mut page = PdfDictionary::new();
            page.insert(
                "Contents",
                PdfObject::Reference(content_id.number, content_id.generation),
            );
            doc.add_page(page).unwrap();
        }
        doc
    }

    #[test]
    fn test_gathers_until_word_target() {
        let doc = doc_with_text_pages(&["one two three", "four five", "six"]);
        let text = early_page_text(&doc, 4, &CancelToken::new()).unwrap();
        // Stops after the second page satisfies the target.
        assert_eq!(text, "one two three four five");
    }

    #[test]
    fn test_window_capped_at_five_pages() {
        let doc = doc_with_text_pages(&["a", "b", "c", "d", "e", "never-read"]);
        let text = early_page_text(&doc, 1000, &CancelToken::new()).unwrap();
        assert_eq!(text, "a b c d e");
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::new();
        let text = early_page_text(&doc, 100, &CancelToken::new()).unwrap();
        assert!(text.is_empty());
    }
}
