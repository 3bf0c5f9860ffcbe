//! Document title remediation.
//!
//! A usable title and `DisplayDocTitle` are the first things a screen
//! reader announces. An existing non-blank title is kept; otherwise one is
//! generated from early-page text, falling back to a placeholder when the
//! document has too little text to describe itself.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::parser::objects::{PdfDictionary, PdfObject, PdfString};
use crate::services::GenerationProvider;
use crate::text_util::{is_blank, normalize_whitespace, truncate_chars, word_count};

use super::config::{RemediationConfig, MAX_TITLE_CHARS, TITLE_MIN_WORDS};
use super::page_text::early_page_text;
use super::StepReport;

pub struct TitleRemediator<'a> {
    config: &'a RemediationConfig,
    generation: &'a dyn GenerationProvider,
}

impl<'a> TitleRemediator<'a> {
    pub fn new(config: &'a RemediationConfig, generation: &'a dyn GenerationProvider) -> Self {
        Self { config, generation }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let existing = doc
            .info()
            .and_then(|info| info.get("Title"))
            .and_then(|t| doc.resolve(t).as_string())
            .map(|s| s.to_text())
            .unwrap_or_default();

        if !is_blank(&existing) {
            set_display_doc_title(doc)?;
            return Ok(StepReport::applied("kept existing title"));
        }

        cancel.check()?;
        let extracted = early_page_text(doc, TITLE_MIN_WORDS, cancel)?;
        let title = if word_count(&extracted) < TITLE_MIN_WORDS {
            self.config.title_placeholder.clone()
        } else {
            cancel.check()?;
            match self.generation.title(&existing, &extracted) {
                Ok(generated) => {
                    let normalized =
                        truncate_chars(&normalize_whitespace(&generated), MAX_TITLE_CHARS);
                    if normalized.is_empty() {
                        self.config.title_placeholder.clone()
                    } else {
                        normalized
                    }
                }
                Err(err) => {
                    tracing::warn!("title generation failed, using placeholder: {}", err);
                    self.config.title_placeholder.clone()
                }
            }
        };

        let info_id = doc.ensure_info_id();
        if let Some(info) = doc.get_dict_mut(info_id) {
            info.insert("Title", PdfObject::String(PdfString::from_text(&title)));
        }
        set_display_doc_title(doc)?;
        Ok(StepReport::applied(format!("set title \"{title}\"")))
    }
}

/// Ensure the catalog's viewer preferences request the document title in
/// the window bar instead of the file name.
pub(crate) fn set_display_doc_title(doc: &mut Document) -> Result<()> {
    let catalog_id = doc.catalog_id()?;
    let prefs_entry = doc
        .catalog()?
        .get("ViewerPreferences")
        .cloned()
        .unwrap_or(PdfObject::Null);
    match prefs_entry {
        // Indirect preferences are edited in place.
        PdfObject::Reference(num, gen) => {
            let id = crate::document::ObjectId::new(num, gen);
            if let Some(prefs) = doc.get_dict_mut(id) {
                prefs.insert("DisplayDocTitle", PdfObject::Boolean(true));
                return Ok(());
            }
        }
        PdfObject::Dictionary(mut prefs) => {
            prefs.insert("DisplayDocTitle", PdfObject::Boolean(true));
            if let Some(catalog) = doc.get_dict_mut(catalog_id) {
                catalog.insert("ViewerPreferences", PdfObject::Dictionary(prefs));
            }
            return Ok(());
        }
        _ => {}
    }
    let mut prefs = PdfDictionary::new();
    prefs.insert("DisplayDocTitle", PdfObject::Boolean(true));
    doc.set_catalog_entry("ViewerPreferences", PdfObject::Dictionary(prefs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfStream;
    use crate::services::MockGenerationProvider;

    fn display_doc_title(doc: &Document) -> Option<bool> {
        doc.catalog()
            .ok()?
            .get("ViewerPreferences")
            .and_then(|p| doc.resolve_dict(p))
            .and_then(|p| p.get("DisplayDocTitle"))
            .and_then(|b| b.as_bool())
    }

    fn title_of(doc: &Document) -> Option<String> {
        doc.info()?
            .get("Title")
            .and_then(|t| t.as_string())
            .map(|s| s.to_text())
    }

    fn doc_with_page_words(words: usize) -> Document {
        let mut doc = Document::new();
        let body: String = (0..words).map(|i| format!("word{i} ")).collect();
        let content = format!("BT /F1 12 Tf 72 700 Td ({body}) Tj ET");
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
        doc
    }

    #[test]
    fn test_existing_title_kept() {
        let mut doc = Document::new();
        let info_id = doc.ensure_info_id();
        doc.get_dict_mut(info_id)
            .unwrap()
            .insert("Title", PdfObject::text("Original Title"));

        let config = RemediationConfig::default();
        let generation = MockGenerationProvider::with_title("Should Not Appear");
        let report = TitleRemediator::new(&config, &generation)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();

        assert!(report.applied);
        assert_eq!(title_of(&doc).unwrap(), "Original Title");
        assert_eq!(generation.title_calls(), 0);
        assert_eq!(display_doc_title(&doc), Some(true));
    }

    #[test]
    fn test_generated_title_from_text() {
        let mut doc = doc_with_page_words(120);
        let config = RemediationConfig::default();
        let generation = MockGenerationProvider::with_title("Quarterly Report 2023");
        TitleRemediator::new(&config, &generation)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();

        assert_eq!(title_of(&doc).unwrap(), "Quarterly Report 2023");
        assert_eq!(generation.title_calls(), 1);
        assert_eq!(display_doc_title(&doc), Some(true));
    }

    #[test]
    fn test_placeholder_when_too_little_text() {
        let mut doc = doc_with_page_words(10);
        let config = RemediationConfig::default();
        let generation = MockGenerationProvider::new();
        TitleRemediator::new(&config, &generation)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();

        assert_eq!(title_of(&doc).unwrap(), "Untitled PDF document");
        assert_eq!(generation.title_calls(), 0);
    }

    #[test]
    fn test_blank_existing_title_regenerated() {
        let mut doc = doc_with_page_words(5);
        let info_id = doc.ensure_info_id();
        doc.get_dict_mut(info_id)
            .unwrap()
            .insert("Title", PdfObject::text("   \t "));

        let config = RemediationConfig::default();
        let generation = MockGenerationProvider::new();
        TitleRemediator::new(&config, &generation)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert_eq!(title_of(&doc).unwrap(), "Untitled PDF document");
    }

    #[test]
    fn test_long_generated_title_truncated() {
        let mut doc = doc_with_page_words(120);
        let config = RemediationConfig::default();
        let generation = MockGenerationProvider::with_title("x".repeat(500));
        TitleRemediator::new(&config, &generation)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert_eq!(title_of(&doc).unwrap().chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn test_existing_viewer_preferences_preserved() {
        let mut doc = Document::new();
        let mut prefs = PdfDictionary::new();
        prefs.insert("HideToolbar", PdfObject::Boolean(true));
        doc.set_catalog_entry("ViewerPreferences", PdfObject::Dictionary(prefs))
            .unwrap();

        set_display_doc_title(&mut doc).unwrap();
        let prefs = doc
            .catalog()
            .unwrap()
            .get("ViewerPreferences")
            .and_then(|p| p.as_dict())
            .unwrap();
        assert_eq!(prefs.get("HideToolbar"), Some(&PdfObject::Boolean(true)));
        assert_eq!(prefs.get("DisplayDocTitle"), Some(&PdfObject::Boolean(true)));
    }
}
