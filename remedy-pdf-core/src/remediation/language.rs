//! Primary-language remediation.
//!
//! Writes the catalog `/Lang` entry from detected early-page text so
//! screen readers pick the right speech synthesizer. An existing
//! non-blank `/Lang` always wins.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::parser::objects::PdfObject;
use crate::text_util::{is_blank, word_count};

use super::config::{RemediationConfig, LANGUAGE_MIN_WORDS};
use super::page_text::early_page_text;
use super::StepReport;

pub struct LanguageRemediator<'a> {
    config: &'a RemediationConfig,
}

impl<'a> LanguageRemediator<'a> {
    pub fn new(config: &'a RemediationConfig) -> Self {
        Self { config }
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let existing = doc
            .catalog()?
            .get("Lang")
            .and_then(|l| doc.resolve(l).as_string())
            .map(|s| s.to_text())
            .unwrap_or_default();
        if !is_blank(&existing) {
            return Ok(StepReport::skipped(format!("kept existing /Lang \"{existing}\"")));
        }

        let text = early_page_text(doc, LANGUAGE_MIN_WORDS, cancel)?;
        let language = if word_count(&text) < LANGUAGE_MIN_WORDS {
            self.config.default_primary_language.clone()
        } else {
            detect_language(&text)
                .unwrap_or_else(|| self.config.default_primary_language.clone())
        };

        doc.set_catalog_entry("Lang", PdfObject::text(&language))?;
        Ok(StepReport::applied(format!("set /Lang \"{language}\"")))
    }
}

/// Detect the dominant language of `text` as a BCP-47 tag.
fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    bcp47_tag(info.lang()).map(str::to_string)
}

/// whatlang reports ISO 639-3 codes; map the languages the detector
/// supports onto primary-subtag BCP-47 tags.
fn bcp47_tag(lang: whatlang::Lang) -> Option<&'static str> {
    use whatlang::Lang;
    let tag = match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        Lang::Kor => "ko",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Ben => "bn",
        Lang::Tur => "tr",
        Lang::Vie => "vi",
        Lang::Pol => "pl",
        Lang::Ukr => "uk",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Nob => "nb",
        Lang::Fin => "fi",
        Lang::Ell => "el",
        Lang::Ces => "cs",
        Lang::Ron => "ro",
        Lang::Hun => "hu",
        Lang::Heb => "he",
        Lang::Tha => "th",
        Lang::Ind => "id",
        Lang::Cat => "ca",
        _ => return None,
    };
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::{PdfDictionary, PdfStream};

    fn lang_of(doc: &Document) -> Option<String> {
        doc.catalog()
            .ok()?
            .get("Lang")
            .and_then(|l| l.as_string())
            .map(|s| s.to_text())
    }

    fn doc_with_text(text: &str) -> Document {
        let mut doc = Document::new();
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
        doc
    }

    #[test]
    fn test_existing_lang_kept() {
        let mut doc = Document::new();
        doc.set_catalog_entry("Lang", PdfObject::text("fr-CA")).unwrap();
        let config = RemediationConfig::default();
        let report = LanguageRemediator::new(&config)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert!(!report.applied);
        assert_eq!(lang_of(&doc).unwrap(), "fr-CA");
    }

    #[test]
    fn test_default_when_too_little_text() {
        let mut doc = doc_with_text("short text");
        let config = RemediationConfig::default();
        LanguageRemediator::new(&config)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert_eq!(lang_of(&doc).unwrap(), "en-US");
    }

    #[test]
    fn test_english_detected() {
        let mut doc = doc_with_text(
            "The quick brown fox jumps over the lazy dog and keeps running through \
             the quiet evening fields while the farmer watches from the old wooden porch",
        );
        let config = RemediationConfig::default();
        LanguageRemediator::new(&config)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert_eq!(lang_of(&doc).unwrap(), "en");
    }

    #[test]
    fn test_spanish_detected() {
        let mut doc = doc_with_text(
            "El rapido zorro marron salta sobre el perro perezoso mientras el granjero \
             observa desde el viejo porche de madera durante una tarde tranquila de verano \
             cerca de los campos silenciosos",
        );
        let config = RemediationConfig::default();
        LanguageRemediator::new(&config)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert_eq!(lang_of(&doc).unwrap(), "es");
    }

    #[test]
    fn test_blank_lang_rewritten() {
        let mut doc = doc_with_text("short");
        doc.set_catalog_entry("Lang", PdfObject::text("  ")).unwrap();
        let config = RemediationConfig::default();
        let report = LanguageRemediator::new(&config)
            .apply(&mut doc, &CancelToken::new())
            .unwrap();
        assert!(report.applied);
        assert_eq!(lang_of(&doc).unwrap(), "en-US");
    }
}
