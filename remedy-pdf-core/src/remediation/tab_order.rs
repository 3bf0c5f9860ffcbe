//! Tab-order remediation.
//!
//! `/Tabs /S` makes keyboard focus follow the document structure instead
//! of annotation declaration order.

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::Result;
use crate::parser::objects::PdfObject;

use super::StepReport;

pub struct TabOrderRemediator;

impl TabOrderRemediator {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, doc: &mut Document, cancel: &CancelToken) -> Result<StepReport> {
        let mut changed = 0usize;
        for page_id in doc.page_ids() {
            cancel.check()?;
            let already_structure = doc
                .get_dict(page_id)
                .and_then(|d| d.get("Tabs"))
                .and_then(|t| doc.resolve(t).as_name())
                == Some("S");
            if already_structure {
                continue;
            }
            if let Some(page) = doc.get_dict_mut(page_id) {
                page.insert("Tabs", PdfObject::name("S"));
                changed += 1;
            }
        }
        if changed == 0 {
            Ok(StepReport::skipped("all pages already /Tabs /S"))
        } else {
            Ok(StepReport::applied(format!("set /Tabs /S on {changed} page(s)")))
        }
    }
}

impl Default for TabOrderRemediator {
    fn default() -> Self {
        Self::new()
    }
}
