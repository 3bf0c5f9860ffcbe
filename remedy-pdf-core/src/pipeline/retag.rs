//! Retag recommendation from accessibility-check reports.
//!
//! A "before" report showing failures of the core tagging rules means the
//! document's structure tree is unusable and in-place remediation would
//! build on sand; those documents should go back through autotagging.
//! Tab-order failures alone never trigger a retag (the tab-order step
//! fixes them in place).

use crate::error::Result;
use crate::text_util::eq_ignore_case_and_whitespace;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Rules whose failure warrants a full retag, as (section, rule) pairs.
/// Matching ignores case and whitespace on both components.
const TRIGGER_RULES: &[(&str, &str)] = &[
    ("Document", "TaggedPDF"),
    ("PageContent", "TaggedContent"),
    ("PageContent", "TaggedAnnotations"),
    ("PageContent", "TaggedMultimedia"),
    ("Forms", "TaggedFormFields"),
    ("Headings", "AppropriateNesting"),
];

#[derive(Debug, Deserialize)]
struct Report {
    /// Section name -> rule results. BTreeMap keeps trigger output
    /// deterministic regardless of JSON key order.
    #[serde(rename = "Detailed Report", default)]
    detailed: BTreeMap<String, Vec<RuleResult>>,
}

#[derive(Debug, Deserialize)]
struct RuleResult {
    #[serde(rename = "Rule", default)]
    rule: String,
    #[serde(rename = "Status", default)]
    status: String,
}

/// Decides whether a checked document needs re-tagging.
pub struct RetagDecider;

impl RetagDecider {
    /// Inspect a report. Returns the decision and the matched triggers as
    /// `"Section: Rule"` strings (report spelling preserved).
    ///
    /// The decision depends only on the set of failed (section, rule)
    /// pairs; report ordering is irrelevant.
    pub fn should_retag(report_json: &str) -> Result<(bool, Vec<String>)> {
        let report: Report = serde_json::from_str(report_json)?;
        let mut triggers = Vec::new();
        for (section, results) in &report.detailed {
            for result in results {
                if !eq_ignore_case_and_whitespace(&result.status, "Failed") {
                    continue;
                }
                let matched = TRIGGER_RULES.iter().any(|(trigger_section, trigger_rule)| {
                    eq_ignore_case_and_whitespace(section, trigger_section)
                        && eq_ignore_case_and_whitespace(&result.rule, trigger_rule)
                });
                if matched {
                    triggers.push(format!("{section}: {}", result.rule));
                }
            }
        }
        Ok((!triggers.is_empty(), triggers))
    }
}
