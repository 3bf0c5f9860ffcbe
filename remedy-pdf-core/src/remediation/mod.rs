//! The remediation engine.
//!
//! Runs the accessibility repair steps over a document in a fixed order:
//! title, language, tab order, bookmarks, layout-table demotion, table
//! summaries, annotation pruning, figure alt text, link alt text, and the
//! alt-text fallback pass. Every step is best-effort: preconditions not
//! met make it a no-op, and a step-local failure is logged and contained
//! at the step boundary so the remaining steps still run. Only
//! cancellation propagates out.

pub mod annotations;
pub mod bookmarks;
pub mod config;
pub mod figures;
pub mod language;
pub mod links;
pub mod page_text;
pub mod tab_order;
pub mod tables;
pub mod title;

pub use config::RemediationConfig;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::services::{GenerationProvider, PageRasterizer};
use std::time::Instant;

/// What a step did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The step changed the document
    Applied,
    /// Preconditions not met; document untouched
    Skipped,
    /// The step failed; its mutations were not written
    Failed,
}

/// Outcome record for one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: &'static str,
    pub status: StepStatus,
    /// Human-readable summary ("3 bookmarks", "kept existing title")
    pub detail: String,
    pub elapsed_ms: u128,
}

/// Result of a full remediation run: the per-step ledger callers surface
/// as "what changed".
#[derive(Debug, Clone, Default)]
pub struct RemediationOutcome {
    pub steps: Vec<StepOutcome>,
}

impl RemediationOutcome {
    pub fn status_of(&self, step: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.status)
    }

    pub fn applied_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Applied)
            .count()
    }
}

/// Report returned by each step implementation.
pub struct StepReport {
    pub applied: bool,
    pub detail: String,
}

impl StepReport {
    pub fn applied(detail: impl Into<String>) -> Self {
        Self {
            applied: true,
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            applied: false,
            detail: detail.into(),
        }
    }
}

/// The PDF remediation engine.
///
/// Holds the configuration and backend providers for one request. The
/// document itself is passed into [`RemediationEngine::remediate`] and
/// mutated in place.
pub struct RemediationEngine<'a> {
    config: RemediationConfig,
    generation: &'a dyn GenerationProvider,
    rasterizer: Option<&'a dyn PageRasterizer>,
}

impl<'a> RemediationEngine<'a> {
    pub fn new(
        config: RemediationConfig,
        generation: &'a dyn GenerationProvider,
        rasterizer: Option<&'a dyn PageRasterizer>,
    ) -> Self {
        Self {
            config,
            generation,
            rasterizer,
        }
    }

    pub fn config(&self) -> &RemediationConfig {
        &self.config
    }

    /// Run all steps over `doc`. `file_id` only labels log records.
    pub fn remediate(
        &self,
        doc: &mut Document,
        file_id: &str,
        cancel: &CancelToken,
    ) -> Result<RemediationOutcome> {
        let mut outcome = RemediationOutcome::default();
        let tagged = doc.is_tagged();

        self.run_step(&mut outcome, doc, file_id, cancel, "title", |doc, cancel| {
            title::TitleRemediator::new(&self.config, self.generation).apply(doc, cancel)
        })?;
        self.run_step(&mut outcome, doc, file_id, cancel, "language", |doc, cancel| {
            language::LanguageRemediator::new(&self.config).apply(doc, cancel)
        })?;

        if !tagged {
            tracing::debug!(file_id, "document untagged; tag-tree steps skipped");
        } else {
            self.run_step(&mut outcome, doc, file_id, cancel, "tab_order", |doc, cancel| {
                tab_order::TabOrderRemediator::new().apply(doc, cancel)
            })?;
            self.run_step(&mut outcome, doc, file_id, cancel, "bookmarks", |doc, cancel| {
                bookmarks::BookmarkBuilder::new().apply(doc, cancel)
            })?;
            self.run_step(
                &mut outcome,
                doc,
                file_id,
                cancel,
                "layout_tables",
                |doc, cancel| {
                    tables::LayoutTableDemoter::new(&self.config).apply(doc, cancel)
                },
            )?;
            self.run_step(
                &mut outcome,
                doc,
                file_id,
                cancel,
                "table_summaries",
                |doc, cancel| tables::TableSummarizer::new().apply(doc, cancel),
            )?;
            self.run_step(
                &mut outcome,
                doc,
                file_id,
                cancel,
                "annotations",
                |doc, cancel| {
                    annotations::UntaggedAnnotationRemediator::new().apply(doc, cancel)
                },
            )?;
            self.run_step(&mut outcome, doc, file_id, cancel, "figure_alt", |doc, cancel| {
                figures::FigureAltPipeline::new(&self.config, self.generation, self.rasterizer)
                    .apply(doc, cancel)
            })?;
            if self.config.generate_link_alt_text {
                self.run_step(&mut outcome, doc, file_id, cancel, "link_alt", |doc, cancel| {
                    links::LinkAltPipeline::new(&self.config, self.generation).apply(doc, cancel)
                })?;
            }
            // The safety net runs after every per-page pass so reruns see
            // sentinels, not gaps.
            self.run_step(
                &mut outcome,
                doc,
                file_id,
                cancel,
                "alt_fallback",
                |doc, cancel| figures::AltFallback::new(&self.config).apply(doc, cancel),
            )?;
        }
        Ok(outcome)
    }

    /// Run one step behind the best-effort boundary: failures are logged
    /// and recorded, cancellation propagates.
    fn run_step(
        &self,
        outcome: &mut RemediationOutcome,
        doc: &mut Document,
        file_id: &str,
        cancel: &CancelToken,
        step: &'static str,
        f: impl FnOnce(&mut Document, &CancelToken) -> Result<StepReport>,
    ) -> Result<()> {
        cancel.check()?;
        let started = Instant::now();
        let (status, detail) = match f(doc, cancel) {
            Ok(report) => (
                if report.applied {
                    StepStatus::Applied
                } else {
                    StepStatus::Skipped
                },
                report.detail,
            ),
            Err(PdfError::OperationCancelled) => return Err(PdfError::OperationCancelled),
            Err(err) => {
                tracing::warn!(file_id, step, error = %err, "remediation step failed");
                (StepStatus::Failed, err.to_string())
            }
        };
        let elapsed_ms = started.elapsed().as_millis();
        tracing::info!(
            file_id,
            step,
            ?status,
            detail = %detail,
            elapsed_ms = elapsed_ms as u64,
            "remediation step finished"
        );
        outcome.steps.push(StepOutcome {
            step,
            status,
            detail,
            elapsed_ms,
        });
        Ok(())
    }
}
