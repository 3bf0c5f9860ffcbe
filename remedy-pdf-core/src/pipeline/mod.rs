//! Ingest pipeline.
//!
//! Drives one document end to end: working-directory setup, a
//! best-effort "before" accessibility check, autotagging (chunked for
//! large documents), remediation, a best-effort "after" check, and an
//! atomic final write. Only malformed input, cancellation and local I/O
//! failures abort; external-service failures degrade to the previous
//! artifact.

pub mod chunker;
mod copy;
pub mod merge;
pub mod retag;

pub use retag::RetagDecider;

use crate::cancel::CancelToken;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::remediation::{RemediationConfig, RemediationEngine, RemediationOutcome};
use crate::services::{
    AccessibilityChecker, AutotagProvider, GenerationProvider, PageRasterizer,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest page count submitted to autotagging in one piece
    pub max_pages_per_chunk: usize,
    /// Root of per-file working directories; `/tmp` when present, else
    /// the platform temp dir
    pub work_dir_root: PathBuf,
    /// Submit documents to the autotagging service
    pub use_autotagging: bool,
    /// Autotag even meaningfully tagged documents
    pub autotag_already_tagged_pdfs: bool,
    /// Options forwarded to the remediation engine
    pub remediation: RemediationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages_per_chunk: 200,
            work_dir_root: default_work_root(),
            use_autotagging: true,
            autotag_already_tagged_pdfs: false,
            remediation: RemediationConfig::default(),
        }
    }
}

fn default_work_root() -> PathBuf {
    let tmp = PathBuf::from("/tmp");
    if tmp.is_dir() {
        tmp
    } else {
        std::env::temp_dir()
    }
}

/// Everything a caller gets back for one processed document.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Path of the remediated PDF inside the working directory
    pub pdf_path: PathBuf,
    /// Accessibility report before remediation, when the checker answered
    pub before_report: Option<String>,
    /// Accessibility report after remediation
    pub after_report: Option<String>,
    /// Per-step remediation ledger
    pub outcome: RemediationOutcome,
}

/// The ingest orchestrator.
pub struct IngestPipeline<'a> {
    config: PipelineConfig,
    autotag: &'a dyn AutotagProvider,
    checker: &'a dyn AccessibilityChecker,
    generation: &'a dyn GenerationProvider,
    rasterizer: Option<&'a dyn PageRasterizer>,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        config: PipelineConfig,
        autotag: &'a dyn AutotagProvider,
        checker: &'a dyn AccessibilityChecker,
        generation: &'a dyn GenerationProvider,
        rasterizer: Option<&'a dyn PageRasterizer>,
    ) -> Self {
        Self {
            config,
            autotag,
            checker,
            generation,
            rasterizer,
        }
    }

    /// Process one document. `file_id` names the working directory (after
    /// sanitization) and labels log records.
    pub fn process(
        &self,
        input: &[u8],
        file_id: &str,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput> {
        cancel.check()?;
        let work_dir = self.config.work_dir_root.join(sanitize_file_id(file_id));
        fs::create_dir_all(&work_dir)?;
        fs::write(work_dir.join("source.pdf"), input)?;

        // Malformed input aborts before any external work.
        let source_doc = Document::from_bytes(input)
            .map_err(|e| PdfError::InvalidInput(format!("unreadable PDF: {e}")))?;

        let before_report = self.run_check(input, file_id, &work_dir, "before");
        cancel.check()?;

        let tagged_bytes =
            self.autotag_stage(input, &source_doc, before_report.as_deref(), file_id, &work_dir, cancel)?;
        cancel.check()?;

        let mut doc = Document::from_bytes(&tagged_bytes)
            .map_err(|e| PdfError::InvalidInput(format!("unreadable tagged PDF: {e}")))?;
        let engine = RemediationEngine::new(
            self.config.remediation.clone(),
            self.generation,
            self.rasterizer,
        );
        let outcome = engine.remediate(&mut doc, file_id, cancel)?;
        let remediated = doc.to_bytes()?;

        let after_report = self.run_check(&remediated, file_id, &work_dir, "after");
        cancel.check()?;

        // Atomic from the caller's view: write to a scratch file in the
        // same directory, rename into place; nothing partial is ever
        // visible under the final name.
        let final_path = work_dir.join("remediated.pdf");
        let mut scratch = tempfile::NamedTempFile::new_in(&work_dir)?;
        std::io::Write::write_all(&mut scratch, &remediated)?;
        scratch
            .persist(&final_path)
            .map_err(|e| PdfError::Io(e.error))?;

        Ok(PipelineOutput {
            pdf_path: final_path,
            before_report,
            after_report,
            outcome,
        })
    }

    /// Best-effort accessibility check; failures log and return None.
    fn run_check(
        &self,
        pdf: &[u8],
        file_id: &str,
        work_dir: &Path,
        label: &str,
    ) -> Option<String> {
        match self.checker.check(pdf, None) {
            Ok(output) => {
                let path = work_dir.join(format!("{label}_report.json"));
                if let Err(err) = fs::write(&path, &output.report_json) {
                    tracing::warn!(file_id, "could not persist {} report: {}", label, err);
                }
                Some(output.report_json)
            }
            Err(err) => {
                tracing::warn!(file_id, "{} accessibility check failed: {}", label, err);
                None
            }
        }
    }

    /// Decide whether to autotag and run the (possibly chunked)
    /// submission. Best-effort: failures fall back to the source bytes.
    fn autotag_stage(
        &self,
        input: &[u8],
        source_doc: &Document,
        before_report: Option<&str>,
        file_id: &str,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>> {
        if !self.config.use_autotagging {
            return Ok(input.to_vec());
        }

        let meaningfully_tagged =
            source_doc.is_tagged() && !source_doc.is_trivially_tagged();
        let retag_recommended = before_report
            .and_then(|report| match RetagDecider::should_retag(report) {
                Ok((retag, triggers)) => {
                    if retag {
                        tracing::info!(file_id, ?triggers, "retag recommended by before-report");
                    }
                    Some(retag)
                }
                Err(err) => {
                    tracing::debug!(file_id, "before-report not parseable: {}", err);
                    None
                }
            })
            .unwrap_or(false);

        if meaningfully_tagged && !self.config.autotag_already_tagged_pdfs && !retag_recommended {
            tracing::debug!(file_id, "document already tagged; autotag skipped");
            return Ok(input.to_vec());
        }

        let page_count = source_doc.page_count();
        if page_count <= self.config.max_pages_per_chunk {
            return Ok(match self.autotag.autotag(input) {
                Ok(output) => output.tagged_pdf,
                Err(err) => {
                    tracing::warn!(file_id, "autotag failed, continuing untagged: {}", err);
                    input.to_vec()
                }
            });
        }

        match self.autotag_chunked(source_doc, page_count, file_id, work_dir, cancel) {
            Ok(Some(merged)) => Ok(merged),
            Ok(None) => Ok(input.to_vec()),
            Err(PdfError::OperationCancelled) => Err(PdfError::OperationCancelled),
            Err(err) => {
                tracing::warn!(file_id, "chunked autotag failed, continuing untagged: {}", err);
                Ok(input.to_vec())
            }
        }
    }

    fn autotag_chunked(
        &self,
        source_doc: &Document,
        page_count: usize,
        file_id: &str,
        work_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<u8>>> {
        let ranges = chunker::chunk_ranges(page_count, self.config.max_pages_per_chunk);
        tracing::info!(
            file_id,
            chunks = ranges.len(),
            page_count,
            "submitting document in chunks"
        );

        let mut tagged_chunks = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            cancel.check()?;
            let mut chunk = chunker::extract_page_range(source_doc, *range)?;
            let chunk_bytes = chunk.to_bytes()?;
            let output = self.autotag.autotag(&chunk_bytes)?;
            let chunk_path = work_dir.join(format!("chunk_{:03}.pdf", index + 1));
            fs::write(&chunk_path, &output.tagged_pdf)?;
            tagged_chunks.push(Document::from_bytes(&output.tagged_pdf)?);
        }
        if tagged_chunks.is_empty() {
            return Ok(None);
        }

        let mut merged = merge::merge_documents(&tagged_chunks)?;
        let merged_bytes = merged.to_bytes()?;
        fs::write(work_dir.join("tagged.pdf"), &merged_bytes)?;
        Ok(Some(merged_bytes))
    }
}

/// Replace path-hostile characters in a caller-provided file id.
pub fn sanitize_file_id(file_id: &str) -> String {
    let sanitized: String = file_id
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed
    }
}
