//! Ingest-pipeline tests: chunked autotagging, tagged-input handling,
//! best-effort checks and atomic output.

mod common;

use common::*;
use remedy_pdf::cancel::CancelToken;
use remedy_pdf::document::Document;
use remedy_pdf::pipeline::{sanitize_file_id, IngestPipeline, PipelineConfig};
use remedy_pdf::services::{
    MockAccessibilityChecker, MockAutotagProvider, MockGenerationProvider, MockRasterizer,
};

fn pipeline_config(work_dir: &std::path::Path, max_pages_per_chunk: usize) -> PipelineConfig {
    PipelineConfig {
        max_pages_per_chunk,
        work_dir_root: work_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

#[test]
fn scenario_seven_pages_chunked_in_threes() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(7);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let rasterizer = MockRasterizer::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 3),
        &autotag,
        &checker,
        &generation,
        Some(&rasterizer),
    );

    let output = pipeline
        .process(&input, "big.pdf", &CancelToken::new())
        .unwrap();

    // Three chunks of 3, 3 and 1 pages, submitted in order.
    assert_eq!(autotag.calls(), 3);
    assert_eq!(autotag.submitted_page_counts(), vec![3, 3, 1]);
    for chunk in 1..=3 {
        assert!(work
            .path()
            .join("big.pdf")
            .join(format!("chunk_{chunk:03}.pdf"))
            .is_file());
    }

    // The merged tagged intermediate and the final output both have all
    // seven pages.
    let tagged = std::fs::read(work.path().join("big.pdf").join("tagged.pdf")).unwrap();
    assert_eq!(Document::from_bytes(&tagged).unwrap().page_count(), 7);
    let remediated = std::fs::read(&output.pdf_path).unwrap();
    let final_doc = Document::from_bytes(&remediated).unwrap();
    assert_eq!(final_doc.page_count(), 7);
    assert!(final_doc.is_tagged());
}

#[test]
fn scenario_already_tagged_skips_autotag() {
    let work = tempfile::tempdir().unwrap();
    let (mut doc, ..) = tagged_doc_with_heading_and_figure();
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "tagged.pdf", &CancelToken::new())
        .unwrap();

    assert_eq!(autotag.calls(), 0);
    let final_doc = Document::from_bytes(&std::fs::read(&output.pdf_path).unwrap()).unwrap();
    assert_eq!(final_doc.page_count(), 1);
    assert!(final_doc.is_tagged());
    // Remediation edits still applied to the passthrough document.
    assert!(title_of(&final_doc).is_some());
}

#[test]
fn scenario_trivially_tagged_is_retagged() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = trivially_tagged_doc(1);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "trivial.pdf", &CancelToken::new())
        .unwrap();

    assert_eq!(autotag.calls(), 1);
    let final_doc = Document::from_bytes(&std::fs::read(&output.pdf_path).unwrap()).unwrap();
    assert!(final_doc.is_tagged());
    assert!(!final_doc.is_trivially_tagged());
}

#[test]
fn failed_retag_rule_forces_autotag_of_tagged_document() {
    let work = tempfile::tempdir().unwrap();
    let (mut doc, ..) = tagged_doc_with_heading_and_figure();
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::with_report(
        r#"{"Detailed Report":{"PageContent":[{"Rule":"Tagged content","Status":"Failed"}]}}"#,
    );
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    pipeline
        .process(&input, "broken-tags.pdf", &CancelToken::new())
        .unwrap();
    assert_eq!(autotag.calls(), 1);
}

#[test]
fn checker_failure_does_not_abort() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(1);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::failing();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "doc.pdf", &CancelToken::new())
        .unwrap();
    assert!(output.before_report.is_none());
    assert!(output.after_report.is_none());
    assert!(output.pdf_path.is_file());
}

#[test]
fn autotag_failure_falls_back_to_source() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(2);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::failing();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "doc.pdf", &CancelToken::new())
        .unwrap();
    assert_eq!(autotag.calls(), 1);
    let final_doc = Document::from_bytes(&std::fs::read(&output.pdf_path).unwrap()).unwrap();
    assert_eq!(final_doc.page_count(), 2);
    // Untagged fallback still receives the metadata repairs.
    assert!(title_of(&final_doc).is_some());
}

#[test]
fn reports_written_into_working_directory() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(1);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "doc.pdf", &CancelToken::new())
        .unwrap();
    let dir = work.path().join("doc.pdf");
    assert!(dir.join("source.pdf").is_file());
    assert!(dir.join("before_report.json").is_file());
    assert!(dir.join("after_report.json").is_file());
    assert!(output.before_report.is_some());
    assert!(output.after_report.is_some());
}

#[test]
fn hostile_file_id_kept_inside_work_root() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(1);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let output = pipeline
        .process(&input, "../../escape:attempt.pdf", &CancelToken::new())
        .unwrap();
    assert!(output.pdf_path.starts_with(work.path()));
}

#[test]
fn cancelled_run_produces_no_output() {
    let work = tempfile::tempdir().unwrap();
    let mut doc = doc_with_text_pages(1);
    let input = doc.to_bytes().unwrap();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let pipeline = IngestPipeline::new(
        pipeline_config(work.path(), 200),
        &autotag,
        &checker,
        &generation,
        None,
    );

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(pipeline.process(&input, "doc.pdf", &cancel).is_err());
    assert!(!work.path().join("doc.pdf").join("remediated.pdf").exists());
}

#[test]
fn file_id_sanitizer_strips_separators() {
    assert!(!sanitize_file_id("a/b\\c").contains('/'));
    assert!(!sanitize_file_id("a/b\\c").contains('\\'));
    assert!(!sanitize_file_id("").is_empty());
}
