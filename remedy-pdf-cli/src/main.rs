//! Command-line front end for the remediation pipeline.
//!
//! Runs one document through the full ingest flow with the in-memory
//! providers (or the remote vendors when built with `remote-services`
//! and given a base URL).

use clap::Parser;
use remedy_pdf::cancel::CancelToken;
use remedy_pdf::pipeline::{IngestPipeline, PipelineConfig};
use remedy_pdf::services::{
    MockAccessibilityChecker, MockAutotagProvider, MockGenerationProvider, MockRasterizer,
};
use remedy_pdf::StepStatus;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "remedy-pdf",
    about = "Remediate a PDF's accessibility metadata and tag tree",
    version
)]
struct Args {
    /// Input PDF
    input: PathBuf,

    /// Directory for working files and the remediated output
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Skip the autotagging stage
    #[arg(long)]
    no_autotag: bool,

    /// Autotag even documents that already carry a structure tree
    #[arg(long)]
    retag: bool,

    /// Generate alt text for link structure elements
    #[arg(long)]
    link_alt: bool,

    /// Demote small header-less tables to Div
    #[arg(long)]
    demote_layout_tables: bool,

    /// Pages per autotag chunk
    #[arg(long, default_value_t = 200)]
    max_pages_per_chunk: usize,

    /// Default language written when detection fails
    #[arg(long, default_value = "en-US")]
    default_language: String,

    #[cfg(feature = "remote-services")]
    /// Base URL of the vendor services; mocks are used when absent
    #[arg(long)]
    service_url: Option<String>,

    #[cfg(feature = "remote-services")]
    /// API key for the vendor services
    #[arg(long, default_value = "")]
    api_key: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("processing failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let input = std::fs::read(&args.input)?;
    let file_id = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    let mut config = PipelineConfig {
        max_pages_per_chunk: args.max_pages_per_chunk,
        use_autotagging: !args.no_autotag,
        autotag_already_tagged_pdfs: args.retag,
        ..PipelineConfig::default()
    };
    if let Some(out_dir) = &args.out_dir {
        config.work_dir_root = out_dir.clone();
    }
    config.remediation.generate_link_alt_text = args.link_alt;
    config.remediation.demote_small_tables_without_headers = args.demote_layout_tables;
    config.remediation.default_primary_language = args.default_language.clone();

    let autotag = MockAutotagProvider::new();
    let checker = MockAccessibilityChecker::new();
    let generation = MockGenerationProvider::new();
    let rasterizer = MockRasterizer::new();

    #[cfg(feature = "remote-services")]
    if let Some(url) = &args.service_url {
        use remedy_pdf::services::remote::{RemoteServiceConfig, RemoteServicesClient};
        let client =
            RemoteServicesClient::new(RemoteServiceConfig::new(url.clone(), args.api_key.clone()))?;
        return run_pipeline(&config, &input, &file_id, &client, &client, &client, &client);
    }

    run_pipeline(
        &config,
        &input,
        &file_id,
        &autotag,
        &checker,
        &generation,
        &rasterizer,
    )
}

fn run_pipeline(
    config: &PipelineConfig,
    input: &[u8],
    file_id: &str,
    autotag: &dyn remedy_pdf::services::AutotagProvider,
    checker: &dyn remedy_pdf::services::AccessibilityChecker,
    generation: &dyn remedy_pdf::services::GenerationProvider,
    rasterizer: &dyn remedy_pdf::services::PageRasterizer,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = IngestPipeline::new(
        config.clone(),
        autotag,
        checker,
        generation,
        Some(rasterizer),
    );
    let output = pipeline.process(input, file_id, &CancelToken::new())?;

    println!("remediated: {}", output.pdf_path.display());
    for step in &output.outcome.steps {
        let marker = match step.status {
            StepStatus::Applied => "+",
            StepStatus::Skipped => "-",
            StepStatus::Failed => "!",
        };
        println!("  {marker} {:<16} {}", step.step, step.detail);
    }
    if output.before_report.is_some() || output.after_report.is_some() {
        println!(
            "reports: before={} after={}",
            output.before_report.is_some(),
            output.after_report.is_some()
        );
    }
    Ok(())
}
