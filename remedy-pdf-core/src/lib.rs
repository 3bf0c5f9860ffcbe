//! # remedy-pdf
//!
//! PDF accessibility remediation in pure Rust. The engine opens a tagged
//! (or untagged) PDF and deterministically repairs the properties
//! assistive technology depends on: document title and primary language,
//! per-page tab order, bookmarks derived from heading structure, table
//! summaries, layout-table demotion, removal of annotations not anchored
//! in the structure tree, and alt text for raster and vector figures
//! (and, optionally, links). An ingest pipeline wraps the engine with
//! autotagging (chunked for large files) and before/after accessibility
//! checks.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use remedy_pdf::cancel::CancelToken;
//! use remedy_pdf::pipeline::{IngestPipeline, PipelineConfig};
//! use remedy_pdf::services::{
//!     MockAccessibilityChecker, MockAutotagProvider, MockGenerationProvider, MockRasterizer,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = std::fs::read("report.pdf")?;
//!
//! let autotag = MockAutotagProvider::new();
//! let checker = MockAccessibilityChecker::new();
//! let generation = MockGenerationProvider::new();
//! let rasterizer = MockRasterizer::new();
//!
//! let pipeline = IngestPipeline::new(
//!     PipelineConfig::default(),
//!     &autotag,
//!     &checker,
//!     &generation,
//!     Some(&rasterizer),
//! );
//! let output = pipeline.process(&input, "report.pdf", &CancelToken::new())?;
//! println!("remediated: {}", output.pdf_path.display());
//! for step in &output.outcome.steps {
//!     println!("  {}: {:?} ({})", step.step, step.status, step.detail);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Swap the mock providers for
//! [`services::remote::RemoteServicesClient`](crate::services) (feature
//! `remote-services`) to run against the real vendors; the engine never
//! branches on which implementation it holds.
//!
//! # Module map
//!
//! - [`parser`] / [`document`] / [`writer`]: the in-memory PDF layer
//! - [`structure`]: structure-tree traversal, indexes, ParentTree
//! - [`scanner`]: content-stream scanning (text, images, paths, MCIDs)
//! - [`remediation`]: the engine and its individual steps
//! - [`pipeline`]: chunked autotagging, checks, orchestration
//! - [`services`]: provider traits, mocks, remote adapters

pub mod cancel;
pub mod document;
pub mod error;
pub mod geometry;
pub mod parser;
pub mod pipeline;
pub mod remediation;
pub mod scanner;
pub mod services;
pub mod structure;
pub mod text_util;
pub mod writer;

pub use cancel::CancelToken;
pub use document::{Document, ObjectId};
pub use error::{PdfError, Result};
pub use pipeline::{IngestPipeline, PipelineConfig, PipelineOutput, RetagDecider};
pub use remediation::{RemediationConfig, RemediationEngine, RemediationOutcome, StepStatus};
