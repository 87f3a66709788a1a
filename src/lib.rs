//! # docubrief
//!
//! Turn an uploaded PDF into a page-by-page view: a rendered image, the
//! page's text, and an LLM-written summary with bullet points.
//!
//! ## Why this crate?
//!
//! Skimming a long document page by page is slow. This crate renders every
//! page, pulls out its text, and asks a language model for a short summary
//! and key points per page, all requests in parallel. A new upload always
//! wins: whatever the previous document was still doing is dropped, and its
//! late results can never overwrite the new one's.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Load     %PDF- signature, encryption check, page count (pdfium)
//!  ├─ 2. Extract  render + text per page on one shared surface, sequential
//!  ├─ 3. Analyse  one summarization request per page, concurrent, fail-fast
//!  └─ 4. Publish  status + pages + results on a watch channel, per generation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docubrief::{LlmSummarizer, PipelineConfig, PipelineController, SummarizerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let summarizer = LlmSummarizer::from_config(SummarizerConfig::default())?;
//!     let controller =
//!         PipelineController::with_pdfium(Arc::new(summarizer), PipelineConfig::default());
//!
//!     let bytes = std::fs::read("report.pdf")?;
//!     let outcome = controller.run("report.pdf", bytes).await;
//!     if let Some(run) = outcome.run() {
//!         for page in run.view().pages {
//!             println!("{}: {}", page.page_number, page.summary.unwrap_or_default());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docubrief` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docubrief = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod state;
pub mod stream;
pub mod summarizer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AggregationPolicy, InFlightLimit, PipelineConfig, PipelineConfigBuilder, SummarizerConfig,
    SummarizerConfigBuilder,
};
pub use controller::{PipelineController, RunOutcome};
pub use error::{BackendError, FailureKind, FailureReason, PipelineError, SummarizeError};
pub use output::{AnalysisResult, DocumentView, PageArtifact, PageImage, PageView};
pub use pipeline::backend::{PdfBackend, PdfiumBackend, RenderParams};
pub use pipeline::dispatch::AnalysisDispatcher;
pub use pipeline::extract::PageExtractor;
pub use pipeline::llm::LlmSummarizer;
pub use pipeline::loader::{DocumentLoader, LoadedDocument, PageHandle};
pub use pipeline::postprocess::parse_bullet_points;
pub use pipeline::surface::{RenderSurface, SharedSurface};
pub use progress::{NoopObserver, ObserverHandle, PipelineObserver};
pub use state::{PipelineRun, PipelineStatus};
pub use stream::{follow_generation, watch_runs, RunStream};
pub use summarizer::{Summarizer, SummaryRequest, SummaryResponse};
