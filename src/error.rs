//! Error types for the docubrief pipeline.
//!
//! Three error types reflect three different layers:
//!
//! * [`PipelineError`]: a stage of one run failed. The three user-facing
//!   kinds (`InvalidDocument`, `Extraction`, `Service`) end the run in
//!   [`crate::state::PipelineStatus::Failed`]; `Cancelled` marks a run that
//!   was superseded by a newer upload and is never shown to the user.
//!
//! * [`BackendError`]: the PDF engine refused a document or a page. The
//!   loader and extractor translate these into `PipelineError`s with the
//!   page number attached.
//!
//! * [`SummarizeError`]: the summarization capability failed for a single
//!   request. The dispatcher folds these into one `PipelineError::Service`
//!   according to the configured aggregation policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors produced while driving a single pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Load errors ───────────────────────────────────────────────────────
    /// The buffer is not a PDF, is corrupt, or is encrypted.
    #[error("Document '{source_name}' cannot be opened: {reason}")]
    InvalidDocument { source_name: String, reason: String },

    /// Requested page number is outside `1..=total`.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A page could not be rendered or its text could not be read.
    #[error("Extraction failed for page {page}: {detail}")]
    Extraction { page: usize, detail: String },

    // ── Analysis errors ───────────────────────────────────────────────────
    /// The summarization batch failed.
    ///
    /// `failed` counts the requests that failed; `first_error` is the first
    /// failure observed, tagged with its page.
    #[error("Summarization failed for {failed}/{total} pages.\nFirst error: {first_error}")]
    Service {
        failed: usize,
        total: usize,
        first_error: SummarizeError,
    },

    // ── Supersession ──────────────────────────────────────────────────────
    /// A newer upload started while generation `generation` was in flight.
    #[error("Run {generation} was superseded by a newer upload")]
    Cancelled { generation: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (a blocking task panicked, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True when this error only means "a newer run took over".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled { .. })
    }
}

/// The three failure kinds a run can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidDocument,
    ExtractionError,
    ServiceError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::InvalidDocument => "invalid document",
            FailureKind::ExtractionError => "extraction error",
            FailureKind::ServiceError => "service error",
        };
        f.write_str(s)
    }
}

/// Serialisable reason carried by a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Errors reported by a [`crate::pipeline::backend::PdfBackend`].
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The document is encrypted, with a user or owner password. The loader
    /// never supplies one.
    #[error("document is encrypted; password-protected documents are not supported")]
    PasswordRequired,

    /// Header, trailer or xref could not be parsed.
    #[error("document is corrupt: {0}")]
    Malformed(String),

    /// The page object could not be rasterised.
    #[error("rendering failed: {0}")]
    Render(String),

    /// The page's text layer could not be read.
    #[error("text retrieval failed: {0}")]
    Text(String),

    /// The PDF engine itself is not available on this machine.
    #[error(
        "failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the \
binary, or install it system-wide."
    )]
    Unavailable(String),
}

/// A single failed summarization request.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum SummarizeError {
    /// The request carried no text to summarise.
    #[error("Page {page}: no text to summarise")]
    EmptyInput { page: usize },

    /// The call did not finish within the capability's timeout.
    #[error("Page {page}: summarization timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The provider returned an error after all retries.
    #[error("Page {page}: provider call failed after {retries} retries: {detail}")]
    Provider {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// The provider replied, but the reply had no usable summary.
    #[error("Page {page}: malformed response: {detail}")]
    MalformedResponse { page: usize, detail: String },
}

impl SummarizeError {
    /// Page number the failing request was for.
    pub fn page(&self) -> usize {
        match self {
            SummarizeError::EmptyInput { page }
            | SummarizeError::Timeout { page, .. }
            | SummarizeError::Provider { page, .. }
            | SummarizeError::MalformedResponse { page, .. } => *page,
        }
    }
}
