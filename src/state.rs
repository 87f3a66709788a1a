//! Run state: the status enum, its transition rules, and [`PipelineRun`].
//!
//! ```text
//! Idle ──▶ LoadingPdf ──▶ Extracting ──▶ Analyzing ──▶ Ready
//!              │               │              │
//!              └───────────────┴──────────────┴──▶ Failed(reason)
//! ```
//!
//! `Ready` and `Failed` are terminal for a generation. A new upload never
//! moves an old run forward; it starts a new `PipelineRun` with a larger
//! generation number.

use crate::error::{FailureKind, FailureReason, PipelineError};
use crate::output::{AnalysisResult, DocumentView, PageArtifact, PageView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle status of one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    LoadingPdf,
    Extracting,
    Analyzing,
    Ready,
    Failed(FailureReason),
}

impl PipelineStatus {
    /// Short lowercase name, stable for logs and progress output.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "idle",
            PipelineStatus::LoadingPdf => "loading_pdf",
            PipelineStatus::Extracting => "extracting",
            PipelineStatus::Analyzing => "analyzing",
            PipelineStatus::Ready => "ready",
            PipelineStatus::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Ready | PipelineStatus::Failed(_))
    }

    /// Whether `next` is a legal successor of `self` within one generation.
    pub fn can_advance_to(&self, next: &PipelineStatus) -> bool {
        use PipelineStatus::*;
        match (self, next) {
            (Idle, LoadingPdf)
            | (LoadingPdf, Extracting)
            | (Extracting, Analyzing)
            | (Analyzing, Ready) => true,
            (LoadingPdf | Extracting | Analyzing, Failed(_)) => true,
            _ => false,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            PipelineStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// The failure kind a stage error produces when raised in this status.
    ///
    /// Stage decides kind: anything going wrong while loading is an invalid
    /// document, while extracting an extraction error, while analysing a
    /// service error.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineStatus::LoadingPdf => Some(FailureKind::InvalidDocument),
            PipelineStatus::Extracting => Some(FailureKind::ExtractionError),
            PipelineStatus::Analyzing => Some(FailureKind::ServiceError),
            _ => None,
        }
    }
}

/// State of one upload-to-result run.
///
/// `pages` and `results` sit behind `Arc` so the controller can publish a
/// copy of the run on every transition without cloning rasters.
///
/// Invariants, enforced by the mutators below:
/// * `pages[i].index == i + 1` for every `i`
/// * every key of `results` is in `1..=pages.len()`
/// * `status` only moves forward along [`PipelineStatus::can_advance_to`]
#[derive(Debug, Clone)]
pub struct PipelineRun {
    generation: u64,
    source_name: String,
    pages: Arc<Vec<PageArtifact>>,
    results: Arc<BTreeMap<usize, AnalysisResult>>,
    status: PipelineStatus,
}

impl PipelineRun {
    /// The empty, idle run every controller starts with.
    pub fn idle() -> Self {
        Self::new(0, "")
    }

    pub(crate) fn new(generation: u64, source_name: impl Into<String>) -> Self {
        Self {
            generation,
            source_name: source_name.into(),
            pages: Arc::new(Vec::new()),
            results: Arc::new(BTreeMap::new()),
            status: PipelineStatus::Idle,
        }
    }

    /// A fresh run that has just received its upload.
    pub(crate) fn started(generation: u64, source_name: impl Into<String>) -> Self {
        let mut run = Self::new(generation, source_name);
        run.status = PipelineStatus::LoadingPdf;
        run
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn status(&self) -> &PipelineStatus {
        &self.status
    }

    pub fn pages(&self) -> &[PageArtifact] {
        &self.pages
    }

    pub fn results(&self) -> &BTreeMap<usize, AnalysisResult> {
        &self.results
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Move to `next`, refusing regressions and skips.
    pub(crate) fn advance(&mut self, next: PipelineStatus) -> Result<(), PipelineError> {
        if !self.status.can_advance_to(&next) {
            return Err(PipelineError::Internal(format!(
                "generation {}: illegal transition {} → {}",
                self.generation,
                self.status.label(),
                next.label()
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Attach the extracted pages. Allowed once, and only while extracting.
    pub(crate) fn set_pages(&mut self, pages: Vec<PageArtifact>) -> Result<(), PipelineError> {
        if self.status != PipelineStatus::Extracting || !self.pages.is_empty() {
            return Err(PipelineError::Internal(format!(
                "generation {}: pages attached in state {}",
                self.generation,
                self.status.label()
            )));
        }
        if let Some((pos, page)) = pages
            .iter()
            .enumerate()
            .find(|(pos, page)| page.index != pos + 1)
        {
            return Err(PipelineError::Internal(format!(
                "page list has a gap: position {} holds page {}",
                pos + 1,
                page.index
            )));
        }
        self.pages = Arc::new(pages);
        Ok(())
    }

    /// Attach analysis results. Only while analysing, and only for known pages.
    pub(crate) fn set_results(
        &mut self,
        results: BTreeMap<usize, AnalysisResult>,
    ) -> Result<(), PipelineError> {
        if self.status != PipelineStatus::Analyzing {
            return Err(PipelineError::Internal(format!(
                "generation {}: results attached in state {}",
                self.generation,
                self.status.label()
            )));
        }
        let total = self.pages.len();
        if let Some(&page) = results.keys().find(|&&k| k == 0 || k > total) {
            return Err(PipelineError::Internal(format!(
                "result for page {page} but document has {total} pages"
            )));
        }
        self.results = Arc::new(results);
        Ok(())
    }

    /// Join pages with results into presentation records, in page order.
    pub fn view(&self) -> DocumentView {
        let pages = self
            .pages
            .iter()
            .map(|page| {
                let result = self.results.get(&page.index);
                PageView {
                    page_number: page.index,
                    image: page.image.clone(),
                    text: page.text.clone(),
                    summary: result.map(|r| r.summary.clone()),
                    bullet_points: result.map(|r| r.bullet_points.clone()).unwrap_or_default(),
                }
            })
            .collect();

        DocumentView {
            generation: self.generation,
            source_name: self.source_name.clone(),
            status: self.status.clone(),
            pages,
        }
    }
}
