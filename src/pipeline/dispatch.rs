//! Analysis dispatch: one summarization request per page, issued concurrently.
//!
//! ## Concurrency
//!
//! Requests fan out through `futures::stream::buffer_unordered`, capped by
//! [`InFlightLimit`]. Completions arrive in any order; each one writes exactly
//! one key of the result map, so no two requests touch the same slot.
//!
//! ## Aggregation
//!
//! Under [`AggregationPolicy::FailFast`] the first failure returns at once.
//! Returning drops the stream, and with it every request still in flight, so
//! their transport calls are cancelled rather than left to finish unseen.
//! Under [`AggregationPolicy::BestEffort`] failures are logged and skipped;
//! the batch only fails when no page succeeded.

use crate::config::{AggregationPolicy, InFlightLimit};
use crate::error::{PipelineError, SummarizeError};
use crate::output::{AnalysisResult, PageArtifact};
use crate::progress::PipelineObserver;
use crate::summarizer::{Summarizer, SummaryRequest};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build one request per page, in page order.
pub fn build_requests(document_name: &str, pages: &[PageArtifact]) -> Vec<SummaryRequest> {
    pages
        .iter()
        .map(|page| SummaryRequest {
            document_name: document_name.to_string(),
            page_number: page.index,
            page_text: page.text.clone(),
        })
        .collect()
}

/// Who to tell about per-page outcomes, and under which generation.
#[derive(Clone, Copy)]
pub struct DispatchProgress<'a> {
    pub generation: u64,
    pub observer: Option<&'a dyn PipelineObserver>,
}

/// Fans page text out to a [`Summarizer`] and folds the replies.
#[derive(Clone)]
pub struct AnalysisDispatcher {
    summarizer: Arc<dyn Summarizer>,
    policy: AggregationPolicy,
    limit: InFlightLimit,
}

impl fmt::Debug for AnalysisDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisDispatcher")
            .field("summarizer", &"<dyn Summarizer>")
            .field("policy", &self.policy)
            .field("limit", &self.limit)
            .finish()
    }
}

impl AnalysisDispatcher {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        policy: AggregationPolicy,
        limit: InFlightLimit,
    ) -> Self {
        Self {
            summarizer,
            policy,
            limit,
        }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Summarise every page of `pages`.
    ///
    /// On success the map has one entry per page under the fail-fast policy,
    /// and at least one under best-effort.
    pub async fn dispatch(
        &self,
        document_name: &str,
        pages: &[PageArtifact],
    ) -> Result<BTreeMap<usize, AnalysisResult>, PipelineError> {
        self.dispatch_with_progress(
            document_name,
            pages,
            DispatchProgress {
                generation: 0,
                observer: None,
            },
        )
        .await
    }

    /// [`Self::dispatch`], reporting each page's outcome as it arrives.
    pub async fn dispatch_with_progress(
        &self,
        document_name: &str,
        pages: &[PageArtifact],
        progress: DispatchProgress<'_>,
    ) -> Result<BTreeMap<usize, AnalysisResult>, PipelineError> {
        let total = pages.len();
        let mut results = BTreeMap::new();
        if total == 0 {
            return Ok(results);
        }

        let in_flight = self.limit.resolve(total);
        info!(
            "Summarising {} pages of '{}' ({} in flight, {:?})",
            total, document_name, in_flight, self.policy
        );

        let calls = stream::iter(build_requests(document_name, pages).into_iter().map(|request| {
            let summarizer = Arc::clone(&self.summarizer);
            async move {
                let outcome = summarizer.summarize(&request).await;
                (request.page_number, outcome)
            }
        }))
        .buffer_unordered(in_flight);
        let mut calls = std::pin::pin!(calls);

        let mut failed = 0usize;
        let mut first_error: Option<SummarizeError> = None;
        let mut done = 0usize;

        while let Some((page, outcome)) = calls.next().await {
            done += 1;
            match outcome {
                Ok(response) => {
                    debug!("Page {} summarised", page);
                    if let Some(observer) = progress.observer {
                        observer.on_page_analyzed(progress.generation, page, total);
                    }
                    results.insert(page, AnalysisResult::from_response(page, &response));
                }
                Err(e) => {
                    if let Some(observer) = progress.observer {
                        observer.on_page_analysis_failed(
                            progress.generation,
                            page,
                            total,
                            &e.to_string(),
                        );
                    }
                    match self.policy {
                        AggregationPolicy::FailFast => {
                            warn!(
                                "Page {} failed, abandoning {} outstanding requests: {}",
                                page,
                                total - done,
                                e
                            );
                            return Err(PipelineError::Service {
                                failed: 1,
                                total,
                                first_error: e,
                            });
                        }
                        AggregationPolicy::BestEffort => {
                            warn!("Page {} failed, continuing: {}", page, e);
                            failed += 1;
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }

        if results.is_empty() {
            if let Some(first_error) = first_error {
                return Err(PipelineError::Service {
                    failed,
                    total,
                    first_error,
                });
            }
        }
        if failed > 0 {
            info!("{}/{} pages summarised, {} failed", results.len(), total, failed);
        }
        Ok(results)
    }
}
