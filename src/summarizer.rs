//! The summarization capability, seen from the core.
//!
//! The core only knows this trait. Prompting, model choice, retries and
//! timeouts all live behind it; whatever goes wrong in there comes back as a
//! [`SummarizeError`] and is treated as one opaque failure of that page.

use crate::error::SummarizeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One request per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub document_name: String,
    /// 1-indexed.
    pub page_number: usize,
    pub page_text: String,
}

/// Raw capability response.
///
/// `bullet_points` is a newline-delimited block, each line optionally
/// prefixed with `"- "`; see [`crate::pipeline::postprocess::parse_bullet_points`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary: String,
    pub bullet_points: String,
}

/// Turns page text into a summary and a bullet block.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError>;
}

#[async_trait]
impl<S: Summarizer + ?Sized> Summarizer for Arc<S> {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        (**self).summarize(request).await
    }
}
