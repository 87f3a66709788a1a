//! Observer trait for per-generation pipeline events.
//!
//! Inject an [`ObserverHandle`] via
//! [`crate::config::PipelineConfigBuilder::observer`] to receive events as
//! the controller loads, extracts and analyses a document.
//!
//! Every event carries the generation it belongs to. A consumer that keeps
//! its own state must compare that tag with the latest generation it has
//! seen before acting on the event; the controller never emits events for a
//! run after it has noticed the run was superseded, but an event already in
//! progress on another thread can still arrive late.
//!
//! # Example
//!
//! ```rust
//! use docubrief::{PipelineConfig, PipelineObserver, ObserverHandle};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     analysed: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_page_analyzed(&self, _generation: u64, _page: usize, _total: usize) {
//!         self.analysed.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let observer = Arc::new(CountingObserver { analysed: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .observer(observer as ObserverHandle)
//!     .build()
//!     .unwrap();
//! ```

use crate::state::PipelineStatus;
use std::sync::Arc;

/// Called by the controller as a generation progresses.
///
/// Implementations must be `Send + Sync`: analysis events are raised from
/// concurrently running requests. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// A new generation was allocated for `source_name`.
    fn on_generation_start(&self, generation: u64, source_name: &str) {
        let _ = (generation, source_name);
    }

    /// The generation moved to `status` and the new state was published.
    fn on_status(&self, generation: u64, status: &PipelineStatus) {
        let _ = (generation, status);
    }

    /// Page `page` of `total` was rendered and its text read.
    fn on_page_extracted(&self, generation: u64, page: usize, total: usize) {
        let _ = (generation, page, total);
    }

    /// The summarization request for `page` succeeded.
    ///
    /// This reports one request, not the batch. Under
    /// [`crate::config::AggregationPolicy::FailFast`] a later failure
    /// discards every result, including pages already reported here; the
    /// `Ready` or `Failed` status that follows is the batch outcome.
    fn on_page_analyzed(&self, generation: u64, page: usize, total: usize) {
        let _ = (generation, page, total);
    }

    /// The summarization request for `page` failed.
    fn on_page_analysis_failed(&self, generation: u64, page: usize, total: usize, error: &str) {
        let _ = (generation, page, total, error);
    }

    /// The generation was overtaken by a newer upload and its work dropped.
    fn on_superseded(&self, generation: u64) {
        let _ = generation;
    }
}

/// A no-op observer for callers that don't need events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Shared observer handle as stored in [`crate::config::PipelineConfig`].
pub type ObserverHandle = Arc<dyn PipelineObserver>;
