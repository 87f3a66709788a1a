//! The pipeline controller: drives one upload through load → extract →
//! analyse, and makes sure only the newest upload ever reaches the screen.
//!
//! ## Generations
//!
//! Every call to [`PipelineController::run`] allocates a generation number
//! strictly greater than any issued before. The published [`PipelineRun`]
//! always belongs to the newest generation: a run may only publish while its
//! number is still the current one, and the check and the write happen under
//! the watch channel's lock, so there is no window in which a stale run can
//! overwrite a newer one.
//!
//! A run that notices it was overtaken stops and returns
//! [`RunOutcome::Superseded`]. During extraction it notices before each page;
//! during analysis the whole dispatch is raced against the arrival of a newer
//! generation and dropped the moment one appears, which cancels every request
//! still in flight.
//!
//! ## Failure kinds
//!
//! The kind of a failure follows the stage it happened in, see
//! [`PipelineStatus::failure_kind`]. Pages extracted before an extraction
//! failure are never published; pages of a run whose analysis failed stay
//! visible.

use crate::config::PipelineConfig;
use crate::error::{FailureKind, FailureReason, PipelineError};
use crate::pipeline::backend::{PdfBackend, PdfiumBackend};
use crate::pipeline::dispatch::{AnalysisDispatcher, DispatchProgress};
use crate::pipeline::extract::PageExtractor;
use crate::pipeline::loader::DocumentLoader;
use crate::progress::ObserverHandle;
use crate::state::{PipelineRun, PipelineStatus};
use crate::summarizer::Summarizer;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a call to [`PipelineController::run`] ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run reached `Ready` or `Failed` and that state was published.
    Finished(PipelineRun),
    /// A newer upload took over; nothing more was published for this run.
    Superseded { generation: u64 },
}

impl RunOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, RunOutcome::Superseded { .. })
    }

    /// The final run, unless superseded.
    pub fn run(&self) -> Option<&PipelineRun> {
        match self {
            RunOutcome::Finished(run) => Some(run),
            RunOutcome::Superseded { .. } => None,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            RunOutcome::Finished(run) => run.generation(),
            RunOutcome::Superseded { generation } => *generation,
        }
    }
}

struct Inner {
    loader: DocumentLoader,
    extractor: PageExtractor,
    dispatcher: AnalysisDispatcher,
    observer: Option<ObserverHandle>,
    state: watch::Sender<PipelineRun>,
}

/// Owns the published state and drives runs. Cheap to clone.
#[derive(Clone)]
pub struct PipelineController {
    inner: Arc<Inner>,
}

impl fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.inner.state.borrow();
        f.debug_struct("PipelineController")
            .field("loader", &self.inner.loader)
            .field("extractor", &self.inner.extractor)
            .field("dispatcher", &self.inner.dispatcher)
            .field("generation", &current.generation())
            .field("status", current.status())
            .finish()
    }
}

impl PipelineController {
    pub fn new(
        backend: Arc<dyn PdfBackend>,
        summarizer: Arc<dyn Summarizer>,
        config: PipelineConfig,
    ) -> Self {
        let (state, _) = watch::channel(PipelineRun::idle());
        Self {
            inner: Arc::new(Inner {
                loader: DocumentLoader::new(backend),
                extractor: PageExtractor::from_config(&config),
                dispatcher: AnalysisDispatcher::new(
                    summarizer,
                    config.aggregation,
                    config.max_in_flight,
                ),
                observer: config.observer,
                state,
            }),
        }
    }

    /// Controller backed by the pdfium library.
    pub fn with_pdfium(summarizer: Arc<dyn Summarizer>, config: PipelineConfig) -> Self {
        Self::new(Arc::new(PdfiumBackend::new()), summarizer, config)
    }

    /// Receive every published state change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.inner.state.subscribe()
    }

    /// Copy of the currently published run.
    pub fn current(&self) -> PipelineRun {
        self.inner.state.borrow().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.inner.state.borrow().generation()
    }

    /// Start a run in the background. Starting another one supersedes it.
    pub fn spawn(
        &self,
        source_name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> JoinHandle<RunOutcome> {
        let this = self.clone();
        let source_name = source_name.into();
        let bytes = bytes.into();
        tokio::spawn(async move { this.run(source_name, bytes).await })
    }

    /// Drive an upload to `Ready` or `Failed`, or until a newer upload
    /// supersedes it.
    pub async fn run(
        &self,
        source_name: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> RunOutcome {
        let source_name = source_name.into();
        let mut run = self.begin(&source_name);
        let generation = run.generation();

        match self.drive(&mut run, bytes.into()).await {
            Ok(()) => {
                info!(
                    "Generation {} ready: {}/{} pages analysed",
                    generation,
                    run.results().len(),
                    run.page_count()
                );
                RunOutcome::Finished(run)
            }
            Err(e) if e.is_cancelled() => self.superseded(generation),
            Err(e) => {
                let kind = run
                    .status()
                    .failure_kind()
                    .unwrap_or(FailureKind::ServiceError);
                warn!("Generation {} failed ({}): {}", generation, kind, e);
                let reason = FailureReason::new(kind, e.to_string());
                match self.transition(&mut run, PipelineStatus::Failed(reason)) {
                    Ok(()) => RunOutcome::Finished(run),
                    Err(_) => self.superseded(generation),
                }
            }
        }
    }

    async fn drive(&self, run: &mut PipelineRun, bytes: Arc<[u8]>) -> Result<(), PipelineError> {
        let generation = run.generation();
        let observer = self.inner.observer.as_deref();

        let document = self.inner.loader.load(run.source_name(), bytes).await?;
        self.transition(run, PipelineStatus::Extracting)?;

        let total = document.page_count();
        let pages = self
            .inner
            .extractor
            .extract_all(&document, |done| {
                self.ensure_current(generation)?;
                if let (Some(observer), true) = (observer, done > 0) {
                    observer.on_page_extracted(generation, done, total);
                }
                Ok(())
            })
            .await?;
        run.set_pages(pages)?;
        self.transition(run, PipelineStatus::Analyzing)?;

        let progress = DispatchProgress {
            generation,
            observer,
        };
        let dispatch =
            self.inner
                .dispatcher
                .dispatch_with_progress(run.source_name(), run.pages(), progress);
        let results = tokio::select! {
            results = dispatch => results,
            () = self.newer_generation(generation) => {
                debug!("Generation {}: dropping in-flight analysis", generation);
                Err(PipelineError::Cancelled { generation })
            }
        }?;

        run.set_results(results)?;
        self.transition(run, PipelineStatus::Ready)
    }

    /// Allocate the next generation and publish it in `LoadingPdf`.
    fn begin(&self, source_name: &str) -> PipelineRun {
        let mut generation = 0;
        self.inner.state.send_modify(|current| {
            generation = current.generation() + 1;
            *current = PipelineRun::started(generation, source_name);
        });
        info!("Generation {} started for '{}'", generation, source_name);
        if let Some(observer) = &self.inner.observer {
            observer.on_generation_start(generation, source_name);
            observer.on_status(generation, &PipelineStatus::LoadingPdf);
        }
        PipelineRun::started(generation, source_name)
    }

    /// Advance `run` and publish it, unless a newer generation exists.
    fn transition(&self, run: &mut PipelineRun, next: PipelineStatus) -> Result<(), PipelineError> {
        let generation = run.generation();
        self.ensure_current(generation)?;
        run.advance(next)?;

        let published = self.inner.state.send_if_modified(|current| {
            if current.generation() != generation {
                return false;
            }
            *current = run.clone();
            true
        });
        if !published {
            return Err(PipelineError::Cancelled { generation });
        }

        debug!("Generation {} → {}", generation, run.status().label());
        if let Some(observer) = &self.inner.observer {
            observer.on_status(generation, run.status());
        }
        Ok(())
    }

    fn ensure_current(&self, generation: u64) -> Result<(), PipelineError> {
        if self.current_generation() == generation {
            Ok(())
        } else {
            Err(PipelineError::Cancelled { generation })
        }
    }

    /// Resolves once a generation other than `generation` is published.
    async fn newer_generation(&self, generation: u64) {
        let mut rx = self.inner.state.subscribe();
        if rx.wait_for(|run| run.generation() != generation).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    fn superseded(&self, generation: u64) -> RunOutcome {
        info!("Generation {} superseded", generation);
        if let Some(observer) = &self.inner.observer {
            observer.on_superseded(generation);
        }
        RunOutcome::Superseded { generation }
    }
}
