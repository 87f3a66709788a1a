//! Pipeline integration tests against an in-memory PDF engine.
//!
//! `FakeBackend` reads a tiny stand-in format: a `%PDF-1.7` header line
//! followed by page texts separated by `|`, optionally ending in a
//! `\ntrailer ...` line. A trailer naming `/Encrypt` makes the document
//! password-protected. A page containing `!broken` fails to render; a page
//! containing `slow` takes 40 ms to render. No native library and no network
//! are involved.

use async_trait::async_trait;
use docubrief::{
    AggregationPolicy, BackendError, FailureKind, InFlightLimit, ObserverHandle, PageExtractor,
    PdfBackend, PipelineConfig, PipelineController, PipelineObserver, PipelineStatus,
    RenderParams, RenderSurface, RunOutcome, SummarizeError, Summarizer, SummaryRequest,
    SummaryResponse,
};
use futures::StreamExt;
use image::{Rgba, RgbaImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::timeout;

// ── Fake PDF engine ──────────────────────────────────────────────────────────

fn pdf(pages: &[&str]) -> Vec<u8> {
    format!("%PDF-1.7\n{}", pages.join("|")).into_bytes()
}

fn split_trailer(bytes: &[u8]) -> Result<(&str, &str), BackendError> {
    let text = std::str::from_utf8(bytes).map_err(|e| BackendError::Malformed(e.to_string()))?;
    let body = text
        .split_once('\n')
        .map(|(_, body)| body)
        .ok_or_else(|| BackendError::Malformed("no body".into()))?;
    Ok(body.split_once("\ntrailer").unwrap_or((body, "")))
}

fn page_texts(bytes: &[u8]) -> Result<Vec<String>, BackendError> {
    let (body, _) = split_trailer(bytes)?;
    if body.is_empty() {
        return Ok(vec![]);
    }
    Ok(body.split('|').map(str::to_string).collect())
}

#[derive(Default)]
struct FakeBackend {
    rendering: AtomicUsize,
    max_rendering: AtomicUsize,
    renders: AtomicUsize,
}

impl PdfBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn page_count(&self, bytes: &[u8]) -> Result<usize, BackendError> {
        let (_, trailer) = split_trailer(bytes)?;
        if trailer.contains("/Encrypt") {
            return Err(BackendError::PasswordRequired);
        }
        Ok(page_texts(bytes)?.len())
    }

    fn render_page(
        &self,
        bytes: &[u8],
        page: usize,
        params: RenderParams,
        surface: &mut RenderSurface,
    ) -> Result<Vec<String>, BackendError> {
        let now = self.rendering.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_rendering.fetch_max(now, Ordering::SeqCst);
        self.renders.fetch_add(1, Ordering::SeqCst);

        let texts = page_texts(bytes)?;
        let text = texts[page - 1].clone();
        if text.contains("slow") {
            std::thread::sleep(Duration::from_millis(40));
        } else {
            std::thread::sleep(Duration::from_millis(2));
        }
        self.rendering.fetch_sub(1, Ordering::SeqCst);

        if text.contains("!broken") {
            return Err(BackendError::Render(format!("bad page object on page {page}")));
        }
        let side = (10.0 * params.scale) as u32;
        surface.present(RgbaImage::from_pixel(side, side, Rgba([255, 255, 255, 255])));
        Ok(text.split_whitespace().map(str::to_string).collect())
    }
}

// ── Fake summarizers ─────────────────────────────────────────────────────────

/// Echoes the page number; optionally fails chosen pages.
#[derive(Default)]
struct EchoSummarizer {
    fail_pages: HashSet<usize>,
    calls: AtomicUsize,
}

impl EchoSummarizer {
    fn failing(pages: &[usize]) -> Self {
        Self {
            fail_pages: pages.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pages.contains(&request.page_number) {
            return Err(SummarizeError::Timeout {
                page: request.page_number,
                secs: 60,
            });
        }
        Ok(SummaryResponse {
            summary: format!("Page {} summary", request.page_number),
            bullet_points: "- point1\n- point2".into(),
        })
    }
}

/// Tracks how many requests are outstanding at once.
#[derive(Default)]
struct SlowSummarizer {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl Summarizer for SlowSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(SummaryResponse {
            summary: format!("Page {} summary", request.page_number),
            bullet_points: String::new(),
        })
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never answers for `stalled_document`; echoes for everything else.
struct StallingSummarizer {
    stalled_document: String,
    entered: Notify,
    dropped: Arc<AtomicBool>,
}

impl StallingSummarizer {
    fn new(stalled_document: &str) -> Self {
        Self {
            stalled_document: stalled_document.into(),
            entered: Notify::new(),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Summarizer for StallingSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        if request.document_name == self.stalled_document {
            let _guard = SetOnDrop(Arc::clone(&self.dropped));
            self.entered.notify_one();
            return std::future::pending().await;
        }
        Ok(SummaryResponse {
            summary: format!("Page {} summary", request.page_number),
            bullet_points: "- fresh".into(),
        })
    }
}

// ── Observer ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Status(u64, &'static str),
    Extracted(u64, usize),
    Analyzed(u64, usize),
    AnalysisFailed(u64, usize),
    Superseded(u64),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }
}

impl PipelineObserver for Recorder {
    fn on_status(&self, generation: u64, status: &PipelineStatus) {
        self.push(Event::Status(generation, status.label()));
    }

    fn on_page_extracted(&self, generation: u64, page: usize, _total: usize) {
        self.push(Event::Extracted(generation, page));
    }

    fn on_page_analyzed(&self, generation: u64, page: usize, _total: usize) {
        self.push(Event::Analyzed(generation, page));
    }

    fn on_page_analysis_failed(&self, generation: u64, page: usize, _total: usize, _error: &str) {
        self.push(Event::AnalysisFailed(generation, page));
    }

    fn on_superseded(&self, generation: u64) {
        self.push(Event::Superseded(generation));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn controller(summarizer: Arc<dyn Summarizer>) -> PipelineController {
    PipelineController::new(
        Arc::new(FakeBackend::default()),
        summarizer,
        PipelineConfig::default(),
    )
}

fn observed(
    backend: Arc<FakeBackend>,
    summarizer: Arc<dyn Summarizer>,
    policy: AggregationPolicy,
) -> (PipelineController, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .aggregation(policy)
        .observer(recorder.clone() as ObserverHandle)
        .build()
        .unwrap();
    (PipelineController::new(backend, summarizer, config), recorder)
}

fn finished(outcome: RunOutcome) -> docubrief::PipelineRun {
    match outcome {
        RunOutcome::Finished(run) => run,
        RunOutcome::Superseded { generation } => panic!("run {generation} unexpectedly superseded"),
    }
}

fn failure_kind(status: &PipelineStatus) -> FailureKind {
    status
        .failure()
        .unwrap_or_else(|| panic!("expected Failed, got {status:?}"))
        .kind
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_document_reaches_ready() {
    let summarizer = Arc::new(EchoSummarizer::default());
    let c = controller(summarizer.clone());

    let run = finished(c.run("notes.pdf", pdf(&["Intro", "Body", "Conclusion"])).await);

    assert_eq!(run.status(), &PipelineStatus::Ready);
    let indices: Vec<_> = run.pages().iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    let texts: Vec<_> = run.pages().iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["Intro", "Body", "Conclusion"]);

    assert_eq!(run.results().len(), 3);
    for (page, result) in run.results() {
        assert_eq!(result.page_index, *page);
        assert_eq!(result.summary, format!("Page {page} summary"));
        assert_eq!(result.bullet_points, vec!["point1", "point2"]);
    }
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 3);

    let published = c.current();
    assert_eq!(published.generation(), 1);
    assert_eq!(published.status(), &PipelineStatus::Ready);
}

#[tokio::test]
async fn multi_run_text_is_joined_with_single_spaces() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let run = finished(c.run("a.pdf", pdf(&["Quarterly   revenue grew"])).await);
    assert_eq!(run.pages()[0].text, "Quarterly revenue grew");
    assert_eq!(&run.pages()[0].image.png[..4], &[0x89, b'P', b'N', b'G']);
    assert_eq!(run.pages()[0].image.width, 15);
}

#[tokio::test]
async fn same_buffer_twice_is_idempotent() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let bytes = pdf(&["Alpha beta", "Gamma", "Delta epsilon"]);

    let first = finished(c.run("a.pdf", bytes.clone()).await);
    let second = finished(c.run("a.pdf", bytes).await);

    let texts = |r: &docubrief::PipelineRun| {
        r.pages().iter().map(|p| p.text.clone()).collect::<Vec<_>>()
    };
    assert_eq!(texts(&first), texts(&second));
    assert_eq!(first.results().len(), second.results().len());
    assert_eq!(first.generation(), 1);
    assert_eq!(second.generation(), 2);
}

#[tokio::test]
async fn view_joins_pages_and_results() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let run = finished(c.run("a.pdf", pdf(&["One", "Two"])).await);
    let view = run.view();
    assert_eq!(view.pages.len(), 2);
    assert_eq!(view.analysed_pages(), 2);
    assert_eq!(view.pages[1].page_number, 2);
    assert_eq!(view.pages[1].summary.as_deref(), Some("Page 2 summary"));
    assert!(view.pages[1].image.data_uri().starts_with("data:image/png;base64,"));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"]["state"], "ready");
}

// ── Load failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn bad_signature_fails_as_invalid_document() {
    let summarizer = Arc::new(EchoSummarizer::default());
    let c = controller(summarizer.clone());

    let run = finished(c.run("notes.txt", b"just some text".to_vec()).await);

    assert_eq!(failure_kind(run.status()), FailureKind::InvalidDocument);
    assert!(run.pages().is_empty());
    assert!(run.results().is_empty());
    assert!(c.current().pages().is_empty());
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn engine_password_error_fails_as_invalid_document() {
    let summarizer = Arc::new(EchoSummarizer::default());
    let c = controller(summarizer.clone());
    let mut bytes = pdf(&["Secret"]);
    bytes.extend_from_slice(b"\ntrailer << /Root 1 0 R /Encrypt 9 0 R >>");

    let run = finished(c.run("locked.pdf", bytes).await);
    assert_eq!(failure_kind(run.status()), FailureKind::InvalidDocument);
    let reason = run.status().failure().unwrap();
    assert!(reason.message.contains("password"), "got: {reason}");
    assert!(run.pages().is_empty());
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn encrypt_key_in_page_text_is_not_encryption() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let mut bytes = pdf(&["Set the /Encrypt key in the trailer", "Then save"]);
    bytes.extend_from_slice(b"\ntrailer << /Root 1 0 R >>");

    let run = finished(c.run("pdf-reference.pdf", bytes).await);
    assert_eq!(run.status(), &PipelineStatus::Ready);
    assert_eq!(run.pages()[0].text, "Set the /Encrypt key in the trailer");
    assert_eq!(run.results().len(), 2);
}

#[tokio::test]
async fn empty_document_is_invalid() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let run = finished(c.run("empty.pdf", b"%PDF-1.7\n".to_vec()).await);
    assert_eq!(failure_kind(run.status()), FailureKind::InvalidDocument);
}

// ── Extraction failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn extraction_failure_discards_all_pages() {
    let summarizer = Arc::new(EchoSummarizer::default());
    let backend = Arc::new(FakeBackend::default());
    let (c, recorder) = observed(backend, summarizer.clone(), AggregationPolicy::FailFast);

    let run = finished(c.run("a.pdf", pdf(&["Fine page", "!broken page"])).await);

    assert_eq!(failure_kind(run.status()), FailureKind::ExtractionError);
    assert!(run.pages().is_empty());
    assert!(c.current().pages().is_empty());
    assert!(run.status().failure().unwrap().message.contains("page 2"));
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);

    let statuses: Vec<_> = recorder
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Status(_, label) => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec!["loading_pdf", "extracting", "failed"]);
}

// ── Analysis failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn fail_fast_yields_service_error_and_no_results() {
    let summarizer = Arc::new(EchoSummarizer::failing(&[2]));
    let c = controller(summarizer);

    let run = finished(c.run("a.pdf", pdf(&["Intro", "Body", "Conclusion"])).await);

    assert_eq!(failure_kind(run.status()), FailureKind::ServiceError);
    assert!(run.results().is_empty());
    // Pages stay visible after a service failure.
    assert_eq!(run.pages().len(), 3);
    assert_eq!(c.current().pages().len(), 3);
    assert!(run.view().pages.iter().all(|p| p.summary.is_none()));
}

#[tokio::test]
async fn fail_fast_reports_answered_pages_then_discards_them() {
    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .max_in_flight(InFlightLimit::Max(1))
        .observer(recorder.clone() as ObserverHandle)
        .build()
        .unwrap();
    let c = PipelineController::new(
        Arc::new(FakeBackend::default()),
        Arc::new(EchoSummarizer::failing(&[2])),
        config,
    );

    let run = finished(c.run("a.pdf", pdf(&["Intro", "Body", "Conclusion"])).await);

    assert_eq!(failure_kind(run.status()), FailureKind::ServiceError);
    assert!(run.results().is_empty());
    let analysis: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                Event::Analyzed(..) | Event::AnalysisFailed(..) | Event::Status(_, "failed")
            )
        })
        .collect();
    // One request at a time: page 1 answers, page 2 fails, page 3 never runs.
    assert_eq!(
        analysis,
        vec![
            Event::Analyzed(1, 1),
            Event::AnalysisFailed(1, 2),
            Event::Status(1, "failed"),
        ]
    );
}

#[tokio::test]
async fn best_effort_keeps_successful_pages() {
    let backend = Arc::new(FakeBackend::default());
    let (c, recorder) = observed(
        backend,
        Arc::new(EchoSummarizer::failing(&[2])),
        AggregationPolicy::BestEffort,
    );

    let run = finished(c.run("a.pdf", pdf(&["Intro", "Body", "Conclusion"])).await);

    assert_eq!(run.status(), &PipelineStatus::Ready);
    assert_eq!(run.results().keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    let view = run.view();
    assert!(view.pages[1].summary.is_none());
    assert!(recorder.events().contains(&Event::AnalysisFailed(1, 2)));
}

#[tokio::test]
async fn best_effort_with_every_page_failing_is_service_error() {
    let backend = Arc::new(FakeBackend::default());
    let (c, _) = observed(
        backend,
        Arc::new(EchoSummarizer::failing(&[1, 2])),
        AggregationPolicy::BestEffort,
    );
    let run = finished(c.run("a.pdf", pdf(&["Intro", "Body"])).await);
    assert_eq!(failure_kind(run.status()), FailureKind::ServiceError);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn in_flight_cap_is_respected() {
    let summarizer = Arc::new(SlowSummarizer::default());
    let config = PipelineConfig::builder()
        .max_in_flight(InFlightLimit::Max(2))
        .build()
        .unwrap();
    let c = PipelineController::new(
        Arc::new(FakeBackend::default()),
        summarizer.clone(),
        config,
    );

    let pages = ["a", "b", "c", "d", "e", "f"];
    let run = finished(c.run("a.pdf", pdf(&pages)).await);

    assert_eq!(run.results().len(), 6);
    let max = summarizer.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 2, "saw {max} requests in flight");
    assert!(max >= 1);
}

#[tokio::test]
async fn unbounded_dispatch_overlaps_requests() {
    let summarizer = Arc::new(SlowSummarizer::default());
    let config = PipelineConfig::builder()
        .max_in_flight(InFlightLimit::Unbounded)
        .build()
        .unwrap();
    let c = PipelineController::new(
        Arc::new(FakeBackend::default()),
        summarizer.clone(),
        config,
    );
    finished(c.run("a.pdf", pdf(&["a", "b", "c", "d"])).await);
    assert!(summarizer.max_in_flight.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn shared_surface_serialises_concurrent_extraction() {
    let backend = Arc::new(FakeBackend::default());
    let loader = docubrief::DocumentLoader::new(backend.clone());
    let doc = loader
        .load("a.pdf", pdf(&["slow one", "slow two", "slow three", "slow four"]))
        .await
        .unwrap();
    let extractor = PageExtractor::new(RenderParams {
        scale: 1.0,
        max_edge_pixels: 2000,
    });

    let handles: Vec<_> = doc.pages().collect();
    let artifacts = futures::future::join_all(handles.iter().map(|h| extractor.extract(h))).await;

    assert!(artifacts.iter().all(|a| a.is_ok()));
    assert_eq!(backend.max_rendering.load(Ordering::SeqCst), 1);
    assert!(!extractor.surface().is_leased());
}

// ── Supersession ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_upload_during_analysis_supersedes_old_run() {
    let summarizer = Arc::new(StallingSummarizer::new("old.pdf"));
    let backend = Arc::new(FakeBackend::default());
    let (c, recorder) = observed(backend, summarizer.clone(), AggregationPolicy::FailFast);

    let old = c.spawn("old.pdf", pdf(&["Old A", "Old B", "Old C"]));
    timeout(Duration::from_secs(5), summarizer.entered.notified())
        .await
        .expect("old run never reached analysis");
    assert_eq!(c.current().status(), &PipelineStatus::Analyzing);

    let new = finished(c.run("new.pdf", pdf(&["New A", "New B"])).await);
    let old = timeout(Duration::from_secs(5), old)
        .await
        .expect("old run did not stop")
        .unwrap();

    assert!(old.is_superseded());
    assert_eq!(old.generation(), 1);
    assert!(
        summarizer.dropped.load(Ordering::SeqCst),
        "in-flight request of the old run should be cancelled"
    );

    assert_eq!(new.generation(), 2);
    assert_eq!(new.status(), &PipelineStatus::Ready);
    let current = c.current();
    assert_eq!(current.generation(), 2);
    assert_eq!(current.source_name(), "new.pdf");
    assert_eq!(current.results().len(), 2);

    let events = recorder.events();
    let first_new = events
        .iter()
        .position(|e| matches!(e, Event::Status(2, _)))
        .expect("generation 2 published");
    assert!(
        events[first_new..]
            .iter()
            .all(|e| !matches!(e, Event::Status(1, _) | Event::Analyzed(1, _))),
        "generation 1 published after generation 2 started: {events:?}"
    );
    assert!(events.contains(&Event::Superseded(1)));
}

#[tokio::test]
async fn new_upload_during_extraction_stops_old_run() {
    let backend = Arc::new(FakeBackend::default());
    let summarizer = Arc::new(EchoSummarizer::default());
    let (c, recorder) = observed(backend.clone(), summarizer.clone(), AggregationPolicy::FailFast);

    let slow_pages = ["slow 1", "slow 2", "slow 3", "slow 4", "slow 5", "slow 6"];
    let old = c.spawn("old.pdf", pdf(&slow_pages));
    tokio::time::sleep(Duration::from_millis(60)).await;

    let new = finished(c.run("new.pdf", pdf(&["fresh"])).await);
    let old = old.await.unwrap();

    assert!(old.is_superseded());
    assert_eq!(new.status(), &PipelineStatus::Ready);
    // Old: fewer than all six pages rendered; new: one.
    assert!(backend.renders.load(Ordering::SeqCst) < slow_pages.len() + 1);
    // Only the new document's single page was ever summarised.
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    assert!(!recorder
        .events()
        .contains(&Event::Status(1, "analyzing")));
}

#[tokio::test]
async fn failed_old_run_cannot_overwrite_new_one() {
    // The old run fails extraction only after the new one has finished.
    let backend = Arc::new(FakeBackend::default());
    let (c, _) = observed(
        backend,
        Arc::new(EchoSummarizer::default()),
        AggregationPolicy::FailFast,
    );

    let old = c.spawn("old.pdf", pdf(&["slow 1", "slow 2", "slow !broken"]));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let new = finished(c.run("new.pdf", pdf(&["fresh"])).await);
    let old = old.await.unwrap();

    assert!(old.is_superseded());
    assert_eq!(new.status(), &PipelineStatus::Ready);
    assert_eq!(c.current().generation(), 2);
    assert_eq!(c.current().status(), &PipelineStatus::Ready);
}

// ── Observation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn observer_sees_every_page() {
    let backend = Arc::new(FakeBackend::default());
    let (c, recorder) = observed(
        backend,
        Arc::new(EchoSummarizer::default()),
        AggregationPolicy::FailFast,
    );
    finished(c.run("a.pdf", pdf(&["a", "b", "c"])).await);

    let events = recorder.events();
    let extracted: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Extracted(1, page) => Some(*page),
            _ => None,
        })
        .collect();
    assert_eq!(extracted, vec![1, 2, 3]);

    let mut analysed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Analyzed(1, page) => Some(*page),
            _ => None,
        })
        .collect();
    analysed.sort();
    assert_eq!(analysed, vec![1, 2, 3]);

    let statuses: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Status(1, label) => Some(*label),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec!["loading_pdf", "extracting", "analyzing", "ready"]
    );
}

#[tokio::test]
async fn follow_generation_ends_at_terminal_state() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let follow = docubrief::follow_generation(&c, 1);
    let handle = c.spawn("a.pdf", pdf(&["a", "b"]));

    let seen: Vec<_> = timeout(Duration::from_secs(5), follow.collect::<Vec<_>>())
        .await
        .expect("stream should end once the run is ready");
    handle.await.unwrap();

    assert!(!seen.is_empty());
    assert!(seen.iter().all(|r| r.generation() == 1));
    assert_eq!(seen.last().unwrap().status(), &PipelineStatus::Ready);
}

#[tokio::test]
async fn subscribers_see_latest_state() {
    let c = controller(Arc::new(EchoSummarizer::default()));
    let mut rx = c.subscribe();
    assert_eq!(rx.borrow().status(), &PipelineStatus::Idle);
    assert_eq!(rx.borrow().generation(), 0);

    finished(c.run("a.pdf", pdf(&["a"])).await);
    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow_and_update().clone();
    assert_eq!(latest.status(), &PipelineStatus::Ready);
    assert_eq!(latest.results().len(), 1);
}
