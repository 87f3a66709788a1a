//! CLI binary for docubrief.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` / `SummarizerConfig`, runs one document through the
//! controller and prints the per-page summaries.

use anyhow::{Context, Result};
use clap::Parser;
use docubrief::{
    AggregationPolicy, DocumentView, InFlightLimit, LlmSummarizer, ObserverHandle,
    PipelineConfig, PipelineController, PipelineObserver, PipelineStatus, PdfiumBackend,
    RunOutcome, SummarizerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner while loading, then one bar per stage.
/// Analysis completions arrive out of order; the bar only counts them.
struct CliObserver {
    bar: ProgressBar,
    analysing: AtomicBool,
    answered: AtomicUsize,
    failed: AtomicUsize,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            analysing: AtomicBool::new(false),
            answered: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    /// Switch to the analysis bar on the first completion.
    fn ensure_analysing(&self, total: usize) {
        if !self.analysing.swap(true, Ordering::SeqCst) {
            self.activate_bar("Analysing", total);
        }
    }

    fn activate_bar(&self, prefix: &'static str, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }
}

impl PipelineObserver for CliObserver {
    fn on_generation_start(&self, _generation: u64, source_name: &str) {
        self.bar.set_message(format!("Opening {source_name}…"));
    }

    fn on_status(&self, _generation: u64, status: &PipelineStatus) {
        match status {
            PipelineStatus::Extracting => {
                self.bar.set_prefix("Extracting");
                self.bar.set_message("rendering pages…");
            }
            PipelineStatus::Ready => {
                self.bar.finish_and_clear();
                let failed = self.failed.load(Ordering::SeqCst);
                if failed == 0 {
                    eprintln!("{} all pages summarised", green("✔"));
                } else {
                    eprintln!(
                        "{} ready with {} pages unsummarised",
                        cyan("⚠"),
                        red(&failed.to_string())
                    );
                }
            }
            PipelineStatus::Failed(_) => {
                self.bar.finish_and_clear();
                let answered = self.answered.load(Ordering::SeqCst);
                if answered > 0 {
                    eprintln!(
                        "{} {} answered pages discarded with the failed batch",
                        cyan("⚠"),
                        answered
                    );
                }
            }
            _ => {}
        }
    }

    fn on_page_extracted(&self, _generation: u64, page: usize, total: usize) {
        if page == 1 {
            self.activate_bar("Extracting", total);
        }
        self.bar.set_position(page as u64);
    }

    fn on_page_analyzed(&self, _generation: u64, page: usize, total: usize) {
        self.ensure_analysing(total);
        self.answered.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} Page {:>3}/{:<3}", green("✓"), page, total));
        self.bar.inc(1);
    }

    fn on_page_analysis_failed(&self, _generation: u64, page: usize, total: usize, error: &str) {
        self.ensure_analysing(total);
        self.failed.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise every page (stdout)
  docubrief report.pdf

  # Keep going when some pages fail to summarise
  docubrief --policy best-effort report.pdf

  # JSON output with page images as data URIs
  docubrief --json report.pdf > report.json

  # Also write each rendered page as PNG
  docubrief --images-dir pages/ report.pdf

  # Use a specific model
  docubrief --provider openai --model gpt-4.1-mini report.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Summarise a PDF page by page using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docubrief",
    version,
    about = "Summarise a PDF page by page using an LLM",
    long_about = "Render every page of a PDF, extract its text, and ask an LLM for a concise \
summary and key bullet points per page. Supports OpenAI, Anthropic, Google Gemini, Ollama and \
any provider edgequake-llm knows about.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to summarise.
    input: PathBuf,

    /// Write the summaries to this file instead of stdout.
    #[arg(short, long, env = "DOCUBRIEF_OUTPUT")]
    output: Option<PathBuf>,

    /// Render scale (0.25–4.0).
    #[arg(long, env = "DOCUBRIEF_SCALE", default_value_t = 1.5)]
    scale: f32,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "DOCUBRIEF_MAX_EDGE_PIXELS", default_value_t = 2000)]
    max_edge_pixels: u32,

    /// Concurrent summarization requests: auto, unbounded, or a number.
    #[arg(long, env = "DOCUBRIEF_MAX_IN_FLIGHT", default_value = "auto",
          value_parser = parse_in_flight)]
    max_in_flight: InFlightLimit,

    /// What one failed page does to the batch.
    #[arg(long, env = "DOCUBRIEF_POLICY", value_enum, default_value = "fail-fast")]
    policy: PolicyArg,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "DOCUBRIEF_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "DOCUBRIEF_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCUBRIEF_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per page.
    #[arg(long, env = "DOCUBRIEF_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Retries per page on LLM failure.
    #[arg(long, env = "DOCUBRIEF_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "DOCUBRIEF_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOCUBRIEF_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Write each rendered page as page-NNN.png into this directory.
    #[arg(long, env = "DOCUBRIEF_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// Output the full document view as JSON.
    #[arg(long, env = "DOCUBRIEF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCUBRIEF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCUBRIEF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCUBRIEF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    FailFast,
    BestEffort,
}

impl From<PolicyArg> for AggregationPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::FailFast => AggregationPolicy::FailFast,
            PolicyArg::BestEffort => AggregationPolicy::BestEffort,
        }
    }
}

fn parse_in_flight(s: &str) -> Result<InFlightLimit, String> {
    match s.trim().to_lowercase().as_str() {
        "auto" => Ok(InFlightLimit::Auto),
        "unbounded" | "all" => Ok(InFlightLimit::Unbounded),
        n => match n.parse::<usize>() {
            Ok(0) => Err("must be at least 1".to_string()),
            Ok(n) => Ok(InFlightLimit::Max(n)),
            Err(_) => Err(format!("expected auto, unbounded or a number, got '{s}'")),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Check the PDF engine before spending an API call ─────────────────
    let backend = PdfiumBackend::new();
    backend.probe().context("PDF engine unavailable")?;

    // ── Build config ─────────────────────────────────────────────────────
    let observer: Option<ObserverHandle> = if show_progress {
        Some(CliObserver::new() as ObserverHandle)
    } else {
        None
    };
    let pipeline_config = build_pipeline_config(&cli, observer)?;
    let summarizer_config = build_summarizer_config(&cli).await?;
    let summarizer =
        LlmSummarizer::from_config(summarizer_config).context("Failed to set up LLM provider")?;
    tracing::info!(
        "Using {} / {}",
        summarizer.provider_name(),
        summarizer.model()
    );

    let controller =
        PipelineController::new(Arc::new(backend), Arc::new(summarizer), pipeline_config);

    // ── Run ──────────────────────────────────────────────────────────────
    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let source_name = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.input.display().to_string());

    let run = match controller.run(source_name, bytes).await {
        RunOutcome::Finished(run) => run,
        RunOutcome::Superseded { generation } => {
            anyhow::bail!("Run {generation} was superseded unexpectedly")
        }
    };
    let view = run.view();

    if let Some(ref dir) = cli.images_dir {
        write_images(dir, &view).await?;
    }

    if let PipelineStatus::Failed(reason) = run.status() {
        // Pages stay printable after a service failure; nothing else to show.
        if view.pages.is_empty() {
            anyhow::bail!("{reason}");
        }
    }

    // ── Output ───────────────────────────────────────────────────────────
    let rendered = if cli.json {
        serde_json::to_string_pretty(&view).context("Failed to serialise output")?
    } else {
        render_text(&view)
    };

    match cli.output {
        Some(ref path) => {
            tokio::fs::write(path, rendered.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}/{} pages  →  {}",
                    green("✔"),
                    view.analysed_pages(),
                    view.pages.len(),
                    bold(&path.display().to_string())
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if let PipelineStatus::Failed(reason) = run.status() {
        anyhow::bail!("{reason}");
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_pipeline_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .scale(cli.scale)
        .max_edge_pixels(cli.max_edge_pixels)
        .max_in_flight(cli.max_in_flight)
        .aggregation(cli.policy.into());
    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }
    builder.build().context("Invalid configuration")
}

/// Map CLI args to `SummarizerConfig`.
async fn build_summarizer_config(cli: &Cli) -> Result<SummarizerConfig> {
    let mut builder = SummarizerConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// Plain-text rendering: one section per page.
fn render_text(view: &DocumentView) -> String {
    let mut out = format!("# {}\n", view.source_name);
    for page in &view.pages {
        out.push_str(&format!("\n## Page {}\n\n", page.page_number));
        match page.summary {
            Some(ref summary) => {
                out.push_str(summary);
                out.push('\n');
                if !page.bullet_points.is_empty() {
                    out.push('\n');
                    for bullet in &page.bullet_points {
                        out.push_str(&format!("- {bullet}\n"));
                    }
                }
            }
            None => out.push_str("(no summary)\n"),
        }
    }
    out
}

async fn write_images(dir: &Path, view: &DocumentView) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for page in &view.pages {
        let path = dir.join(format!("page-{:03}.png", page.page_number));
        tokio::fs::write(&path, &page.image.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
