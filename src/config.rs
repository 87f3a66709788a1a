//! Configuration types for the pipeline and the LLM summarizer.
//!
//! Two structs, two owners:
//!
//! * [`PipelineConfig`] controls the core: render scale, in-flight cap for
//!   the analysis fan-out, the aggregation policy, and an optional observer.
//! * [`SummarizerConfig`] controls [`crate::pipeline::llm::LlmSummarizer`]:
//!   provider selection, sampling, retries and the per-call timeout. The core
//!   never reads it; timeouts and retries are the capability's business.
//!
//! Both are built through validating builders so callers set only what they
//! care about and rely on documented defaults for the rest.

use crate::error::PipelineError;
use crate::progress::ObserverHandle;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Smallest accepted render scale.
pub const MIN_SCALE: f32 = 0.25;
/// Largest accepted render scale.
pub const MAX_SCALE: f32 = 4.0;
/// Page count up to which [`InFlightLimit::Auto`] leaves the fan-out unbounded.
pub const AUTO_UNBOUNDED_PAGES: usize = 16;
/// In-flight cap [`InFlightLimit::Auto`] applies to larger documents.
pub const AUTO_IN_FLIGHT_CAP: usize = 8;

/// Configuration for one [`crate::controller::PipelineController`].
///
/// # Example
/// ```rust
/// use docubrief::{AggregationPolicy, InFlightLimit, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .scale(2.0)
///     .max_in_flight(InFlightLimit::Max(4))
///     .aggregation(AggregationPolicy::FailFast)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_in_flight.resolve(100), 4);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Viewport scale applied when rasterising a page. Range: 0.25–4.0. Default: 1.5.
    ///
    /// 1.5 renders a US-letter page at roughly 918 × 1188 px: sharp enough to
    /// read on screen without producing multi-megabyte PNGs.
    pub scale: f32,

    /// Maximum rendered edge (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages independently of `scale`.
    pub max_edge_pixels: u32,

    /// How many summarization requests may be in flight at once. Default: Auto.
    pub max_in_flight: InFlightLimit,

    /// How per-page summarization failures fold into the batch result.
    /// Default: [`AggregationPolicy::FailFast`].
    pub aggregation: AggregationPolicy,

    /// Receives lifecycle events for every generation. Default: none.
    pub observer: Option<ObserverHandle>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale: 1.5,
            max_edge_pixels: 2000,
            max_in_flight: InFlightLimit::default(),
            aggregation: AggregationPolicy::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("scale", &self.scale)
            .field("max_edge_pixels", &self.max_edge_pixels)
            .field("max_in_flight", &self.max_in_flight)
            .field("aggregation", &self.aggregation)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn max_edge_pixels(mut self, px: u32) -> Self {
        self.config.max_edge_pixels = px.max(100);
        self
    }

    pub fn max_in_flight(mut self, limit: InFlightLimit) -> Self {
        self.config.max_in_flight = limit;
        self
    }

    pub fn aggregation(mut self, policy: AggregationPolicy) -> Self {
        self.config.aggregation = policy;
        self
    }

    pub fn observer(mut self, observer: ObserverHandle) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if !c.scale.is_finite() || c.scale < MIN_SCALE || c.scale > MAX_SCALE {
            return Err(PipelineError::InvalidConfig(format!(
                "scale must be {MIN_SCALE}–{MAX_SCALE}, got {}",
                c.scale
            )));
        }
        if let InFlightLimit::Max(0) = c.max_in_flight {
            return Err(PipelineError::InvalidConfig(
                "max in-flight requests must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Cap on concurrently outstanding summarization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InFlightLimit {
    /// Unbounded for small documents, [`AUTO_IN_FLIGHT_CAP`] above
    /// [`AUTO_UNBOUNDED_PAGES`] pages. (default)
    #[default]
    Auto,
    /// One request per page, all at once.
    Unbounded,
    /// At most this many requests at once.
    Max(usize),
}

impl InFlightLimit {
    /// Concrete buffer size for a batch of `pages` requests. Never zero.
    pub fn resolve(&self, pages: usize) -> usize {
        let n = match self {
            InFlightLimit::Auto if pages <= AUTO_UNBOUNDED_PAGES => pages,
            InFlightLimit::Auto => AUTO_IN_FLIGHT_CAP,
            InFlightLimit::Unbounded => pages,
            InFlightLimit::Max(n) => (*n).min(pages),
        };
        n.max(1)
    }
}

/// How the dispatcher folds per-page failures into a batch outcome.
///
/// | Policy | Any page fails | Every page fails |
/// |--------|----------------|------------------|
/// | `FailFast` | `ServiceError`, no results | `ServiceError` |
/// | `BestEffort` | surviving pages kept | `ServiceError` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregationPolicy {
    /// One failure invalidates the whole batch. (default)
    #[default]
    FailFast,
    /// Keep what succeeded; fail only when nothing did.
    BestEffort,
}

// ── Summarizer config ─────────────────────────────────────────────────────

/// Configuration for [`crate::pipeline::llm::LlmSummarizer`].
#[derive(Clone)]
pub struct SummarizerConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 1024.
    pub max_tokens: usize,

    /// Retry attempts after a failed provider call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for SummarizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizerConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl SummarizerConfig {
    pub fn builder() -> SummarizerConfigBuilder {
        SummarizerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummarizerConfig`].
#[derive(Debug)]
pub struct SummarizerConfigBuilder {
    config: SummarizerConfig,
}

impl SummarizerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<SummarizerConfig, PipelineError> {
        if self.config.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max tokens must be ≥ 1".into(),
            ));
        }
        if self.config.api_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
