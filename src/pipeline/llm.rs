//! LLM-backed [`Summarizer`]: prompt, call, retry, parse.
//!
//! All prompt wording lives in [`crate::prompts`]; this module owns the call
//! loop only.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids thundering-herd: with 500 ms base and 2 retries the wait sequence
//! is 500 ms → 1 s. Timeouts and unparseable replies are retried the same
//! way; the error kept is the one from the final attempt.

use crate::config::SummarizerConfig;
use crate::error::{PipelineError, SummarizeError};
use crate::pipeline::postprocess::parse_summary_reply;
use crate::prompts::{page_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::summarizer::{Summarizer, SummaryRequest, SummaryResponse};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Attempt budget for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub call_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SummarizerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            call_timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `call` until it yields a parseable reply or the budget is spent.
///
/// `call` returns the raw reply text or a provider error message.
pub async fn call_with_retries<F, Fut>(
    policy: RetryPolicy,
    page: usize,
    mut call: F,
) -> Result<SummaryResponse, SummarizeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, String>>,
{
    let mut last_err: Option<SummarizeError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.delay_before(attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        let err = match timeout(policy.call_timeout, call()).await {
            Ok(Ok(reply)) => match parse_summary_reply(&reply) {
                Some(response) => return Ok(response),
                None => SummarizeError::MalformedResponse {
                    page,
                    detail: format!("no summary in {} chars of reply", reply.len()),
                },
            },
            Ok(Err(detail)) => SummarizeError::Provider {
                page,
                retries: attempt,
                detail,
            },
            Err(_) => SummarizeError::Timeout {
                page,
                secs: policy.call_timeout.as_secs(),
            },
        };
        warn!("Page {}: attempt {} failed: {}", page, attempt + 1, err);
        last_err = Some(err);
    }

    Err(last_err.unwrap_or(SummarizeError::Provider {
        page,
        retries: policy.max_retries,
        detail: "no attempt was made".into(),
    }))
}

/// Summarizer that calls an `edgequake_llm` provider.
#[derive(Clone)]
pub struct LlmSummarizer {
    provider: Arc<dyn LLMProvider>,
    config: SummarizerConfig,
}

impl fmt::Debug for LlmSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSummarizer")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("config", &self.config)
            .finish()
    }
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: SummarizerConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: SummarizerConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummarizeError> {
        let page = request.page_number;
        if request.page_text.trim().is_empty() {
            return Err(SummarizeError::EmptyInput { page });
        }

        let start = Instant::now();
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(page_prompt(request)),
        ];
        let options = self.build_options();
        let policy = RetryPolicy::from_config(&self.config);

        let provider = &self.provider;
        let (messages, options) = (&messages, &options);
        let result = call_with_retries(policy, page, || async move {
            match provider.chat(messages, Some(options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens",
                        page, response.prompt_tokens, response.completion_tokens
                    );
                    Ok(response.content)
                }
                Err(e) => Err(format!("{}", e)),
            }
        })
        .await;

        debug!("Page {}: summarization took {:?}", page, start.elapsed());
        result
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured only when both are set.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &SummarizerConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
