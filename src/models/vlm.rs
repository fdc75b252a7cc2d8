//! Blocking bridge to an edgequake-llm provider, with retry/backoff.
//!
//! The pipeline is synchronous and runs on a `spawn_blocking` thread; the
//! providers are async. [`VlmClient`] holds a runtime [`Handle`] and drives
//! each call with `Handle::block_on`, so it must not be called from inside
//! an async task.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) spaces the attempts: with 500 ms base and
//! 2 retries the wait sequence is 500 ms → 1 s.

use crate::config::ExtractionConfig;
use crate::error::{ModelError, SamplerError};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// A provider plus the call settings shared by every bundled adapter.
pub struct VlmClient {
    provider: Arc<dyn LLMProvider>,
    runtime: Handle,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig, runtime: Handle) -> Self {
        Self {
            provider,
            runtime,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Build a client bound to the runtime the caller is running in.
    pub fn for_current_runtime(
        provider: Arc<dyn LLMProvider>,
        config: &ExtractionConfig,
    ) -> Result<Self, SamplerError> {
        let runtime = Handle::try_current()
            .map_err(|e| SamplerError::Internal(format!("No tokio runtime for model calls: {e}")))?;
        Ok(Self::new(provider, config, runtime))
    }

    /// Send `messages` and return the reply text, blocking the current thread.
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.runtime.block_on(self.chat_with_retries(messages))
    }

    async fn chat_with_retries(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Model call: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Model call: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Model call: attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(ModelError::Api {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
