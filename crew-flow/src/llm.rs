//! LLM client seam.
//!
//! Agents and tools never construct a model client themselves: a single
//! [`LlmClient`] handle is built at process start and passed to every
//! component that needs it. Calls are bounded by [`BoundedLlm`], which adds an
//! explicit timeout and a small retry budget on top of any client.
//!
//! ## Retry Strategy
//!
//! A failed or timed-out call is retried up to `max_retries` times with
//! exponential backoff (`retry_backoff * 2^(attempt-1)`). With the defaults
//! (one retry, 1s backoff) a stalled call costs at most two timeouts plus one
//! second before the error reaches the pipeline.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{FlowError, Result};

/// One prompt sent to a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System prompt / persona, if any
    pub preamble: Option<String>,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            preamble: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the request and return the model's text response verbatim
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}

/// Timeout and retry policy for remote model calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBounds {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for CallBounds {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 1,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Wraps a client so every call has an upper time bound and a fixed retry budget
pub struct BoundedLlm<C> {
    inner: C,
    bounds: CallBounds,
}

impl<C: LlmClient> BoundedLlm<C> {
    pub fn new(inner: C, bounds: CallBounds) -> Self {
        Self { inner, bounds }
    }

    pub fn bounds(&self) -> CallBounds {
        self.bounds
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for BoundedLlm<C> {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut last_err: Option<FlowError> = None;

        for attempt in 0..=self.bounds.max_retries {
            if attempt > 0 {
                let backoff = self.bounds.retry_backoff * 2u32.pow(attempt - 1);
                warn!(
                    "LLM retry {}/{} after {}ms",
                    attempt,
                    self.bounds.max_retries,
                    backoff.as_millis()
                );
                sleep(backoff).await;
            }

            match timeout(self.bounds.timeout, self.inner.complete(request.clone())).await {
                Ok(Ok(response)) => {
                    debug!(attempt, chars = response.len(), "LLM call completed");
                    return Ok(response);
                }
                Ok(Err(e)) => {
                    warn!("LLM attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
                Err(_) => {
                    warn!(
                        "LLM attempt {} timed out after {:?}",
                        attempt + 1,
                        self.bounds.timeout
                    );
                    last_err = Some(FlowError::LlmTimeout {
                        secs: self.bounds.timeout.as_secs(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| FlowError::LlmFailed("no attempt was made".to_string())))
    }
}

#[cfg(feature = "rig")]
pub use openrouter::OpenRouterClient;

#[cfg(feature = "rig")]
mod openrouter {
    use async_trait::async_trait;
    use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};

    use super::{CompletionRequest, LlmClient};
    use crate::error::{FlowError, Result};

    /// OpenRouter-backed client. Construct once and share.
    #[derive(Clone)]
    pub struct OpenRouterClient {
        client: openrouter::Client,
        model: String,
        temperature: f64,
    }

    impl OpenRouterClient {
        pub fn new(api_key: &str, model: impl Into<String>, temperature: f64) -> Self {
            Self {
                client: openrouter::Client::new(api_key),
                model: model.into(),
                temperature,
            }
        }

        pub fn model(&self) -> &str {
            &self.model
        }
    }

    #[async_trait]
    impl LlmClient for OpenRouterClient {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            let mut builder = self
                .client
                .agent(&self.model)
                .temperature(self.temperature);
            if let Some(preamble) = request.preamble.as_deref() {
                builder = builder.preamble(preamble);
            }
            let agent = builder.build();

            agent
                .prompt(request.prompt.as_str())
                .await
                .map_err(|e| FlowError::LlmFailed(e.to_string()))
        }
    }
}
