//! Model invocation: the [`ReviewModel`] seam and the call wrapper.
//!
//! A request is one instruction string plus zero or more images. Backends
//! turn it into a provider call:
//!
//! * [`ProviderModel`]: any edgequake-llm provider (OpenAI, Anthropic,
//!   Gemini, Ollama, …)
//! * [`crate::pipeline::gemini::GeminiClient`]: native Gemini REST, which
//!   can carry safety settings
//!
//! [`invoke`] wraps a backend with the client-side timeout and the optional
//! retry loop (`retry_backoff_ms * 2^attempt`). Only errors for which
//! [`ReviewError::is_retryable`] holds are retried.

use crate::config::{ReviewConfig, SafetyMode};
use crate::error::ReviewError;
use crate::prompts::UseCase;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One model request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub use_case: UseCase,
    pub prompt: String,
    /// Attachments, in upload/page order.
    pub images: Vec<ImageData>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub safety: SafetyMode,
}

impl GenerationRequest {
    /// A request carrying the generation settings from `config`.
    pub fn new(
        use_case: UseCase,
        prompt: String,
        images: Vec<ImageData>,
        config: &ReviewConfig,
    ) -> Self {
        Self {
            use_case,
            prompt,
            images,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            safety: config.safety,
        }
    }
}

/// The model's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A generative-model backend.
#[async_trait]
pub trait ReviewModel: Send + Sync {
    /// Short label for logs and output metadata, e.g. `gemini/gemini-2.0-flash`.
    fn name(&self) -> String;

    /// Send one request and wait for the answer.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResponse, ReviewError>;
}

/// Result of [`invoke`]: the response plus how many retries it took.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub response: GenerationResponse,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Call `model` with the configured timeout and retry policy.
pub async fn invoke(
    model: &dyn ReviewModel,
    request: &GenerationRequest,
    config: &ReviewConfig,
) -> Result<Invocation, ReviewError> {
    let start = Instant::now();
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                request.use_case, attempt, config.max_retries, backoff
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_retry(attempt, backoff);
            }
            sleep(Duration::from_millis(backoff)).await;
        }

        let result = match timeout(limit, model.generate(request)).await {
            Ok(r) => r,
            Err(_) => Err(ReviewError::ApiTimeout {
                secs: config.api_timeout_secs,
            }),
        };

        match result {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    request.use_case,
                    response.input_tokens,
                    response.output_tokens,
                    start.elapsed()
                );
                return Ok(Invocation {
                    response,
                    retries: attempt,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                warn!("{}: attempt {} failed: {}", request.use_case, attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// Adapter from an edgequake-llm provider to [`ReviewModel`].
///
/// Safety settings are Gemini-specific and are not forwarded here.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ReviewModel for ProviderModel {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ReviewError> {
        if request.safety == SafetyMode::Relaxed {
            debug!("{}: safety settings are not forwarded to this provider", self.label);
        }

        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            request.images.clone(),
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_provider_error(&self.label, &e.to_string()))?;

        if response.content.trim().is_empty() {
            return Err(ReviewError::EmptyResponse);
        }

        Ok(GenerationResponse {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Map a provider error message onto the error taxonomy.
///
/// edgequake-llm reports HTTP failures as text, so the status is recovered
/// from the message.
fn classify_provider_error(provider: &str, message: &str) -> ReviewError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401") || lower.contains("403") || lower.contains("unauthorized") {
        ReviewError::AuthError {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    } else if lower.contains("429") || lower.contains("rate limit") {
        ReviewError::RateLimitExceeded {
            provider: provider.to_string(),
        }
    } else if lower.contains("content_filter") || lower.contains("safety") {
        ReviewError::Blocked {
            reason: message.to_string(),
        }
    } else {
        ReviewError::Generation {
            provider: provider.to_string(),
            detail: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<GenerationResponse, ReviewError>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<GenerationResponse, ReviewError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ReviewModel for Scripted {
        fn name(&self) -> String {
            "scripted".into()
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResponse, ReviewError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                sleep(d).await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ReviewError::EmptyResponse))
        }
    }

    fn ok(text: &str) -> Result<GenerationResponse, ReviewError> {
        Ok(GenerationResponse {
            text: text.into(),
            ..Default::default()
        })
    }

    fn request(config: &ReviewConfig) -> GenerationRequest {
        GenerationRequest::new(UseCase::RatingOnly, "rate".into(), vec![], config)
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let config = ReviewConfig::default();
        let model = Scripted::new(vec![
            Err(ReviewError::ApiTimeout { secs: 1 }),
            ok("7"),
        ]);
        let err = invoke(&model, &request(&config), &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::ApiTimeout { .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures() {
        let config = ReviewConfig::builder()
            .max_retries(2)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let model = Scripted::new(vec![
            Err(ReviewError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            ok("7"),
        ]);
        let inv = invoke(&model, &request(&config), &config).await.unwrap();
        assert_eq!(inv.response.text, "7");
        assert_eq!(inv.retries, 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn never_retries_safety_blocks() {
        let config = ReviewConfig::builder()
            .max_retries(3)
            .retry_backoff_ms(1)
            .build()
            .unwrap();
        let model = Scripted::new(vec![
            Err(ReviewError::Blocked {
                reason: "SAFETY".into(),
            }),
            ok("7"),
        ]);
        let err = invoke(&model, &request(&config), &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::Blocked { .. }));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_side_timeout() {
        let config = ReviewConfig::builder().api_timeout_secs(1).build().unwrap();
        let mut model = Scripted::new(vec![ok("late")]);
        model.delay = Some(Duration::from_secs(5));
        let err = invoke(&model, &request(&config), &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::ApiTimeout { secs: 1 }));
    }

    #[test]
    fn classify_errors() {
        assert!(matches!(
            classify_provider_error("openai", "HTTP 401 Unauthorized"),
            ReviewError::AuthError { .. }
        ));
        assert!(matches!(
            classify_provider_error("openai", "429 Too Many Requests"),
            ReviewError::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            classify_provider_error("azure", "finish_reason=content_filter"),
            ReviewError::Blocked { .. }
        ));
        assert!(matches!(
            classify_provider_error("ollama", "connection refused"),
            ReviewError::Generation { .. }
        ));
    }
}
