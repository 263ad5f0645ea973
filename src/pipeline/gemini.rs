//! Native Gemini backend over the `generateContent` REST endpoint.
//!
//! Used when a Google API key is available and no edgequake-llm provider
//! was requested. Talking to the endpoint directly lets a request carry
//! `safetySettings`, which the provider-agnostic layer cannot express.
//!
//! A blocked prompt (`promptFeedback.blockReason`) or a candidate that
//! stops for safety with no text is a [`ReviewError::Blocked`]; any other
//! empty answer is a [`ReviewError::EmptyResponse`].

use crate::config::SafetyMode;
use crate::error::ReviewError;
use crate::pipeline::model::{GenerationRequest, GenerationResponse, ReviewModel};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Harm categories whose blocking is disabled in [`SafetyMode::Relaxed`].
pub const RELAXED_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const SAFETY_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ReviewError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReviewError::Internal(format!("HTTP client: {e}")))?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ReviewModel for GeminiClient {
    fn name(&self) -> String {
        format!("gemini/{}", self.model)
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ReviewError> {
        let body = build_request(request);
        info!(
            "Gemini {}: {} image(s), safety={:?}",
            self.model,
            request.images.len(),
            request.safety
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReviewError::ApiTimeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ReviewError::Generation {
                        provider: "gemini".to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: GeminiResponse =
            response
                .json()
                .await
                .map_err(|e| ReviewError::Generation {
                    provider: "gemini".to_string(),
                    detail: format!("malformed response: {e}"),
                })?;

        interpret_response(parsed)
    }
}

fn status_error(status: StatusCode, body: &str) -> ReviewError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ReviewError::AuthError {
            provider: "gemini".to_string(),
            detail: message,
        },
        StatusCode::TOO_MANY_REQUESTS => ReviewError::RateLimitExceeded {
            provider: "gemini".to_string(),
        },
        s => ReviewError::Api {
            status: s.as_u16(),
            message,
        },
    }
}

fn interpret_response(parsed: GeminiResponse) -> Result<GenerationResponse, ReviewError> {
    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ReviewError::Blocked { reason });
    }

    let candidate = parsed.candidates.into_iter().next();
    let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
    let text: String = candidate
        .and_then(|c| c.content)
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match finish_reason {
            Some(r) if SAFETY_FINISH_REASONS.contains(&r.as_str()) => {
                Err(ReviewError::Blocked { reason: r })
            }
            _ => Err(ReviewError::EmptyResponse),
        };
    }

    let usage = parsed.usage_metadata.unwrap_or_default();
    debug!(
        "Gemini usage: {} prompt / {} candidate tokens",
        usage.prompt_token_count, usage.candidates_token_count
    );

    Ok(GenerationResponse {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Build the JSON body: prompt text first, then images in order.
pub(crate) fn build_request(request: &GenerationRequest) -> GeminiRequest {
    let mut parts = Vec::with_capacity(request.images.len() + 1);
    parts.push(Part::Text(request.prompt.clone()));
    parts.extend(request.images.iter().map(|img| {
        Part::InlineData(InlineData {
            mime_type: img.mime_type.clone(),
            data: img.data.clone(),
        })
    }));

    let safety_settings = match request.safety {
        SafetyMode::ProviderDefault => Vec::new(),
        SafetyMode::Relaxed => RELAXED_CATEGORIES
            .iter()
            .map(|category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect(),
    };

    GeminiRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
        safety_settings,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}
