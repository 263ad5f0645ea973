//! Review entry points.
//!
//! A [`Reviewer`] owns the configuration and the resolved model backend.
//! Each public method is one user action: acquire the uploads, assemble the
//! prompt, make one model call, interpret the answer.
//!
//! Missing credentials never make construction fail. The reviewer records
//! why no backend is available, reports it through [`Reviewer::status`],
//! and every model-invoking method returns
//! [`ReviewError::NotConfigured`] before touching the uploads.

use crate::config::{Credentials, ReviewConfig, DEFAULT_GEMINI_MODEL};
use crate::error::ReviewError;
use crate::output::{ReviewOutput, ReviewStats};
use crate::pipeline::gemini::GeminiClient;
use crate::pipeline::input::{self, Upload};
use crate::pipeline::interpret::{self, RatedReview, Rating};
use crate::pipeline::model::{invoke, GenerationRequest, ProviderModel, ReviewModel};
use crate::pipeline::encode;
use crate::prompts::{render_text, UseCase};
use crate::session::SessionContext;
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Whether a model backend is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Ready { model: String },
    Unavailable { provider: String, hint: String },
}

enum ModelSlot {
    Ready(Arc<dyn ReviewModel>),
    Unavailable { provider: String, hint: String },
}

/// Runs review requests against one configured backend.
///
/// `Send + Sync`; share it behind an `Arc` to serve several tasks.
pub struct Reviewer {
    config: ReviewConfig,
    slot: ModelSlot,
}

impl std::fmt::Debug for Reviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reviewer")
            .field("config", &self.config)
            .field("status", &self.status())
            .finish()
    }
}

impl Reviewer {
    /// Resolve the backend using credentials from the process environment.
    pub fn new(config: ReviewConfig) -> Self {
        Self::with_credentials(config, &Credentials::from_env())
    }

    /// Resolve the backend using the given credentials.
    pub fn with_credentials(config: ReviewConfig, credentials: &Credentials) -> Self {
        let slot = match resolve_model(&config, credentials) {
            Ok(model) => {
                info!("Model backend: {}", model.name());
                ModelSlot::Ready(model)
            }
            Err(ReviewError::NotConfigured { provider, hint }) => {
                warn!("No model backend available ({provider}): {hint}");
                ModelSlot::Unavailable { provider, hint }
            }
            Err(e) => {
                warn!("No model backend available: {e}");
                ModelSlot::Unavailable {
                    provider: config
                        .provider_name
                        .clone()
                        .unwrap_or_else(|| "gemini".to_string()),
                    hint: e.to_string(),
                }
            }
        };
        Self { config, slot }
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn status(&self) -> ModelStatus {
        match &self.slot {
            ModelSlot::Ready(m) => ModelStatus::Ready { model: m.name() },
            ModelSlot::Unavailable { provider, hint } => ModelStatus::Unavailable {
                provider: provider.clone(),
                hint: hint.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.slot, ModelSlot::Ready(_))
    }

    fn model(&self) -> Result<&Arc<dyn ReviewModel>, ReviewError> {
        match &self.slot {
            ModelSlot::Ready(m) => Ok(m),
            ModelSlot::Unavailable { provider, hint } => Err(ReviewError::NotConfigured {
                provider: provider.clone(),
                hint: hint.clone(),
            }),
        }
    }

    // ── Use cases ────────────────────────────────────────────────────────

    /// Long-form critique of dating-profile screenshots (or a PDF export).
    ///
    /// An `N/10` score in the text is attached as an informational rating.
    pub async fn review_profile(&self, uploads: Vec<Upload>) -> Result<ReviewOutput, ReviewError> {
        self.run(UseCase::ProfileReview, uploads).await
    }

    /// A 1–10 rating plus a short justification.
    pub async fn rate_profile(&self, uploads: Vec<Upload>) -> Result<ReviewOutput, ReviewError> {
        self.run(UseCase::RatingOnly, uploads).await
    }

    /// Reply suggestions for the last message in one chat screenshot.
    pub async fn generate_reply(&self, upload: Upload) -> Result<ReviewOutput, ReviewError> {
        self.run(UseCase::ReplyGeneration, vec![upload]).await
    }

    /// Transcribe a résumé (one PDF or one image) into a [`ResumeProfile`].
    ///
    /// [`ResumeProfile`]: crate::session::ResumeProfile
    pub async fn parse_resume(&self, upload: Upload) -> Result<ReviewOutput, ReviewError> {
        self.run(UseCase::ResumeParsing, vec![upload]).await
    }

    /// Interview questions from the session's résumé and job description.
    pub async fn interview_prep(
        &self,
        context: &SessionContext,
    ) -> Result<ReviewOutput, ReviewError> {
        let use_case = UseCase::InterviewPrep;
        let result = async {
            let model = self.model()?;
            let job = context
                .job_description
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ReviewError::InvalidInput {
                    reason: "a job description is required".to_string(),
                })?;
            let resume_json = context.resume_json()?;
            debug!(
                "Session {}: {} chars of job description",
                context.session_id,
                job.len()
            );

            let vars = [
                ("job_description", job),
                ("resume_json", resume_json.as_str()),
            ];
            let (prompt_id, prompt) = self.prompt(use_case, &vars)?;
            self.generate(model, use_case, prompt_id, prompt, Vec::new(), Instant::now(), 0)
                .await
        }
        .await;

        self.report(use_case, result)
    }

    /// Run any media use case by name.
    pub async fn run(
        &self,
        use_case: UseCase,
        uploads: Vec<Upload>,
    ) -> Result<ReviewOutput, ReviewError> {
        let result = self.run_media(use_case, uploads).await;
        self.report(use_case, result)
    }

    async fn run_media(
        &self,
        use_case: UseCase,
        uploads: Vec<Upload>,
    ) -> Result<ReviewOutput, ReviewError> {
        let start = Instant::now();
        let model = self.model()?;
        if use_case == UseCase::InterviewPrep {
            return Err(ReviewError::InvalidInput {
                reason: "interview preparation takes a session, not uploads".to_string(),
            });
        }
        let (prompt_id, prompt) = self.prompt(use_case, &[])?;

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_acquire_start(use_case, uploads.len());
        }

        // ── Acquire ──────────────────────────────────────────────────────
        let acquire_start = Instant::now();
        let media = input::acquire(uploads, use_case, &self.config).await?;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_media_ready(media.len());
        }

        // ── Encode ───────────────────────────────────────────────────────
        let images = tokio::task::spawn_blocking(move || encode::encode_all(&media.images))
            .await
            .map_err(|e| ReviewError::Internal(format!("Encode task panicked: {e}")))?
            .map_err(|e| ReviewError::Internal(format!("Image encoding failed: {e}")))?;
        let acquire_ms = acquire_start.elapsed().as_millis() as u64;
        debug!("{use_case}: {} image(s) ready in {acquire_ms}ms", images.len());

        self.generate(model, use_case, prompt_id, prompt, images, start, acquire_ms)
            .await
    }

    /// Invoke the model and interpret its answer.
    #[allow(clippy::too_many_arguments)]
    async fn generate(
        &self,
        model: &Arc<dyn ReviewModel>,
        use_case: UseCase,
        prompt_id: String,
        prompt: String,
        images: Vec<ImageData>,
        start: Instant,
        acquire_duration_ms: u64,
    ) -> Result<ReviewOutput, ReviewError> {
        let images_sent = images.len();
        info!(
            "{use_case}: sending {images_sent} image(s) to {} with {prompt_id}",
            model.name()
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_request_start(use_case, images_sent);
        }

        let request = GenerationRequest::new(use_case, prompt, images, &self.config);
        let invocation = invoke(model.as_ref(), &request, &self.config).await?;
        let text = interpret::tidy_response(&invocation.response.text);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_response(text.len());
        }

        let floor = self.config.rating_floor;
        let (rating, resume) = match use_case {
            UseCase::RatingOnly => {
                let rated = interpret::interpret_rating(&text);
                if let Rating::Unparseable(ref raw) = rated.rating {
                    warn!("Could not read a rating from {raw:?}");
                }
                (
                    Some(RatedReview {
                        rating: rated.rating.with_floor(floor),
                        review: rated.review,
                    }),
                    None,
                )
            }
            UseCase::ProfileReview => (
                interpret::find_score_out_of_ten(&text).map(|n| RatedReview {
                    rating: Rating::Value(n).with_floor(floor),
                    review: text.clone(),
                }),
                None,
            ),
            UseCase::ResumeParsing => (None, Some(interpret::parse_resume_profile(&text))),
            UseCase::ReplyGeneration | UseCase::InterviewPrep => (None, None),
        };

        Ok(ReviewOutput {
            use_case,
            prompt_id,
            model: model.name(),
            text,
            rating,
            resume,
            images_sent,
            stats: ReviewStats {
                input_tokens: invocation.response.input_tokens,
                output_tokens: invocation.response.output_tokens,
                retries: invocation.retries,
                duration_ms: start.elapsed().as_millis() as u64,
                acquire_duration_ms,
                model_duration_ms: invocation.duration_ms,
            },
        })
    }

    /// The prompt text for this run and its identifier.
    fn prompt(
        &self,
        use_case: UseCase,
        vars: &[(&str, &str)],
    ) -> Result<(String, String), ReviewError> {
        match self.config.prompt_override {
            Some(ref text) => Ok(("override".to_string(), render_text(text, vars)?)),
            None => {
                let template = use_case.template();
                Ok((template.id(), template.render(vars)?))
            }
        }
    }

    fn report(
        &self,
        use_case: UseCase,
        result: Result<ReviewOutput, ReviewError>,
    ) -> Result<ReviewOutput, ReviewError> {
        match &result {
            Ok(out) => info!(
                "{use_case}: done in {}ms ({} in / {} out tokens)",
                out.stats.duration_ms, out.stats.input_tokens, out.stats.output_tokens
            ),
            Err(e) => {
                warn!("{use_case}: {e}");
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_error(&e.to_string());
                }
            }
        }
        result
    }
}

// ── Backend resolution ───────────────────────────────────────────────────

/// Pick the model backend, from most to least specific.
///
/// 1. A pre-built backend (`config.backend`).
/// 2. A pre-built edgequake-llm provider (`config.provider`).
/// 3. A named edgequake-llm provider (`config.provider_name`), which reads
///    its own API key variable.
/// 4. The native Gemini client with `config.api_key`, or a Google key from
///    `GOOGLE_API_KEY` / `GEMINI_API_KEY`.
/// 5. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
///
/// Nothing found is [`ReviewError::NotConfigured`].
pub fn resolve_model(
    config: &ReviewConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn ReviewModel>, ReviewError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref provider) = config.provider {
        let label = match config.model {
            Some(ref m) => format!("custom/{m}"),
            None => "custom".to_string(),
        };
        return Ok(Arc::new(ProviderModel::new(Arc::clone(provider), label)));
    }

    if let Some(ref name) = config.provider_name {
        let model = match config.model.as_deref() {
            Some(m) => m,
            None => default_model_for(name).ok_or_else(|| ReviewError::NotConfigured {
                provider: name.clone(),
                hint: format!("No default model for provider '{name}'. Pass --model."),
            })?,
        };
        return named_provider(name, model);
    }

    let api_key = config
        .api_key
        .clone()
        .or_else(|| credentials.google_api_key.clone());
    if let Some(key) = api_key {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        let client = GeminiClient::new(
            key,
            model,
            &config.gemini_base_url,
            config.api_timeout_secs,
        )?;
        return Ok(Arc::new(client));
    }

    if let Some((ref provider, ref model)) = credentials.provider_pair {
        return named_provider(provider, model);
    }

    Err(ReviewError::NotConfigured {
        provider: "gemini".to_string(),
        hint: "Set GOOGLE_API_KEY (or GEMINI_API_KEY) in the environment or a .env file, \
               or choose another provider with --provider."
            .to_string(),
    })
}

fn named_provider(name: &str, model: &str) -> Result<Arc<dyn ReviewModel>, ReviewError> {
    let provider: Arc<dyn LLMProvider> = ProviderFactory::create_llm_provider(name, model)
        .map_err(|e| ReviewError::NotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        })?;
    Ok(Arc::new(ProviderModel::new(provider, format!("{name}/{model}"))))
}

fn default_model_for(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" | "google" => Some(DEFAULT_GEMINI_MODEL),
        "openai" => Some("gpt-4.1-nano"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "ollama" | "lmstudio" => Some("llava"),
        _ => None,
    }
}

// ── Convenience wrappers ─────────────────────────────────────────────────

/// Run one media use case with a fresh [`Reviewer`].
pub async fn review(
    use_case: UseCase,
    uploads: Vec<Upload>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    Reviewer::new(config.clone()).run(use_case, uploads).await
}

/// Synchronous wrapper around [`review`].
///
/// Creates a temporary tokio runtime internally.
pub fn review_sync(
    use_case: UseCase,
    uploads: Vec<Upload>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(review(use_case, uploads, config))
}
