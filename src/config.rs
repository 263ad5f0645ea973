//! Configuration types for a review run.
//!
//! All behaviour is controlled through [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]. One struct holds every knob so a config can be
//! shared across tasks and logged in one line (secrets redacted).

use crate::error::ReviewError;
use crate::pipeline::model::ReviewModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Gemini model for the native backend.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variables checked, in order, for a Google API key.
pub const GOOGLE_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Configuration for a review run.
///
/// Built via [`ReviewConfig::builder()`] or using [`ReviewConfig::default()`].
///
/// # Example
/// ```rust
/// use verge_review::{ReviewConfig, SafetyMode};
///
/// let config = ReviewConfig::builder()
///     .max_images(8)
///     .safety(SafetyMode::Relaxed)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Model identifier. If None, the backend default is used
    /// (`gemini-2.0-flash` for the native Gemini backend).
    pub model: Option<String>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "gemini").
    /// When set, the provider-agnostic backend is used instead of the native
    /// Gemini client.
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over
    /// `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed model backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn ReviewModel>>,

    /// Google API key for the native Gemini backend. If None, read from
    /// `GOOGLE_API_KEY` / `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API. Default: the public endpoint.
    pub gemini_base_url: String,

    /// Sampling temperature. Default: 0.4.
    pub temperature: f32,

    /// Maximum output tokens per request. Default: 2048.
    pub max_tokens: usize,

    /// Retries on transient model failures. Default: 0 (one attempt).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Client-side timeout for one model call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Upper bound on images per request. Default: None (no cap).
    pub max_images: Option<usize>,

    /// Which PDF pages to rasterise. Default: all pages.
    pub pdf_pages: PdfPages,

    /// Render scale applied to the PDF page size in points. 1.0 renders at
    /// the document's native 72 DPI. Default: 1.0.
    pub render_scale: f32,

    /// Longest edge, in pixels, of any image sent to the model. Larger
    /// photos are downscaled and PDF renders are capped. Default: 2000.
    pub max_image_pixels: u32,

    /// Safety-filter configuration passed to the Gemini backend.
    pub safety: SafetyMode,

    /// Lowest rating reported; in-range ratings below it are raised to it.
    /// Default: 1.
    pub rating_floor: u8,

    /// Replaces the registered prompt template text for this run.
    pub prompt_override: Option<String>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.4,
            max_tokens: 2048,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            max_images: None,
            pdf_pages: PdfPages::default(),
            render_scale: 1.0,
            max_image_pixels: 2000,
            safety: SafetyMode::default(),
            rating_floor: 1,
            prompt_override: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ReviewModel>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_images", &self.max_images)
            .field("pdf_pages", &self.pdf_pages)
            .field("render_scale", &self.render_scale)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("safety", &self.safety)
            .field("rating_floor", &self.rating_floor)
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
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

    pub fn backend(mut self, backend: Arc<dyn ReviewModel>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.config.gemini_base_url = url.trim_end_matches('/').to_string();
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
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.max_images = Some(n);
        self
    }

    pub fn pdf_pages(mut self, pages: PdfPages) -> Self {
        self.config.pdf_pages = pages;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 5.0);
        self
    }

    pub fn max_image_pixels(mut self, px: u32) -> Self {
        self.config.max_image_pixels = px.max(100);
        self
    }

    pub fn safety(mut self, mode: SafetyMode) -> Self {
        self.config.safety = mode;
        self
    }

    pub fn rating_floor(mut self, floor: u8) -> Self {
        self.config.rating_floor = floor;
        self
    }

    pub fn prompt_override(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_override = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.max_images == Some(0) {
            return Err(ReviewError::InvalidConfig(
                "max_images must be ≥ 1 when set".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ReviewError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(1..=10).contains(&c.rating_floor) {
            return Err(ReviewError::InvalidConfig(format!(
                "rating_floor must be 1–10, got {}",
                c.rating_floor
            )));
        }
        if c.gemini_base_url.is_empty() {
            return Err(ReviewError::InvalidConfig(
                "gemini_base_url must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Safety-filter setting sent with Gemini requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SafetyMode {
    /// Leave the provider's default filters in place. (default)
    #[default]
    ProviderDefault,
    /// Disable blocking on harassment, hate speech, sexually explicit and
    /// dangerous content.
    Relaxed,
}

/// Which pages of an uploaded PDF become images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfPages {
    /// Every page, in document order. (default)
    #[default]
    All,
    /// Only page 1.
    FirstOnly,
}

impl PdfPages {
    /// 0-indexed pages to render for a document with `total_pages` pages.
    pub fn to_indices(self, total_pages: usize) -> Vec<usize> {
        match self {
            PdfPages::All => (0..total_pages).collect(),
            PdfPages::FirstOnly => (0..total_pages.min(1)).collect(),
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Model credentials discovered at startup.
///
/// Kept separate from [`ReviewConfig`] so tests can resolve a backend
/// against a controlled set of variables instead of the process environment.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Google API key for the native Gemini backend.
    pub google_api_key: Option<String>,
    /// `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
    pub provider_pair: Option<(String, String)>,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        let google_api_key = GOOGLE_KEY_VARS.iter().find_map(|k| non_empty(*k));
        let provider_pair = match (
            non_empty("EDGEQUAKE_LLM_PROVIDER"),
            non_empty("EDGEQUAKE_MODEL"),
        ) {
            (Some(p), Some(m)) => Some((p, m)),
            _ => None,
        };

        Self {
            google_api_key,
            provider_pair,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("provider_pair", &self.provider_pair)
            .finish()
    }
}
