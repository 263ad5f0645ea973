//! # verge-review
//!
//! Send photos, chat screenshots or a résumé to a multimodal LLM and get
//! back a dating-profile review, a 1–10 rating, reply suggestions, or
//! interview preparation.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads (jpg / png / one pdf)
//!  │
//!  ├─ 1. Input      file-type rules, optional image cap, decode photos
//!  ├─ 2. Render     rasterise PDF pages via pdfium (spawn_blocking)
//!  ├─ 3. Encode     JPEG / PNG → base64 ImageData
//!  ├─ 4. Model      one call: native Gemini REST or any edgequake-llm provider
//!  └─ 5. Interpret  tidy text, extract rating or résumé JSON
//! ```
//!
//! Every use case is one model call. Prompts come from a versioned registry
//! keyed by [`UseCase`]. Résumé text is handed to interview preparation
//! through a [`SessionContext`], kept in memory ([`SessionStore`]) or on disk
//! ([`ScratchStore`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verge_review::{Reviewer, ReviewConfig, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend picked from GOOGLE_API_KEY / GEMINI_API_KEY or EDGEQUAKE_* vars
//!     let reviewer = Reviewer::new(ReviewConfig::builder().max_images(8).build()?);
//!     let uploads = vec![
//!         Upload::from_path("profile-1.jpg").await?,
//!         Upload::from_path("profile-2.jpg").await?,
//!     ];
//!     let output = reviewer.rate_profile(uploads).await?;
//!     if let Some(rated) = output.rating {
//!         println!("{}: {}", rated.rating, rated.review);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `verge` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! ```toml
//! verge-review = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, PdfPages, ReviewConfig, ReviewConfigBuilder, SafetyMode};
pub use error::{ErrorKind, ReviewError, NO_RESPONSE};
pub use output::{render_result, Rendered, ReviewOutput, ReviewStats};
pub use pipeline::input::Upload;
pub use pipeline::interpret::{interpret_rating, RatedReview, Rating, INVALID_RATING};
pub use pipeline::model::{GenerationRequest, GenerationResponse, ReviewModel};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback};
pub use prompts::{PromptTemplate, UseCase};
pub use review::{resolve_model, review, review_sync, ModelStatus, Reviewer};
pub use session::{ResumeProfile, ScratchStore, SessionContext, SessionId, SessionStore};
