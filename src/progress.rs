//! Progress-callback trait for review events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to observe a
//! request as it moves through acquisition, the model call and
//! interpretation. The CLI uses it to drive a spinner.
//!
//! # Example
//!
//! ```rust
//! use verge_review::{ReviewConfig, ReviewProgressCallback, UseCase};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ReviewProgressCallback for Printer {
//!     fn on_request_start(&self, use_case: UseCase, images: usize) {
//!         eprintln!("{use_case}: sending {images} image(s)");
//!     }
//! }
//!
//! let config = ReviewConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::prompts::UseCase;
use std::sync::Arc;

/// Called by the pipeline at each stage boundary.
///
/// All methods default to no-ops so implementors override only what they
/// need. Implementations must be `Send + Sync`; a shared `Reviewer` may run
/// requests from several tasks.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once the upload set has been accepted, before decoding.
    fn on_acquire_start(&self, use_case: UseCase, files: usize) {
        let _ = (use_case, files);
    }

    /// Called after decoding/rasterisation with the number of images that
    /// will be attached to the request.
    fn on_media_ready(&self, images: usize) {
        let _ = images;
    }

    /// Called just before the model request is sent.
    fn on_request_start(&self, use_case: UseCase, images: usize) {
        let _ = (use_case, images);
    }

    /// Called before a retry with the delay that will be waited.
    fn on_retry(&self, attempt: u32, backoff_ms: u64) {
        let _ = (attempt, backoff_ms);
    }

    /// Called when the model answered.
    fn on_response(&self, text_len: usize) {
        let _ = text_len;
    }

    /// Called when the request failed.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;
