//! Error types for the verge-review library.
//!
//! Every fallible operation returns `Result<T, ReviewError>`. Variants are
//! grouped by the pipeline stage that produces them, and each maps onto one
//! [`ErrorKind`]:
//!
//! * **Configuration**: no usable model credentials, or an invalid config.
//! * **Input / Decode**: the upload is rejected or cannot be opened.
//! * **Generation**: the external model call failed or returned nothing.
//! * **Handoff**: per-session state could not be stored or loaded.
//!
//! Rating extraction never fails with an error; an unparseable rating is a
//! value ([`crate::Rating::Unparseable`]).
//!
//! [`ReviewError::user_message`] is the single place where errors become
//! user-facing text.

use std::path::PathBuf;
use thiserror::Error;

/// Sentinel body shown in place of model output when a request fails.
pub const NO_RESPONSE: &str = "No response";

/// Coarse error classes, one per failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Configuration,
    Input,
    Decode,
    Generation,
    Handoff,
    Internal,
}

/// All errors returned by the verge-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Nothing was uploaded.
    #[error("No input files were provided")]
    NoInput,

    /// File extension is not one of jpg, jpeg, png, pdf.
    #[error("Unsupported file type for '{name}'. Accepted: jpg, jpeg, png, pdf")]
    UnsupportedFileType { name: String },

    /// The upload set is not acceptable for this use case.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// More images than the configured cap.
    #[error("Too many images: {count} provided, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file has a `.pdf` extension but is not a PDF.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// Image bytes could not be decoded.
    #[error("Could not decode image '{name}': {detail}")]
    Decode { name: String, detail: String },

    /// PDF header/trailer/xref is corrupt or encrypted.
    #[error("PDF '{name}' could not be opened: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
PDFium is downloaded automatically on first use.\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// No model backend could be configured (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    NotConfigured { provider: String, hint: String },

    /// Builder or template validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// Transport or provider failure without a more specific class.
    #[error("Generation failed ({provider}): {detail}")]
    Generation { provider: String, detail: String },

    /// The provider answered with a non-success HTTP status.
    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// 401/403 from the provider. Retrying will not help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded { provider: String },

    /// The client-side timeout elapsed.
    #[error("Model call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The provider's safety filter withheld the answer.
    #[error("Response blocked by the provider's safety filter: {reason}")]
    Blocked { reason: String },

    /// The provider returned no text.
    #[error("Model returned an empty response")]
    EmptyResponse,

    // ── Hand-off errors ───────────────────────────────────────────────────
    /// Reading or writing a session scratch file failed.
    #[error("Scratch file '{path}': {source}")]
    ScratchIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A session scratch file exists but is not the expected JSON shape.
    #[error("Scratch file '{path}' is malformed: {source}")]
    ScratchFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No stored context for the given session id.
    #[error("No session '{session}' found")]
    SessionNotFound { session: String },

    /// The session exists but no résumé has been parsed into it yet.
    #[error("Session '{session}' has no parsed résumé; run the résumé step first")]
    MissingResume { session: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// The failure family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use ReviewError::*;
        match self {
            NoInput
            | UnsupportedFileType { .. }
            | InvalidInput { .. }
            | TooManyImages { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | NotAPdf { .. } => ErrorKind::Input,
            Decode { .. }
            | CorruptPdf { .. }
            | RasterisationFailed { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Decode,
            NotConfigured { .. } | InvalidConfig(_) => ErrorKind::Configuration,
            Generation { .. }
            | Api { .. }
            | AuthError { .. }
            | RateLimitExceeded { .. }
            | ApiTimeout { .. }
            | Blocked { .. }
            | EmptyResponse => ErrorKind::Generation,
            ScratchIo { .. }
            | ScratchFormat { .. }
            | SessionNotFound { .. }
            | MissingResume { .. } => ErrorKind::Handoff,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Only transport failures, timeouts, 429 and 5xx qualify. Safety blocks
    /// are deterministic for the same input and are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewError::Generation { .. }
            | ReviewError::ApiTimeout { .. }
            | ReviewError::RateLimitExceeded { .. } => true,
            ReviewError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Render the error as a short message for the person using the app.
    ///
    /// Generation failures collapse into one generic sentence; details stay
    /// in the `Display` output for logs.
    pub fn user_message(&self) -> String {
        match self {
            ReviewError::NoInput => "Please upload at least one file.".to_string(),
            ReviewError::TooManyImages { max, .. } => {
                format!("You can upload at most {max} images. Please remove some and try again.")
            }
            ReviewError::UnsupportedFileType { .. }
            | ReviewError::InvalidInput { .. }
            | ReviewError::FileNotFound { .. }
            | ReviewError::PermissionDenied { .. } => self.to_string(),
            ReviewError::NotConfigured { .. } => {
                "API key not found. Please make sure it is set in the environment or the .env file."
                    .to_string()
            }
            ReviewError::InvalidConfig(_) => format!("Configuration problem: {self}"),
            ReviewError::Blocked { .. } | ReviewError::EmptyResponse => {
                "The model did not return a response for this upload. Try different images."
                    .to_string()
            }
            e => match e.kind() {
                ErrorKind::Decode => format!("We could not read your upload: {e}"),
                ErrorKind::Generation => {
                    format!("An error occurred while generating the response: {e}")
                }
                ErrorKind::Handoff => format!("Saved session data is unavailable: {e}"),
                _ => format!("Something went wrong: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_images_display() {
        let e = ReviewError::TooManyImages { count: 9, max: 8 };
        assert!(e.to_string().contains("9 provided"));
        assert!(e.user_message().contains("at most 8"));
        assert_eq!(e.kind(), ErrorKind::Input);
    }

    #[test]
    fn not_configured_is_configuration_kind() {
        let e = ReviewError::NotConfigured {
            provider: "gemini".into(),
            hint: "Set GOOGLE_API_KEY".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.user_message().contains("API key not found"));
        assert!(!e.is_retryable());
    }

    #[test]
    fn retryable_classification() {
        assert!(ReviewError::ApiTimeout { secs: 60 }.is_retryable());
        assert!(ReviewError::Api {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());
        assert!(!ReviewError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_retryable());
        assert!(!ReviewError::Blocked {
            reason: "SAFETY".into()
        }
        .is_retryable());
        assert!(!ReviewError::AuthError {
            provider: "gemini".into(),
            detail: "invalid key".into()
        }
        .is_retryable());
    }

    #[test]
    fn generation_errors_collapse_to_generic_message() {
        let e = ReviewError::Generation {
            provider: "openai".into(),
            detail: "connection reset".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Generation);
        assert!(e.user_message().starts_with("An error occurred while generating"));
    }

    #[test]
    fn scratch_errors_are_handoff() {
        let e = ReviewError::SessionNotFound {
            session: "abc".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Handoff);
        assert!(e.to_string().contains("abc"));
    }
}
