//! Pipeline stages for a review request.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ model/gemini ──▶ interpret
//! (files)   (pdfium)   (base64)   (one call)       (text / rating)
//! ```
//!
//! 1. [`input`] : check file types and caps, decode photos; PDFs go to
//!    [`render`]
//! 2. [`render`]: rasterise PDF pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: JPEG/PNG-encode and base64-wrap each image for the
//!    request body
//! 4. [`model`] : the [`model::ReviewModel`] seam, the edgequake-llm
//!    adapter, and the timeout/retry wrapper; [`gemini`] is the native
//!    Gemini REST backend
//! 5. [`interpret`]: tidy the text, extract ratings and résumé JSON

pub mod encode;
pub mod gemini;
pub mod input;
pub mod interpret;
pub mod model;
pub mod render;
