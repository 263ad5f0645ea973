//! Output types returned by a review run.

use crate::error::{ErrorKind, ReviewError, NO_RESPONSE};
use crate::pipeline::interpret::RatedReview;
use crate::prompts::UseCase;
use crate::session::ResumeProfile;
use serde::{Deserialize, Serialize};

/// The result of one successful review request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub use_case: UseCase,
    /// `use_case@version` of the template used, or `override` when the
    /// prompt text was replaced for this run.
    pub prompt_id: String,
    /// Backend label, e.g. `gemini/gemini-2.0-flash`.
    pub model: String,
    /// Tidied model text.
    pub text: String,
    /// Present for [`UseCase::RatingOnly`], and for profile reviews when an
    /// `N/10` score was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatedReview>,
    /// Present for [`UseCase::ResumeParsing`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeProfile>,
    pub images_sent: usize,
    pub stats: ReviewStats,
}

/// Timing and token counts for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
    /// Wall-clock time for the whole request.
    pub duration_ms: u64,
    /// Decoding and rasterisation.
    pub acquire_duration_ms: u64,
    /// Model call(s), including retries.
    pub model_duration_ms: u64,
}

/// A review result prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered {
    pub heading: String,
    /// Model text, or [`NO_RESPONSE`] when the request failed.
    pub body: String,
    /// User-facing error message when the request failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

/// Turn a review result into display text.
///
/// Failures show [`ReviewError::user_message`] and the `"No response"`
/// body; a rating that could not be read shows `"Invalid rating format"`.
pub fn render_result(result: &Result<ReviewOutput, ReviewError>) -> Rendered {
    match result {
        Ok(out) => {
            let heading = match (&out.use_case, &out.rating) {
                (UseCase::RatingOnly, Some(rated)) => match rated.rating.stars() {
                    Some(stars) => format!("Rating: {}/10 {stars}", rated.rating),
                    None => format!("Rating: {}", rated.rating),
                },
                (UseCase::ProfileReview, _) => "Profile review".to_string(),
                (UseCase::ReplyGeneration, _) => "Suggested replies".to_string(),
                (UseCase::ResumeParsing, _) => "Extracted résumé".to_string(),
                (UseCase::InterviewPrep, _) => "Interview questions".to_string(),
                (UseCase::RatingOnly, None) => "Rating".to_string(),
            };
            let body = match (&out.use_case, &out.rating, &out.resume) {
                (UseCase::RatingOnly, Some(rated), _) => rated.review.clone(),
                (UseCase::ResumeParsing, _, Some(resume)) => resume.ocr_text.clone(),
                _ => out.text.clone(),
            };
            Rendered {
                heading,
                body,
                error: None,
                error_kind: None,
            }
        }
        Err(e) => Rendered {
            heading: "Error".to_string(),
            body: NO_RESPONSE.to_string(),
            error: Some(e.user_message()),
            error_kind: Some(e.kind()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::interpret::{Rating, INVALID_RATING};

    fn output(use_case: UseCase, text: &str, rating: Option<RatedReview>) -> ReviewOutput {
        ReviewOutput {
            use_case,
            prompt_id: use_case.template().id(),
            model: "test".into(),
            text: text.into(),
            rating,
            resume: None,
            images_sent: 1,
            stats: ReviewStats::default(),
        }
    }

    #[test]
    fn failure_shows_sentinel() {
        let r = render_result(&Err(ReviewError::EmptyResponse));
        assert_eq!(r.body, "No response");
        assert!(r.error.is_some());
        assert_eq!(r.error_kind, Some(ErrorKind::Generation));
    }

    #[test]
    fn rating_heading() {
        let rated = RatedReview {
            rating: Rating::Value(8),
            review: "Good.".into(),
        };
        let r = render_result(&Ok(output(UseCase::RatingOnly, "Rating: 8\nGood.", Some(rated))));
        assert_eq!(r.heading, "Rating: 8/10 ★★★★★★★★☆☆");
        assert_eq!(r.body, "Good.");
    }

    #[test]
    fn unparseable_rating_heading() {
        let rated = RatedReview {
            rating: Rating::Unparseable("Eight".into()),
            review: "Eight".into(),
        };
        let r = render_result(&Ok(output(UseCase::RatingOnly, "Eight", Some(rated))));
        assert_eq!(r.heading, format!("Rating: {INVALID_RATING}"));
        assert!(r.error.is_none());
    }

    #[test]
    fn out_of_range_deserialised_rating_renders() {
        let rating: Rating =
            serde_json::from_value(serde_json::json!({"kind": "value", "value": 11})).unwrap();
        let rated = RatedReview {
            rating,
            review: "Off the charts.".into(),
        };
        let r = render_result(&Ok(output(UseCase::RatingOnly, "11", Some(rated))));
        assert_eq!(r.heading, "Rating: 11/10 ★★★★★★★★★★");
        assert_eq!(r.body, "Off the charts.");
    }

    #[test]
    fn output_json_omits_empty_fields() {
        let v = serde_json::to_value(output(UseCase::ReplyGeneration, "hey", None)).unwrap();
        assert_eq!(v["use_case"], "reply_generation");
        assert!(v.get("rating").is_none());
        assert!(v.get("resume").is_none());
    }
}
