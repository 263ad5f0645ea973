//! Response interpretation: tidy model text, extract ratings and résumé JSON.
//!
//! Nothing here fails. A rating that cannot be read becomes
//! [`Rating::Unparseable`], and a résumé answer that is not JSON is kept as
//! plain text.
//!
//! Rating extraction tries, in order:
//! 1. the whole trimmed response as an integer (`"7"`)
//! 2. the token after the literal `Rating:` label, tolerating markdown bold,
//!    trailing punctuation and a `/10` suffix (`"Rating: **9/10**."`)
//!
//! Only values in `1..=10` count as ratings.

use crate::session::ResumeProfile;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel shown in place of a rating that could not be read.
pub const INVALID_RATING: &str = "Invalid rating format";

const RATING_LABEL: &str = "Rating:";

/// A 1–10 rating, or the raw text that failed to parse as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Rating {
    Value(u8),
    /// The offending token, kept for diagnostics.
    Unparseable(String),
}

impl Rating {
    pub fn value(&self) -> Option<u8> {
        match self {
            Rating::Value(n) => Some(*n),
            Rating::Unparseable(_) => None,
        }
    }

    /// `★` per point, padded with `☆` to ten. `None` when unparseable.
    ///
    /// Values above ten (only reachable by building or deserialising a
    /// `Rating` directly) show ten stars.
    pub fn stars(&self) -> Option<String> {
        self.value().map(|n| {
            let n = usize::from(n.min(10));
            format!("{}{}", "★".repeat(n), "☆".repeat(10 - n))
        })
    }

    /// Raise an in-range rating below `floor` to `floor`.
    pub fn with_floor(self, floor: u8) -> Self {
        match self {
            Rating::Value(n) if n < floor => Rating::Value(floor.min(10)),
            other => other,
        }
    }

    fn from_integer(raw: &str) -> Option<Self> {
        let n: u64 = raw.parse().ok()?;
        Some(match u8::try_from(n) {
            Ok(n) if (1..=10).contains(&n) => Rating::Value(n),
            _ => Rating::Unparseable(raw.to_string()),
        })
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Value(n) => write!(f, "{n}"),
            Rating::Unparseable(_) => f.write_str(INVALID_RATING),
        }
    }
}

/// A rating together with the text that explains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatedReview {
    pub rating: Rating,
    pub review: String,
}

/// Read the whole response as a bare integer rating.
///
/// `None` when the text is not an integer at all; `Some(Unparseable)` when it
/// is an integer outside `1..=10`.
pub fn parse_numeric_rating(text: &str) -> Option<Rating> {
    Rating::from_integer(text.trim())
}

/// Read the rating after the first `Rating:` label.
///
/// The review is the text with the label line removed. `None` when the
/// label does not appear.
pub fn parse_labelled_rating(text: &str) -> Option<RatedReview> {
    let at = text.find(RATING_LABEL)?;
    let after = at + RATING_LABEL.len();

    let line_start = text[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[after..]
        .find('\n')
        .map(|i| after + i)
        .unwrap_or(text.len());

    // Skip decoration such as the closing `**` of `**Rating:** 8`.
    let token = text[after..line_end]
        .split_whitespace()
        .find(|t| t.chars().any(|c| c.is_alphanumeric()))
        .unwrap_or_default();

    let review = format!("{}{}", &text[..line_start], &text[line_end..]);

    Some(RatedReview {
        rating: parse_rating_token(token),
        review: review.trim().to_string(),
    })
}

/// Normalise `**9/10**.` → `9` and parse it.
fn parse_rating_token(token: &str) -> Rating {
    let cleaned = token
        .trim_matches('*')
        .trim_end_matches(['.', ',', ';', ':', '!', ')'])
        .trim_matches('*');
    let cleaned = cleaned.strip_suffix("/10").unwrap_or(cleaned);

    Rating::from_integer(cleaned).unwrap_or_else(|| Rating::Unparseable(token.to_string()))
}

/// Extract a rating from a rating-only response.
///
/// Falls back to [`Rating::Unparseable`] with the whole text as the review.
pub fn interpret_rating(text: &str) -> RatedReview {
    if let Some(rating) = parse_numeric_rating(text) {
        return RatedReview {
            rating,
            review: String::new(),
        };
    }
    if let Some(rated) = parse_labelled_rating(text) {
        return rated;
    }
    RatedReview {
        rating: Rating::Unparseable(first_line(text).to_string()),
        review: text.trim().to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default()
}

static RE_OUT_OF_TEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*/\s*10\b").unwrap());

/// First `N/10` score in free text, e.g. a long-form profile review.
pub fn find_score_out_of_ten(text: &str) -> Option<u8> {
    RE_OUT_OF_TEN
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u8>().ok())
        .find(|n| (1..=10).contains(n))
}

// ── Text cleanup ─────────────────────────────────────────────────────────

/// CRLF → LF, strip invisible Unicode, trim.
pub fn tidy_response(text: &str) -> String {
    let s = text.replace("\r\n", "\n").replace('\r', "\n");
    let s = s.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    );
    s.trim().to_string()
}

static RE_FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)\n\s*```").unwrap());

/// Pull a JSON object out of a model answer.
///
/// Unwraps a fenced block if present, then slices from the first `{` to the
/// last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let body = RE_FENCED
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Interpret a résumé-parsing answer.
///
/// Non-JSON answers become the profile text verbatim.
pub fn parse_resume_profile(text: &str) -> ResumeProfile {
    extract_json(text)
        .and_then(|json| serde_json::from_str::<ResumeProfile>(json).ok())
        .unwrap_or_else(|| ResumeProfile {
            ocr_text: text.trim().to_string(),
        })
}
