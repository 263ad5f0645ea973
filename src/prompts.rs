//! Prompt templates, one per use case.
//!
//! Every instruction sent to the model lives here, keyed by [`UseCase`] and
//! carrying a version number. Callers select a template explicitly; a
//! per-run override is possible via
//! [`crate::config::ReviewConfig::prompt_override`].
//!
//! Templates may contain `{placeholder}` markers (lowercase, underscores).
//! [`PromptTemplate::render`] substitutes them and refuses to send a prompt
//! with a marker left unfilled.

use crate::error::ReviewError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller wants from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    /// Long-form dating-profile critique with pros, cons and suggestions.
    ProfileReview,
    /// A 1–10 rating plus a short justification.
    RatingOnly,
    /// Reply suggestions for the last message in a chat screenshot.
    ReplyGeneration,
    /// Transcribe a résumé into JSON for later steps.
    ResumeParsing,
    /// Interview questions tailored to a résumé and a job description.
    InterviewPrep,
}

impl UseCase {
    /// Every use case, in display order.
    pub const ALL: [UseCase; 5] = [
        UseCase::ProfileReview,
        UseCase::RatingOnly,
        UseCase::ReplyGeneration,
        UseCase::ResumeParsing,
        UseCase::InterviewPrep,
    ];

    /// Stable identifier used in logs, JSON and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::ProfileReview => "profile_review",
            UseCase::RatingOnly => "rating_only",
            UseCase::ReplyGeneration => "reply_generation",
            UseCase::ResumeParsing => "resume_parsing",
            UseCase::InterviewPrep => "interview_prep",
        }
    }

    /// The registered template for this use case.
    pub fn template(self) -> &'static PromptTemplate {
        match self {
            UseCase::ProfileReview => &PROFILE_REVIEW,
            UseCase::RatingOnly => &RATING_ONLY,
            UseCase::ReplyGeneration => &REPLY_GENERATION,
            UseCase::ResumeParsing => &RESUME_PARSING,
            UseCase::InterviewPrep => &INTERVIEW_PREP,
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned instruction template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub use_case: UseCase,
    pub version: u32,
    pub text: &'static str,
}

static RE_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

impl PromptTemplate {
    /// `use_case@version`, for logs and output metadata.
    pub fn id(&self) -> String {
        format!("{}@v{}", self.use_case, self.version)
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&'static str> {
        placeholders_in(self.text)
    }

    /// Substitute `{name}` markers with the given values.
    ///
    /// Extra values are ignored. A marker without a value is an
    /// [`ReviewError::InvalidConfig`].
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, ReviewError> {
        render_text(self.text, vars)
    }
}

/// Render arbitrary template text (used for prompt overrides as well).
pub fn render_text(text: &str, vars: &[(&str, &str)]) -> Result<String, ReviewError> {
    let mut missing = Vec::new();
    let rendered = RE_PLACEHOLDER.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match vars.iter().find(|(k, _)| *k == name) {
            Some((_, v)) => v.to_string(),
            None => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ReviewError::InvalidConfig(format!(
            "prompt placeholder(s) without a value: {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

fn placeholders_in(text: &'static str) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    for caps in RE_PLACEHOLDER.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// All registered templates.
pub fn all_templates() -> [&'static PromptTemplate; 5] {
    UseCase::ALL.map(UseCase::template)
}

// ── Templates ────────────────────────────────────────────────────────────

pub static PROFILE_REVIEW: PromptTemplate = PromptTemplate {
    use_case: UseCase::ProfileReview,
    version: 2,
    text: r#"Assume the role of a relationship coach and dating expert. You are 28 years old and have spent more than 8 years in online dating. You are known for very specific dating-profile improvement tips, unlike others who only give generic suggestions.

The attached images are screenshots of one person's dating-app profile. Write the review in this structure:

1. Greeting: "Hi, <their name>!" using the name shown on the profile.
2. Overall view of their dating-app profile.
3. Rating: rate the profile out of 10 in the form "N/10". Be specific about why; do not pick a random number. Put that many stars right next to the number.
4. Body:
   - Pros of the profile and what stood out.
   - More pros.
   - Cons of the profile and what is not working.
   - More cons, i.e. what they can improve.
5. Suggestions: specific, personalised advice on improving the profile. For example: change the cover photo, shuffle the images, change a prompt, rewrite the bio, remove a particular photo, add a specific type of photo. Base the tips on their interests and the whole profile.

Keep the review easy to understand and easy to act on. Be on point; no beating around the bush."#,
};

pub static RATING_ONLY: PromptTemplate = PromptTemplate {
    use_case: UseCase::RatingOnly,
    version: 1,
    text: r#"You are a dating expert. The attached images are screenshots of one person's dating-app profile.

Rate the profile as a whole on a scale from 1 to 10, where 10 is outstanding. Respond in exactly this format and nothing else:

Rating: <a single integer from 1 to 10>
<two or three sentences explaining the rating>"#,
};

pub static REPLY_GENERATION: PromptTemplate = PromptTemplate {
    use_case: UseCase::ReplyGeneration,
    version: 1,
    text: r#"The attached image is a chat screenshot. Messages on the right are mine; messages on the left are from my crush.

Read the whole conversation, then write a fun and cheeky reply to the last message on the left, at the bottom of the screen. Match the texting style of the conversation. Also suggest a few good puns or jokes I could use."#,
};

pub static RESUME_PARSING: PromptTemplate = PromptTemplate {
    use_case: UseCase::ResumeParsing,
    version: 1,
    text: r#"The attached images are the pages of a résumé, in order.

Transcribe all of the text faithfully, keeping the reading order and section headings. Do not summarise or correct anything.

Respond with JSON only, no code fences, in exactly this shape:
{"ocr_text": "<the full transcribed text>"}"#,
};

pub static INTERVIEW_PREP: PromptTemplate = PromptTemplate {
    use_case: UseCase::InterviewPrep,
    version: 1,
    text: r#"You are an experienced hiring manager preparing to interview a candidate.

Job description:
"""
{job_description}
"""

Candidate résumé (JSON):
{resume_json}

Write 10 interview questions tailored to this candidate and role: a mix of technical, behavioural and situational questions. For each question, add one line on what a strong answer would cover, referring to specific items on the résumé where possible. Finish with the three biggest gaps between the résumé and the job description."#,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_use_case_has_a_template() {
        for uc in UseCase::ALL {
            let t = uc.template();
            assert_eq!(t.use_case, uc);
            assert!(t.version >= 1);
            assert!(!t.text.trim().is_empty());
        }
    }

    #[test]
    fn template_ids_are_unique() {
        let ids: HashSet<String> = all_templates().iter().map(|t| t.id()).collect();
        assert_eq!(ids.len(), UseCase::ALL.len());
        assert_eq!(PROFILE_REVIEW.id(), "profile_review@v2");
    }

    #[test]
    fn media_templates_have_no_placeholders() {
        for uc in [
            UseCase::ProfileReview,
            UseCase::RatingOnly,
            UseCase::ReplyGeneration,
            UseCase::ResumeParsing,
        ] {
            assert!(uc.template().placeholders().is_empty(), "{uc}");
            assert!(uc.template().render(&[]).is_ok());
        }
    }

    #[test]
    fn interview_prep_placeholders() {
        assert_eq!(
            INTERVIEW_PREP.placeholders(),
            vec!["job_description", "resume_json"]
        );
    }

    #[test]
    fn render_substitutes_values() {
        let out = INTERVIEW_PREP
            .render(&[
                ("job_description", "Rust engineer"),
                ("resume_json", r#"{"ocr_text":"X"}"#),
            ])
            .unwrap();
        assert!(out.contains("Rust engineer"));
        assert!(out.contains(r#"{"ocr_text":"X"}"#));
        assert!(!out.contains("{job_description}"));
    }

    #[test]
    fn render_reports_missing_values() {
        let err = INTERVIEW_PREP
            .render(&[("job_description", "Rust engineer")])
            .unwrap_err();
        assert!(err.to_string().contains("resume_json"));
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = render_text("A {x} B", &[("x", "{y}")]).unwrap();
        assert_eq!(out, "A {y} B");
    }

    #[test]
    fn rating_prompt_asks_for_label() {
        assert!(RATING_ONLY.text.contains("Rating:"));
    }

    #[test]
    fn resume_prompt_asks_for_ocr_text_json() {
        assert!(RESUME_PARSING.text.contains("\"ocr_text\""));
    }
}
