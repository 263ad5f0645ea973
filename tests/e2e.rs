//! End-to-end tests against a live model.
//!
//! These tests read images from `./test_cases/` and call the real Gemini
//! API, or rasterise generated PDFs through a real pdfium (downloaded on
//! first use). They are gated behind the `E2E_ENABLED` environment variable
//! so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GOOGLE_API_KEY=... cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use verge_review::{
    Credentials, GenerationRequest, GenerationResponse, PdfPages, Rating, ReviewConfig,
    ReviewError, ReviewModel, Reviewer, SafetyMode, SessionContext, SessionId, Upload,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

/// Skip this test if E2E_ENABLED is not set *or* the fixture is missing.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn live_reviewer() -> Reviewer {
    let config = ReviewConfig::builder()
        .max_images(8)
        .safety(SafetyMode::Relaxed)
        .max_retries(2)
        .build()
        .unwrap();
    let reviewer = Reviewer::new(config);
    assert!(reviewer.is_ready(), "set GOOGLE_API_KEY or EDGEQUAKE_* vars");
    reviewer
}

/// A valid PDF of `pages` blank 200x300pt pages.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
    ];
    objects.extend(
        (0..pages).map(|_| "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 300] >>".to_string()),
    );

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in offsets {
        xref.push_str(&format!("{off:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}

/// Answers every request and records how many images it was sent.
#[derive(Default)]
struct CountingModel {
    calls: AtomicUsize,
    image_counts: Mutex<Vec<usize>>,
}

#[async_trait]
impl ReviewModel for CountingModel {
    fn name(&self) -> String {
        "counting/model".into()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ReviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.image_counts.lock().unwrap().push(request.images.len());
        Ok(GenerationResponse {
            text: "Clean layout, add metrics to each role.".into(),
            ..Default::default()
        })
    }
}

fn offline_reviewer(model: Arc<CountingModel>, pages: PdfPages, cap: Option<usize>) -> Reviewer {
    let mut builder = ReviewConfig::builder().backend(model).pdf_pages(pages);
    if let Some(max) = cap {
        builder = builder.max_images(max);
    }
    Reviewer::with_credentials(builder.build().unwrap(), &Credentials::default())
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_pdf_page_count_counts_against_cap() {
    e2e_skip_unless_enabled!();
    let model = Arc::new(CountingModel::default());
    let reviewer = offline_reviewer(Arc::clone(&model), PdfPages::All, Some(1));

    let err = reviewer
        .review_profile(vec![Upload::new("cv.pdf", blank_pdf(3))])
        .await
        .unwrap_err();

    match err {
        ReviewError::TooManyImages { count, max } => {
            assert_eq!(count, 3);
            assert_eq!(max, 1);
        }
        other => panic!("expected TooManyImages, got {other:?}"),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_page_only_sends_one_image() {
    e2e_skip_unless_enabled!();
    let model = Arc::new(CountingModel::default());
    let reviewer = offline_reviewer(Arc::clone(&model), PdfPages::FirstOnly, Some(1));

    let out = reviewer
        .review_profile(vec![Upload::new("cv.pdf", blank_pdf(3))])
        .await
        .unwrap();

    assert_eq!(out.images_sent, 1);
    assert_eq!(*model.image_counts.lock().unwrap(), vec![1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_all_pages_are_sent() {
    e2e_skip_unless_enabled!();
    let model = Arc::new(CountingModel::default());
    let reviewer = offline_reviewer(Arc::clone(&model), PdfPages::All, None);

    let out = reviewer
        .review_profile(vec![Upload::new("cv.pdf", blank_pdf(3))])
        .await
        .unwrap();

    assert_eq!(out.images_sent, 3);
    assert_eq!(*model.image_counts.lock().unwrap(), vec![3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rate_profile_live() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("profile.jpg"));
    let upload = Upload::from_path(&path).await.unwrap();

    let out = live_reviewer().rate_profile(vec![upload]).await.unwrap();
    let rated = out.rating.expect("rating use case always carries a rating");
    println!("rating={} review={}", rated.rating, rated.review);

    match rated.rating {
        Rating::Value(n) => assert!((1..=10).contains(&n)),
        Rating::Unparseable(raw) => panic!("model ignored the rating format: {raw:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_review_profile_live() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("profile.jpg"));
    let upload = Upload::from_path(&path).await.unwrap();

    let out = live_reviewer().review_profile(vec![upload]).await.unwrap();
    assert!(out.text.len() > 200, "review unexpectedly short");
    assert!(out.stats.output_tokens > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resume_pdf_to_interview_live() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("resume.pdf"));
    let reviewer = live_reviewer();

    let parsed = reviewer
        .parse_resume(Upload::from_path(&path).await.unwrap())
        .await
        .unwrap();
    let resume = parsed.resume.unwrap();
    assert!(!resume.ocr_text.trim().is_empty());

    let context = SessionContext::new(SessionId::generate())
        .with_resume(resume)
        .with_job_description("Backend engineer: Rust, PostgreSQL, distributed systems.");
    let out = reviewer.interview_prep(&context).await.unwrap();
    println!("{}", out.text);
    assert!(out.text.contains('?'));
}
