//! HTTP contract tests for the native Gemini backend.
//!
//! A `wiremock` server stands in for `generativelanguage.googleapis.com`.

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use verge_review::prompts::RATING_ONLY;
use verge_review::{
    render_result, Credentials, Rating, ReviewConfig, ReviewError, Reviewer, SafetyMode, Upload,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn photo() -> Upload {
    let img = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    Upload::new("profile.png", buf)
}

fn answer(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 812, "candidatesTokenCount": 31}
    })
}

fn reviewer(server: &MockServer, safety: SafetyMode, retries: u32) -> Reviewer {
    let config = ReviewConfig::builder()
        .api_key("test-key")
        .gemini_base_url(server.uri())
        .safety(safety)
        .max_retries(retries)
        .retry_backoff_ms(1)
        .build()
        .unwrap();
    Reviewer::with_credentials(config, &Credentials::default())
}

async fn sent_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests.last().unwrap().body).unwrap()
}

#[tokio::test]
async fn test_rating_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer("Rating: 8\nLovely photos.")))
        .expect(1)
        .mount(&server)
        .await;

    let out = reviewer(&server, SafetyMode::ProviderDefault, 0)
        .rate_profile(vec![photo()])
        .await
        .unwrap();

    let rated = out.rating.unwrap();
    assert_eq!(rated.rating, Rating::Value(8));
    assert_eq!(rated.review, "Lovely photos.");
    assert_eq!(out.model, "gemini/gemini-2.0-flash");
    assert_eq!(out.stats.input_tokens, 812);
    assert_eq!(out.stats.output_tokens, 31);

    let body = sent_body(&server).await;
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], RATING_ONLY.text);
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
    assert!(body.get("safetySettings").is_none());
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
}

#[tokio::test]
async fn test_relaxed_safety_sends_block_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer("Nice pics.")))
        .mount(&server)
        .await;

    reviewer(&server, SafetyMode::Relaxed, 0)
        .review_profile(vec![photo()])
        .await
        .unwrap();

    let body = sent_body(&server).await;
    let settings = body["safetySettings"].as_array().unwrap();
    assert_eq!(settings.len(), 4);
    let categories: Vec<&str> = settings
        .iter()
        .map(|s| s["category"].as_str().unwrap())
        .collect();
    assert!(categories.contains(&"HARM_CATEGORY_HARASSMENT"));
    assert!(categories.contains(&"HARM_CATEGORY_HATE_SPEECH"));
    assert!(categories.contains(&"HARM_CATEGORY_SEXUALLY_EXPLICIT"));
    assert!(categories.contains(&"HARM_CATEGORY_DANGEROUS_CONTENT"));
    assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
}

#[tokio::test]
async fn test_safety_block_is_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = reviewer(&server, SafetyMode::ProviderDefault, 3)
        .review_profile(vec![photo()])
        .await;

    assert!(matches!(result, Err(ReviewError::Blocked { .. })));
    assert_eq!(render_result(&result).body, "No response");
}

#[tokio::test]
async fn test_invalid_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = reviewer(&server, SafetyMode::ProviderDefault, 2)
        .generate_reply(photo())
        .await
        .unwrap_err();

    match err {
        ReviewError::AuthError { detail, .. } => assert_eq!(detail, "API key not valid."),
        other => panic!("expected AuthError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer("7")))
        .with_priority(2)
        .mount(&server)
        .await;

    let out = reviewer(&server, SafetyMode::ProviderDefault, 1)
        .rate_profile(vec![photo()])
        .await
        .unwrap();

    assert_eq!(out.rating.unwrap().rating, Rating::Value(7));
    assert_eq!(out.stats.retries, 1);
}

#[tokio::test]
async fn test_server_error_without_retries_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = reviewer(&server, SafetyMode::ProviderDefault, 0)
        .rate_profile(vec![photo()])
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::Api { status: 500, .. }));
    assert!(err
        .user_message()
        .starts_with("An error occurred while generating the response"));
}
