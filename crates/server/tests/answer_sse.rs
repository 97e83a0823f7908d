//! End-to-end answer stream tests
//!
//! Drives the full HTTP surface with mocked upstreams and asserts the
//! SSE event sequence a client would observe.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use answerflow_config::Settings;
use answerflow_server::{create_router, AppState};

fn openai_sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n",
            fragment
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mock_upstreams() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(openai_sse_body(&["The answer ", "is yes."])),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/km/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "documentId": "d1",
                "document": {
                    "id": "d1",
                    "metadata": {},
                    "publicId": "pub-1",
                    "sampleQuestions": [],
                    "content": "Yes, online."
                },
                "rerankerScore": null,
                "score": 0.9
            }],
            "total": 1
        })))
        .mount(&server)
        .await;

    server
}

fn write_org_config(dir: &std::path::Path) {
    let org_dir = dir.join("acme");
    std::fs::create_dir_all(&org_dir).unwrap();
    std::fs::write(
        org_dir.join("main.json"),
        r#"{
            "defaultPrimaryLanguage": "en-US",
            "localisations": [{
                "language": "en-US",
                "assistantId": "a1",
                "assistantKey": "k1",
                "generatorModel": "gpt-4o-mini",
                "systemPrompt": "You are helpful.",
                "validatorSystemPromptTemplateUrl": "https://cfg.invalid/v-sys.txt",
                "validatorTranscriptPromptTemplateUrl": "https://cfg.invalid/v-tr.txt"
            }]
        }"#,
    )
    .unwrap();
}

fn app(upstreams: &MockServer, org_dir: &std::path::Path) -> axum::Router {
    let mut settings = Settings::default();
    settings.generator.openai_endpoint = upstreams.uri();
    settings.km.endpoint = format!("{}/km/search", upstreams.uri());
    settings.org.config_dir = org_dir.to_string_lossy().into_owned();
    create_router(AppState::from_settings(settings).unwrap())
}

/// Event `type` values in body order, ignoring keep-alive comments.
fn event_types(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|payload| serde_json::from_str::<serde_json::Value>(payload).ok())
        .filter_map(|event| event["type"].as_str().map(str::to_string))
        .collect()
}

async fn post_answer(app: axum::Router, body: serde_json::Value) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/answer-sse")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_keyword_request_streams_answer_then_completes() {
    let upstreams = mock_upstreams().await;
    let dir = tempfile::tempdir().unwrap();
    write_org_config(dir.path());

    let (status, body) = post_answer(
        app(&upstreams, dir.path()),
        serde_json::json!({
            "transcript": "hello",
            "language": "en-US",
            "orgId": "acme",
            "configId": "main",
            "keywords": ["hi"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let types = event_types(&body);
    assert_eq!(types[0], "status");
    assert_eq!(types[1], "status");
    assert_eq!(types[2], "validation_result");
    assert_eq!(types[3], "km_result");
    assert!(types.iter().any(|t| t == "answer_chunk"));
    assert_eq!(types.last().unwrap(), "complete");
    // TTS is disabled in this configuration
    assert!(!types.iter().any(|t| t == "tts_audio"));
}

#[tokio::test]
async fn test_missing_fields_yield_error_then_complete() {
    let upstreams = mock_upstreams().await;
    let dir = tempfile::tempdir().unwrap();
    write_org_config(dir.path());

    let (status, body) = post_answer(
        app(&upstreams, dir.path()),
        serde_json::json!({
            "transcript": "",
            "language": "en-US",
            "orgId": "acme",
            "configId": "main"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(event_types(&body), vec!["error", "complete"]);
}

#[tokio::test]
async fn test_health_endpoints() {
    let upstreams = mock_upstreams().await;
    let dir = tempfile::tempdir().unwrap();
    write_org_config(dir.path());
    let app = app(&upstreams, dir.path());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
