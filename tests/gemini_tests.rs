use code_review::client::{ClientError, GeminiClient, GenerationClient};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/gemini-2.0-flash:generateContent";

fn client(server: &MockServer, key: Option<&str>) -> GeminiClient {
    GeminiClient::new(server.uri(), key.map(str::to_owned), Some(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn generate_sends_prompt_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(serde_json::json!({
            "contents": [{"parts": [{"text": "review this"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Looks **good**."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 3, "totalTokenCount": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server, Some("test-key"))
        .generate("gemini-2.0-flash", "review this")
        .await
        .expect("generate");
    assert_eq!(text, "Looks **good**.");
}

#[tokio::test]
async fn api_error_uses_google_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Some("bad-key"))
        .generate("gemini-2.0-flash", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { .. }));
    assert_eq!(
        err.to_string(),
        "[400 Bad Request] API key not valid. Please pass a valid API key."
    );
}

#[tokio::test]
async fn server_error_with_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server, Some("k"))
        .generate("gemini-2.0-flash", "hi")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "[503 Service Unavailable] Service Unavailable"
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, Some("k"))
        .generate("gemini-2.0-flash", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn missing_key_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server, None)
        .generate("gemini-2.0-flash", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MissingApiKey));
}

#[tokio::test]
async fn connection_failure_is_http_error() {
    // Port 9 (discard) is not listening on test machines.
    let client = GeminiClient::new("http://127.0.0.1:9", Some("k".into()), Some(Duration::from_secs(2)))
        .unwrap();
    let err = client.generate("gemini-2.0-flash", "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::Http(_)));
}
