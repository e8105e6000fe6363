//! Tests for the HTTP streaming client against a mock endpoint.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use baton::config::BatonConfig;
use baton::error::BatonError;
use baton::provider::{ChatProvider, ChatRequest, StreamingClient};
use baton::types::Message;

fn sse_body(fragments: &[&str], done: bool) -> String {
    let mut body = String::from(": connected\n\n");
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": fragment}}]})
        ));
    }
    if done {
        body.push_str("data: [DONE]\n\n");
    }
    body
}

fn client(server: &MockServer) -> StreamingClient {
    let config = BatonConfig::default()
        .with_api_key("sk-test")
        .with_base_url(server.uri())
        .with_retry_initial_backoff(Duration::from_millis(10));
    StreamingClient::new(config).unwrap()
}

fn request() -> ChatRequest {
    ChatRequest {
        history: vec![
            Message::user("add lunch for 12"),
            Message::assistant("{\"tool\": \"addTransaction\", \"args\": {\"amount\": 12}}"),
            Message::tool_result("addTransaction", &json!({"id": 1})),
        ],
        system_prompt: "You are a bookkeeper.".into(),
        model: "gpt-4o-mini".into(),
        temperature: 0.2,
        max_tokens: 256,
    }
}

#[tokio::test]
async fn streams_fragments_and_sends_mapped_roles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"stream": true, "model": "gpt-4o-mini", "max_tokens": 256})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Logged", " lunch."], true), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut deltas = Vec::new();
    let text = client(&server)
        .stream_chat(
            &request(),
            &mut |d: &str| deltas.push(d.to_string()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(text, "Logged lunch.");
    assert_eq!(deltas, vec!["Logged", " lunch."]);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = received[0].body_json().unwrap();
    let roles: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(body["messages"][0]["content"], "You are a bookkeeper.");
}

#[tokio::test]
async fn premature_end_of_stream_keeps_partial_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hello", " world"], false), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let text = client(&server)
        .stream_chat(&request(), &mut |_: &str| {}, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(text, "Hello world");
}

#[tokio::test]
async fn error_status_is_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .stream_chat(&request(), &mut |_: &str| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BatonError::Authentication(ref m) if m.contains("Incorrect API key")));
}

#[tokio::test]
async fn cancellation_aborts_the_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["late"], true), "text/event-stream")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client(&server)
        .stream_chat(&request(), &mut |_: &str| {}, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BatonError::Cancelled));
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["late"], true), "text/event-stream")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let config = BatonConfig::default()
        .with_api_key("sk-test")
        .with_base_url(server.uri())
        .with_request_timeout(Duration::from_secs(1));
    let err = StreamingClient::new(config)
        .unwrap()
        .stream_chat(&request(), &mut |_: &str| {}, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BatonError::Timeout(1000)));
}

#[tokio::test]
async fn complete_chat_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "All set."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server).complete_chat(&request()).await.unwrap();
    assert_eq!(text, "All set.");
}

#[tokio::test]
async fn complete_chat_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).complete_chat(&request()).await.unwrap_err();
    assert!(matches!(err, BatonError::Api { status: 400, .. }));
}
