//! Provider-contract tests: a local axum server plays the Gemini endpoint.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{sample_input, RESULT_JSON, TINY_PNG};
use listing_genius::config::GeminiConfig;
use listing_genius::gemini::{ContentGenerator, GeminiClient, GenerationError};

type Seen = Arc<Mutex<Vec<Value>>>;

async fn spawn_provider(status: StatusCode, reply: Value) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let captured = seen.clone();
    let app = Router::new().route(
        "/models/:call",
        post(
            move |Path(call): Path<String>,
                  Query(query): Query<HashMap<String, String>>,
                  Json(request): Json<Value>| {
                let captured = captured.clone();
                let reply = reply.clone();
                async move {
                    captured.lock().push(json!({
                        "call": call,
                        "key": query.get("key"),
                        "request": request,
                    }));
                    (status, Json(reply))
                }
            },
        ),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn client_for(base_url: String) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".into()),
        base_url,
        model: "gemini-test".into(),
        ..GeminiConfig::default()
    })
}

fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn fenced_reply_decodes_and_request_is_schema_constrained() {
    let mut reply = text_reply(&format!("```json\n{RESULT_JSON}\n```"));
    reply["candidates"][0]["groundingMetadata"] = json!({
        "groundingChunks": [{ "web": { "uri": "https://example.com/trends", "title": "Trends" } }]
    });
    let (base, seen) = spawn_provider(StatusCode::OK, reply).await;

    let result = client_for(base).generate(&sample_input()).await.unwrap();
    assert_eq!(result.listing.bullet_points.len(), 5);
    assert_eq!(result.ads.detailed_roadmap.len(), 4);
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].uri, "https://example.com/trends");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["call"], "gemini-test:generateContent");
    assert_eq!(seen[0]["key"], "test-key");
    let request = &seen[0]["request"];
    assert_eq!(request["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(request["generationConfig"]["responseSchema"]["required"], json!(["listing", "ads"]));
    assert!(request["systemInstruction"]["parts"][0]["text"].as_str().unwrap().contains("Swimwear"));
}

#[tokio::test]
async fn front_image_is_sent_inline() {
    let (base, seen) = spawn_provider(StatusCode::OK, text_reply(RESULT_JSON)).await;
    let encoded = base64::engine::general_purpose::STANDARD.encode(TINY_PNG);
    let mut input = sample_input();
    input.front_image = Some(format!("data:image/png;base64,{encoded}"));

    client_for(base).generate(&input).await.unwrap();

    let seen = seen.lock();
    let parts = &seen[0]["request"]["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], encoded);
}

#[tokio::test]
async fn not_found_is_an_auth_failure() {
    let reply = json!({ "error": { "code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND" } });
    let (base, _) = spawn_provider(StatusCode::NOT_FOUND, reply).await;
    assert_eq!(client_for(base).generate(&sample_input()).await, Err(GenerationError::AuthFailure));
}

#[tokio::test]
async fn rate_limit_is_quota_exceeded() {
    let reply = json!({ "error": { "code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED" } });
    let (base, _) = spawn_provider(StatusCode::TOO_MANY_REQUESTS, reply).await;
    assert_eq!(client_for(base).generate(&sample_input()).await, Err(GenerationError::QuotaExceeded));
}

#[tokio::test]
async fn server_errors_stay_unknown_with_context() {
    let reply = json!({ "error": { "code": 500, "message": "Internal error encountered.", "status": "INTERNAL" } });
    let (base, _) = spawn_provider(StatusCode::INTERNAL_SERVER_ERROR, reply).await;
    match client_for(base).generate(&sample_input()).await {
        Err(GenerationError::Unknown(message)) => assert!(message.contains("Internal error encountered.")),
        other => panic!("expected unknown failure, got {other:?}"),
    }
}

#[tokio::test]
async fn safety_stop_is_content_filtered() {
    let reply = json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "SAFETY" }] });
    let (base, _) = spawn_provider(StatusCode::OK, reply).await;
    assert_eq!(client_for(base).generate(&sample_input()).await, Err(GenerationError::ContentFiltered));
}

#[tokio::test]
async fn blocked_prompt_is_content_filtered() {
    let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
    let (base, _) = spawn_provider(StatusCode::OK, reply).await;
    assert_eq!(client_for(base).generate(&sample_input()).await, Err(GenerationError::ContentFiltered));
}

#[tokio::test]
async fn off_schema_reply_is_unknown() {
    let (base, _) = spawn_provider(StatusCode::OK, text_reply(r#"{"listing": {"altTitles": []}, "ads": {}}"#)).await;
    match client_for(base).generate(&sample_input()).await {
        Err(GenerationError::Unknown(message)) => assert!(message.contains("expected shape")),
        other => panic!("expected unknown failure, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_input_never_reaches_the_provider() {
    let (base, seen) = spawn_provider(StatusCode::OK, text_reply(RESULT_JSON)).await;
    let mut input = sample_input();
    input.features.clear();
    assert!(matches!(
        client_for(base).generate(&input).await,
        Err(GenerationError::Unknown(_))
    ));
    assert!(seen.lock().is_empty());
}
