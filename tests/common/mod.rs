#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Method, Request, Response, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use listing_genius::controller::ViewController;
use listing_genius::gemini::{ContentGenerator, GenerationError};
use listing_genius::history::{HistoryCache, MemoryStore};
use listing_genius::models::{Category, GenerationResult, ProductDescription};
use listing_genius::routes::{self, AppState};

pub const RESULT_JSON: &str = include_str!("../fixtures/generation_result.json");

pub const TINY_PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R',
];

pub fn sample_result() -> GenerationResult {
    serde_json::from_str(RESULT_JSON).unwrap()
}

pub fn sample_input() -> ProductDescription {
    ProductDescription {
        name: "Women's One-Piece Swimsuit".into(),
        category: Category::Swimwear,
        material: "82% Nylon, 18% Spandex".into(),
        features: "Tummy control\nAdjustable straps".into(),
        style: "Retro high-cut".into(),
        target_audience: "Women 25-45".into(),
        front_image: None,
        back_image: None,
    }
}

/// Plays back canned outcomes in order and counts how often it was asked.
pub struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<Result<GenerationResult, GenerationError>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedGenerator {
    pub fn new(outcomes: Vec<Result<GenerationResult, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    /// Same as `new`, but every reply arrives only after `delay`.
    pub fn delayed(outcomes: Vec<Result<GenerationResult, GenerationError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _input: &ProductDescription) -> Result<GenerationResult, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Unknown("script exhausted".into())))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub generator: Arc<ScriptedGenerator>,
    pub store: Arc<MemoryStore>,
}

pub fn build_test_app(outcomes: Vec<Result<GenerationResult, GenerationError>>) -> TestApp {
    build_test_app_with_store(Arc::new(MemoryStore::default()), outcomes)
}

/// Mirrors the wiring in `main.rs` with an in-memory history store.
pub fn build_test_app_with_store(
    store: Arc<MemoryStore>,
    outcomes: Vec<Result<GenerationResult, GenerationError>>,
) -> TestApp {
    build_test_app_with(store, ScriptedGenerator::new(outcomes))
}

pub fn build_test_app_with(store: Arc<MemoryStore>, generator: Arc<ScriptedGenerator>) -> TestApp {
    let history = HistoryCache::load(Box::new(store.clone()));
    let state = AppState::new(ViewController::new(history), generator.clone());
    TestApp {
        router: routes::router(state.clone()),
        state,
        generator,
        store,
    }
}

pub async fn send_raw(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = send_raw(app, request).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
