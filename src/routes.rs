use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    controller::{Snapshot, ViewController},
    error::{AppError, AppResult},
    export::{self, ExportFont},
    gemini::{ContentGenerator, GenerationError},
    intake::{self, ImageSlot},
    models::{GenerationResult, HistoryRecord, ProductDescription},
    render::{self, Section, Tab},
};

/// Two data-URL images plus form text fit comfortably under this.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Mutex<ViewController>>,
    pub generator: Arc<dyn ContentGenerator>,
    pub export_font: ExportFont,
}

impl AppState {
    pub fn new(controller: ViewController, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            generator,
            export_font: ExportFont::Builtin,
        }
    }

    pub fn with_export_font(mut self, font: ExportFont) -> Self {
        self.export_font = font;
        self
    }

    fn snapshot(&self) -> Snapshot {
        self.controller.lock().snapshot()
    }

    fn settle(&self, outcome: Result<GenerationResult, GenerationError>) -> AppResult<Snapshot> {
        let failure = outcome.as_ref().err().cloned();
        let mut controller = self.controller.lock();
        controller.finish_generation(outcome, Utc::now())?;
        if let Some(err) = failure {
            return Err(err.into());
        }
        tracing::info!("✅ Generation stored; history now holds {} records", controller.history().len());
        Ok(controller.snapshot())
    }

    fn current_result(&self) -> AppResult<GenerationResult> {
        self.controller
            .lock()
            .current_result()
            .cloned()
            .ok_or_else(|| AppError::NotFound("no generation result is loaded".into()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/generate", post(generate))
        .route("/api/result/edit", post(edit_result))
        .route("/api/reset", post(reset))
        .route("/api/credential", post(credential_reselected))
        .route("/api/result/tabs/:tab", get(get_tab))
        .route("/api/result/fragments/:name", get(get_fragment))
        .route("/api/result/export/:tab", get(export_tab))
        .route("/api/images", post(upload_image))
        .route("/api/history", get(list_history).delete(clear_history))
        .route("/api/history/open", post(open_history))
        .route("/api/history/back", post(history_back))
        .route("/api/history/:id/select", post(select_record))
        .route("/api/history/:id/edit", post(edit_record))
        .route("/api/history/:id", delete(delete_record))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn get_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.snapshot())
}

/// Runs one generation: Form → Loading → Result, or back to Form on failure.
///
/// The provider call runs on its own task so the controller always leaves
/// Loading, even when the client goes away before the reply arrives.
pub async fn generate(
    State(state): State<AppState>,
    Json(input): Json<ProductDescription>,
) -> AppResult<Json<Snapshot>> {
    state.controller.lock().begin_generation(input.clone())?;

    tracing::info!("🚀 Generating listing bundle for product: {}", input.name);
    let worker = state.clone();
    let task = tokio::spawn(async move {
        let outcome = worker.generator.generate(&input).await;
        worker.settle(outcome)
    });

    let snapshot = match task.await {
        Ok(settled) => settled?,
        Err(e) => {
            tracing::error!("Generation task failed: {}", e);
            state.settle(Err(GenerationError::Unknown(format!("generation task failed: {e}"))))?
        }
    };
    Ok(Json(snapshot))
}

pub async fn edit_result(State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.edit_current()?;
    Ok(Json(controller.snapshot()))
}

pub async fn reset(State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.reset()?;
    Ok(Json(controller.snapshot()))
}

pub async fn credential_reselected(State(state): State<AppState>) -> Json<Snapshot> {
    let mut controller = state.controller.lock();
    controller.credential_reselected();
    tracing::info!("🔑 Credential reselected by user");
    Json(controller.snapshot())
}

pub async fn get_tab(Path(tab): Path<String>, State(state): State<AppState>) -> AppResult<Json<Section>> {
    let tab: Tab = tab.parse().map_err(AppError::BadRequest)?;
    let result = state.current_result()?;
    Ok(Json(render::render_tab(&result, tab)))
}

pub async fn get_fragment(Path(name): Path<String>, State(state): State<AppState>) -> AppResult<Response> {
    let result = state.current_result()?;
    let text = render::fragment(&result, &name)
        .ok_or_else(|| AppError::NotFound(format!("no fragment named '{name}'")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

pub async fn export_tab(Path(tab): Path<String>, State(state): State<AppState>) -> AppResult<Response> {
    let tab: Tab = tab.parse().map_err(AppError::BadRequest)?;
    let result = state.current_result()?;
    let exported = export::export_section(&result, tab, Utc::now(), &state.export_font)?;
    tracing::info!("📄 Exported {} ({} bytes)", exported.file_name, exported.bytes.len());
    let headers = [
        (header::CONTENT_TYPE, exported.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", exported.file_name),
        ),
    ];
    Ok((headers, exported.bytes).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub slot: ImageSlot,
    pub data_url: String,
}

/// Accepts one image file (field `file`) and an optional `slot` field.
pub async fn upload_image(mut multipart: Multipart) -> AppResult<Json<UploadedImage>> {
    let mut slot = ImageSlot::Front;
    let mut data_url = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("slot") {
            let value = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
            slot = value.parse()?;
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes: Bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
        data_url = Some(intake::encode_upload(content_type.as_deref(), &bytes)?);
    }

    let data_url = data_url.ok_or_else(|| AppError::BadRequest("no image file received".into()))?;
    tracing::info!("🖼️ Accepted {} image ({} chars as data URL)", slot, data_url.len());
    Ok(Json(UploadedImage { slot, data_url }))
}

pub async fn list_history(State(state): State<AppState>) -> Json<Vec<HistoryRecord>> {
    Json(state.controller.lock().history().all().to_vec())
}

pub async fn open_history(State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.view_history()?;
    Ok(Json(controller.snapshot()))
}

pub async fn history_back(State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.back()?;
    Ok(Json(controller.snapshot()))
}

pub async fn select_record(Path(id): Path<String>, State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.select_record(&id)?;
    Ok(Json(controller.snapshot()))
}

pub async fn edit_record(Path(id): Path<String>, State(state): State<AppState>) -> AppResult<Json<Snapshot>> {
    let mut controller = state.controller.lock();
    controller.edit_record(&id)?;
    Ok(Json(controller.snapshot()))
}

pub async fn delete_record(Path(id): Path<String>, State(state): State<AppState>) -> Json<Snapshot> {
    let mut controller = state.controller.lock();
    if controller.delete_record(&id) {
        tracing::info!("🗑️ Deleted history record {}", id);
    }
    Json(controller.snapshot())
}

pub async fn clear_history(State(state): State<AppState>) -> Json<Snapshot> {
    let mut controller = state.controller.lock();
    controller.clear_history();
    tracing::info!("🗑️ Cleared history");
    Json(controller.snapshot())
}
