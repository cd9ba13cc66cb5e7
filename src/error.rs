use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    controller::TransitionError, export::ExportError, gemini::GenerationError, intake::IntakeError,
};

/// Error type for HTTP handlers; renders as `{"error", "code"}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("{0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Generation(err) => {
                let status = match err {
                    GenerationError::AuthFailure => StatusCode::UNAUTHORIZED,
                    GenerationError::ContentFiltered => StatusCode::UNPROCESSABLE_ENTITY,
                    GenerationError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
                    GenerationError::Unknown(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.code(), err.user_message())
            }
            AppError::Transition(err) => match err {
                TransitionError::Busy | TransitionError::Illegal { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", err.to_string())
                }
                TransitionError::UnknownRecord(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                TransitionError::Input(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
            },
            AppError::Intake(err) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE", err.to_string()),
            AppError::Export(err) => {
                tracing::error!(error = %err, "Export failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED", err.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if matches!(self, AppError::Generation(GenerationError::AuthFailure)) {
            body["credentialMissing"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}
