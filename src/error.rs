//! Crate error type and its HTTP mapping.
//!
//! Expected pipeline branches (blocked prompts, malformed replies, rate limits) never
//! surface here: they are `client::Outcome` values absorbed by the retry loops.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Text extraction failed: {0}")]
  Extraction(String),

  #[error("Unsupported file type: {0}")]
  UnsupportedFile(String),

  #[error("Upstream service error: {0}")]
  Upstream(String),

  #[error("HTTP error: {0}")]
  Reqwest(#[from] reqwest::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Multipart error: {0}")]
  Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
      AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
      AppError::Extraction(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
      AppError::UnsupportedFile(msg) => (StatusCode::BAD_REQUEST, format!("Unsupported file type: {}", msg)),
      AppError::Multipart(err) => (StatusCode::BAD_REQUEST, err.to_string()),
      AppError::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
      AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
      AppError::Reqwest(err) => (StatusCode::BAD_GATEWAY, format!("External service error: {}", err)),
      AppError::Config(_) | AppError::Io(_) => {
        tracing::error!(target: "exam_forge", error = %self, "Internal error while serving request");
        (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred".to_string())
      }
    };

    (status, Json(json!({ "error": message }))).into_response()
  }
}
