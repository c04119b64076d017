//! HTTP endpoint handlers. Thin wrappers over the library and `logic`.

use std::sync::Arc;

use axum::{
  extract::{Form, Multipart, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::client::GenerativeBackend;
use crate::error::{AppError, Result};
use crate::logic::build_exam;
use crate::protocol::*;
use crate::state::AppState;
use crate::util::sanitize_filename;

const UPLOAD_FIELD: &str = "book_file";
const DEFAULT_PAPER_FILENAME: &str = "exam_paper.txt";

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_books<B: GenerativeBackend>(State(state): State<Arc<AppState<B>>>) -> Result<Json<BooksOut>> {
  let books = state.library.list().await?;
  Ok(Json(BooksOut { books }))
}

#[instrument(level = "info", skip(state, multipart))]
pub async fn http_upload_book<B: GenerativeBackend>(
  State(state): State<Arc<AppState<B>>>,
  mut multipart: Multipart,
) -> Result<Json<UploadOut>> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let original = field.file_name().unwrap_or_default().to_string();
    let data = field.bytes().await?;
    let filename = state.library.save(&original, &data).await?;
    info!(target: "library", %filename, "HTTP book uploaded");
    return Ok(Json(UploadOut { filename }));
  }
  Err(AppError::BadRequest(format!("No file part '{}' in request", UPLOAD_FIELD)))
}

#[instrument(level = "info", skip(state, body), fields(book = %body.book))]
pub async fn http_create_exam<B: GenerativeBackend>(
  State(state): State<Arc<AppState<B>>>,
  Json(body): Json<ExamIn>,
) -> Result<Json<ExamOut>> {
  let out = build_exam(&state, body).await?;
  info!(target: "exam_forge", run_id = %out.run_id, total_marks = out.total_marks, "HTTP exam served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(form))]
pub async fn http_download_paper(Form(form): Form<DownloadIn>) -> Result<impl IntoResponse> {
  let content = form
    .paper_content
    .filter(|c| !c.is_empty())
    .ok_or_else(|| AppError::BadRequest("No paper content to download.".into()))?;

  let filename = form
    .paper_filename
    .map(|f| sanitize_filename(&f))
    .filter(|f| !f.is_empty())
    .unwrap_or_else(|| DEFAULT_PAPER_FILENAME.to_string());
  let disposition = format!("attachment; filename=\"{}\"", filename);

  Ok((
    StatusCode::OK,
    [
      (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    content,
  ))
}
