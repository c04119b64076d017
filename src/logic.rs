//! Exam assembly behind the HTTP handlers: read the book, run the generator,
//! lay out the paper.

use chrono::Local;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::GenerativeBackend;
use crate::error::{AppError, Result};
use crate::paper::{download_filename, format_exam_paper, PaperLayout};
use crate::protocol::{ExamIn, ExamOut};
use crate::state::AppState;

#[instrument(
  level = "info",
  skip(state, req),
  fields(book = %req.book, mcq = req.counts.mcq, short = req.counts.short_answer, long = req.counts.long_answer)
)]
pub async fn build_exam<B: GenerativeBackend>(state: &AppState<B>, req: ExamIn) -> Result<ExamOut> {
  let max = state.generator.tuning().max_questions_per_kind;
  if let Some(kind) = req.counts.over_limit(max) {
    return Err(AppError::BadRequest(format!(
      "At most {} {} questions per exam (requested {})",
      max,
      kind.label(),
      req.counts.get(kind)
    )));
  }

  let run_id = Uuid::new_v4().to_string();
  let text = state.library.read_text(&req.book).await?;

  let questions = state.generator.generate(&text, req.counts).await;

  let layout = PaperLayout::standard(&req.counts);
  let paper = format_exam_paper(&req.details, &questions, &layout);
  let filename = download_filename(&req.details, Local::now());

  info!(
    target: "exam_forge",
    %run_id,
    produced = questions.len(),
    requested = req.counts.total(),
    total_marks = layout.total_marks,
    %filename,
    "Exam paper assembled"
  );

  Ok(ExamOut { run_id, questions, paper, filename, total_marks: layout.total_marks })
}
