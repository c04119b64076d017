//! Public request/response structs for the HTTP API (serde ready).

use serde::{Deserialize, Serialize};

use crate::domain::{GenerationResult, QuestionCounts};
use crate::paper::ExamDetails;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BooksOut {
    pub books: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadOut {
    pub filename: String,
}

/// Body of `POST /api/v1/exams`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExamIn {
    pub book: String,
    #[serde(default)]
    pub details: ExamDetails,
    #[serde(default)]
    pub counts: QuestionCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExamOut {
    pub run_id: String,
    pub questions: GenerationResult,
    pub paper: String,
    pub filename: String,
    pub total_marks: u32,
}

/// Form body of `POST /api/v1/exams/download`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadIn {
    #[serde(default)]
    pub paper_content: Option<String>,
    #[serde(default)]
    pub paper_filename: Option<String>,
}
