//! Exam Forge: turns an uploaded book into a formatted exam paper.
//!
//! The core is the question pipeline in [`pipeline`]: topic analysis, per-topic question
//! synthesis with retries against a rate-limited model, and tolerant parsing of the
//! model's JSON. The HTTP surface, book storage and paper layout sit around it.

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod gemini;
pub mod library;
pub mod logic;
pub mod paper;
pub mod parser;
pub mod pipeline;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod util;

pub use client::{BackendReply, CallParams, GenerativeBackend, ModelRequest};
pub use domain::{GeneratedQuestion, GenerationResult, QuestionCounts, QuestionKind};
pub use error::{AppError, Result};
pub use pipeline::QuestionGenerator;
