//! Configuration: server and Gemini settings from the environment, prompts and
//! retry tuning from an optional TOML file.
//!
//! TOML schema (every key optional, defaults below):
//!
//! ```toml
//! [prompts]
//! topic_analysis = "... {count} ... {text}"
//! topic_instruction = "... {kind} ... {topic} ..."
//! mcq = "... {text}"
//! short_answer = "... {text}"
//! long_answer = "... {text}"
//!
//! [tuning]
//! question_attempts = 3
//! mcq_prefix_chars = 5000
//! max_rate_limit_wait_secs = 300
//! max_questions_per_kind = 50
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::client::CallParams;
use crate::domain::QuestionKind;
use crate::error::{AppError, Result};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GenerationConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub tuning: Tuning,
}

/// Prompt templates. `{text}` receives the kind-specific prefix of the source text.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub topic_analysis: String,
  /// Prepended to the kind template; binds the question to one topic.
  pub topic_instruction: String,
  pub mcq: String,
  pub short_answer: String,
  pub long_answer: String,
}

impl Prompts {
  pub fn for_kind(&self, kind: QuestionKind) -> &str {
    match kind {
      QuestionKind::Mcq => &self.mcq,
      QuestionKind::ShortAnswer => &self.short_answer,
      QuestionKind::LongAnswer => &self.long_answer,
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      topic_analysis: "Analyze the following text and identify {count} distinct topics, themes, concepts, named entities (like specific people, companies, tools), or specific outcomes discussed within it.\nProvide the topics as a JSON array of strings. Each string should be a concise phrase (3-8 words) summarizing a topic.\nEnsure the topics are varied and cover different aspects mentioned in the text.\nFocus on specific details, names, or concepts.\n\nText: {text}".into(),
      topic_instruction: "Generate a {kind} question based on the provided text. The question MUST focus specifically on this topic: '{topic}'. Ensure the question relates directly to this topic.\n\n--- Format and Content Instructions ---\n".into(),
      mcq: "Generate exactly ONE multiple choice question with 4 unique options based on the provided text.\nThe response MUST be a JSON object in this format:\n{\n  \"question\": \"Your question here?\",\n  \"options\": [\"Option A\", \"Option B\", \"Option C\", \"Option D\"],\n  \"correct_option_index\": 0\n}\n\nText: {text}".into(),
      short_answer: "Generate ONE short answer question based on the provided text.\nThe response MUST be a JSON object in this format:\n{ \"question\": \"Your question here?\", \"guideline\": \"Guideline for answering here.\" }\n\nText content: {text}".into(),
      long_answer: "Generate ONE detailed essay question based on the provided text.\nThe response MUST be a JSON object in this format:\n{ \"question\": \"Your essay question here?\", \"guideline\": \"Comprehensive answer guideline here.\" }\n\nText content: {text}".into(),
    }
  }
}

/// Retry budgets, pause units and prompt sizing. None of these are load-bearing;
/// they keep prompts within a safe size and the call rate under the service ceiling.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Tuning {
  pub topic_attempts: u32,
  pub question_attempts: u32,
  pub empty_pause_secs: f64,
  pub malformed_pause_secs: f64,
  pub transient_base_secs: f64,
  pub rate_limit_base_secs: f64,
  pub rate_limit_padding_secs: f64,
  pub max_rate_limit_wait_secs: f64,

  pub topic_prefix_chars: usize,
  pub mcq_prefix_chars: usize,
  pub short_answer_prefix_chars: usize,
  pub long_answer_prefix_chars: usize,

  pub min_topics: usize,
  pub max_questions_per_kind: usize,
  pub topics_per_question: usize,

  pub topic_temperature: f32,
  pub topic_max_tokens: u32,
  pub question_temperature: f32,
  pub question_top_p: f32,
  pub question_max_tokens: u32,
}

impl Default for Tuning {
  fn default() -> Self {
    Self {
      topic_attempts: 3,
      question_attempts: 3,
      empty_pause_secs: 1.0,
      malformed_pause_secs: 1.5,
      transient_base_secs: 1.0,
      rate_limit_base_secs: 2.0,
      rate_limit_padding_secs: 1.0,
      max_rate_limit_wait_secs: 300.0,
      topic_prefix_chars: 8000,
      mcq_prefix_chars: 5000,
      short_answer_prefix_chars: 5500,
      long_answer_prefix_chars: 7000,
      min_topics: 10,
      max_questions_per_kind: 50,
      topics_per_question: 2,
      topic_temperature: 0.8,
      topic_max_tokens: 512,
      question_temperature: 0.7,
      question_top_p: 0.95,
      question_max_tokens: 1024,
    }
  }
}

impl Tuning {
  pub fn prefix_chars(&self, kind: QuestionKind) -> usize {
    match kind {
      QuestionKind::Mcq => self.mcq_prefix_chars,
      QuestionKind::ShortAnswer => self.short_answer_prefix_chars,
      QuestionKind::LongAnswer => self.long_answer_prefix_chars,
    }
  }

  pub fn topic_params(&self) -> CallParams {
    CallParams { temperature: self.topic_temperature, top_p: None, max_output_tokens: self.topic_max_tokens }
  }

  pub fn question_params(&self) -> CallParams {
    CallParams {
      temperature: self.question_temperature,
      top_p: Some(self.question_top_p),
      max_output_tokens: self.question_max_tokens,
    }
  }

  /// Topic pool size requested for a run of `total_questions`.
  pub fn desired_topics(&self, total_questions: usize) -> usize {
    total_questions.saturating_mul(self.topics_per_question).max(self.min_topics)
  }
}

/// Attempt to load `GenerationConfig` from EXAMGEN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_generation_config_from_env() -> Option<GenerationConfig> {
  let path = std::env::var("EXAMGEN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<GenerationConfig>(&s) {
      Ok(cfg) => {
        info!(target: "exam_forge", %path, "Loaded generation config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "exam_forge", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "exam_forge", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Immutable Gemini client settings. Construction fails without an API key.
#[derive(Clone)]
pub struct GeminiConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeminiConfig")
      .field("api_key", &"<redacted>")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .field("timeout", &self.timeout)
      .finish()
  }
}

impl GeminiConfig {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let api_key = get("GEMINI_API_KEY")
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| AppError::Config("Missing environment variable: GEMINI_API_KEY".into()))?;
    let base_url = get("GEMINI_BASE_URL")
      .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into())
      .trim_end_matches('/')
      .to_string();
    let model = get("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash-latest".into());
    let timeout_secs: u64 = parse_or(&get, "GEMINI_TIMEOUT_SECS", 60)?;

    Ok(Self { api_key, base_url, model, timeout: Duration::from_secs(timeout_secs) })
  }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
  pub port: u16,
  pub upload_dir: PathBuf,
  pub max_upload_bytes: usize,
}

impl ServerConfig {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
    Ok(Self {
      port: parse_or(&get, "PORT", 3000)?,
      upload_dir: get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./uploads")),
      max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
    })
  }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match get(name) {
    Some(raw) => raw
      .trim()
      .parse()
      .map_err(|e| AppError::Config(format!("Invalid value for {}: {}", name, e))),
    None => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |k: &str| map.get(k).cloned()
  }

  #[test]
  fn gemini_config_requires_api_key() {
    let err = GeminiConfig::from_lookup(lookup(&[])).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(GeminiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).is_err());
  }

  #[test]
  fn gemini_config_defaults_and_overrides() {
    let cfg = GeminiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
    assert_eq!(cfg.model, "gemini-1.5-flash-latest");
    assert_eq!(cfg.timeout, Duration::from_secs(60));
    assert!(!format!("{:?}", cfg).contains("\"k\""));

    let cfg = GeminiConfig::from_lookup(lookup(&[
      ("GEMINI_API_KEY", "k"),
      ("GEMINI_BASE_URL", "http://127.0.0.1:9999/v1beta/"),
      ("GEMINI_TIMEOUT_SECS", "5"),
    ]))
    .unwrap();
    assert_eq!(cfg.base_url, "http://127.0.0.1:9999/v1beta");
    assert_eq!(cfg.timeout, Duration::from_secs(5));
  }

  #[test]
  fn server_config_rejects_garbage_port() {
    assert!(ServerConfig::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
    let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.max_upload_bytes, 16 * 1024 * 1024);
  }

  #[test]
  fn toml_overrides_merge_with_defaults() {
    let cfg: GenerationConfig = toml::from_str(
      r#"
      [prompts]
      mcq = "Custom MCQ {text}"

      [tuning]
      question_attempts = 5
      mcq_prefix_chars = 100
      "#,
    )
    .unwrap();
    assert_eq!(cfg.prompts.mcq, "Custom MCQ {text}");
    assert_eq!(cfg.prompts.short_answer, Prompts::default().short_answer);
    assert_eq!(cfg.tuning.question_attempts, 5);
    assert_eq!(cfg.tuning.prefix_chars(QuestionKind::Mcq), 100);
    assert_eq!(cfg.tuning.topic_attempts, 3);
  }

  #[test]
  fn desired_topics_has_a_floor() {
    let t = Tuning::default();
    assert_eq!(t.desired_topics(1), 10);
    assert_eq!(t.desired_topics(4), 10);
    assert_eq!(t.desired_topics(12), 24);
    assert_eq!(t.desired_topics(usize::MAX), usize::MAX);
  }
}
