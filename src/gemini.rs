//! Minimal Gemini REST client for our use-case.
//!
//! We only call `models/{model}:generateContent` (plus `models` for the listing tool).
//! Every request carries the same fixed safety policy. Calls are instrumented and log
//! model names, latencies and token usage, never prompt contents or the API key.

use std::future::Future;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::{BackendReply, GenerativeBackend, ModelRequest};
use crate::config::GeminiConfig;
use crate::error::{AppError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons that mean the output itself tripped a policy filter.
const POLICY_FINISH_REASONS: [&str; 4] = ["SAFETY", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct SafetySetting {
  pub category: &'static str,
  pub threshold: &'static str,
}

/// Applied uniformly to every call.
pub static SAFETY_SETTINGS: [SafetySetting; 4] = [
  SafetySetting { category: "HARM_CATEGORY_HARASSMENT", threshold: "BLOCK_MEDIUM_AND_ABOVE" },
  SafetySetting { category: "HARM_CATEGORY_HATE_SPEECH", threshold: "BLOCK_MEDIUM_AND_ABOVE" },
  SafetySetting { category: "HARM_CATEGORY_SEXUALLY_EXPLICIT", threshold: "BLOCK_MEDIUM_AND_ABOVE" },
  SafetySetting { category: "HARM_CATEGORY_DANGEROUS_CONTENT", threshold: "BLOCK_MEDIUM_AND_ABOVE" },
];

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  config: GeminiConfig,
}

/// One entry of the model listing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
  pub name: String,
  #[serde(default)] pub display_name: String,
  #[serde(default)] pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
  pub fn supports_generate_content(&self) -> bool {
    self.supported_generation_methods.iter().any(|m| m == "generateContent")
  }
}

impl Gemini {
  pub fn new(config: GeminiConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(config.timeout)
      .build()?;
    Ok(Self { client, config })
  }

  pub fn model(&self) -> &str {
    &self.config.model
  }

  pub fn base_url(&self) -> &str {
    &self.config.base_url
  }

  fn generate_url(&self) -> String {
    let model = &self.config.model;
    if model.starts_with("models/") {
      format!("{}/{}:generateContent", self.config.base_url, model)
    } else {
      format!("{}/models/{}:generateContent", self.config.base_url, model)
    }
  }

  #[instrument(level = "info", skip(self, request), fields(model = %self.config.model, prompt_len = request.prompt.len()))]
  async fn generate_content(&self, request: ModelRequest) -> BackendReply {
    let body = GenerateContentRequest {
      contents: vec![Content { role: "user", parts: vec![PartReq { text: &request.prompt }] }],
      safety_settings: &SAFETY_SETTINGS,
      generation_config: GenerationConfigReq {
        temperature: request.params.temperature,
        top_p: request.params.top_p,
        max_output_tokens: request.params.max_output_tokens,
      },
    };

    let start = Instant::now();
    let res = match self
      .client
      .post(self.generate_url())
      .header(USER_AGENT, "exam-forge/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.config.api_key)
      .json(&body)
      .send()
      .await
    {
      Ok(res) => res,
      Err(e) => return BackendReply::Failed(format!("Gemini request failed: {}", e)),
    };

    let status = res.status();
    let headers = res.headers().clone();
    let text = match res.text().await {
      Ok(t) => t,
      Err(e) => return BackendReply::Failed(format!("Gemini body read failed: {}", e)),
    };
    let elapsed = start.elapsed();

    if !status.is_success() {
      return classify_error(status, &headers, &text);
    }

    match serde_json::from_str::<GenerateContentResponse>(&text) {
      Ok(parsed) => {
        if let Some(usage) = &parsed.usage_metadata {
          info!(?elapsed, prompt_tokens = ?usage.prompt_token_count, output_tokens = ?usage.candidates_token_count, total_tokens = ?usage.total_token_count, "Gemini usage");
        } else {
          debug!(?elapsed, "Gemini reply received");
        }
        interpret(parsed)
      }
      Err(e) => BackendReply::Failed(format!("Gemini response decode error: {}", e)),
    }
  }

  /// Every model visible to the key, following pagination.
  #[instrument(level = "info", skip(self), fields(base_url = %self.config.base_url))]
  pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
    let url = format!("{}/models", self.config.base_url);
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut req = self
        .client
        .get(&url)
        .header(USER_AGENT, "exam-forge/0.1")
        .header(API_KEY_HEADER, &self.config.api_key)
        .query(&[("pageSize", "1000")]);
      if let Some(token) = &page_token {
        req = req.query(&[("pageToken", token.as_str())]);
      }

      let res = req.send().await?;
      if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let msg = extract_error(&body).map(|e| e.message).unwrap_or(body);
        return Err(AppError::Upstream(format!("Gemini HTTP {}: {}", status, msg)));
      }

      let page: ListModelsResponse = res.json().await?;
      models.extend(page.models);
      match page.next_page_token.filter(|t| !t.is_empty()) {
        Some(t) => page_token = Some(t),
        None => break,
      }
    }

    info!(count = models.len(), "Listed Gemini models");
    Ok(models)
  }
}

impl GenerativeBackend for Gemini {
  fn generate(&self, request: ModelRequest) -> impl Future<Output = BackendReply> + Send {
    self.generate_content(request)
  }
}

fn interpret(resp: GenerateContentResponse) -> BackendReply {
  if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
    warn!(target: "generation", %reason, "Prompt blocked by safety policy");
    return BackendReply::Blocked(reason);
  }

  let Some(candidate) = resp.candidates.into_iter().next() else {
    return BackendReply::NoContent;
  };

  let text: String = candidate
    .content
    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
    .unwrap_or_default();

  if !text.is_empty() {
    return BackendReply::Text(text);
  }

  match candidate.finish_reason {
    Some(reason) if POLICY_FINISH_REASONS.contains(&reason.as_str()) => {
      warn!(target: "generation", %reason, "Output blocked by safety policy");
      BackendReply::Blocked(reason)
    }
    _ => BackendReply::NoContent,
  }
}

fn classify_error(status: StatusCode, headers: &HeaderMap, body: &str) -> BackendReply {
  let err = extract_error(body);
  let exhausted = status == StatusCode::TOO_MANY_REQUESTS
    || err.as_ref().map(|e| e.status == "RESOURCE_EXHAUSTED").unwrap_or(false);

  if exhausted {
    let retry_after = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
    let hint = retry_hint(body, retry_after);
    warn!(target: "generation", %status, ?hint, "Gemini rate limit hit");
    return BackendReply::RateLimited(hint);
  }

  let msg = err.map(|e| e.message).unwrap_or_else(|| body.to_string());
  BackendReply::Failed(format!("Gemini HTTP {}: {}", status, msg))
}

fn retry_delay_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"retry_delay\s*\{\s*seconds:\s*(\d+)\s*\}").expect("static retry regex"))
}

/// Server-suggested wait: `RetryInfo.retryDelay` in the error body, then a
/// `retry_delay { seconds: N }` fragment, then a numeric `Retry-After` header.
fn retry_hint(body: &str, retry_after: Option<&str>) -> Option<Duration> {
  let from_details = extract_error(body).and_then(|e| {
    e.details.iter().find_map(|d| {
      let is_retry_info = d.get("@type").and_then(Value::as_str).map(|t| t.ends_with("RetryInfo")).unwrap_or(false);
      if !is_retry_info {
        return None;
      }
      d.get("retryDelay").and_then(Value::as_str).and_then(parse_proto_duration)
    })
  });

  from_details
    .or_else(|| {
      retry_delay_re()
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
    })
    .or_else(|| retry_after.and_then(|v| v.trim().parse::<u64>().ok()).map(Duration::from_secs))
}

/// `"37s"` / `"1.5s"` as used by protobuf JSON durations.
fn parse_proto_duration(s: &str) -> Option<Duration> {
  let secs: f64 = s.trim().strip_suffix('s')?.parse().ok()?;
  Duration::try_from_secs_f64(secs).ok()
}

fn extract_error(body: &str) -> Option<ErrorObj> {
  #[derive(Deserialize)]
  struct EWrap { error: ErrorObj }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}

// --- DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
  contents: Vec<Content<'a>>,
  safety_settings: &'static [SafetySetting],
  generation_config: GenerationConfigReq,
}
#[derive(Serialize)]
struct Content<'a> { role: &'static str, parts: Vec<PartReq<'a>> }
#[derive(Serialize)]
struct PartReq<'a> { text: &'a str }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigReq {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  top_p: Option<f32>,
  max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] prompt_feedback: Option<PromptFeedback>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<PartResp> }
#[derive(Deserialize)]
struct PartResp { #[serde(default)] text: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback { #[serde(default)] block_reason: Option<String> }
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorObj {
  #[serde(default)] message: String,
  #[serde(default)] status: String,
  #[serde(default)] details: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
  #[serde(default)] models: Vec<ModelInfo>,
  #[serde(default)] next_page_token: Option<String>,
}
