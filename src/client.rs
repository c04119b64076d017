//! Model client: one prompt in, one classified `Outcome` out.
//!
//! The transport is abstracted behind `GenerativeBackend` (the Gemini REST client in
//! production, scripted fakes in tests). `ModelClient` turns raw backend replies into
//! outcomes the pipeline can act on, running text replies through the response parser.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::parser::extract_json;
use crate::util::trunc_for_log;

/// Sampling parameters for one call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CallParams {
  pub temperature: f32,
  pub top_p: Option<f32>,
  pub max_output_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
  pub prompt: String,
  pub params: CallParams,
}

/// What the remote service said, before any parsing.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendReply {
  Text(String),
  /// Refused on content-policy grounds.
  Blocked(String),
  /// Answered, but without usable content.
  NoContent,
  /// Throughput exhausted; carries the service's retry hint when it sent one.
  RateLimited(Option<Duration>),
  /// Transport, HTTP or decoding failure.
  Failed(String),
}

/// A remote generative model. One outstanding call at a time is the caller's concern.
pub trait GenerativeBackend: Send + Sync {
  fn generate(&self, request: ModelRequest) -> impl Future<Output = BackendReply> + Send;
}

/// Top-level JSON type the caller expects back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expect {
  Array,
  Object,
}

impl Expect {
  fn matches(self, v: &Value) -> bool {
    match self {
      Expect::Array => v.is_array(),
      Expect::Object => v.is_object(),
    }
  }
}

/// Classified result of one call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
  Success(Value),
  Blocked(String),
  Empty,
  /// Content came back but no value of the expected shape could be recovered.
  Malformed(String),
  RateLimited(Option<Duration>),
  Transient(String),
}

pub struct ModelClient<B> {
  backend: B,
}

impl<B: GenerativeBackend> ModelClient<B> {
  pub fn new(backend: B) -> Self {
    Self { backend }
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  #[instrument(level = "debug", skip(self, prompt), fields(prompt_len = prompt.len()))]
  pub async fn invoke(&self, prompt: &str, params: CallParams, expect: Expect) -> Outcome {
    let reply = self
      .backend
      .generate(ModelRequest { prompt: prompt.to_string(), params })
      .await;
    classify(reply, expect)
  }
}

fn classify(reply: BackendReply, expect: Expect) -> Outcome {
  match reply {
    BackendReply::Text(text) if text.trim().is_empty() => Outcome::Empty,
    BackendReply::Text(text) => match extract_json(&text) {
      Some(v) if expect.matches(&v) => Outcome::Success(v),
      Some(_) => {
        debug!(target: "generation", ?expect, preview = %trunc_for_log(&text, 200), "Reply parsed to the wrong JSON type");
        Outcome::Malformed(text)
      }
      None => {
        debug!(target: "generation", preview = %trunc_for_log(&text, 200), "No JSON recovered from reply");
        Outcome::Malformed(text)
      }
    },
    BackendReply::Blocked(reason) => Outcome::Blocked(reason),
    BackendReply::NoContent => Outcome::Empty,
    BackendReply::RateLimited(hint) => Outcome::RateLimited(hint),
    BackendReply::Failed(e) => {
      warn!(target: "generation", error = %e, "Model call failed");
      Outcome::Transient(e)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn text_is_parsed_and_type_checked() {
    let ok = classify(BackendReply::Text("```json\n[\"a\"]\n```".into()), Expect::Array);
    assert_eq!(ok, Outcome::Success(json!(["a"])));

    let wrong = classify(BackendReply::Text("{\"a\": 1}".into()), Expect::Array);
    assert!(matches!(wrong, Outcome::Malformed(_)));

    let prose = classify(BackendReply::Text("I cannot do that.".into()), Expect::Object);
    assert_eq!(prose, Outcome::Malformed("I cannot do that.".into()));
  }

  #[test]
  fn blank_text_and_no_content_are_empty() {
    assert_eq!(classify(BackendReply::Text("  \n".into()), Expect::Object), Outcome::Empty);
    assert_eq!(classify(BackendReply::NoContent, Expect::Object), Outcome::Empty);
  }

  #[test]
  fn service_signals_pass_through() {
    assert_eq!(
      classify(BackendReply::Blocked("SAFETY".into()), Expect::Object),
      Outcome::Blocked("SAFETY".into())
    );
    assert_eq!(
      classify(BackendReply::RateLimited(Some(Duration::from_secs(7))), Expect::Object),
      Outcome::RateLimited(Some(Duration::from_secs(7)))
    );
    assert_eq!(
      classify(BackendReply::Failed("boom".into()), Expect::Array),
      Outcome::Transient("boom".into())
    );
  }
}
