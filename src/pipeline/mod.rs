//! Question-generation pipeline.
//!
//! Flow for one run:
//! 1) topic analysis over a prefix of the source text (`topics.rs`)
//! 2) shuffle the topic pool
//! 3) for each kind in order (MCQ, short, long): pop a topic, synthesize one question (`synth.rs`)
//!
//! Calls to the model are strictly sequential. Retryable failures are absorbed in
//! the analyzer and synthesizer; the orchestrator only sees "question" or "no question".

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use tracing::{info, instrument, warn};

use crate::client::{GenerativeBackend, ModelClient};
use crate::config::{GenerationConfig, Prompts, Tuning};
use crate::domain::{GenerationResult, QuestionCounts, QuestionKind};
use crate::util::{char_prefix, fill_template};

pub mod backoff;
pub mod synth;
pub mod topics;

pub use backoff::Backoff;
pub use synth::QuestionError;

pub struct QuestionGenerator<B> {
  client: ModelClient<B>,
  prompts: Prompts,
  tuning: Tuning,
  backoff: Backoff,
}

impl<B: GenerativeBackend> QuestionGenerator<B> {
  pub fn new(backend: B, config: GenerationConfig) -> Self {
    let backoff = Backoff::from_tuning(&config.tuning);
    Self { client: ModelClient::new(backend), prompts: config.prompts, tuning: config.tuning, backoff }
  }

  pub fn backend(&self) -> &B {
    self.client.backend()
  }

  pub fn tuning(&self) -> &Tuning {
    &self.tuning
  }

  /// Produce up to `counts` questions from `text`. Never fails: exhausted retries and
  /// an exhausted topic pool simply leave the affected lists short.
  #[instrument(
    level = "info",
    skip(self, text),
    fields(text_len = text.len(), mcq = counts.mcq, short = counts.short_answer, long = counts.long_answer)
  )]
  pub async fn generate(&self, text: &str, counts: QuestionCounts) -> GenerationResult {
    let mut result = GenerationResult::default();

    let total = counts.total();
    if total == 0 {
      info!(target: "generation", "No questions requested");
      return result;
    }
    if text.trim().is_empty() {
      warn!(target: "generation", "Source text is empty; nothing to generate from");
      return result;
    }

    let desired = self.tuning.desired_topics(total);
    let mut topics = self.analyze_topics(text, desired).await;
    if topics.is_empty() {
      warn!(target: "generation", desired, "Failed to extract topics from the text");
      return result;
    }
    topics.shuffle(&mut rand::thread_rng());
    let mut pool: VecDeque<String> = topics.into();
    info!(target: "generation", pool = pool.len(), requested = total, "Topic pool ready");

    for kind in QuestionKind::ALL {
      let target = counts.get(kind);
      if target == 0 {
        continue;
      }

      let source = char_prefix(text, self.tuning.prefix_chars(kind));
      let base_prompt = fill_template(self.prompts.for_kind(kind), &[("text", source)]);
      let mut produced = 0usize;

      while produced < target {
        let Some(topic) = pool.pop_front() else {
          warn!(target: "generation", kind = kind.label(), produced, target, "Topic pool exhausted; stopping short");
          break;
        };

        match self.synthesize(kind, &base_prompt, &topic, produced + 1).await {
          Ok(Some(question)) => {
            result.push(question);
            produced += 1;
          }
          Ok(None) => {
            info!(target: "generation", kind = kind.label(), %topic, "No question for topic; moving on");
          }
          Err(e) => {
            warn!(target: "generation", kind = kind.label(), %topic, error = %e, "Error processing question; skipping topic");
          }
        }
      }
    }

    info!(
      target: "generation",
      mcq = result.mcq.len(),
      short = result.short_answer.len(),
      long = result.long_answer.len(),
      topics_left = pool.len(),
      "Generation run finished"
    );
    result
  }
}
