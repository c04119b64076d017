//! Question synthesis: one topic, one kind, a bounded number of model calls.
//!
//! Shape failures and empty replies are retried with linear pauses, transport errors
//! with exponential ones. A policy block or an explicitly empty question ends the
//! topic at once. MCQ options are shuffled locally and the answer index re-derived.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::backoff::pause;
use super::QuestionGenerator;
use crate::client::{Expect, GenerativeBackend, Outcome};
use crate::domain::{GeneratedQuestion, MultipleChoice, QuestionKind};
use crate::util::fill_template;

const MCQ_OPTIONS: usize = 4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuestionError {
  #[error("missing key '{0}'")]
  MissingKey(&'static str),
  #[error("key '{0}' has the wrong type")]
  WrongType(&'static str),
  #[error("expected {expected} options, got {got}")]
  OptionCount { expected: usize, got: usize },
  #[error("correct_option_index {index} out of range for {len} options")]
  IndexOutOfRange { index: i64, len: usize },
  #[error("correct option text not found after shuffling")]
  CorrectOptionLost,
}

impl QuestionError {
  /// Failures in post-processing a well-shaped reply, as opposed to a reply of the wrong shape.
  /// These surface to the orchestrator when they end the attempt budget.
  pub fn is_processing(&self) -> bool {
    matches!(self, QuestionError::IndexOutOfRange { .. } | QuestionError::CorrectOptionLost)
  }
}

impl<B: GenerativeBackend> QuestionGenerator<B> {
  /// `Ok(None)` is a miss: blocked, explicitly empty, or retries spent on shape problems.
  /// `Err` means the last attempt failed while processing an otherwise valid MCQ.
  #[instrument(level = "debug", skip(self, base_prompt), fields(kind = kind.label()))]
  pub async fn synthesize(
    &self,
    kind: QuestionKind,
    base_prompt: &str,
    topic: &str,
    index: usize,
  ) -> Result<Option<GeneratedQuestion>, QuestionError> {
    let instruction = fill_template(&self.prompts.topic_instruction, &[("kind", kind.label()), ("topic", topic)]);
    let prompt = format!("{}{}", instruction, base_prompt);
    let params = self.tuning.question_params();
    let attempts = self.tuning.question_attempts.max(1);
    let mut last_processing: Option<QuestionError> = None;

    for attempt in 0..attempts {
      debug!(target: "generation", index, attempt = attempt + 1, attempts, "Requesting question");
      let outcome = self.client.invoke(&prompt, params, Expect::Object).await;

      let wait = match outcome {
        Outcome::Success(Value::Object(obj)) => {
          let built = {
            let mut rng = rand::thread_rng();
            build_question(kind, &obj, &mut rng)
          };
          match built {
            Ok(Some(question)) => {
              info!(target: "generation", index, "Generated question");
              return Ok(Some(question));
            }
            Ok(None) => {
              warn!(target: "generation", index, "Model returned an empty question; skipping topic");
              return Ok(None);
            }
            Err(e) if e.is_processing() => {
              warn!(target: "generation", index, attempt = attempt + 1, error = %e, "Error processing question");
              last_processing = Some(e);
              self.backoff.malformed(attempt)
            }
            Err(e) => {
              warn!(target: "generation", index, attempt = attempt + 1, error = %e, "Reply has the wrong shape");
              last_processing = None;
              self.backoff.malformed(attempt)
            }
          }
        }
        Outcome::Success(_) | Outcome::Malformed(_) => {
          warn!(target: "generation", index, attempt = attempt + 1, "Reply was not a JSON object");
          last_processing = None;
          self.backoff.malformed(attempt)
        }
        Outcome::Empty => {
          warn!(target: "generation", index, attempt = attempt + 1, "Empty reply");
          last_processing = None;
          self.backoff.empty(attempt)
        }
        Outcome::Blocked(reason) => {
          warn!(target: "generation", index, %reason, "Question prompt blocked");
          return Ok(None);
        }
        Outcome::RateLimited(hint) => {
          warn!(target: "generation", index, attempt = attempt + 1, ?hint, "Rate limit hit");
          last_processing = None;
          self.backoff.rate_limited(attempt, hint)
        }
        Outcome::Transient(e) => {
          warn!(target: "generation", index, attempt = attempt + 1, error = %e, "Model call failed");
          last_processing = None;
          self.backoff.exponential(attempt)
        }
      };

      if attempt + 1 < attempts {
        pause(wait).await;
      }
    }

    warn!(target: "generation", index, attempts, "Failed to generate question after all attempts");
    match last_processing {
      Some(e) => Err(e),
      None => Ok(None),
    }
  }
}

/// Validate a reply object for `kind` and turn it into a record.
/// `Ok(None)` when the question text is blank.
pub fn build_question<R: Rng + ?Sized>(
  kind: QuestionKind,
  obj: &Map<String, Value>,
  rng: &mut R,
) -> Result<Option<GeneratedQuestion>, QuestionError> {
  for key in kind.required_keys() {
    if !obj.contains_key(*key) {
      return Err(QuestionError::MissingKey(*key));
    }
  }

  let question = obj
    .get("question")
    .and_then(Value::as_str)
    .ok_or(QuestionError::WrongType("question"))?
    .trim();
  if question.is_empty() {
    return Ok(None);
  }

  match kind {
    QuestionKind::Mcq => {
      let options = obj
        .get("options")
        .and_then(Value::as_array)
        .ok_or(QuestionError::WrongType("options"))?
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or(QuestionError::WrongType("options"))?;
      if options.len() != MCQ_OPTIONS {
        return Err(QuestionError::OptionCount { expected: MCQ_OPTIONS, got: options.len() });
      }
      let index = obj
        .get("correct_option_index")
        .and_then(Value::as_i64)
        .ok_or(QuestionError::WrongType("correct_option_index"))?;

      let (options, correct_option_index) = shuffle_options(options, index, rng)?;
      Ok(Some(GeneratedQuestion::Mcq(MultipleChoice {
        question: question.to_string(),
        options,
        correct_option_index,
        marks: kind.marks(),
      })))
    }
    QuestionKind::ShortAnswer | QuestionKind::LongAnswer => {
      let guideline = obj.get("guideline").and_then(Value::as_str).unwrap_or("").trim();
      Ok(GeneratedQuestion::written(kind, question.to_string(), guideline.to_string()))
    }
  }
}

/// Shuffle `options` and return the new position of the text originally at `correct`.
pub fn shuffle_options<R: Rng + ?Sized>(
  mut options: Vec<String>,
  correct: i64,
  rng: &mut R,
) -> Result<(Vec<String>, usize), QuestionError> {
  let len = options.len();
  let correct_text = usize::try_from(correct)
    .ok()
    .and_then(|i| options.get(i))
    .cloned()
    .ok_or(QuestionError::IndexOutOfRange { index: correct, len })?;

  options.shuffle(rng);
  let new_index = options
    .iter()
    .position(|o| *o == correct_text)
    .ok_or(QuestionError::CorrectOptionLost)?;
  Ok((options, new_index))
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use serde_json::json;
  use tokio::time::Instant;

  use super::*;
  use crate::client::BackendReply;
  use crate::config::GenerationConfig;
  use crate::pipeline::testing::*;

  fn generator(replies: Vec<BackendReply>) -> QuestionGenerator<ScriptedBackend> {
    QuestionGenerator::new(ScriptedBackend::new(replies), GenerationConfig::default())
  }

  fn opts() -> Vec<String> {
    ["alpha", "beta", "gamma", "delta"].iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn shuffle_keeps_correct_text_for_every_seed_and_index() {
    for seed in 0..200u64 {
      let mut rng = StdRng::seed_from_u64(seed);
      for correct in 0..4 {
        let original = opts();
        let (shuffled, idx) = shuffle_options(original.clone(), correct, &mut rng).unwrap();
        assert_eq!(shuffled[idx], original[correct as usize]);
        let mut sorted = shuffled.clone();
        sorted.sort();
        let mut expected = original.clone();
        expected.sort();
        assert_eq!(sorted, expected);
      }
    }
  }

  #[test]
  fn shuffle_rejects_out_of_range_index() {
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(
      shuffle_options(opts(), 4, &mut rng),
      Err(QuestionError::IndexOutOfRange { index: 4, len: 4 })
    );
    assert_eq!(
      shuffle_options(opts(), -1, &mut rng),
      Err(QuestionError::IndexOutOfRange { index: -1, len: 4 })
    );
  }

  #[test]
  fn build_validates_shape_per_kind() {
    let mut rng = StdRng::seed_from_u64(1);
    let missing = json!({ "question": "Q?", "options": ["a", "b", "c", "d"] });
    assert_eq!(
      build_question(QuestionKind::Mcq, missing.as_object().unwrap(), &mut rng),
      Err(QuestionError::MissingKey("correct_option_index"))
    );

    let three = json!({ "question": "Q?", "options": ["a", "b", "c"], "correct_option_index": 0 });
    assert_eq!(
      build_question(QuestionKind::Mcq, three.as_object().unwrap(), &mut rng),
      Err(QuestionError::OptionCount { expected: 4, got: 3 })
    );

    let no_guideline = json!({ "question": "Q?" });
    assert_eq!(
      build_question(QuestionKind::ShortAnswer, no_guideline.as_object().unwrap(), &mut rng),
      Err(QuestionError::MissingKey("guideline"))
    );

    let null_guideline = json!({ "question": "Q?", "guideline": null });
    let q = build_question(QuestionKind::ShortAnswer, null_guideline.as_object().unwrap(), &mut rng)
      .unwrap()
      .unwrap();
    assert_eq!(q, GeneratedQuestion::written(QuestionKind::ShortAnswer, "Q?".into(), String::new()).unwrap());
  }

  #[test]
  fn blank_question_is_a_miss() {
    let mut rng = StdRng::seed_from_u64(1);
    let blank = json!({ "question": "   ", "guideline": "g" });
    assert_eq!(build_question(QuestionKind::LongAnswer, blank.as_object().unwrap(), &mut rng), Ok(None));
  }

  #[tokio::test(start_paused = true)]
  async fn empty_question_is_not_retried() {
    let g = generator(vec![written_reply("", "g"), written_reply("Real?", "g")]);
    let got = g.synthesize(QuestionKind::ShortAnswer, "base", "topic", 1).await;
    assert_eq!(got, Ok(None));
    assert_eq!(g.backend().calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn blocked_is_not_retried() {
    let g = generator(vec![BackendReply::Blocked("SAFETY".into()), mcq_reply("Q?", 0)]);
    assert_eq!(g.synthesize(QuestionKind::Mcq, "base", "topic", 1).await, Ok(None));
    assert_eq!(g.backend().calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn malformed_then_valid_uses_linear_pause() {
    let g = generator(vec![text("not json at all"), text("{\"question\": \"Q?\"}"), mcq_reply("Q?", 2)]);
    let start = Instant::now();
    let got = g.synthesize(QuestionKind::Mcq, "base", "topic", 1).await.unwrap().unwrap();
    assert_eq!(g.backend().calls(), 3);
    // 1.5s then 3s.
    assert!(start.elapsed() >= Duration::from_millis(4500));
    match got {
      GeneratedQuestion::Mcq(m) => assert_eq!(m.correct_option(), Some("gamma")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn transport_failure_then_valid_uses_exponential_pause() {
    let g = generator(vec![BackendReply::Failed("reset".into()), written_reply("Q?", "g")]);
    let start = Instant::now();
    let got = g.synthesize(QuestionKind::ShortAnswer, "base", "topic", 1).await.unwrap();
    assert!(got.is_some());
    assert_eq!(g.backend().calls(), 2);
    assert!(start.elapsed() >= Duration::from_secs(1));
  }

  #[tokio::test(start_paused = true)]
  async fn exhausted_shape_failures_are_a_miss() {
    let g = generator(vec![BackendReply::NoContent, text("[1, 2]"), text("{\"q\": 1}"), mcq_reply("late", 0)]);
    assert_eq!(g.synthesize(QuestionKind::Mcq, "base", "topic", 1).await, Ok(None));
    assert_eq!(g.backend().calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn out_of_range_index_on_last_attempt_is_an_error() {
    let g = generator(vec![mcq_reply("Q?", 9), mcq_reply("Q?", 9), mcq_reply("Q?", 4)]);
    let got = g.synthesize(QuestionKind::Mcq, "base", "topic", 1).await;
    assert_eq!(got, Err(QuestionError::IndexOutOfRange { index: 4, len: 4 }));
  }

  #[tokio::test(start_paused = true)]
  async fn out_of_range_index_recovers_when_budget_remains() {
    let g = generator(vec![mcq_reply("Q?", 5), mcq_reply("Q?", 1)]);
    let got = g.synthesize(QuestionKind::Mcq, "base", "topic", 1).await.unwrap().unwrap();
    assert_eq!(got.marks(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn rate_limit_hint_is_honoured_and_consumes_an_attempt() {
    let g = generator(vec![
      BackendReply::RateLimited(Some(Duration::from_secs(30))),
      BackendReply::RateLimited(None),
      written_reply("Q?", "g"),
    ]);
    let start = Instant::now();
    let got = g.synthesize(QuestionKind::LongAnswer, "base", "topic", 1).await.unwrap();
    assert!(got.is_some());
    // 30s hint + 1s padding, then 2 × 2^1 without a hint.
    assert!(start.elapsed() >= Duration::from_secs(35));
    assert_eq!(g.backend().calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn rate_limit_on_every_attempt_is_a_miss() {
    let g = generator(vec![
      BackendReply::RateLimited(None),
      BackendReply::RateLimited(None),
      BackendReply::RateLimited(None),
      written_reply("Q?", "g"),
    ]);
    assert_eq!(g.synthesize(QuestionKind::ShortAnswer, "base", "topic", 1).await, Ok(None));
    assert_eq!(g.backend().remaining(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn prompt_binds_topic_before_base_template() {
    let g = generator(vec![written_reply("Q?", "g")]);
    g.synthesize(QuestionKind::ShortAnswer, "BASE TEMPLATE", "Photosynthesis", 1).await.unwrap();
    let prompt = &g.backend().prompts()[0];
    assert!(prompt.starts_with("Generate a short answer question"));
    assert!(prompt.contains("'Photosynthesis'"));
    assert!(prompt.ends_with("BASE TEMPLATE"));
  }
}
