//! Topic analysis: one prompt over a prefix of the source text, expecting a JSON
//! array of short topic phrases. Up to `topic_attempts` calls; any failure mode
//! other than a policy block is retried with exponential pauses.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{info, instrument, warn};

use super::backoff::pause;
use super::QuestionGenerator;
use crate::client::{Expect, GenerativeBackend, Outcome};
use crate::util::{char_prefix, fill_template};

impl<B: GenerativeBackend> QuestionGenerator<B> {
  /// Unique, trimmed topic phrases in first-seen order. Empty on total failure.
  #[instrument(level = "info", skip(self, text), fields(text_len = text.len()))]
  pub async fn analyze_topics(&self, text: &str, desired: usize) -> Vec<String> {
    let count = desired.to_string();
    let prompt = fill_template(
      &self.prompts.topic_analysis,
      &[("count", &count), ("text", char_prefix(text, self.tuning.topic_prefix_chars))],
    );
    let params = self.tuning.topic_params();
    let attempts = self.tuning.topic_attempts.max(1);

    for attempt in 0..attempts {
      info!(target: "generation", attempt = attempt + 1, attempts, "Sending topic analysis prompt");
      let outcome = self.client.invoke(&prompt, params, Expect::Array).await;

      let wait = match outcome {
        Outcome::Success(Value::Array(items)) => {
          let topics = clean_topics(&items);
          if !topics.is_empty() {
            info!(target: "generation", count = topics.len(), "Extracted unique topics");
            return topics;
          }
          warn!(target: "generation", attempt = attempt + 1, "Topic reply held no usable strings");
          self.backoff.exponential(attempt)
        }
        Outcome::Success(_) | Outcome::Malformed(_) => {
          warn!(target: "generation", attempt = attempt + 1, "Topic reply was not a JSON array");
          self.backoff.exponential(attempt)
        }
        Outcome::Blocked(reason) => {
          warn!(target: "generation", %reason, "Topic analysis prompt blocked");
          return Vec::new();
        }
        Outcome::Empty => {
          warn!(target: "generation", attempt = attempt + 1, "Topic analysis reply was empty");
          self.backoff.exponential(attempt)
        }
        Outcome::RateLimited(hint) => {
          warn!(target: "generation", attempt = attempt + 1, ?hint, "Rate limit hit during topic analysis");
          self.backoff.rate_limited(attempt, hint)
        }
        Outcome::Transient(e) => {
          warn!(target: "generation", attempt = attempt + 1, error = %e, "Error during topic analysis");
          self.backoff.exponential(attempt)
        }
      };

      if attempt + 1 < attempts {
        pause(wait).await;
      }
    }

    warn!(target: "generation", attempts, "Topic analysis attempts exhausted");
    Vec::new()
  }
}

/// Trim, drop blanks and non-strings, collapse duplicates keeping first occurrence.
pub fn clean_topics(items: &[Value]) -> Vec<String> {
  let mut seen = HashSet::new();
  items
    .iter()
    .filter_map(Value::as_str)
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .filter(|t| seen.insert(t.to_string()))
    .map(str::to_string)
    .collect()
}
