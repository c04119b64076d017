//! Recovery of a single JSON value (object or array) from free-text model replies.
//!
//! Models wrap their JSON in markdown fences, lead with prose, or trail off with
//! commentary. Attempts, in order:
//!   1. a ```json fenced block (authoritative: if it fails to parse we stop there)
//!   2. the first balanced `{...}` / `[...]` span starting at the first opening bracket
//!   3. an incremental parse of the first JSON value at that same offset
//!   4. the whole reply as-is
//!
//! A miss is an ordinary outcome (`None`), never an error.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

fn fence_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?i)```json\s*([\s\S]*?)\s*```").expect("static fence regex"))
}

/// Extract the structured value carried by `raw`, if any.
pub fn extract_json(raw: &str) -> Option<Value> {
  if raw.trim().is_empty() {
    debug!(target: "generation", "extract_json: empty reply");
    return None;
  }

  if let Some(caps) = fence_re().captures(raw) {
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    return match serde_json::from_str::<Value>(body) {
      Ok(v) => Some(v),
      Err(e) => {
        debug!(target: "generation", error = %e, "extract_json: fenced block is not valid JSON");
        None
      }
    };
  }

  if let Some(start) = raw.find(['{', '[']) {
    let candidate = &raw[start..];

    if let Some(span) = balanced_span(candidate) {
      match serde_json::from_str::<Value>(span) {
        Ok(v) => return Some(v),
        Err(e) => debug!(target: "generation", error = %e, "extract_json: balanced span did not parse"),
      }
    }

    // Brackets inside string literals can close the span early; let serde find the real end.
    let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
    if let Some(Ok(v)) = stream.next() {
      if v.is_object() || v.is_array() {
        return Some(v);
      }
    }
  }

  match serde_json::from_str::<Value>(raw) {
    Ok(v) => Some(v),
    Err(e) => {
      debug!(target: "generation", error = %e, "extract_json: no structured value found");
      None
    }
  }
}

/// `text` starts with `{` or `[`. Returns the prefix ending at the first position where
/// the brace and bracket depths are both back to zero on a closer of the opening type.
fn balanced_span(text: &str) -> Option<&str> {
  let opener = text.chars().next()?;
  let closer = match opener {
    '{' => '}',
    '[' => ']',
    _ => return None,
  };

  let (mut braces, mut brackets) = (0i64, 0i64);
  for (idx, c) in text.char_indices() {
    match c {
      '{' => braces += 1,
      '}' => braces -= 1,
      '[' => brackets += 1,
      ']' => brackets -= 1,
      _ => continue,
    }
    if braces == 0 && brackets == 0 && c == closer {
      return Some(&text[..=idx]);
    }
  }
  None
}
