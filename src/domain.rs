//! Domain models: question kinds, requested counts, generated question records and the per-run result.

use serde::{Deserialize, Serialize};

/// Question category. Each kind has its own prompt template, response shape and fixed mark value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
  Mcq,
  ShortAnswer,
  LongAnswer,
}

impl QuestionKind {
  /// Generation order used by the orchestrator.
  pub const ALL: [QuestionKind; 3] = [QuestionKind::Mcq, QuestionKind::ShortAnswer, QuestionKind::LongAnswer];

  pub fn marks(self) -> u32 {
    match self {
      QuestionKind::Mcq => 1,
      QuestionKind::ShortAnswer => 4,
      QuestionKind::LongAnswer => 8,
    }
  }

  /// Human label injected into prompts and log lines.
  pub fn label(self) -> &'static str {
    match self {
      QuestionKind::Mcq => "multiple choice",
      QuestionKind::ShortAnswer => "short answer",
      QuestionKind::LongAnswer => "long answer",
    }
  }

  /// Keys the model's JSON object must carry for this kind.
  pub fn required_keys(self) -> &'static [&'static str] {
    match self {
      QuestionKind::Mcq => &["question", "options", "correct_option_index"],
      QuestionKind::ShortAnswer | QuestionKind::LongAnswer => &["question", "guideline"],
    }
  }
}

/// Target number of questions per kind for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCounts {
  #[serde(default)] pub mcq: usize,
  #[serde(default)] pub short_answer: usize,
  #[serde(default)] pub long_answer: usize,
}

impl QuestionCounts {
  pub fn new(mcq: usize, short_answer: usize, long_answer: usize) -> Self {
    Self { mcq, short_answer, long_answer }
  }

  pub fn get(&self, kind: QuestionKind) -> usize {
    match kind {
      QuestionKind::Mcq => self.mcq,
      QuestionKind::ShortAnswer => self.short_answer,
      QuestionKind::LongAnswer => self.long_answer,
    }
  }

  pub fn total(&self) -> usize {
    self.mcq.saturating_add(self.short_answer).saturating_add(self.long_answer)
  }

  /// Marks for `kind` if every requested question of it were produced.
  pub fn marks_for(&self, kind: QuestionKind) -> u32 {
    u32::try_from(self.get(kind)).unwrap_or(u32::MAX).saturating_mul(kind.marks())
  }

  /// Marks the paper would carry if every requested question were produced.
  pub fn total_marks(&self) -> u32 {
    QuestionKind::ALL.iter().fold(0u32, |acc, k| acc.saturating_add(self.marks_for(*k)))
  }

  /// The first kind whose count exceeds `max`, if any.
  pub fn over_limit(&self, max: usize) -> Option<QuestionKind> {
    QuestionKind::ALL.into_iter().find(|k| self.get(*k) > max)
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoice {
  pub question: String,
  pub options: Vec<String>,
  pub correct_option_index: usize,
  pub marks: u32,
}

impl MultipleChoice {
  pub fn correct_option(&self) -> Option<&str> {
    self.options.get(self.correct_option_index).map(String::as_str)
  }
}

/// Short- and long-answer payload: the question plus a marking guideline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WrittenAnswer {
  pub question: String,
  pub answer_guideline: String,
  pub marks: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedQuestion {
  Mcq(MultipleChoice),
  ShortAnswer(WrittenAnswer),
  LongAnswer(WrittenAnswer),
}

impl GeneratedQuestion {
  pub fn kind(&self) -> QuestionKind {
    match self {
      GeneratedQuestion::Mcq(_) => QuestionKind::Mcq,
      GeneratedQuestion::ShortAnswer(_) => QuestionKind::ShortAnswer,
      GeneratedQuestion::LongAnswer(_) => QuestionKind::LongAnswer,
    }
  }

  pub fn question(&self) -> &str {
    match self {
      GeneratedQuestion::Mcq(q) => &q.question,
      GeneratedQuestion::ShortAnswer(q) | GeneratedQuestion::LongAnswer(q) => &q.question,
    }
  }

  pub fn marks(&self) -> u32 {
    match self {
      GeneratedQuestion::Mcq(q) => q.marks,
      GeneratedQuestion::ShortAnswer(q) | GeneratedQuestion::LongAnswer(q) => q.marks,
    }
  }

  /// Build a text-answer record for `kind` with its fixed mark value.
  /// Returns `None` for `QuestionKind::Mcq`, which carries options instead.
  pub fn written(kind: QuestionKind, question: String, answer_guideline: String) -> Option<Self> {
    let body = WrittenAnswer { question, answer_guideline, marks: kind.marks() };
    match kind {
      QuestionKind::ShortAnswer => Some(GeneratedQuestion::ShortAnswer(body)),
      QuestionKind::LongAnswer => Some(GeneratedQuestion::LongAnswer(body)),
      QuestionKind::Mcq => None,
    }
  }
}

/// Per-kind question lists for one run, each in generation order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
  #[serde(default)] pub mcq: Vec<GeneratedQuestion>,
  #[serde(default)] pub short_answer: Vec<GeneratedQuestion>,
  #[serde(default)] pub long_answer: Vec<GeneratedQuestion>,
}

impl GenerationResult {
  pub fn questions(&self, kind: QuestionKind) -> &[GeneratedQuestion] {
    match kind {
      QuestionKind::Mcq => &self.mcq,
      QuestionKind::ShortAnswer => &self.short_answer,
      QuestionKind::LongAnswer => &self.long_answer,
    }
  }

  pub fn push(&mut self, question: GeneratedQuestion) {
    match question.kind() {
      QuestionKind::Mcq => self.mcq.push(question),
      QuestionKind::ShortAnswer => self.short_answer.push(question),
      QuestionKind::LongAnswer => self.long_answer.push(question),
    }
  }

  pub fn len(&self) -> usize {
    self.mcq.len() + self.short_answer.len() + self.long_answer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn total_marks(&self) -> u32 {
    QuestionKind::ALL
      .iter()
      .flat_map(|k| self.questions(*k))
      .map(GeneratedQuestion::marks)
      .sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn marks_are_fixed_per_kind() {
    assert_eq!(QuestionKind::Mcq.marks(), 1);
    assert_eq!(QuestionKind::ShortAnswer.marks(), 4);
    assert_eq!(QuestionKind::LongAnswer.marks(), 8);
    assert_eq!(QuestionCounts::new(2, 1, 1).total_marks(), 14);
  }

  #[test]
  fn oversized_counts_saturate() {
    let huge: QuestionCounts = serde_json::from_str(r#"{"mcq":18446744073709551615,"short_answer":1}"#).unwrap();
    assert_eq!(huge.total(), usize::MAX);
    assert_eq!(huge.total_marks(), u32::MAX);
    assert_eq!(QuestionCounts::new(4_294_967_296, 0, 1).total_marks(), u32::MAX);
    assert_eq!(huge.over_limit(50), Some(QuestionKind::Mcq));
    assert_eq!(QuestionCounts::new(50, 50, 50).over_limit(50), None);
    assert_eq!(QuestionCounts::new(0, 0, 51).over_limit(50), Some(QuestionKind::LongAnswer));
  }

  #[test]
  fn written_constructor_refuses_mcq() {
    assert!(GeneratedQuestion::written(QuestionKind::Mcq, "q".into(), "g".into()).is_none());
    let q = GeneratedQuestion::written(QuestionKind::LongAnswer, "q".into(), "g".into()).unwrap();
    assert_eq!(q.kind(), QuestionKind::LongAnswer);
    assert_eq!(q.marks(), 8);
  }

  #[test]
  fn result_serializes_with_kind_tags() {
    let mut result = GenerationResult::default();
    result.push(GeneratedQuestion::Mcq(MultipleChoice {
      question: "Which?".into(),
      options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
      correct_option_index: 2,
      marks: 1,
    }));
    result.push(GeneratedQuestion::written(QuestionKind::ShortAnswer, "Why?".into(), "Because".into()).unwrap());

    let v = serde_json::to_value(&result).unwrap();
    assert_eq!(v["mcq"][0]["type"], "mcq");
    assert_eq!(v["mcq"][0]["correct_option_index"], 2);
    assert_eq!(v["short_answer"][0]["type"], "short_answer");
    assert_eq!(v["short_answer"][0]["answer_guideline"], "Because");
    assert_eq!(v["short_answer"][0]["marks"], 4);
    assert_eq!(v["long_answer"], serde_json::json!([]));
    assert_eq!(result.total_marks(), 5);
  }
}
