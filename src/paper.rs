//! Plain-text exam paper rendering.
//!
//! The paper is 80 columns wide: a centred header, then one section per question kind
//! (A: MCQ, B: short answer, C: long answer). Question numbers run on across sections.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{GeneratedQuestion, GenerationResult, QuestionCounts, QuestionKind};
use crate::util::sanitize_filename;

pub const PAPER_WIDTH: usize = 80;

const SECTION_A_INSTRUCTIONS: &str = "Attempt this section on the MCQ's Answer Sheet only. Use black ball point or marker for shading only one circle for correct option of a question. No mark will be awarded for cutting, erasing, over writing and multiple circles shading.";

/// Header fields supplied by the caller. Missing fields fall back to sample values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamDetails {
  #[serde(default)] pub school_name: Option<String>,
  #[serde(default)] pub exam_title: Option<String>,
  #[serde(default)] pub class_level: Option<String>,
  #[serde(default)] pub subject: Option<String>,
  #[serde(default)] pub total_time: Option<String>,
  #[serde(default)] pub version: Option<String>,
}

impl ExamDetails {
  fn or<'a>(v: &'a Option<String>, default: &'a str) -> &'a str {
    match v.as_deref().map(str::trim) {
      Some(s) if !s.is_empty() => s,
      _ => default,
    }
  }

  pub fn school_name(&self) -> &str {
    Self::or(&self.school_name, "Oriental Public School Mardan")
  }

  pub fn exam_title(&self) -> &str {
    Self::or(&self.exam_title, "Final Term Examination")
  }

  pub fn class_level(&self) -> &str {
    Self::or(&self.class_level, "6th")
  }

  pub fn subject(&self) -> &str {
    Self::or(&self.subject, "SUBJECT")
  }

  pub fn total_time(&self) -> &str {
    Self::or(&self.total_time, "3:00 Hours")
  }

  pub fn version(&self) -> Option<&str> {
    self.version.as_deref().map(str::trim).filter(|v| !v.is_empty())
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SectionConfig {
  pub title: String,
  pub instructions: String,
  pub time_allowed: Option<String>,
  pub total_marks: u32,
}

/// Section settings for one paper. A section with `None` is left out even when
/// questions of that kind exist.
#[derive(Clone, Debug, PartialEq)]
pub struct PaperLayout {
  pub a: Option<SectionConfig>,
  pub b: Option<SectionConfig>,
  pub c: Option<SectionConfig>,
  pub total_marks: u32,
}

impl PaperLayout {
  /// Layout whose marks follow the requested counts (not the produced ones).
  pub fn standard(counts: &QuestionCounts) -> Self {
    let section_marks = |kind: QuestionKind| counts.marks_for(kind);
    Self {
      a: Some(SectionConfig {
        title: "SECTION A".into(),
        instructions: SECTION_A_INSTRUCTIONS.into(),
        time_allowed: Some("20 Minutes".into()),
        total_marks: section_marks(QuestionKind::Mcq),
      }),
      b: Some(SectionConfig {
        title: "SECTION B".into(),
        instructions: format!("Attempt any {} questions. Each question carries equal marks.", counts.short_answer),
        time_allowed: None,
        total_marks: section_marks(QuestionKind::ShortAnswer),
      }),
      c: Some(SectionConfig {
        title: "SECTION C".into(),
        instructions: format!("Attempt any {} questions. Each question carries equal marks.", counts.long_answer),
        time_allowed: None,
        total_marks: section_marks(QuestionKind::LongAnswer),
      }),
      total_marks: counts.total_marks(),
    }
  }

  fn section(&self, kind: QuestionKind) -> Option<&SectionConfig> {
    match kind {
      QuestionKind::Mcq => self.a.as_ref(),
      QuestionKind::ShortAnswer => self.b.as_ref(),
      QuestionKind::LongAnswer => self.c.as_ref(),
    }
  }
}

pub fn format_exam_paper(details: &ExamDetails, result: &GenerationResult, layout: &PaperLayout) -> String {
  let rule = "-".repeat(PAPER_WIDTH);
  let mut lines: Vec<String> = Vec::new();

  lines.push(center(details.school_name(), PAPER_WIDTH));
  lines.push(center(details.exam_title(), PAPER_WIDTH));
  lines.push(center(
    &format!("CLASS {} PAPER {}", details.class_level(), details.subject().to_uppercase()),
    PAPER_WIDTH,
  ));
  lines.push(format!(
    "Total Time : {:<40} {:>39}",
    details.total_time(),
    format!("Total Marks: {}", layout.total_marks)
  ));
  if let Some(v) = details.version() {
    lines.push(format!("{:>79}", format!("Version: {}", v)));
  }
  lines.push(String::new());
  lines.push("Note: There are three sections in this paper i.e. Section A, B & C.".into());
  lines.push(rule.clone());

  let mut number = 1usize;
  for kind in QuestionKind::ALL {
    let questions = result.questions(kind);
    let Some(section) = layout.section(kind) else { continue };
    if questions.is_empty() {
      continue;
    }

    lines.push(String::new());
    lines.push(center(&section.title, PAPER_WIDTH));
    match kind {
      QuestionKind::Mcq => {
        let time = format!("Time Allowed: {}", section.time_allowed.as_deref().unwrap_or("20 Minutes"));
        lines.push(format!("Marks: {:<40} {:>39}", section.total_marks, time));
        lines.push("INSTRUCTION :".into());
        lines.push(format!("    {}", section.instructions));
      }
      QuestionKind::ShortAnswer | QuestionKind::LongAnswer => {
        lines.push(format!("{} (Marks: {})", section.instructions, section.total_marks));
      }
    }
    lines.push(String::new());

    for q in questions {
      lines.push(format!("{}. {} ({})", number, q.question(), marks_label(q.marks())));
      match q {
        GeneratedQuestion::Mcq(m) => {
          for (letter, option) in ('A'..='Z').zip(&m.options) {
            lines.push(format!("    {} {}", letter, option));
          }
          lines.push(String::new());
        }
        GeneratedQuestion::ShortAnswer(_) => lines.push(String::new()),
        GeneratedQuestion::LongAnswer(_) => lines.extend(std::iter::repeat(String::new()).take(4)),
      }
      number += 1;
    }
    lines.push(rule.clone());
  }

  lines.join("\n")
}

/// `{subject}_{class}_paper_{YYYYmmddHHMMSS}.txt`, reduced to a safe file name.
pub fn download_filename(details: &ExamDetails, at: DateTime<Local>) -> String {
  let subject = details.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("exam");
  let class = details.class_level.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("paper");
  let raw = format!("{}_{}_paper_{}.txt", subject, class, at.format("%Y%m%d%H%M%S"));
  sanitize_filename(&raw.replace(['/', '\\'], "_"))
}

fn marks_label(marks: u32) -> String {
  if marks == 1 { "1 Mark".into() } else { format!("{} Marks", marks) }
}

/// Centre `s` in `width` columns. Odd padding goes right, except when `width` is odd too.
fn center(s: &str, width: usize) -> String {
  let len = s.chars().count();
  if len >= width {
    return s.to_string();
  }
  let pad = width - len;
  let left = pad / 2 + (pad & width & 1);
  format!("{}{}{}", " ".repeat(left), s, " ".repeat(pad - left))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::domain::{MultipleChoice, WrittenAnswer};

  fn sample_result() -> GenerationResult {
    let mut r = GenerationResult::default();
    r.push(GeneratedQuestion::Mcq(MultipleChoice {
      question: "What is 2 + 2?".into(),
      options: vec!["3".into(), "4".into(), "5".into(), "22".into()],
      correct_option_index: 1,
      marks: 1,
    }));
    r.push(GeneratedQuestion::ShortAnswer(WrittenAnswer {
      question: "Define a prime.".into(),
      answer_guideline: "Divisible only by 1 and itself".into(),
      marks: 4,
    }));
    r.push(GeneratedQuestion::LongAnswer(WrittenAnswer {
      question: "Discuss fractions.".into(),
      answer_guideline: String::new(),
      marks: 8,
    }));
    r
  }

  fn details() -> ExamDetails {
    ExamDetails {
      school_name: Some("Hill School".into()),
      exam_title: Some("Mid Term".into()),
      class_level: Some("6th".into()),
      subject: Some("Math".into()),
      total_time: Some("2:00 Hours".into()),
      version: Some("A".into()),
    }
  }

  #[test]
  fn center_matches_common_convention() {
    assert_eq!(center("ab", 6), "  ab  ");
    assert_eq!(center("abc", 6), " abc  ");
    assert_eq!(center("abc", 7), "  abc  ");
    assert_eq!(center("ab", 7), "   ab  ");
    assert_eq!(center("too long", 3), "too long");
  }

  #[test]
  fn standard_layout_marks_follow_counts() {
    let layout = PaperLayout::standard(&QuestionCounts::new(15, 9, 3));
    assert_eq!(layout.a.as_ref().unwrap().total_marks, 15);
    assert_eq!(layout.b.as_ref().unwrap().total_marks, 36);
    assert_eq!(layout.c.as_ref().unwrap().total_marks, 24);
    assert_eq!(layout.total_marks, 75);
    assert!(layout.b.as_ref().unwrap().instructions.starts_with("Attempt any 9 questions"));
  }

  #[test]
  fn paper_has_header_sections_and_running_numbers() {
    let layout = PaperLayout::standard(&QuestionCounts::new(1, 1, 1));
    let paper = format_exam_paper(&details(), &sample_result(), &layout);
    let lines: Vec<&str> = paper.lines().collect();

    assert_eq!(lines[0].trim(), "Hill School");
    assert_eq!(lines[0].len(), PAPER_WIDTH);
    assert_eq!(lines[2].trim(), "CLASS 6th PAPER MATH");
    assert!(lines[3].starts_with("Total Time : 2:00 Hours"));
    assert!(lines[3].ends_with("Total Marks: 13"));
    assert_eq!(lines[3].len(), "Total Time : ".len() + 40 + 1 + 39);
    assert!(lines[4].ends_with("Version: A"));
    assert_eq!(lines[4].len(), 79);

    assert!(paper.contains("1. What is 2 + 2? (1 Mark)"));
    assert!(paper.contains("    A 3\n    B 4\n    C 5\n    D 22"));
    assert!(paper.contains("2. Define a prime. (4 Marks)"));
    assert!(paper.contains("3. Discuss fractions. (8 Marks)"));
    assert!(paper.contains("Attempt any 1 questions. Each question carries equal marks. (Marks: 4)"));
    assert!(paper.contains("INSTRUCTION :"));
    assert_eq!(lines.iter().filter(|l| **l == "-".repeat(80)).count(), 4);
  }

  #[test]
  fn empty_sections_are_omitted() {
    let mut r = GenerationResult::default();
    r.push(GeneratedQuestion::written(QuestionKind::LongAnswer, "Only essay.".into(), "g".into()).unwrap());
    let layout = PaperLayout::standard(&QuestionCounts::new(2, 0, 1));
    let paper = format_exam_paper(&ExamDetails::default(), &r, &layout);
    assert!(!paper.contains("SECTION A"));
    assert!(!paper.contains("SECTION B"));
    assert!(paper.contains("SECTION C"));
    assert!(paper.contains("1. Only essay. (8 Marks)"));
    // Header still reports the requested total.
    assert!(paper.contains("Total Marks: 10"));
    assert!(!paper.contains("Version:"));
  }

  #[test]
  fn section_without_config_is_skipped() {
    let mut layout = PaperLayout::standard(&QuestionCounts::new(1, 1, 1));
    layout.a = None;
    let paper = format_exam_paper(&details(), &sample_result(), &layout);
    assert!(!paper.contains("SECTION A"));
    assert!(paper.contains("1. Define a prime."));
  }

  #[test]
  fn download_name_is_sanitised() {
    let at = Local.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
    let mut d = details();
    d.subject = Some("General Science/Bio".into());
    d.class_level = Some("Grade 6".into());
    assert_eq!(download_filename(&d, at), "General_Science_Bio_Grade_6_paper_20250304050607.txt");

    let blank = ExamDetails::default();
    assert_eq!(download_filename(&blank, at), "exam_paper_paper_20250304050607.txt");
  }
}
