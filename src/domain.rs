//! Domain models: topics, difficulty labels, questions, model ids and the API key.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed set of topics the player can pick from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
  Math,
  Geography,
  History,
  GeneralCulture,
}

impl Topic {
  pub const ALL: [Topic; 4] = [Topic::Math, Topic::Geography, Topic::History, Topic::GeneralCulture];

  /// Name used inside the generation prompt.
  pub fn prompt_name(&self) -> &'static str {
    match self {
      Topic::Math => "mathematics",
      Topic::Geography => "geography",
      Topic::History => "history",
      Topic::GeneralCulture => "general culture",
    }
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Topic::Math => "math",
      Topic::Geography => "geography",
      Topic::History => "history",
      Topic::GeneralCulture => "general-culture",
    })
  }
}

/// Always derived from the level, never stored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
  VeryHard,
}

impl Difficulty {
  pub fn prompt_name(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
      Difficulty::VeryHard => "very hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.prompt_name())
  }
}

/// One validated multiple-choice item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  pub id: Uuid,
  pub prompt_text: String,
  pub options: Vec<String>,
  pub correct_index: usize,
}

impl Question {
  pub fn new(prompt_text: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
    Self { id: Uuid::new_v4(), prompt_text: prompt_text.into(), options, correct_index }
  }

  pub fn is_correct(&self, index: usize) -> bool {
    index == self.correct_index
  }

  pub fn correct_option(&self) -> Option<&str> {
    self.options.get(self.correct_index).map(String::as_str)
  }
}

/// Opaque provider model identifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
  pub fn new(id: impl Into<String>) -> Self {
    ModelId(id.into())
  }
}

impl fmt::Display for ModelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// API key passed through to the provider. Debug output is redacted so it never
/// ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
  /// Blank input means "no key".
  pub fn new(raw: impl Into<String>) -> Option<Self> {
    let raw = raw.into();
    let trimmed = raw.trim();
    if trimmed.is_empty() { None } else { Some(Secret(trimmed.to_string())) }
  }

  pub fn expose(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Secret(***)")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn topic_wire_names_are_kebab_case() {
    let json = serde_json::to_string(&Topic::GeneralCulture).unwrap();
    assert_eq!(json, "\"general-culture\"");
    let t: Topic = serde_json::from_str("\"math\"").unwrap();
    assert_eq!(t, Topic::Math);
    assert_eq!(Topic::GeneralCulture.to_string(), "general-culture");
  }

  #[test]
  fn secret_is_redacted_and_blank_is_none() {
    let s = Secret::new("  abc123 ").unwrap();
    assert_eq!(s.expose(), "abc123");
    assert_eq!(format!("{s:?}"), "Secret(***)");
    assert!(Secret::new("   ").is_none());
  }

  #[test]
  fn question_correctness() {
    let q = Question::new("2+2?", vec!["3".into(), "4".into(), "5".into(), "6".into()], 1);
    assert!(q.is_correct(1));
    assert!(!q.is_correct(0));
    assert_eq!(q.correct_option(), Some("4"));
  }
}
