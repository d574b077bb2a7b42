//! Turning a raw provider reply into a validated `Question`.
//!
//! Flow:
//! 1) Probe the known reply shapes in a fixed order; first non-empty text wins.
//! 2) Strip Markdown fences and surrounding prose.
//! 3) Parse as JSON.
//! 4) Check the question fields structurally before accepting.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::Question;
use crate::error::{QuizError, Result};
use crate::util::trunc_for_log;

pub const OPTION_COUNT: usize = 4;

type Extractor = fn(&Value) -> Option<String>;

/// Probed in order. Each returns `None` unless it finds non-empty text.
const EXTRACTORS: &[(&str, Extractor)] = &[
  ("candidates", from_candidates),
  ("output", from_output),
  ("text", from_text_field),
  ("outputs", from_outputs),
  ("bare_string", from_bare_string),
];

fn non_empty(s: String) -> Option<String> {
  if s.trim().is_empty() { None } else { Some(s) }
}

/// `candidates[*].content.parts[*].text`
fn from_candidates(raw: &Value) -> Option<String> {
  raw.get("candidates")?
    .as_array()?
    .iter()
    .filter_map(|c| c.pointer("/content/parts")?.as_array())
    .flat_map(|parts| parts.iter().filter_map(|p| p.get("text")?.as_str()))
    .map(str::to_string)
    .find_map(non_empty)
}

/// `output[*].content[*]` entries tagged as text.
fn from_output(raw: &Value) -> Option<String> {
  let texts: Vec<&str> = raw.get("output")?
    .as_array()?
    .iter()
    .filter_map(|o| o.get("content")?.as_array())
    .flatten()
    .filter(|c| matches!(c.get("type").and_then(Value::as_str), Some("output_text") | Some("text")))
    .filter_map(|c| c.get("text")?.as_str())
    .collect();
  non_empty(texts.concat())
}

fn from_text_field(raw: &Value) -> Option<String> {
  non_empty(raw.get("text")?.as_str()?.to_string())
}

/// `outputs[*].text`, falling back to `outputs[*].content` when it is a string.
fn from_outputs(raw: &Value) -> Option<String> {
  raw.get("outputs")?
    .as_array()?
    .iter()
    .filter_map(|o| o.get("text").or_else(|| o.get("content"))?.as_str())
    .map(str::to_string)
    .find_map(non_empty)
}

fn from_bare_string(raw: &Value) -> Option<String> {
  non_empty(raw.as_str()?.to_string())
}

/// Step 1: first matching strategy wins.
pub fn extract_text(raw: &Value) -> Result<String> {
  for (name, extract) in EXTRACTORS {
    if let Some(text) = extract(raw) {
      debug!(target: "provider", strategy = *name, text_len = text.len(), "Extracted reply text");
      return Ok(text);
    }
  }
  warn!(target: "provider", raw = %trunc_for_log(&raw.to_string(), 300), "No text payload in provider reply");
  Err(QuizError::ProviderResponseShape { raw: raw.clone() })
}

/// Body of the first Markdown fence, without its language tag. An unclosed
/// fence runs to the end of the text.
fn fenced_block(text: &str) -> Option<&str> {
  let open = text.find("```")?;
  let body = text[open + 3..].trim_start_matches(|c: char| c.is_ascii_alphabetic());
  Some(body.find("```").map_or(body, |close| &body[..close]))
}

/// Step 2: keep only the fenced block when there is one, then drop any prose
/// still around the JSON object.
pub fn clean_payload(text: &str) -> String {
  let trimmed = fenced_block(text).unwrap_or(text).trim();
  if trimmed.starts_with('{') && trimmed.ends_with('}') {
    return trimmed.to_string();
  }
  match (trimmed.find('{'), trimmed.rfind('}')) {
    (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
    _ => trimmed.to_string(),
  }
}

fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
  names.iter().find_map(|n| obj.get(*n))
}

/// Integers, or floats with no fractional part (`1.0`).
fn as_index(v: &Value) -> Option<usize> {
  if let Some(i) = v.as_u64() {
    return Some(i as usize);
  }
  let f = v.as_f64()?;
  (f >= 0.0 && f.fract() == 0.0).then_some(f as usize)
}

/// Step 4.
fn validate_schema(parsed: Value) -> Result<Question> {
  let fail = |reason: &str, parsed: &Value| QuizError::SchemaValidation {
    reason: reason.to_string(),
    parsed: parsed.clone(),
  };

  if !parsed.is_object() {
    return Err(fail("reply is not a JSON object", &parsed));
  }

  let prompt = match field(&parsed, &["promptText", "question"]).and_then(Value::as_str) {
    Some(p) if !p.trim().is_empty() => p.trim().to_string(),
    _ => return Err(fail("promptText must be a non-empty string", &parsed)),
  };

  let options: Vec<String> = match field(&parsed, &["options", "answers"]).and_then(Value::as_array) {
    Some(items) => {
      let strings: Option<Vec<String>> = items.iter().map(|v| v.as_str().map(str::to_string)).collect();
      match strings {
        Some(s) => s,
        None => return Err(fail("options must all be strings", &parsed)),
      }
    }
    None => return Err(fail("options must be an array", &parsed)),
  };
  if options.len() != OPTION_COUNT {
    return Err(fail(&format!("options must have exactly {OPTION_COUNT} entries, got {}", options.len()), &parsed));
  }

  let correct = match field(&parsed, &["correctIndex", "correctAnswer"]).and_then(as_index) {
    Some(i) => i,
    None => return Err(fail("correctIndex must be a non-negative integer", &parsed)),
  };
  if correct >= options.len() {
    return Err(fail(&format!("correctIndex {correct} is out of range"), &parsed));
  }

  Ok(Question::new(prompt, options, correct))
}

/// Full pipeline. Never returns a partially filled question.
#[instrument(level = "debug", skip(raw))]
pub fn parse(raw: &Value) -> Result<Question> {
  let text = extract_text(raw)?;
  let cleaned = clean_payload(&text);
  let parsed: Value = serde_json::from_str(&cleaned).map_err(|e| QuizError::MalformedJson {
    message: e.to_string(),
    text: cleaned.clone(),
  })?;
  validate_schema(parsed)
}
