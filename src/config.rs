//! Loading game configuration (prompt, provider tuning, transition delays) from TOML,
//! plus the environment-level settings the service reads at startup.
//!
//! Every section is optional; anything missing falls back to `Default`.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ModelId, Secret};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GameConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub provider: ProviderTuning,
  #[serde(default)]
  pub timing: Timing,
}

/// Instruction sent to the provider. Placeholders: `{topic}`, `{difficulty}`, `{level}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_template: "Generate one multiple-choice trivia question about {topic} at {difficulty} difficulty \
(level {level} of 20). Reply ONLY with a JSON object, no text before or after it, in exactly this shape: \
{\"promptText\": \"the question\", \"options\": [\"option 1\", \"option 2\", \"option 3\", \"option 4\"], \
\"correctIndex\": 0}. The options array must contain exactly 4 strings and correctIndex must be the \
zero-based index of the correct option."
        .into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProviderTuning {
  pub temperature: f32,
  pub max_output_tokens: u32,
  pub timeout_secs: u64,
}

impl Default for ProviderTuning {
  fn default() -> Self {
    Self { temperature: 0.8, max_output_tokens: 500, timeout_secs: 30 }
  }
}

/// Delays before the post-answer level transition is applied.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
  pub correct_delay_ms: u64,
  pub incorrect_delay_ms: u64,
}

impl Default for Timing {
  fn default() -> Self {
    Self { correct_delay_ms: 2000, incorrect_delay_ms: 2500 }
  }
}

impl Timing {
  pub fn correct_delay(&self) -> Duration {
    Duration::from_millis(self.correct_delay_ms)
  }

  pub fn incorrect_delay(&self) -> Duration {
    Duration::from_millis(self.incorrect_delay_ms)
  }
}

/// Environment-derived settings for the provider connection.
#[derive(Clone, Debug)]
pub struct ProviderEnv {
  pub base_url: String,
  pub default_model: ModelId,
  pub api_key: Option<Secret>,
}

impl ProviderEnv {
  /// GEMINI_BASE_URL, GEMINI_MODEL, GEMINI_API_KEY.
  pub fn from_env() -> Self {
    let base_url = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let default_model = std::env::var("GEMINI_MODEL")
      .ok()
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_MODEL.into());
    let api_key = std::env::var("GEMINI_API_KEY").ok().and_then(Secret::new);
    Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      default_model: ModelId::new(default_model),
      api_key,
    }
  }
}

pub fn parse_game_config(s: &str) -> Result<GameConfig, toml::de::Error> {
  toml::from_str::<GameConfig>(s)
}

/// Attempt to load `GameConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns defaults.
pub fn load_game_config_from_env() -> GameConfig {
  let Ok(path) = std::env::var("QUIZ_CONFIG_PATH") else {
    return GameConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_game_config(&s) {
      Ok(cfg) => {
        info!(target: "trivia_ladder", %path, "Loaded game config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "trivia_ladder", %path, error = %e, "Failed to parse TOML config; using defaults");
        GameConfig::default()
      }
    },
    Err(e) => {
      error!(target: "trivia_ladder", %path, error = %e, "Failed to read TOML config file; using defaults");
      GameConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = parse_game_config("").unwrap();
    assert_eq!(cfg.provider.temperature, 0.8);
    assert_eq!(cfg.provider.max_output_tokens, 500);
    assert_eq!(cfg.timing.correct_delay(), Duration::from_millis(2000));
    assert_eq!(cfg.timing.incorrect_delay(), Duration::from_millis(2500));
    assert!(cfg.prompts.question_template.contains("{topic}"));
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg = parse_game_config(
      r#"
[timing]
correct_delay_ms = 10

[provider]
timeout_secs = 5
"#,
    )
    .unwrap();
    assert_eq!(cfg.timing.correct_delay_ms, 10);
    assert_eq!(cfg.timing.incorrect_delay_ms, 2500);
    assert_eq!(cfg.provider.timeout_secs, 5);
    assert_eq!(cfg.provider.temperature, 0.8);
  }
}
