//! Error kinds surfaced by the provider pipeline.
//!
//! All of them are recoverable at the session boundary: the session turns them
//! into a status message and the player can pick a topic again.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuizError>;

#[derive(Error, Debug)]
pub enum QuizError {
  /// No API key configured; nothing was sent over the network.
  #[error("No API key configured. Set one before requesting questions or models.")]
  MissingCredential,

  #[error("Provider call failed: {message}")]
  ProviderCall { message: String },

  /// The reply succeeded but none of the known locations held any text.
  #[error("Provider reply did not contain any generated text")]
  ProviderResponseShape { raw: Value },

  #[error("Provider reply is not valid JSON ({message})")]
  MalformedJson { message: String, text: String },

  #[error("Provider reply is missing required question fields: {reason}")]
  SchemaValidation { reason: String, parsed: Value },
}

impl QuizError {
  pub fn provider_call(message: impl Into<String>) -> Self {
    QuizError::ProviderCall { message: message.into() }
  }

  /// Short stable tag, used in logs and error payloads.
  pub fn kind(&self) -> &'static str {
    match self {
      QuizError::MissingCredential => "missing_credential",
      QuizError::ProviderCall { .. } => "provider_call",
      QuizError::ProviderResponseShape { .. } => "provider_response_shape",
      QuizError::MalformedJson { .. } => "malformed_json",
      QuizError::SchemaValidation { .. } => "schema_validation",
    }
  }

  /// The payload carried for diagnostics, when there is one.
  pub fn diagnostic(&self) -> Option<String> {
    match self {
      QuizError::ProviderResponseShape { raw } => Some(raw.to_string()),
      QuizError::MalformedJson { text, .. } => Some(text.clone()),
      QuizError::SchemaValidation { parsed, .. } => Some(parsed.to_string()),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for QuizError {
  fn from(e: reqwest::Error) -> Self {
    QuizError::provider_call(e.to_string())
  }
}
