//! Minimal client for the generative question provider.
//!
//! One `generateContent` call per question; no retries. The HTTP exchange itself
//! sits behind `ProviderTransport` so the pipeline can run against a fake.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::config::{Prompts, ProviderTuning};
use crate::difficulty::{difficulty_for, MAX_LEVEL};
use crate::domain::{ModelId, Question, Secret, Topic};
use crate::error::{QuizError, Result};
use crate::util::{fill_template, trunc_for_log};
use crate::validator;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
  Get,
  Post,
}

#[derive(Clone, Debug)]
pub struct TransportRequest {
  pub method: HttpMethod,
  pub url: String,
  pub body: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct TransportReply {
  pub status: u16,
  pub body: String,
}

impl TransportReply {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// A single authenticated HTTP exchange with the provider.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
  async fn send(&self, credential: &Secret, req: TransportRequest) -> Result<TransportReply>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl ProviderTransport for ReqwestTransport {
  async fn send(&self, credential: &Secret, req: TransportRequest) -> Result<TransportReply> {
    let builder = match req.method {
      HttpMethod::Get => self.client.get(&req.url),
      HttpMethod::Post => self.client.post(&req.url),
    };
    let mut builder = builder
      .header(USER_AGENT, "trivia-ladder/0.1")
      .header(API_KEY_HEADER, credential.expose());
    if let Some(body) = &req.body {
      builder = builder.header(CONTENT_TYPE, "application/json").json(body);
    }

    let res = builder.send().await?;
    let status = res.status().as_u16();
    let body = res.text().await?;
    Ok(TransportReply { status, body })
  }
}

/// Send one request and turn the reply into JSON, or into a `ProviderCall` error.
/// A successful body that is not JSON is returned as a JSON string.
pub(crate) async fn exchange(
  transport: &dyn ProviderTransport,
  credential: &Secret,
  req: TransportRequest,
) -> Result<Value> {
  let reply = transport.send(credential, req).await?;
  if !reply.is_success() {
    let msg = extract_provider_error(&reply.body).unwrap_or(reply.body);
    return Err(QuizError::provider_call(format!("HTTP {}: {}", reply.status, msg)));
  }
  Ok(serde_json::from_str::<Value>(&reply.body).unwrap_or(Value::String(reply.body)))
}

/// Try to extract a clean error message from the provider error body.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

/// Issues question requests for a given topic/level.
#[derive(Clone)]
pub struct QuestionProvider {
  transport: Arc<dyn ProviderTransport>,
  base_url: String,
  prompts: Prompts,
  tuning: ProviderTuning,
}

impl QuestionProvider {
  pub fn new(transport: Arc<dyn ProviderTransport>, base_url: impl Into<String>, prompts: Prompts, tuning: ProviderTuning) -> Self {
    Self { transport, base_url: base_url.into(), prompts, tuning }
  }

  pub fn instruction(&self, topic: Topic, level: u32) -> String {
    let difficulty = difficulty_for(level);
    fill_template(
      &self.prompts.question_template,
      &[
        ("topic", topic.prompt_name()),
        ("difficulty", difficulty.prompt_name()),
        ("level", &level.min(MAX_LEVEL).to_string()),
      ],
    )
  }

  fn build_request(&self, topic: Topic, level: u32, model: &ModelId) -> Result<TransportRequest> {
    let req = GenerateContentRequest {
      contents: vec![ContentReq { parts: vec![PartReq { text: self.instruction(topic, level) }] }],
      generation_config: GenerationConfig {
        temperature: self.tuning.temperature,
        max_output_tokens: self.tuning.max_output_tokens,
      },
    };
    let body = serde_json::to_value(&req).map_err(|e| QuizError::provider_call(e.to_string()))?;
    Ok(TransportRequest {
      method: HttpMethod::Post,
      url: format!("{}/models/{}:generateContent", self.base_url, model),
      body: Some(body),
    })
  }

  /// One attempt. Provider and validation failures are returned unchanged.
  #[instrument(level = "info", skip_all, fields(%topic, lvl = level, %model, difficulty = %difficulty_for(level)))]
  pub async fn request_question(
    &self,
    topic: Topic,
    level: u32,
    model: &ModelId,
    credential: Option<&Secret>,
  ) -> Result<Question> {
    let credential = credential.ok_or(QuizError::MissingCredential)?;
    let req = self.build_request(topic, level, model)?;

    let start = Instant::now();
    let result = exchange(self.transport.as_ref(), credential, req).await;
    let elapsed = start.elapsed();

    let raw = match result {
      Ok(raw) => {
        info!(target: "provider", ?elapsed, "Model response received successfully");
        raw
      }
      Err(e) => {
        error!(target: "provider", ?elapsed, error = %e, "Model call failed during question generation");
        return Err(e);
      }
    };

    let question = validator::parse(&raw).inspect_err(|e| {
      let payload = e.diagnostic().unwrap_or_default();
      error!(target: "provider", kind = e.kind(), error = %e, payload = %trunc_for_log(&payload, 300), "Reply rejected");
    })?;

    info!(
      target: "provider",
      question_id = %question.id,
      prompt_preview = %question.prompt_text.chars().take(40).collect::<String>(),
      "Question successfully generated"
    );
    Ok(question)
  }
}

// --- generateContent DTOs ---

#[derive(Serialize)]
struct GenerateContentRequest {
  contents: Vec<ContentReq>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
}
#[derive(Serialize)]
struct ContentReq { parts: Vec<PartReq> }
#[derive(Serialize)]
struct PartReq { text: String }
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  max_output_tokens: u32,
}
