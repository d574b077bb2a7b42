//! Available provider models and the one currently selected for question requests.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::domain::{ModelId, Secret};
use crate::error::{QuizError, Result};
use crate::provider::{exchange, HttpMethod, ProviderTransport, TransportRequest};

#[derive(Deserialize)]
struct ModelList {
  #[serde(default)]
  models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
  name: String,
}

pub struct ModelRegistry {
  transport: Arc<dyn ProviderTransport>,
  base_url: String,
  available: RwLock<Vec<ModelId>>,
  selected: RwLock<ModelId>,
}

impl ModelRegistry {
  pub fn new(transport: Arc<dyn ProviderTransport>, base_url: impl Into<String>, default_model: ModelId) -> Self {
    Self {
      transport,
      base_url: base_url.into(),
      available: RwLock::new(Vec::new()),
      selected: RwLock::new(default_model),
    }
  }

  pub async fn selected(&self) -> ModelId {
    self.selected.read().await.clone()
  }

  pub async fn available(&self) -> Vec<ModelId> {
    self.available.read().await.clone()
  }

  /// The id is opaque; it does not have to come from the last listing.
  #[instrument(level = "info", skip(self), fields(model = %model))]
  pub async fn select(&self, model: ModelId) {
    *self.selected.write().await = model;
  }

  /// Enumerate models in provider order. The first listed id becomes the selection.
  #[instrument(level = "info", skip_all)]
  pub async fn list_available_models(&self, credential: Option<&Secret>) -> Result<Vec<ModelId>> {
    let credential = credential.ok_or(QuizError::MissingCredential)?;
    let req = TransportRequest {
      method: HttpMethod::Get,
      url: format!("{}/models", self.base_url),
      body: None,
    };
    let raw = exchange(self.transport.as_ref(), credential, req).await.inspect_err(|e| {
      warn!(target: "provider", error = %e, "Model listing failed");
    })?;

    let models = parse_model_list(raw)?;
    if let Some(first) = models.first() {
      *self.selected.write().await = first.clone();
    }
    *self.available.write().await = models.clone();
    let selected = self.selected().await;
    info!(target: "provider", count = models.len(), %selected, "Model list refreshed");
    Ok(models)
  }
}

fn parse_model_list(raw: Value) -> Result<Vec<ModelId>> {
  let list: ModelList = serde_json::from_value(raw)
    .map_err(|e| QuizError::provider_call(format!("unexpected model list reply: {e}")))?;
  Ok(list
    .models
    .into_iter()
    .map(|m| ModelId::new(m.name.strip_prefix("models/").unwrap_or(&m.name)))
    .collect())
}
