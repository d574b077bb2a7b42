//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Driving the game session (topic selection, answers, restart)
//!   - Refreshing and selecting provider models
//!   - Updating the API key

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{ModelId, Topic};
use crate::error::Result;
use crate::session::{GameSnapshot, Outcome};
use crate::state::AppState;

#[instrument(level = "info", skip(state), fields(%topic))]
pub async fn do_select_topic(state: &AppState, topic: Topic) -> GameSnapshot {
  let origin = state.session.select_topic(topic).await;
  info!(target: "game", ?origin, "Topic selection handled");
  state.session.snapshot().await
}

#[instrument(level = "info", skip(state))]
pub async fn do_submit_answer(state: &AppState, index: usize, question_id: Option<Uuid>) -> (Option<Outcome>, GameSnapshot) {
  let outcome = state.session.submit_answer(index, question_id).await;
  (outcome, state.session.snapshot().await)
}

#[instrument(level = "info", skip(state))]
pub async fn do_restart(state: &AppState) -> GameSnapshot {
  state.session.restart().await;
  state.session.snapshot().await
}

/// Refresh the model list from the provider; returns it with the resulting selection.
#[instrument(level = "info", skip(state))]
pub async fn do_list_models(state: &AppState) -> Result<(Vec<ModelId>, ModelId)> {
  let credential = state.current_credential().await;
  let models = state.registry.list_available_models(credential.as_ref()).await?;
  Ok((models, state.selected_model().await))
}

#[instrument(level = "info", skip(state), fields(model = %model))]
pub async fn do_select_model(state: &AppState, model: ModelId) -> (Vec<ModelId>, ModelId) {
  state.registry.select(model).await;
  (state.registry.available().await, state.selected_model().await)
}

#[instrument(level = "info", skip_all)]
pub async fn do_set_credential(state: &AppState, api_key: &str) -> bool {
  state.set_credential(api_key).await
}
