//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::{info, instrument};

use crate::domain::Topic;
use crate::error::QuizError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for QuizError {
  fn into_response(self) -> Response {
    let status = match &self {
      QuizError::MissingCredential => StatusCode::BAD_REQUEST,
      _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorOut { error: self.to_string(), kind: self.kind() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_topics() -> impl IntoResponse {
  Json(TopicsOut { topics: Topic::ALL.to_vec() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.session.snapshot().await)
}

#[instrument(level = "info", skip(state), fields(topic = %body.topic))]
pub async fn http_post_topic(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TopicIn>,
) -> impl IntoResponse {
  let snap = do_select_topic(&state, body.topic).await;
  info!(target: "game", phase = ?snap.phase, level = snap.level, "HTTP topic served");
  Json(snap)
}

#[instrument(level = "info", skip(state), fields(index = body.index))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> impl IntoResponse {
  let (outcome, snap) = do_submit_answer(&state, body.index, body.question_id).await;
  info!(target: "game", accepted = outcome.is_some(), ?outcome, "HTTP submit_answer evaluated");
  Json(AnswerOut { accepted: outcome.is_some(), outcome, state: snap })
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(do_restart(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_models(State(state): State<Arc<AppState>>) -> Result<Json<ModelsOut>, QuizError> {
  let (models, selected) = do_list_models(&state).await?;
  Ok(Json(ModelsOut { models, selected }))
}

#[instrument(level = "info", skip(state), fields(model = %body.model))]
pub async fn http_put_selected_model(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ModelSelectIn>,
) -> impl IntoResponse {
  let (models, selected) = do_select_model(&state, body.model).await;
  Json(ModelsOut { models, selected })
}

#[instrument(level = "info", skip_all)]
pub async fn http_put_credential(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CredentialIn>,
) -> impl IntoResponse {
  let present = do_set_credential(&state, &body.api_key).await;
  Json(CredentialOut { present })
}
