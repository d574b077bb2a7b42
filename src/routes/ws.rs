//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. Besides direct replies, every session change is
//! pushed as a `snapshot` message, so clients see loading and delayed level
//! transitions without polling.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "trivia_ladder", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

fn encode(msg: &ServerWsMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "trivia_ladder", "WebSocket connected");
  let mut updates = state.session.subscribe();

  let hello = ServerWsMessage::Snapshot { state: updates.borrow_and_update().clone() };
  if socket.send(Message::Text(encode(&hello))).await.is_err() {
    return;
  }

  loop {
    tokio::select! {
      changed = updates.changed() => {
        if changed.is_err() {
          break;
        }
        let snap = updates.borrow_and_update().clone();
        if let Err(e) = socket.send(Message::Text(encode(&ServerWsMessage::Snapshot { state: snap }))).await {
          error!(target: "trivia_ladder", error = %e, "WS send error");
          break;
        }
      }
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize response.
            let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "trivia_ladder", kind = incoming.kind(), "WS received");
                handle_client_ws(incoming, &state).await
              }
              Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
            };

            if let Some(reply) = reply_msg {
              if let Err(e) = socket.send(Message::Text(encode(&reply))).await {
                error!(target: "trivia_ladder", error = %e, "WS send error");
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
    }
  }
  info!(target: "trivia_ladder", "WebSocket disconnected");
}

/// Session changes arrive through the snapshot stream, so those commands need no direct reply.
#[instrument(level = "info", skip_all, fields(kind = msg.kind()))]
async fn handle_client_ws(msg: ClientWsMessage, state: &Arc<AppState>) -> Option<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => Some(ServerWsMessage::Pong),

    ClientWsMessage::GetState => Some(ServerWsMessage::Snapshot { state: state.session.snapshot().await }),

    // Runs detached so this loop keeps pushing the loading snapshot meanwhile.
    ClientWsMessage::SelectTopic { topic } => {
      let state = state.clone();
      tokio::spawn(async move { do_select_topic(&state, topic).await });
      None
    }

    ClientWsMessage::SubmitAnswer { index, question_id } => {
      let (outcome, _) = do_submit_answer(state, index, question_id).await;
      Some(ServerWsMessage::AnswerResult { accepted: outcome.is_some(), outcome })
    }

    ClientWsMessage::Restart => {
      do_restart(state).await;
      None
    }

    ClientWsMessage::ListModels => Some(match do_list_models(state).await {
      Ok((models, selected)) => ServerWsMessage::Models { models, selected },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    }),

    ClientWsMessage::SelectModel { model } => {
      let (models, selected) = do_select_model(state, model).await;
      Some(ServerWsMessage::Models { models, selected })
    }

    ClientWsMessage::SetCredential { api_key } => {
      let present = do_set_credential(state, &api_key).await;
      Some(ServerWsMessage::Credential { present })
    }
  }
}
