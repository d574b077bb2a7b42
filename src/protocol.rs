//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ModelId, Topic};
use crate::session::{GameSnapshot, Outcome};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    SelectTopic {
        topic: Topic,
    },
    SubmitAnswer {
        index: usize,
        #[serde(default, rename = "questionId")]
        question_id: Option<Uuid>,
    },
    Restart,
    ListModels,
    SelectModel {
        model: ModelId,
    },
    SetCredential {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

impl ClientWsMessage {
    /// Log-safe name; never includes payloads such as the API key.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::GetState => "get_state",
            ClientWsMessage::SelectTopic { .. } => "select_topic",
            ClientWsMessage::SubmitAnswer { .. } => "submit_answer",
            ClientWsMessage::Restart => "restart",
            ClientWsMessage::ListModels => "list_models",
            ClientWsMessage::SelectModel { .. } => "select_model",
            ClientWsMessage::SetCredential { .. } => "set_credential",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Snapshot {
        state: GameSnapshot,
    },
    AnswerResult {
        accepted: bool,
        outcome: Option<Outcome>,
    },
    Models {
        models: Vec<ModelId>,
        selected: ModelId,
    },
    Credential {
        present: bool,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct TopicIn {
    pub topic: Topic,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub index: usize,
    #[serde(default, rename = "questionId")]
    pub question_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    pub accepted: bool,
    pub outcome: Option<Outcome>,
    pub state: GameSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ModelsOut {
    pub models: Vec<ModelId>,
    pub selected: ModelId,
}

#[derive(Debug, Deserialize)]
pub struct ModelSelectIn {
    pub model: ModelId,
}

#[derive(Debug, Deserialize)]
pub struct CredentialIn {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialOut {
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TopicsOut {
    pub topics: Vec<Topic>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
