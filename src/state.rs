//! Application state: the single game session, the model registry, and the API key.
//!
//! This module owns:
//!   - the game session (level/score state machine)
//!   - the model registry (available + selected model)
//!   - the credential, settable at runtime and never logged
//!   - the wiring that feeds the selected model and key into each question request

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::{load_game_config_from_env, GameConfig, ProviderEnv};
use crate::domain::{ModelId, Question, Secret, Topic};
use crate::error::Result;
use crate::provider::{ProviderTransport, QuestionProvider, ReqwestTransport};
use crate::registry::ModelRegistry;
use crate::session::{GameSession, QuestionSource};

pub type CredentialSlot = Arc<RwLock<Option<Secret>>>;

/// Question source backed by the real provider: reads the selected model and the
/// current key at request time.
pub struct LiveQuestionSource {
    provider: QuestionProvider,
    registry: Arc<ModelRegistry>,
    credential: CredentialSlot,
}

#[async_trait]
impl QuestionSource for LiveQuestionSource {
    async fn fetch_question(&self, topic: Topic, level: u32) -> Result<Question> {
        let model = self.registry.selected().await;
        let credential = self.credential.read().await.clone();
        self.provider
            .request_question(topic, level, &model, credential.as_ref())
            .await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session: GameSession,
    pub registry: Arc<ModelRegistry>,
    pub credential: CredentialSlot,
}

impl AppState {
    /// Build state from env: load config, build the HTTP transport, seed the key.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self> {
        let cfg = load_game_config_from_env();
        let env = ProviderEnv::from_env();
        let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(
            cfg.provider.timeout_secs,
        ))?);

        info!(
            target: "trivia_ladder",
            base_url = %env.base_url,
            default_model = %env.default_model,
            has_api_key = env.api_key.is_some(),
            "Provider configured"
        );
        Ok(Self::with_transport(cfg, env, transport))
    }

    /// Same wiring over any transport.
    pub fn with_transport(cfg: GameConfig, env: ProviderEnv, transport: Arc<dyn ProviderTransport>) -> Self {
        let registry = Arc::new(ModelRegistry::new(
            transport.clone(),
            env.base_url.clone(),
            env.default_model.clone(),
        ));
        let credential: CredentialSlot = Arc::new(RwLock::new(env.api_key.clone()));
        let provider = QuestionProvider::new(transport, env.base_url, cfg.prompts, cfg.provider);
        let source = Arc::new(LiveQuestionSource {
            provider,
            registry: registry.clone(),
            credential: credential.clone(),
        });

        Self {
            session: GameSession::new(source, cfg.timing),
            registry,
            credential,
        }
    }

    pub async fn current_credential(&self) -> Option<Secret> {
        self.credential.read().await.clone()
    }

    /// Blank input clears the key.
    #[instrument(level = "info", skip_all)]
    pub async fn set_credential(&self, raw: &str) -> bool {
        let secret = Secret::new(raw);
        let present = secret.is_some();
        *self.credential.write().await = secret;
        info!(target: "trivia_ladder", present, "API key updated");
        present
    }

    pub async fn selected_model(&self) -> ModelId {
        self.registry.selected().await
    }
}
