//! Application state: the in-memory session store, the content generator, and engine settings.
//!
//! Sessions are keyed by UUID. Idle sessions older than the configured TTL are
//! torn down and dropped whenever a new journey is started.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{load_engine_config_from_env, EngineSettings};
use crate::controller::JourneyController;
use crate::generator::{ContentGenerator, DisabledGenerator};
use crate::openai::OpenAI;
use crate::session::LiveSession;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, Arc<LiveSession>>>>,
    pub generator: Arc<dyn ContentGenerator>,
    pub settings: EngineSettings,
}

impl AppState {
    /// Build state from env: load config, init OpenAI if a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_engine_config_from_env().unwrap_or_default();

        let generator: Arc<dyn ContentGenerator> = match OpenAI::from_env(cfg.prompts.clone()) {
            Some(oa) => {
                info!(target: "lingo_journey", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "lingo_journey", "OpenAI disabled (no OPENAI_API_KEY). Serving fallback journeys.");
                Arc::new(DisabledGenerator)
            }
        };
        info!(
            target: "lingo_journey",
            advance_delay_ms = cfg.engine.advance_delay_ms,
            generation_timeout_secs = cfg.engine.generation_timeout_secs,
            session_ttl_secs = cfg.engine.session_ttl_secs,
            "Engine settings"
        );

        Self::with_generator(generator, cfg.engine)
    }

    pub fn with_generator(generator: Arc<dyn ContentGenerator>, settings: EngineSettings) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), generator, settings }
    }

    /// Register a fresh session in Loading state.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> Arc<LiveSession> {
        let id = Uuid::new_v4().to_string();
        let controller = JourneyController::new(self.generator.clone(), self.settings.generation_timeout());
        let session = LiveSession::new(id.clone(), controller, self.settings.advance_delay());
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    /// Look a session up and mark it as recently used.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_session(&self, id: &str) -> Option<Arc<LiveSession>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Tear down and forget a session. Returns false if the id was unknown.
    #[instrument(level = "info", skip(self))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.teardown().await;
                info!(target: "lingo_journey", session = %id, "Session ended");
                true
            }
            None => false,
        }
    }

    /// Drop sessions idle for longer than the TTL; returns how many went.
    #[instrument(level = "debug", skip(self))]
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.settings.session_ttl();
        let expired: Vec<Arc<LiveSession>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.idle_for() > ttl)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &expired {
            session.teardown().await;
        }
        if !expired.is_empty() {
            info!(target: "lingo_journey", purged = expired.len(), "Purged idle sessions");
        }
        expired.len()
    }
}
