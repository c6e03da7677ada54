// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::chat_log::ChatLogRepository;
use crate::engine::{Engines, LlamaEngine, OpenAIEngine};
use crate::functions::{default_registry, FunctionRegistry};
use crate::models::{default_model, load_catalog};
use crate::session::ChatSession;
use crate::settings::Config;
use crate::types::AIModel;

/// Everything a session needs, built once from the loaded configuration.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<FunctionRegistry>,
    pub engines: Arc<Engines>,
    pub chat_log: Arc<ChatLogRepository>,
    pub models: Vec<AIModel>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        // Functions get a whole-request timeout. Completion streams may run
        // longer than that, so they only bound the connect phase.
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let streaming = reqwest::Client::builder().connect_timeout(timeout).build()?;

        let registry = Arc::new(default_registry(&config, http));
        let engines = Arc::new(Engines {
            openai: OpenAIEngine::from_config(&config, streaming.clone(), registry.clone()),
            llama: LlamaEngine::new(config.llama.clone(), streaming),
        });
        let chat_log = Arc::new(ChatLogRepository::new(&config.data_directory));
        let models = load_catalog(&config.data_directory);

        info!(
            data_directory = %config.data_directory.display(),
            models = models.len(),
            functions = registry.list().len(),
            has_token = config.api_token().is_some(),
            "Application state ready"
        );

        Ok(Self {
            config,
            registry,
            engines,
            chat_log,
            models,
        })
    }

    pub fn default_model(&self) -> Option<AIModel> {
        default_model(&self.models, self.config.default_model_name.as_deref())
    }

    /// A session on today's log, or `None` when no model is available.
    pub fn new_session(&self) -> Option<ChatSession> {
        let model = self.default_model()?;
        Some(ChatSession::new(
            self.engines.clone(),
            self.chat_log.clone(),
            model,
            self.config.prompt.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> Config {
        Config {
            data_directory: dir.to_path_buf(),
            default_model_name: Some("gpt-4".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_state_wires_catalog_and_registry() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(dir.path())).unwrap();

        assert_eq!(state.models.len(), 6);
        assert_eq!(state.registry.list().len(), 5);
        assert_eq!(state.default_model().unwrap().name(), "gpt-4");
        assert!(!state.engines.openai.has_client());
    }

    #[test]
    fn test_new_session_starts_from_todays_log() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(config(dir.path())).unwrap();

        let session = state.new_session().unwrap();

        assert_eq!(session.model().name(), "gpt-4");
        assert!(session.conversation().is_empty());
    }
}
