// src/settings.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::atomic_write::write_atomic;
use crate::error::ConfigError;

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an assistant helping software developers.

Rules:
- Use Markdown for formatting.
- Be concise.
- If you don't know, say "I don't know"."#;

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSearchConfig {
    pub api_key: Option<String>,
    pub search_engine_id: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LlamaConfig {
    pub server_path: PathBuf,
    pub host: String,
    pub base_port: u16,
    pub context_size: u32,
    pub startup_timeout_secs: u64,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            server_path: PathBuf::from("llama-server"),
            host: "127.0.0.1".to_string(),
            base_port: 8080,
            context_size: 8192,
            startup_timeout_secs: 120,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_model_name: Option<String>,
    pub prompt: String,
    pub api_token: Option<String>,
    pub google_search_config: GoogleSearchConfig,
    pub data_directory: PathBuf,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub llama: LlamaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model_name: None,
            prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            api_token: None,
            google_search_config: GoogleSearchConfig::default(),
            data_directory: default_data_directory(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 120,
            llama: LlamaConfig::default(),
        }
    }
}

impl Config {
    /// The API token, if one is configured and non-empty.
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

fn default_data_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ReflectAI")
}

/// Get the path to the settings file (~/.config/reflect-ai/config.json)
pub fn get_settings_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("reflect-ai").join("config.json"))
}

/// Load settings from the default location.
pub fn load_settings() -> Result<Config, ConfigError> {
    load_settings_from(&get_settings_path()?)
}

/// Load settings from `path`, falling back to defaults when it does not exist.
pub fn load_settings_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!("No settings at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;

    info!("Loaded settings from {}", path.display());
    Ok(config)
}

/// Save settings to the default location.
pub fn save_settings(config: &Config) -> Result<(), ConfigError> {
    save_settings_to(config, &get_settings_path()?)
}

pub fn save_settings_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let content = serde_json::to_string_pretty(config)?;
    write_atomic(path, content.as_bytes())?;

    info!("Saved settings to {}", path.display());
    Ok(())
}

/// Get the default system prompt
pub fn get_default_system_prompt() -> &'static str {
    DEFAULT_SYSTEM_PROMPT
}
