// src/lib.rs

pub mod atomic_write;
pub mod chat_log;
pub mod engine;
pub mod error;
pub mod functions;
pub mod logging;
pub mod models;
pub mod repl;
pub mod server;
pub mod session;
pub mod settings;
pub mod state;
pub mod tokenizer;
pub mod types;

use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

// ==================== App Entry Point ====================

pub async fn run() -> Result<(), AppError> {
    let config = settings::load_settings()?;
    info!(
        path = %settings::get_settings_path()?.display(),
        "Loaded settings"
    );

    let state = AppState::new(config)?;
    repl::run_repl(state).await
}
