// src/error.rs

use thiserror::Error;

/// Failures while locating, reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to access settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures talking to a completion backend.
///
/// These never escape the engines: they are turned into a terminal
/// `CompletionStreamItem::Error` at the turn boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("OpenAI token is not available")]
    MissingApiToken,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Local model server error: {0}")]
    LocalServer(String),
}

/// Failures inside a function invocation.
///
/// The engine absorbs these into a Function-role transcript entry, using
/// [`FunctionError::kind`] as the failure label.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    MissingConfig(&'static str),
}

impl FunctionError {
    /// Short, stable label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            FunctionError::InvalidArguments(_) => "InvalidArguments",
            FunctionError::Http(e) => http_error_kind(e),
            FunctionError::Io(_) => "IoError",
            FunctionError::Api { .. } => "ApiError",
            FunctionError::Decode(_) => "DecodeError",
            FunctionError::MissingConfig(_) => "MissingConfig",
        }
    }
}

/// Classifies a reqwest failure the same way for every HTTP-backed function.
pub fn http_error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "HttpTimeout"
    } else if e.is_connect() {
        "HttpConnect"
    } else if e.is_status() {
        "HttpStatus"
    } else if e.is_decode() || e.is_body() {
        "HttpBody"
    } else if e.is_builder() {
        "HttpRequest"
    } else {
        "HttpError"
    }
}

/// Failures of the per-day conversation store.
#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("Failed to access chat log: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode chat log: {0}")]
    Json(#[from] serde_json::Error),

    /// The file on disk is larger than what would replace it.
    #[error("Existing chat log is larger than the new content ({existing} > {new} bytes); skipping save")]
    SizeAnomaly { existing: u64, new: u64 },
}

/// Startup failures of the terminal client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Terminal IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No models available")]
    NoModels,
}
