// src/engine/llama.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{CompletionClient, OpenAIClient};
use super::openai::text_deltas;
use super::{error_stream, CompletionStream, Progress};
use crate::error::EngineError;
use crate::server::wait_for_server_ready;
use crate::settings::LlamaConfig;
use crate::types::{ChatCompletionRequest, ChatMessage, LlamaModel};

/// A running `llama-server` process. Killed when dropped.
struct LlamaServer {
    child: Child,
    client: OpenAIClient,
}

/// Local backend: one `llama-server` per model file, started on first use.
///
/// Servers stay cached for the engine's lifetime. An entry is only replaced
/// when its process has exited.
pub struct LlamaEngine {
    config: LlamaConfig,
    http: reqwest::Client,
    servers: Mutex<HashMap<PathBuf, LlamaServer>>,
    next_port: AtomicU16,
}

impl LlamaEngine {
    pub fn new(config: LlamaConfig, http: reqwest::Client) -> Self {
        let next_port = AtomicU16::new(config.base_port);
        Self {
            config,
            http,
            servers: Mutex::new(HashMap::new()),
            next_port,
        }
    }

    /// Stream a reply from the local model.
    ///
    /// Local models get the system prompt and the latest message only, with
    /// no functions attached.
    pub async fn generate(
        &self,
        model: &LlamaModel,
        system_prompt: &str,
        messages: &[ChatMessage],
        progress: Progress<'_>,
    ) -> CompletionStream {
        let client = match self.server_for(model, progress).await {
            Ok(client) => client,
            Err(e) => {
                warn!(model = %model.name, error = %e, "Local model unavailable");
                return error_stream(e.to_string());
            }
        };

        progress(&format!("Calling local model: {}", model.name));
        let request = ChatCompletionRequest::streaming(&model.name, local_prompt(system_prompt, messages));
        match client.stream_chat(request).await {
            Ok(chunks) => text_deltas(chunks),
            Err(e) => error_stream(e.to_string()),
        }
    }

    async fn server_for(&self, model: &LlamaModel, progress: Progress<'_>) -> Result<OpenAIClient, EngineError> {
        let mut servers = self.servers.lock().await;

        if let Some(server) = servers.get_mut(&model.model_path) {
            match server.child.try_wait() {
                Ok(None) => return Ok(server.client.clone()),
                Ok(Some(status)) => warn!(model = %model.name, %status, "Local server exited; restarting"),
                Err(e) => warn!(model = %model.name, error = %e, "Local server state unknown; restarting"),
            }
            servers.remove(&model.model_path);
        }

        progress(&format!("Starting local model: {}", model.name));
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        let server = self.spawn(model, port).await?;
        let client = server.client.clone();
        servers.insert(model.model_path.clone(), server);
        Ok(client)
    }

    async fn spawn(&self, model: &LlamaModel, port: u16) -> Result<LlamaServer, EngineError> {
        info!(model = %model.name, port, "Starting llama-server");

        let mut child = Command::new(&self.config.server_path)
            .arg("-m")
            .arg(&model.model_path)
            .args(["--host", &self.config.host])
            .args(["--port", &port.to_string()])
            .args(["--ctx-size", &self.config.context_size.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::LocalServer(format!(
                    "failed to start {}: {}",
                    self.config.server_path.display(),
                    e
                ))
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, model.name.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, model.name.clone()));
        }

        let url = format!("http://{}:{}", self.config.host, port);
        // On failure `child` is dropped here, which kills the process.
        wait_for_server_ready(&self.http, &url, self.config.startup_timeout_secs).await?;

        Ok(LlamaServer {
            child,
            client: OpenAIClient::new(self.http.clone(), format!("{}/v1", url), None),
        })
    }
}

fn local_prompt(system_prompt: &str, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut prompt = vec![ChatMessage::system(system_prompt)];
    prompt.extend(messages.last().cloned());
    prompt
}

async fn forward_output<R>(reader: R, model: String)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.to_ascii_lowercase().contains("error") {
            warn!(target: "llama-server", model = %model, "{}", line);
        } else {
            debug!(target: "llama-server", model = %model, "{}", line);
        }
    }
}
