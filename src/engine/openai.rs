// src/engine/openai.rs

use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use tracing::{info, warn};

use super::client::{CompletionClient, OpenAIClient};
use super::peek::Peeked;
use super::window::{remaining_tokens, select_window};
use super::{error_stream, CompletionStream, CompletionStreamItem, Progress};
use crate::error::EngineError;
use crate::functions::FunctionRegistry;
use crate::settings::Config;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest, ChatEntry, ChatMessage, OpenAIModel};

/// The remote completion engine.
///
/// One turn is at most two completion calls: the first with the function
/// catalog attached, and a follow-up without functions when the model asked
/// for a non-terminal function.
pub struct OpenAIEngine {
    registry: Arc<FunctionRegistry>,
    client: Option<Arc<dyn CompletionClient>>,
}

impl OpenAIEngine {
    pub fn new(registry: Arc<FunctionRegistry>, client: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { registry, client }
    }

    /// Engine talking to `config.api_base_url`. Without a token every turn fails fast.
    pub fn from_config(config: &Config, http: reqwest::Client, registry: Arc<FunctionRegistry>) -> Self {
        let client = config.api_token().map(|token| {
            Arc::new(OpenAIClient::new(
                http,
                config.api_base_url.clone(),
                Some(token.to_string()),
            )) as Arc<dyn CompletionClient>
        });
        Self::new(registry, client)
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub async fn generate(
        &self,
        model: &OpenAIModel,
        system_prompt: &str,
        messages: &[ChatMessage],
        progress: Progress<'_>,
    ) -> CompletionStream {
        let Some(client) = self.client.as_deref() else {
            return error_stream(EngineError::MissingApiToken.to_string());
        };

        match self
            .run_turn(client, model, system_prompt, messages, progress)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(model = model.name(), error = %e, "Completion failed");
                error_stream(e.to_string())
            }
        }
    }

    async fn run_turn(
        &self,
        client: &dyn CompletionClient,
        model: &OpenAIModel,
        system_prompt: &str,
        messages: &[ChatMessage],
        progress: Progress<'_>,
    ) -> Result<CompletionStream, EngineError> {
        let count = |m: &ChatMessage| model.count_tokens(&m.content);

        let remaining = remaining_tokens(model.max_tokens(), model.count_tokens(system_prompt));
        let window = select_window(messages, remaining, count);

        info!(
            model = model.name(),
            selected = window.len(),
            total = messages.len(),
            remaining,
            "Calling OpenAI API"
        );
        progress(&format!(
            "Calling OpenAI API: {}(using {} messages)",
            model.name(),
            window.len()
        ));

        let request = ChatCompletionRequest::streaming(
            model.model_id(),
            with_system_prompt(system_prompt, window),
        )
        .with_functions(self.registry.definitions());
        let mut chunks = Peeked::peek(client.stream_chat(request).await?).await;

        let function_name = match chunks.first() {
            Some(Ok(chunk)) => chunk
                .function_call()
                .map(|call| call.name.clone().unwrap_or_default()),
            _ => None,
        };
        let Some(name) = function_name else {
            return Ok(text_deltas(chunks));
        };

        // The head chunk is yielded again here, so its fragment is included.
        let mut arguments = String::new();
        while let Some(chunk) = chunks.next().await {
            arguments.push_str(chunk?.function_arguments());
        }

        info!(function = %name, arguments = %arguments, "Model requested function");
        progress(&format!("Running function: {}: {}", name, arguments));

        let last_tokens = messages.last().map(count).unwrap_or(0) as i64;
        let (result, terminal) = self
            .dispatch(&name, &arguments, remaining - last_tokens)
            .await;

        if terminal {
            info!(function = %name, "Terminal function; skipping follow-up");
            return Ok(stream::iter([CompletionStreamItem::FunctionInvoked(result)]).boxed());
        }

        progress("Calling OpenAI API again...");
        let budget = remaining - model.count_tokens(&result.content) as i64;
        let mut followup = with_system_prompt(system_prompt, select_window(messages, budget, count));
        followup.extend(result.to_chat_message());

        let tail = match client
            .stream_chat(ChatCompletionRequest::streaming(model.model_id(), followup))
            .await
        {
            Ok(s) => text_deltas(s),
            Err(e) => {
                warn!(error = %e, "Follow-up completion failed");
                error_stream(e.to_string())
            }
        };

        Ok(stream::iter([CompletionStreamItem::FunctionInvoked(result)])
            .chain(tail)
            .boxed())
    }

    /// Invoke `name`, absorbing every failure into a Function entry.
    ///
    /// Returns the entry and whether the function is terminal.
    async fn dispatch(&self, name: &str, arguments: &str, budget: i64) -> (ChatEntry, bool) {
        let Some(function) = self.registry.get_by_name(name) else {
            warn!(function = %name, "Unknown function");
            return (
                ChatEntry::function(name, format!("Unknown function: {}", name)),
                false,
            );
        };

        let entry = match function.invoke(arguments, budget).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(function = %name, arguments = %arguments, error = %e, "Failed to call function");
                ChatEntry::function(
                    name,
                    format!("Cannot call function: {}({} {})", name, e.kind(), e),
                )
            }
        };
        (entry, function.is_terminal())
    }
}

fn with_system_prompt(system_prompt: &str, window: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(window);
    messages
}

pub(crate) fn text_deltas<S>(chunks: S) -> CompletionStream
where
    S: Stream<Item = Result<ChatCompletionChunk, EngineError>> + Send + 'static,
{
    chunks
        .map(|chunk| match chunk {
            Ok(chunk) => CompletionStreamItem::TextDelta(chunk.content().to_string()),
            Err(e) => CompletionStreamItem::Error(e.to_string()),
        })
        .boxed()
}
