// src/engine/mod.rs

pub mod client;
pub mod llama;
pub mod openai;
pub mod peek;
pub mod window;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::{AIModel, ChatEntry, ChatMessage};

pub use client::{ChunkStream, CompletionClient, OpenAIClient};
pub use llama::LlamaEngine;
pub use openai::OpenAIEngine;

/// One unit of engine output for a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum CompletionStreamItem {
    TextDelta(String),
    /// Result of a model-initiated function call. Precedes the deltas it triggered.
    FunctionInvoked(ChatEntry),
    /// Terminal failure of the turn.
    Error(String),
}

pub type CompletionStream = BoxStream<'static, CompletionStreamItem>;

/// Callback for human-readable progress lines.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Runs one turn against whichever backend serves `model`.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn generate(
        &self,
        model: &AIModel,
        system_prompt: &str,
        messages: &[ChatMessage],
        progress: Progress<'_>,
    ) -> CompletionStream;
}

/// Routes a turn to the remote or the local engine by model variant.
pub struct Engines {
    pub openai: OpenAIEngine,
    pub llama: LlamaEngine,
}

#[async_trait]
impl CompletionEngine for Engines {
    async fn generate(
        &self,
        model: &AIModel,
        system_prompt: &str,
        messages: &[ChatMessage],
        progress: Progress<'_>,
    ) -> CompletionStream {
        match model {
            AIModel::OpenAI(m) => self.openai.generate(m, system_prompt, messages, progress).await,
            AIModel::Llama(m) => self.llama.generate(m, system_prompt, messages, progress).await,
        }
    }
}

/// A stream holding exactly one `Error` item.
pub(crate) fn error_stream(message: impl Into<String>) -> CompletionStream {
    use futures::StreamExt;
    futures::stream::iter([CompletionStreamItem::Error(message.into())]).boxed()
}
