// src/types/model.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::tokenizer::{TiktokenCounter, TokenCounter};

/// A remote model served over the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAIModel {
    name: String,
    max_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

impl OpenAIModel {
    pub fn new(name: impl Into<String>, max_tokens: usize) -> Self {
        let name = name.into();
        let counter = Arc::new(TiktokenCounter::for_model(name.clone()));
        Self::with_counter(name, max_tokens, counter)
    }

    pub fn with_counter(
        name: impl Into<String>,
        max_tokens: usize,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            name: name.into(),
            max_tokens,
            counter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier sent as `model` on the wire.
    pub fn model_id(&self) -> &str {
        &self.name
    }

    /// Hard context limit.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count_tokens(text)
    }
}

impl fmt::Debug for OpenAIModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIModel")
            .field("name", &self.name)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// A GGUF model file run by a local inference server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlamaModel {
    pub name: String,
    pub model_path: PathBuf,
}

#[derive(Clone, Debug)]
pub enum AIModel {
    OpenAI(OpenAIModel),
    Llama(LlamaModel),
}

impl AIModel {
    pub fn name(&self) -> &str {
        match self {
            AIModel::OpenAI(m) => m.name(),
            AIModel::Llama(m) => &m.name,
        }
    }

    pub fn label(&self) -> String {
        match self {
            AIModel::OpenAI(m) => format!("{} ({} max tokens)", m.name(), m.max_tokens()),
            AIModel::Llama(m) => m.name.clone(),
        }
    }

    pub fn count_token_available(&self) -> bool {
        matches!(self, AIModel::OpenAI(_))
    }

    /// Token count, or `None` when the backend cannot count exactly.
    pub fn count_tokens(&self, text: &str) -> Option<usize> {
        match self {
            AIModel::OpenAI(m) => Some(m.count_tokens(text)),
            AIModel::Llama(_) => None,
        }
    }
}
