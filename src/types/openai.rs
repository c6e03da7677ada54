// src/types/openai.rs

use serde::{Deserialize, Serialize};

use crate::functions::FunctionDefinition;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
    Function,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: WireRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: content.into(),
            name: None,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCallMode {
    Auto,
    None,
}

#[derive(Serialize, Clone, Debug)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallMode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
}

impl ChatCompletionRequest {
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            function_call: None,
            functions: Vec::new(),
        }
    }

    /// Attach a function catalog with automatic dispatch.
    pub fn with_functions(mut self, functions: Vec<FunctionDefinition>) -> Self {
        if !functions.is_empty() {
            self.function_call = Some(FunctionCallMode::Auto);
            self.functions = functions;
        }
        self
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChunkDelta {
    pub content: Option<String>,
    pub function_call: Option<FunctionCallDelta>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FunctionCallDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    fn delta(&self) -> Option<&ChunkDelta> {
        self.choices.first().map(|c| &c.delta)
    }

    /// Text carried by this chunk; empty when there is none.
    pub fn content(&self) -> &str {
        self.delta()
            .and_then(|d| d.content.as_deref())
            .unwrap_or("")
    }

    pub fn function_call(&self) -> Option<&FunctionCallDelta> {
        self.delta().and_then(|d| d.function_call.as_ref())
    }

    pub fn function_arguments(&self) -> &str {
        self.function_call()
            .and_then(|f| f.arguments.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
impl ChatCompletionChunk {
    pub(crate) fn text(content: &str) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: Some(content.to_string()),
                    function_call: None,
                },
            }],
        }
    }

    pub(crate) fn call(name: Option<&str>, arguments: &str) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    content: None,
                    function_call: Some(FunctionCallDelta {
                        name: name.map(str::to_string),
                        arguments: Some(arguments.to_string()),
                    }),
                },
            }],
        }
    }
}

// Image generation

#[derive(Serialize, Debug)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub response_format: String,
}

#[derive(Deserialize, Debug)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
pub struct ImageData {
    pub b64_json: Option<String>,
}
