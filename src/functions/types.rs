// src/functions/types.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FunctionError;
use crate::types::ChatEntry;

/// Wire description of a callable function.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// A capability the model may invoke mid-completion.
#[async_trait]
pub trait ChatFunction: Send + Sync {
    fn definition(&self) -> FunctionDefinition;

    fn name(&self) -> &str;

    /// Run the function with the raw JSON `arguments` produced by the model.
    ///
    /// `remaining_tokens` bounds the size of the returned content.
    async fn invoke(&self, arguments: &str, remaining_tokens: i64)
        -> Result<ChatEntry, FunctionError>;

    /// Terminal functions end the turn: their result is not sent back to the model.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`.
///
/// Counts chars, not bytes, so multibyte sequences are never split. A
/// negative budget is treated as zero.
pub fn truncate_at(text: &str, max_chars: i64) -> String {
    let max = usize::try_from(max_chars).unwrap_or(0);
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}
