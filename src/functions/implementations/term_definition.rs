// src/functions/implementations/term_definition.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::atomic_write::write_atomic;
use crate::error::FunctionError;
use crate::functions::types::{truncate_at, ChatFunction, FunctionDefinition};
use crate::types::ChatEntry;

pub const FETCH_NAME: &str = "fetch_term_definition";
pub const REGISTER_NAME: &str = "register_term_definition";

#[derive(Serialize, Deserialize, Default)]
struct WordMapping {
    #[serde(default)]
    words: BTreeMap<String, String>,
}

/// Glossary of organisation-specific terms stored as one JSON file.
pub struct TermDefinitionRepository {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl TermDefinitionRepository {
    pub fn new(data_directory: &Path) -> Self {
        Self {
            path: data_directory.join("features/termdefinition/words.json"),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<WordMapping, FunctionError> {
        if !self.path.exists() {
            return Ok(WordMapping::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Register `definition`, appending to any existing definition of `word`.
    pub async fn add_word(&self, word: &str, definition: &str) -> Result<(), FunctionError> {
        let _guard = self.lock.lock().await;
        let mut mapping = self.read()?;

        mapping
            .words
            .entry(word.to_string())
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(definition);
            })
            .or_insert_with(|| definition.to_string());

        let content = serde_json::to_string_pretty(&mapping)?;
        write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }

    pub async fn get_word(&self, word: &str) -> Result<String, FunctionError> {
        let _guard = self.lock.lock().await;
        let mapping = self.read()?;
        Ok(mapping
            .words
            .get(word)
            .cloned()
            .unwrap_or_else(|| format!("Unknown word: {}", word)))
    }
}

#[derive(Deserialize)]
struct FetchArgs {
    word: String,
}

#[derive(Deserialize)]
struct RegisterArgs {
    word: String,
    definition: String,
}

pub struct FetchTermDefinitionFunction {
    repository: Arc<TermDefinitionRepository>,
}

impl FetchTermDefinitionFunction {
    pub fn new(repository: Arc<TermDefinitionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ChatFunction for FetchTermDefinitionFunction {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: FETCH_NAME.to_string(),
            description: "This function fetches the definition of a given term and, if available, \
                provides a URL for further information related to the term. The term can be any \
                specialized or internal term commonly used within the organization."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "word": {
                        "type": "string",
                        "description": "This is the term for which the function will fetch the \
                            definition and, if available, a related URL. It can be any specialized \
                            or internal term commonly used within the organization."
                    }
                },
                "required": ["word"]
            }),
        }
    }

    fn name(&self) -> &str {
        FETCH_NAME
    }

    async fn invoke(
        &self,
        arguments: &str,
        remaining_tokens: i64,
    ) -> Result<ChatEntry, FunctionError> {
        let args: FetchArgs = serde_json::from_str(arguments)?;
        let definition = self.repository.get_word(&args.word).await?;
        Ok(ChatEntry::function(
            FETCH_NAME,
            truncate_at(&definition, remaining_tokens),
        ))
    }
}

pub struct RegisterTermDefinitionFunction {
    repository: Arc<TermDefinitionRepository>,
}

impl RegisterTermDefinitionFunction {
    pub fn new(repository: Arc<TermDefinitionRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ChatFunction for RegisterTermDefinitionFunction {
    fn definition(&self) -> FunctionDefinition {
        FunctionDefinition {
            name: REGISTER_NAME.to_string(),
            description: "This function registers the definition of a given term and, if \
                available, a related URL. The term and its related information can be used to \
                enrich the understanding and responses of the assistant."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "word": {
                        "type": "string",
                        "description": "This is the term that the function will register."
                    },
                    "definition": {
                        "type": "string",
                        "description": "This is the definition of the term that the function \
                            will register, along with related URL if available."
                    }
                },
                "required": ["word", "definition"]
            }),
        }
    }

    fn name(&self) -> &str {
        REGISTER_NAME
    }

    async fn invoke(&self, arguments: &str, _: i64) -> Result<ChatEntry, FunctionError> {
        let args: RegisterArgs = serde_json::from_str(arguments)?;
        self.repository.add_word(&args.word, &args.definition).await?;
        info!(word = %args.word, "registered term definition");

        Ok(ChatEntry::function(
            REGISTER_NAME,
            format!("Registered term definition: {}", truncate_at(&args.word, 20)),
        ))
    }
}
