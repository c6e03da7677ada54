// src/models/catalog.rs

use std::path::Path;

use crate::models::discovery::{get_models_dir, scan_models_dir};
use crate::types::{AIModel, OpenAIModel};

/// Remote models offered out of the box, with their context limits.
pub const OPENAI_MODELS: &[(&str, usize)] = &[
    ("gpt-3.5-turbo-1106", 16385),
    ("gpt-4-1106-preview", 128000),
    ("gpt-3.5-turbo", 4097),
    ("gpt-3.5-turbo-16k", 16385),
    ("gpt-4", 8192),
    ("gpt-4-32k", 32768),
];

pub fn openai_models() -> Vec<AIModel> {
    OPENAI_MODELS
        .iter()
        .map(|(name, max_tokens)| AIModel::OpenAI(OpenAIModel::new(*name, *max_tokens)))
        .collect()
}

pub fn llama_models(data_directory: &Path) -> Vec<AIModel> {
    scan_models_dir(&get_models_dir(data_directory))
        .into_iter()
        .map(AIModel::Llama)
        .collect()
}

/// Every selectable model: remote models first, then local ones.
pub fn load_catalog(data_directory: &Path) -> Vec<AIModel> {
    let mut models = openai_models();
    models.extend(llama_models(data_directory));
    models
}

/// The model named `default_name`, or the first one in the catalog.
pub fn default_model(models: &[AIModel], default_name: Option<&str>) -> Option<AIModel> {
    default_name
        .and_then(|name| models.iter().find(|m| m.name() == name))
        .or_else(|| models.first())
        .cloned()
}

pub fn find_model(models: &[AIModel], name: &str) -> Option<AIModel> {
    models.iter().find(|m| m.name() == name).cloned()
}
