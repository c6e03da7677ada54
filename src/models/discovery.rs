// src/models/discovery.rs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::types::LlamaModel;

/// Local models live in `<data>/models/llama`.
pub fn get_models_dir(data_directory: &Path) -> PathBuf {
    data_directory.join("models").join("llama")
}

/// Scans a directory for .gguf model files, sorted by file name.
/// Multimodal projector files (`*mmproj*`) are not models on their own and are skipped.
pub fn scan_models_dir(models_dir: &Path) -> Vec<LlamaModel> {
    if !models_dir.exists() {
        debug!(dir = %models_dir.display(), "No local models directory");
        return Vec::new();
    }

    let entries = match std::fs::read_dir(models_dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %models_dir.display(), error = %e, "Cannot read models directory");
            return Vec::new();
        }
    };

    let mut models = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_gguf = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("gguf"))
            .unwrap_or(false);
        if !is_gguf {
            continue;
        }

        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        if filename.to_lowercase().contains("mmproj") {
            continue;
        }

        models.push(LlamaModel {
            name: filename,
            model_path: path,
        });
    }

    models.sort_by(|a, b| a.name.cmp(&b.name));
    models
}
