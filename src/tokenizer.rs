// src/tokenizer.rs

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Heuristic used when no BPE table can be loaded.
const CHARS_PER_TOKEN: usize = 4;

/// Counts model-context units for budgeting.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

static CL100K: Lazy<Option<Arc<CoreBPE>>> = Lazy::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(Arc::new(bpe)),
    Err(e) => {
        warn!("cl100k_base tokenizer unavailable, falling back to estimates: {e}");
        None
    }
});

/// Token counter backed by the model's tiktoken encoding.
///
/// The table is loaded on first use. Unknown model names use cl100k_base,
/// and a missing table degrades to a character-based estimate.
pub struct TiktokenCounter {
    model: String,
    bpe: OnceCell<Option<Arc<CoreBPE>>>,
}

impl TiktokenCounter {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            bpe: OnceCell::new(),
        }
    }

    fn bpe(&self) -> Option<&Arc<CoreBPE>> {
        self.bpe
            .get_or_init(|| match tiktoken_rs::get_bpe_from_model(&self.model) {
                Ok(bpe) => Some(Arc::new(bpe)),
                Err(_) => (*CL100K).clone(),
            })
            .as_ref()
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        match self.bpe() {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => estimate_tokens(text),
        }
    }
}

/// Rough count: one token per four bytes, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

#[cfg(test)]
pub(crate) struct CharCounter;

#[cfg(test)]
impl TokenCounter for CharCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_tiktoken_counts_are_positive_and_monotonic() {
        let counter = TiktokenCounter::for_model("gpt-4");
        let short = counter.count_tokens("hello");
        let long = counter.count_tokens("hello world, this is a longer sentence");
        assert!(short >= 1);
        assert!(long > short);
        assert_eq!(counter.count_tokens(""), 0);
    }

    #[test]
    fn test_unknown_model_still_counts() {
        let counter = TiktokenCounter::for_model("not-a-real-model");
        assert!(counter.count_tokens("some text") > 0);
    }
}
