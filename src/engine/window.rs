// src/engine/window.rs

//! Bounded prompt assembly.
//!
//! A model's context holds the system prompt, the selected history and the
//! response. One eighth of the context is reserved for the response; what
//! remains after the system prompt is the history budget.

/// Fraction of the context reserved for the model's answer (1/8).
pub const RESPONSE_RESERVE_DIVISOR: usize = 8;

/// Tokens available for history once the prompt and response reserve are subtracted.
///
/// May be zero or negative when the prompt alone is too large.
pub fn remaining_tokens(max_tokens: usize, prompt_tokens: usize) -> i64 {
    max_tokens as i64 - prompt_tokens as i64 - (max_tokens / RESPONSE_RESERVE_DIVISOR) as i64
}

/// Select the longest suffix of `history` whose token total fits in `budget`.
///
/// Walks from the newest message backwards and stops at the first message
/// that would overflow, so the result is always a contiguous suffix in
/// chronological order. Messages are never split.
pub fn select_window<T, F>(history: &[T], budget: i64, mut tokens: F) -> Vec<T>
where
    T: Clone,
    F: FnMut(&T) -> usize,
{
    if budget <= 0 {
        return Vec::new();
    }

    let mut left = budget;
    let mut start = history.len();
    for (idx, message) in history.iter().enumerate().rev() {
        let cost = tokens(message) as i64;
        if cost > left {
            break;
        }
        left -= cost;
        start = idx;
    }

    history[start..].to_vec()
}
