//! Token budgeting: a cheap size heuristic and a prompt trimmer built on it.
//!
//! The estimate is ~4 characters per token. It is not a backend tokenizer
//! count, but it is applied identically to system and user prompts so the
//! two can share one budget.

/// Approximate characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of `text`.
///
/// Returns 0 for empty or whitespace-only input, otherwise
/// `ceil(trimmed_char_count / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    trimmed.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Trim `prompt` so that `estimate_tokens(result) <= max_tokens`.
///
/// A prompt that already fits is returned unchanged. Otherwise the oldest
/// lines are dropped first; if a single line is still too large, only its
/// last `max_tokens * 4` characters are kept.
pub fn trim_to_budget(prompt: &str, max_tokens: usize) -> String {
    if estimate_tokens(prompt) <= max_tokens {
        return prompt.to_string();
    }

    // Dropping the first k lines leaves a suffix of the original string, so
    // walk the line starts instead of re-joining a Vec each iteration.
    let mut remaining = prompt;
    while estimate_tokens(remaining) > max_tokens {
        match remaining.find('\n') {
            Some(pos) => remaining = &remaining[pos + 1..],
            None => break,
        }
    }

    let trimmed = remaining.trim_start();
    if estimate_tokens(trimmed) <= max_tokens {
        return trimmed.to_string();
    }

    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let char_count = trimmed.chars().count();
    trimmed
        .chars()
        .skip(char_count.saturating_sub(max_chars))
        .collect()
}
