use std::collections::BTreeSet;

/// Normalize line endings to `\n` so blank-line detection does not depend on the platform.
pub fn normalize_text(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

/// Case-insensitive whitespace tokens as a set. Frequency is deliberately dropped.
pub fn tokens(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

/// First `max_chars` characters of `text`, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
