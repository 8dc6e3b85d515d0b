//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Single-line preview of `text`, at most `max_len` characters.
///
/// Newlines collapse to spaces; an ellipsis marks truncation.
pub fn snippet(text: &str, max_len: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_len {
        return flattened;
    }
    let mut out: String = flattened.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
