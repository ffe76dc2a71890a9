//! Formatting utilities for CLI output.

use chrono::{DateTime, Utc};

/// Truncate a string to a maximum length (in chars) with ellipsis.
///
/// Newlines are flattened to spaces first so excerpts stay on one row.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_str("hello", 10), "hello");
/// assert_eq!(truncate_str("hello world", 8), "hello...");
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let count = flat.chars().count();
    if count <= max_len {
        flat
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = flat.chars().take(max_len - 3).collect();
        format!("{}...", kept.trim_end())
    }
}

/// Format a duration in milliseconds.
///
/// - Below 1s: `"12.3ms"`
/// - Otherwise: `"1.50s"`
pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Format an optional page number (`-` when absent).
pub fn format_page(page: Option<u32>) -> String {
    page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
