//! Utility functions for string sanitization, escaping, and run timestamps.
//!
//! This module provides helper functions used throughout the application:
//! - Filesystem-safe filename prefixes derived from article titles
//! - HTML escaping for user-derived text interpolated into templates
//! - Character-safe truncation for content previews
//! - Run timestamps used in output folder names

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Derive a filesystem-safe filename stem from an article title.
///
/// Strips everything outside word characters, whitespace, and hyphens,
/// collapses whitespace runs to a single underscore, and truncates to
/// 50 characters. Deterministic: two articles with the same title share
/// the same prefix; batch-level uniqueness comes from the article index.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(safe_prefix("半年总结！2024"), "半年总结2024");
/// assert_eq!(safe_prefix("A Day in the Life"), "A_Day_in_the_Life");
/// ```
pub fn safe_prefix(title: &str) -> String {
    let stripped = UNSAFE_CHARS.replace_all(title, "");
    let collapsed = WHITESPACE_RUN.replace_all(stripped.trim(), "_");
    collapsed.chars().take(50).collect()
}

/// Escape text for interpolation into HTML element content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for interpolation into a double-quoted HTML attribute.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Truncate a string to `max` characters, appending `"..."` when cut.
///
/// Operates on characters, not bytes, so CJK text is never split
/// mid-codepoint.
pub fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

/// Timestamp used to name run folders and article ids, e.g. `20250506_183025`.
pub fn run_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
