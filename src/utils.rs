//! Utility functions for text cleanup, logging and file system checks.
//!
//! - Summary cleanup for post bodies
//! - String truncation and slugification for logs and file names
//! - File system validation for the state directory

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum number of characters of article description placed in a post.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Turn a raw article description into the summary paragraph of a post.
///
/// Steps, in order:
/// 1. cut at the first `[` (drops markers like `[+2345 chars]`)
/// 2. strip leading whitespace
/// 3. keep at most [`SUMMARY_MAX_CHARS`] characters
/// 4. strip trailing periods, ellipses and whitespace
///
/// Capping before stripping keeps the result free of trailing `.`/`…`
/// even when the cap lands right after a sentence, and makes the function
/// idempotent.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_summary("Attackers moved fast… [+1200 chars]"), "Attackers moved fast");
/// assert_eq!(clean_summary(""), "");
/// ```
pub fn clean_summary(text: &str) -> String {
    let head = match text.find('[') {
        Some(pos) => &text[..pos],
        None => text,
    };
    let capped: String = head.trim_start().chars().take(SUMMARY_MAX_CHARS).collect();
    capped
        .trim_end_matches(|c: char| c == '.' || c == '…' || c.is_whitespace())
        .to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with
/// `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Convert a topic name to a file-name-safe slug.
///
/// Lowercases, drops anything that is not alphanumeric, space, `-` or `_`,
/// then turns spaces into hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Cloud & DevOps"), "cloud--devops");
/// ```
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(
            |c: char| !c.is_alphanumeric() && c != ' ' && c != '-' && c != '_',
            "",
        )
        .replace(' ', "-")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
/// Run at startup so an unwritable state directory is caught before a post
/// is published rather than after.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or written to.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let scratch_path = format!("{}/..__write_check__", path.trim_end_matches('/'));
    match stdfs::File::create(&scratch_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&scratch_path);
            info!("State directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
