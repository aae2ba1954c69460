//! Small helpers shared by the pipeline binaries.
//!
//! - String truncation for log fields
//! - File system validation for output directories

use std::fs as stdfs;
use std::path::Path;

use tokio::fs;
use tracing::{info, instrument};

use crate::error::PipelineError;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` bytes (backing off to a character
/// boundary) with an ellipsis and byte count appended.
///
/// ```
/// use foundation_grants::utils::truncate_for_log;
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

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}
