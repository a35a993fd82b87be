//! Utility functions for timestamp formatting, log truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - ISO-8601 formatting of UTC timestamps for the output file
//! - String truncation for logging feed bodies and error messages
//! - File system validation for the output directory

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Format a UTC timestamp as ISO-8601 with an explicit `+00:00` offset.
///
/// Fractional seconds are emitted as microseconds, and only when non-zero:
///
/// ```ignore
/// 2024-01-15T10:30:00+00:00
/// 2024-01-15T10:30:00.250000+00:00
/// ```
pub fn iso_utc(dt: &DateTime<Utc>) -> String {
    let format = if dt.nanosecond() / 1_000 == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    let dt = match dt.with_nanosecond(dt.nanosecond() / 1_000 * 1_000) {
        Some(truncated) => truncated,
        None => *dt,
    };
    dt.to_rfc3339_opts(format, false)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and remaining byte count appended.
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
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
