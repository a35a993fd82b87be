//! JSON output generation for static sites.
//!
//! The whole [`ResultEnvelope`] is written to a single file that is replaced
//! on every run:
//!
//! ```text
//! public/
//! └── articles.json
//! ```
//!
//! # Replacement
//!
//! The document goes to a sibling `.tmp` file first and is then renamed over
//! the destination, so readers see either the previous run or the new one.

use crate::models::ResultEnvelope;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Sibling path used while the new document is being written.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "articles.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize a [`ResultEnvelope`] as indented UTF-8 JSON.
///
/// Non-ASCII text is written as-is, not as `\u` escapes.
pub fn render_envelope(envelope: &ResultEnvelope) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(envelope)
}

/// Write a [`ResultEnvelope`] to `path`, replacing any earlier file.
///
/// Creates the parent directory when missing.
///
/// # Errors
///
/// Returns an error if serialization, directory creation, writing, or the
/// final rename fails. Any previous file is left in place in that case.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_envelope(envelope: &ResultEnvelope, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = render_envelope(envelope)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let tmp = temp_path(path);
    fs::write(&tmp, json).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        error!(tmp = %tmp.display(), error = %e, "Failed to move JSON into place");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(articles = envelope.article_count, "Wrote JSON envelope");
    Ok(())
}
