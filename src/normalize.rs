//! Entry normalization.
//!
//! Turns one [`RawFeedEntry`] plus the [`SourceDescriptor`] it came from into
//! an [`ArticleRecord`]. Normalization never fails: every missing field is
//! replaced by a default.
//!
//! # Field rules
//!
//! | Field | Source | Fallback |
//! |-------|--------|----------|
//! | `id` | `<source.id>::` + entry id | entry link, then `""` |
//! | `title` | entry title | [`UNTITLED`] |
//! | `url` | entry link | `""` |
//! | `summary_raw` | non-empty summary | description, then `""` |
//! | `categories_raw` | tag terms, in order | `[]` |
//! | `published_at` | publish time truncated to seconds | the current time |
//!
//! Entries without a publish time are stamped with "now" and therefore sort
//! ahead of every dated entry in the output.

use crate::models::{ArticleRecord, RawFeedEntry, SourceDescriptor};
use crate::utils::iso_utc;
use chrono::{DateTime, Timelike, Utc};

/// Placeholder title for entries that carry none ("(no title)").
pub const UNTITLED: &str = "(無標題)";

/// Separator between the source id and the entry's native id.
pub const ID_SEPARATOR: &str = "::";

/// Normalize an entry, stamping undated entries with the current time.
pub fn normalize(source: &SourceDescriptor, entry: &RawFeedEntry) -> ArticleRecord {
    normalize_at(source, entry, Utc::now())
}

/// Normalize an entry against an explicit "current time".
///
/// # Arguments
///
/// * `source` - The source the entry came from; supplies the id prefix and name
/// * `entry` - The raw entry, with any subset of fields present
/// * `now` - Timestamp used when the entry has no publish time
///
/// # Returns
///
/// A fully populated [`ArticleRecord`]. The same inputs always produce the
/// same record.
pub fn normalize_at(
    source: &SourceDescriptor,
    entry: &RawFeedEntry,
    now: DateTime<Utc>,
) -> ArticleRecord {
    let published = match entry.published_parsed {
        // Only year..second are meaningful.
        Some(dt) => dt.with_nanosecond(0).unwrap_or(dt),
        None => now,
    };

    let summary_raw = match entry.summary.as_deref() {
        Some(summary) if !summary.is_empty() => summary.to_string(),
        _ => entry.description.clone().unwrap_or_default(),
    };

    let categories_raw = entry
        .tags
        .iter()
        .flatten()
        .filter_map(|tag| tag.term.as_deref())
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect();

    let native_id = entry
        .id
        .as_deref()
        .or(entry.link.as_deref())
        .unwrap_or_default();

    ArticleRecord {
        id: format!("{}{}{}", source.id, ID_SEPARATOR, native_id),
        source_id: source.id.clone(),
        source_name: source.name.clone(),
        title: entry.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
        url: entry.link.clone().unwrap_or_default(),
        summary_raw,
        categories_raw,
        published_at: iso_utc(&published),
    }
}
