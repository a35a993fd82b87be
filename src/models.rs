//! Data models for feed sources, raw entries, and the published article list.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SourceDescriptor`]: One configured feed from the source registry
//! - [`RawFeedEntry`]: A loosely-shaped entry as handed back by a feed parser
//! - [`ArticleRecord`]: The canonical, normalized article
//! - [`ResultEnvelope`]: The document written to disk once per run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item cap applied when a source does not set `max_items`.
pub const DEFAULT_MAX_ITEMS: usize = 30;

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

/// A configured feed source.
///
/// Loaded once per run from the registry file and never mutated afterwards.
/// The registry spells the feed URL as `rss`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceDescriptor {
    /// Unique, stable identifier used as the article id prefix.
    pub id: String,
    /// Human readable source name.
    pub name: String,
    /// Feed location (http(s) URL, `file://` URL, or local path).
    #[serde(rename = "rss")]
    pub feed_url: String,
    /// Maximum number of entries taken from the head of the feed.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[cfg(test)]
impl SourceDescriptor {
    pub fn new(id: &str, name: &str, feed_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// A category/tag attached to a raw entry. The term may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTag {
    pub term: Option<String>,
}

/// A raw entry produced by the feed parser.
///
/// This is a foreign, untrusted shape: every field is independently
/// optional and nothing is validated. `Some("")` (present but empty) and
/// `None` (absent) are distinct and the normalizer treats them differently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Native identifier (RSS `guid`, Atom `id`).
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Structured publish time, already converted to UTC.
    pub published_parsed: Option<DateTime<Utc>>,
    pub tags: Option<Vec<RawTag>>,
}

/// A parsed feed: optional channel title plus entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawFeedEntry>,
}

/// A normalized article as published in the output file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// `<source_id>::<native id or link>`.
    pub id: String,
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub url: String,
    pub summary_raw: String,
    pub categories_raw: Vec<String>,
    /// ISO-8601 UTC timestamp, always present.
    pub published_at: String,
}

/// The top-level document written at the end of every run.
///
/// Created fresh each run and never merged with earlier output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResultEnvelope {
    pub generated_at: String,
    /// Number of configured sources, successful or not.
    pub source_count: usize,
    pub article_count: usize,
    /// Sorted by `published_at`, newest first.
    pub articles: Vec<ArticleRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_descriptor_defaults_max_items() {
        let yaml = "id: bbc\nname: BBC News\nrss: https://feeds.bbci.co.uk/news/rss.xml\n";
        let source: SourceDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.id, "bbc");
        assert_eq!(source.feed_url, "https://feeds.bbci.co.uk/news/rss.xml");
        assert_eq!(source.max_items, DEFAULT_MAX_ITEMS);
    }

    #[test]
    fn test_source_descriptor_explicit_max_items() {
        let yaml = "id: a\nname: A\nrss: http://a/feed\nmax_items: 5\n";
        let source: SourceDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.max_items, 5);
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = ResultEnvelope {
            generated_at: "2024-01-15T10:30:00+00:00".to_string(),
            source_count: 2,
            article_count: 1,
            articles: vec![ArticleRecord {
                id: "bbc::xyz".to_string(),
                source_id: "bbc".to_string(),
                source_name: "BBC".to_string(),
                title: "Headline".to_string(),
                url: "http://a/b".to_string(),
                summary_raw: String::new(),
                categories_raw: vec!["World".to_string()],
                published_at: "2024-01-15T10:30:00+00:00".to_string(),
            }],
        };

        let value = serde_json::to_value(&envelope).unwrap();
        for key in ["generated_at", "source_count", "article_count", "articles"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let article = &value["articles"][0];
        for key in [
            "id",
            "source_id",
            "source_name",
            "title",
            "url",
            "summary_raw",
            "categories_raw",
            "published_at",
        ] {
            assert!(article.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_raw_entry_default_is_fully_absent() {
        let entry = RawFeedEntry::default();
        assert!(entry.title.is_none());
        assert!(entry.link.is_none());
        assert!(entry.tags.is_none());
    }
}
