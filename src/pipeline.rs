//! Per-source fetching and whole-run aggregation.
//!
//! One run is a single straight pass:
//!
//! 1. [`fetch_source`] retrieves one feed, keeps the first `max_items`
//!    entries and normalizes them
//! 2. [`aggregate`] does that for every source in listed order, logging and
//!    skipping the sources that fail
//! 3. [`run`] loads the registry, aggregates, and writes the envelope
//!
//! Sources are awaited one after another; nothing runs concurrently.

use crate::config::{AppConfig, load_sources};
use crate::feeds::{FeedError, FeedRetriever};
use crate::models::{ArticleRecord, ResultEnvelope, SourceDescriptor};
use crate::normalize::normalize;
use crate::outputs::json::write_envelope;
use crate::utils::iso_utc;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::error::Error;
use tracing::{Instrument, error, info, info_span, instrument};

/// Retrieve one source and normalize at most `max_items` of its entries.
///
/// # Arguments
///
/// * `retriever` - Where feed bodies come from
/// * `source` - The registry entry to fetch
///
/// # Returns
///
/// Up to `source.max_items` articles, in the order the retriever returned
/// the entries. Failures are returned to the caller untouched.
#[instrument(level = "info", skip_all, fields(source_id = %source.id))]
pub async fn fetch_source<R: FeedRetriever>(
    retriever: &R,
    source: &SourceDescriptor,
) -> Result<Vec<ArticleRecord>, FeedError> {
    info!(name = %source.name, url = %source.feed_url, "Fetching");
    let feed = retriever.retrieve(&source.feed_url).await?;

    let articles: Vec<ArticleRecord> = feed
        .entries
        .iter()
        .take(source.max_items)
        .map(|entry| normalize(source, entry))
        .collect();

    info!(
        feed_title = feed.title.as_deref().unwrap_or_default(),
        available = feed.entries.len(),
        kept = articles.len(),
        "Normalized source entries"
    );
    Ok(articles)
}

/// Sort newest first. Stable, so equal timestamps keep collection order.
pub fn sort_newest_first(articles: &mut [ArticleRecord]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Fetch every source in order and fold the results into one envelope.
///
/// A failing source is logged as soon as it fails, inside its own span, and
/// contributes nothing; it still counts towards `source_count`.
///
/// # Returns
///
/// A fresh envelope stamped with the current time, articles newest first.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn aggregate<R: FeedRetriever>(retriever: &R, sources: &[SourceDescriptor]) -> ResultEnvelope {
    let outcomes: Vec<Option<Vec<ArticleRecord>>> = stream::iter(sources)
        .then(|source| {
            async move {
                match fetch_source(retriever, source).await {
                    Ok(fetched) => Some(fetched),
                    Err(e) => {
                        error!(error = %e, "Fetch failed");
                        None
                    }
                }
            }
            .instrument(info_span!("source", source_id = %source.id))
        })
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| o.is_none()).count();
    let mut articles: Vec<ArticleRecord> = outcomes.into_iter().flatten().flatten().collect();

    sort_newest_first(&mut articles);
    info!(
        sources = sources.len(),
        failed,
        articles = articles.len(),
        "Aggregated sources"
    );

    ResultEnvelope {
        generated_at: iso_utc(&Utc::now()),
        source_count: sources.len(),
        article_count: articles.len(),
        articles,
    }
}

/// Run one full load → fetch → aggregate → persist cycle.
///
/// # Errors
///
/// Only fatal problems surface here: an unreadable or invalid source
/// registry, or an output file that cannot be written.
#[instrument(level = "info", skip_all)]
pub async fn run<R: FeedRetriever>(
    config: &AppConfig,
    retriever: &R,
) -> Result<ResultEnvelope, Box<dyn Error>> {
    let sources = load_sources(&config.sources_path).await?;
    let envelope = aggregate(retriever, &sources).await;
    write_envelope(&envelope, &config.output_path).await?;
    info!(
        count = envelope.article_count,
        path = %config.output_path.display(),
        "Saved articles"
    );
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParsedFeed, RawFeedEntry};
    use crate::normalize::UNTITLED;
    use chrono::{DateTime, TimeZone};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Serves canned feeds by location and records the call order.
    #[derive(Default)]
    struct StubRetriever {
        feeds: HashMap<String, Vec<RawFeedEntry>>,
        calls: RefCell<Vec<String>>,
    }

    impl StubRetriever {
        fn with(mut self, location: &str, entries: Vec<RawFeedEntry>) -> Self {
            self.feeds.insert(location.to_string(), entries);
            self
        }
    }

    impl FeedRetriever for StubRetriever {
        async fn retrieve(&self, location: &str) -> Result<ParsedFeed, FeedError> {
            self.calls.borrow_mut().push(location.to_string());
            match self.feeds.get(location) {
                Some(entries) => Ok(ParsedFeed {
                    title: None,
                    entries: entries.clone(),
                }),
                None => Err(FeedError::UnsupportedLocation(location.to_string())),
            }
        }
    }

    fn dated(id: &str, day: u32) -> RawFeedEntry {
        RawFeedEntry {
            id: Some(id.to_string()),
            title: Some(format!("Entry {id}")),
            published_parsed: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn source(id: &str, max_items: usize) -> SourceDescriptor {
        SourceDescriptor {
            max_items,
            ..SourceDescriptor::new(id, &id.to_uppercase(), &format!("http://{id}/rss"))
        }
    }

    #[tokio::test]
    async fn test_fetch_source_caps_at_max_items_from_head() {
        let entries = (1..=5).map(|d| dated(&format!("e{d}"), d)).collect();
        let retriever = StubRetriever::default().with("http://a/rss", entries);

        let articles = fetch_source(&retriever, &source("a", 2)).await.unwrap();
        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a::e1", "a::e2"]);
    }

    #[tokio::test]
    async fn test_fetch_source_propagates_failure() {
        let retriever = StubRetriever::default();
        let err = fetch_source(&retriever, &source("a", 30)).await.unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedLocation(_)));
    }

    #[tokio::test]
    async fn test_aggregate_isolates_failing_source() {
        let retriever = StubRetriever::default().with("http://ok/rss", vec![dated("x", 1), dated("y", 2)]);
        let sources = vec![source("broken", 30), source("ok", 30)];

        let envelope = aggregate(&retriever, &sources).await;
        assert_eq!(envelope.source_count, 2);
        assert_eq!(envelope.article_count, 2);
        assert!(envelope.articles.iter().all(|a| a.source_id == "ok"));
        assert_eq!(
            *retriever.calls.borrow(),
            vec!["http://broken/rss".to_string(), "http://ok/rss".to_string()]
        );
    }

    /// Shared buffer the fmt layer writes into.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_is_logged_before_next_source_in_its_span() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let retriever = StubRetriever::default().with("http://ok/rss", vec![dated("x", 1)]);
        aggregate(&retriever, &[source("broken", 30), source("ok", 30)]).await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        let failed = lines
            .iter()
            .position(|l| l.contains("Fetch failed"))
            .expect("failure logged");
        let next = lines
            .iter()
            .position(|l| l.contains("Fetching") && l.contains("name=OK"))
            .expect("second source fetched");
        assert!(failed < next);
        assert!(lines[failed].contains("source_id=broken"));
    }

    #[tokio::test]
    async fn test_aggregate_sorts_newest_first_across_sources() {
        let retriever = StubRetriever::default()
            .with("http://a/rss", vec![dated("3", 3), dated("1", 1)])
            .with("http://b/rss", vec![dated("2", 2)]);
        let sources = vec![source("a", 30), source("b", 30)];

        let envelope = aggregate(&retriever, &sources).await;
        let days: Vec<_> = envelope
            .articles
            .iter()
            .map(|a| &a.published_at[..10])
            .collect();
        assert_eq!(days, vec!["2024-01-03", "2024-01-02", "2024-01-01"]);
    }

    #[tokio::test]
    async fn test_aggregate_with_no_sources() {
        let envelope = aggregate(&StubRetriever::default(), &[]).await;
        assert_eq!(envelope.source_count, 0);
        assert_eq!(envelope.article_count, 0);
        assert!(DateTime::parse_from_rfc3339(&envelope.generated_at).is_ok());
    }

    #[tokio::test]
    async fn test_undated_entries_sort_as_now() {
        // Undated entries are stamped with the fetch time, which puts them
        // ahead of anything published earlier.
        let undated = RawFeedEntry {
            link: Some("http://a/undated".to_string()),
            ..Default::default()
        };
        let retriever = StubRetriever::default().with("http://a/rss", vec![dated("old", 1), undated]);

        let envelope = aggregate(&retriever, &[source("a", 30)]).await;
        assert_eq!(envelope.articles[0].id, "a::http://a/undated");
        assert_eq!(envelope.articles[0].title, UNTITLED);
        assert_eq!(envelope.articles[1].id, "a::old");
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let make = |id: &str, ts: &str| ArticleRecord {
            id: id.to_string(),
            source_id: "s".to_string(),
            source_name: "S".to_string(),
            title: String::new(),
            url: String::new(),
            summary_raw: String::new(),
            categories_raw: vec![],
            published_at: ts.to_string(),
        };
        let mut articles = vec![
            make("first", "2024-01-01T00:00:00+00:00"),
            make("newer", "2024-01-02T00:00:00+00:00"),
            make("second", "2024-01-01T00:00:00+00:00"),
        ];
        sort_newest_first(&mut articles);
        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "first", "second"]);
    }

    #[tokio::test]
    async fn test_run_writes_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let sources_path = dir.path().join("sources.yml");
        std::fs::write(
            &sources_path,
            "sources:\n  - id: a\n    name: A\n    rss: http://a/rss\n    max_items: 1\n  - id: b\n    name: B\n    rss: http://b/rss\n",
        )
        .unwrap();
        let config = AppConfig {
            sources_path,
            output_path: dir.path().join("public").join("articles.json"),
            ..AppConfig::default()
        };
        let retriever = StubRetriever::default().with("http://a/rss", vec![dated("1", 1), dated("2", 2)]);

        let envelope = run(&config, &retriever).await.unwrap();
        assert_eq!(envelope.source_count, 2);
        assert_eq!(envelope.article_count, 1);

        let written: ResultEnvelope =
            serde_json::from_str(&std::fs::read_to_string(&config.output_path).unwrap()).unwrap();
        assert_eq!(written, envelope);
    }

    #[tokio::test]
    async fn test_run_fails_without_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            sources_path: dir.path().join("missing.yml"),
            output_path: dir.path().join("articles.json"),
            ..AppConfig::default()
        };
        assert!(run(&config, &StubRetriever::default()).await.is_err());
        assert!(!config.output_path.exists());
    }
}
