//! Feed retrieval and parsing.
//!
//! The pipeline talks to feeds only through the [`FeedRetriever`] trait, so
//! the network-backed implementation can be swapped for a stub in tests.
//!
//! # Submodules
//!
//! - [`parser`]: RSS 2.0, RSS 1.0 (RDF) and Atom bodies, in any declared charset, into [`ParsedFeed`]
//! - [`retriever`]: [`HttpFeedRetriever`], which loads http(s) URLs and local files
//!
//! [`HttpFeedRetriever`]: retriever::HttpFeedRetriever

use crate::models::ParsedFeed;
use thiserror::Error;

pub mod parser;
pub mod retriever;

/// Why a single source could not be retrieved or parsed.
///
/// Every variant is treated the same way by the aggregation step: it is
/// logged and the source contributes no articles.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not a usable RSS or Atom document: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),

    #[error("unsupported feed location: {0}")]
    UnsupportedLocation(String),
}

/// Something that can turn a feed location into parsed entries.
///
/// Implementors preserve the document order of entries; callers rely on it
/// when capping the number of items per source.
pub trait FeedRetriever {
    /// Fetch and parse the feed at `location`.
    async fn retrieve(&self, location: &str) -> Result<ParsedFeed, FeedError>;
}
