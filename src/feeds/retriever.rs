//! Network and filesystem feed retrieval.
//!
//! [`HttpFeedRetriever`] accepts the same kinds of locations a source registry
//! may contain:
//!
//! - `http://` and `https://` URLs, fetched with `reqwest`
//! - `file://` URLs and plain filesystem paths, read from disk
//!
//! Bodies are kept as raw bytes so the parser can honour the document's own
//! charset. Each call blocks the pipeline until it completes or the client
//! timeout expires. There are no retries.

use crate::feeds::parser::parse_feed;
use crate::feeds::{FeedError, FeedRetriever};
use crate::models::ParsedFeed;
use crate::utils::truncate_for_log;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where a feed location points.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedLocation {
    Remote(Url),
    Local(PathBuf),
}

impl FeedLocation {
    fn resolve(location: &str) -> Result<Self, FeedError> {
        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Self::Local)
                    .map_err(|_| FeedError::UnsupportedLocation(location.to_string())),
                // Single letter schemes are Windows drive prefixes.
                scheme if scheme.len() == 1 => Ok(Self::Local(PathBuf::from(location))),
                _ => Err(FeedError::UnsupportedLocation(location.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Self::Local(PathBuf::from(location)))
            }
            Err(_) => Err(FeedError::UnsupportedLocation(location.to_string())),
        }
    }
}

/// Default [`FeedRetriever`]: HTTP(S) via `reqwest`, local files via `tokio::fs`.
#[derive(Debug, Clone)]
pub struct HttpFeedRetriever {
    client: Client,
}

impl HttpFeedRetriever {
    /// Build a retriever whose requests give up after `timeout`.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Download `url`, returning the body and the charset the server named.
    async fn fetch_remote(&self, url: Url) -> Result<(Vec<u8>, Option<String>), FeedError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "Feed request returned non-success status");
            return Err(FeedError::Status {
                url: url.to_string(),
                status,
            });
        }
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_type_charset);
        Ok((response.bytes().await?.to_vec(), charset))
    }

    async fn read_local(&self, path: PathBuf) -> Result<Vec<u8>, FeedError> {
        tokio::fs::read(&path)
            .await
            .map_err(|source| FeedError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

/// The `charset` parameter of a `Content-Type` header value.
fn content_type_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

impl FeedRetriever for HttpFeedRetriever {
    #[instrument(level = "info", skip(self))]
    async fn retrieve(&self, location: &str) -> Result<ParsedFeed, FeedError> {
        let t0 = Instant::now();
        let (body, charset) = match FeedLocation::resolve(location)? {
            FeedLocation::Remote(url) => self.fetch_remote(url).await?,
            FeedLocation::Local(path) => (self.read_local(path).await?, None),
        };
        debug!(bytes = body.len(), ?charset, "Downloaded feed body");

        match parse_feed(&body, charset.as_deref()) {
            Ok(feed) => {
                info!(
                    entries = feed.entries.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Parsed feed"
                );
                Ok(feed)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    body_preview = %truncate_for_log(&String::from_utf8_lossy(&body), 200),
                    "Feed body could not be parsed"
                );
                Err(e)
            }
        }
    }
}
