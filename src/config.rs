//! Run configuration and the source registry loader.
//!
//! [`AppConfig`] is built once by `main` from the CLI and passed by reference
//! to the pipeline. The source registry is a YAML document:
//!
//! ```yaml
//! sources:
//!   - id: bbc
//!     name: BBC News
//!     rss: https://feeds.bbci.co.uk/news/rss.xml
//!     max_items: 20   # optional, defaults to 30
//! ```

use crate::models::SourceDescriptor;
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Everything a single run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// YAML source registry.
    pub sources_path: PathBuf,
    /// Destination of the result envelope.
    pub output_path: PathBuf,
    /// Upper bound for retrieving one feed.
    pub fetch_timeout: Duration,
    /// `User-Agent` sent with feed requests.
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources_path: PathBuf::from("backend/sources.yml"),
            output_path: PathBuf::from("public/articles.json"),
            fetch_timeout: Duration::from_secs(30),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AppConfig {
    /// Directory the output file lives in.
    pub fn output_dir(&self) -> &Path {
        match self.output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceRegistry {
    #[serde(default)]
    sources: Vec<SourceDescriptor>,
}

/// Parse a YAML registry document. A missing `sources` key means no sources.
pub fn parse_sources(yaml: &str) -> Result<Vec<SourceDescriptor>, serde_yaml::Error> {
    let registry: Option<SourceRegistry> = serde_yaml::from_str(yaml)?;
    Ok(registry.map(|r| r.sources).unwrap_or_default())
}

/// Read and parse the source registry at `path`.
///
/// # Errors
///
/// Any failure here is fatal for the run: the file is missing or unreadable,
/// or it is not a valid registry document.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_sources(path: &Path) -> Result<Vec<SourceDescriptor>, Box<dyn Error>> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("reading source registry {}: {e}", path.display()))?;
    let sources = parse_sources(&yaml)
        .map_err(|e| format!("parsing source registry {}: {e}", path.display()))?;
    info!(count = sources.len(), "Loaded source registry");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_MAX_ITEMS;

    const REGISTRY: &str = r#"
sources:
  - id: bbc
    name: BBC News
    rss: https://feeds.bbci.co.uk/news/rss.xml
  - id: cna
    name: 中央社
    rss: https://feeds.feedburner.com/rsscna/politics
    max_items: 10
"#;

    #[test]
    fn test_parse_sources_in_order() {
        let sources = parse_sources(REGISTRY).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, "bbc");
        assert_eq!(sources[0].max_items, DEFAULT_MAX_ITEMS);
        assert_eq!(sources[1].name, "中央社");
        assert_eq!(sources[1].max_items, 10);
    }

    #[test]
    fn test_missing_sources_key_is_empty() {
        assert!(parse_sources("other: 1\n").unwrap().is_empty());
    }

    #[test]
    fn test_source_without_feed_url_is_an_error() {
        assert!(parse_sources("sources:\n  - id: x\n    name: X\n").is_err());
    }

    #[test]
    fn test_output_dir() {
        let mut config = AppConfig::default();
        assert_eq!(config.output_dir(), Path::new("public"));
        config.output_path = PathBuf::from("articles.json");
        assert_eq!(config.output_dir(), Path::new("."));
    }

    #[tokio::test]
    async fn test_load_sources_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.yml");
        std::fs::write(&path, REGISTRY).unwrap();
        let sources = load_sources(&path).await.unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[tokio::test]
    async fn test_load_sources_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_sources(&dir.path().join("nope.yml")).await.unwrap_err();
        assert!(err.to_string().contains("reading source registry"));
    }
}
