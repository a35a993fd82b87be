//! Command-line interface definitions for Feed Roundup.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the Feed Roundup application.
///
/// # Examples
///
/// ```sh
/// # Defaults: backend/sources.yml -> public/articles.json
/// feed_roundup
///
/// # Explicit paths and a shorter timeout
/// feed_roundup -s ./sources.yml -o ./site/articles.json --timeout-secs 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML source registry
    #[arg(short, long, env = "FEED_SOURCES", default_value = "backend/sources.yml")]
    pub sources: PathBuf,

    /// Path of the JSON file to (over)write
    #[arg(short, long, env = "FEED_OUTPUT", default_value = "public/articles.json")]
    pub output: PathBuf,

    /// Seconds to wait for a single feed before giving up on that source
    #[arg(long, env = "FEED_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Cli {
    /// Build the run configuration handed to the pipeline.
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            sources_path: self.sources,
            output_path: self.output,
            fetch_timeout: Duration::from_secs(self.timeout_secs),
            ..AppConfig::default()
        }
    }
}
