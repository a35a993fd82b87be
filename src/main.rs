//! # Feed Roundup
//!
//! Collects RSS and Atom feeds from a configured list of sources, normalizes
//! every entry into a common article record, and writes the newest-first list
//! to a single JSON file for a static site to pick up.
//!
//! ## Usage
//!
//! ```sh
//! feed_roundup -s backend/sources.yml -o public/articles.json
//! ```
//!
//! ## Architecture
//!
//! The application is a linear pipeline that runs once and exits:
//! 1. **Registry**: Load the source list from YAML
//! 2. **Fetching**: Retrieve each feed in order, one at a time
//! 3. **Normalizing**: Map up to `max_items` entries per source into article records
//! 4. **Output**: Sort everything newest first and replace the JSON file
//!
//! A source that fails is logged and skipped. Only a missing registry or an
//! unwritable output location stops the run.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod feeds;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod utils;

use cli::Cli;
use feeds::retriever::HttpFeedRetriever;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_roundup starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.sources, ?args.output, timeout_secs = args.timeout_secs, "Parsed CLI arguments");
    let config = args.into_config();

    // Early check: ensure the output dir exists and is writable
    if let Err(e) = ensure_writable_dir(config.output_dir()).await {
        error!(
            path = %config.output_dir().display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let retriever = HttpFeedRetriever::new(config.fetch_timeout, &config.user_agent)?;
    let envelope = pipeline::run(&config, &retriever).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        sources = envelope.source_count,
        articles = envelope.article_count,
        "Execution complete"
    );

    Ok(())
}
