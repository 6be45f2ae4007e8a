//! # FPDS Feed ETL
//!
//! Crawls the FPDS contract-award Atom feed, decodes every entry into a flat
//! record, and writes the merged result to CSV, JSON Lines, or PostgreSQL.
//!
//! ## Usage
//!
//! ```sh
//! fpds_feed_etl --start-date 2024-02-13 --end-date 2024-02-14 \
//!     -p JF4LNSAWQ3K5 -p QVZMH5JLF274 -o awards.csv
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Configuration**: merge CLI flags, environment, and an optional YAML file
//! 2. **Partitioning**: one query per partition value over a shared base query
//! 3. **Walking**: follow each query's `next` links page by page (10 partitions at a time by default)
//! 4. **Output**: write the union of successful partitions to the chosen sink

use clap::Parser;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod coordinator;
mod error;
mod feed;
mod models;
mod outputs;
#[cfg(test)]
mod test_support;
mod utils;

use api::{HttpFetcher, RetryFetch};
use cli::Cli;
use config::{RunConfig, SinkConfig};
use coordinator::{Coordinator, RunReport};
use error::{AppError, SinkError};
use feed::walker::FeedWalker;
use utils::ensure_parent_dir;

/// First delay before a retried page fetch; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
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

    let start_time = Instant::now();
    info!("fpds_feed_etl starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = run(&args).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    result.map_err(Into::into)
}

#[instrument(level = "info", skip_all)]
async fn run(args: &Cli) -> Result<(), AppError> {
    let config = RunConfig::resolve(args)?;
    info!(
        base_url = %config.base_url,
        start = ?config.query.date_range.map(|r| r.start()),
        end = ?config.query.date_range.map(|r| r.end()),
        partition_by = config.partition_by.feed_name(),
        partitions = config.partitions.len(),
        concurrency = config.concurrency,
        sink = config.sink.kind(),
        "Resolved configuration"
    );

    // Early check: the output file must be writable before any crawling starts
    if let Some(path) = config.sink.output_path() {
        if let Err(e) = ensure_parent_dir(path).await {
            error!(
                path = %path.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(SinkError::Io {
                path: path.display().to_string(),
                source: e,
            }
            .into());
        }
    }

    let fetcher = RetryFetch::new(
        HttpFetcher::new(config.timeout)?,
        config.retries,
        RETRY_BASE_DELAY,
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight pages and stopping");
            on_ctrl_c.cancel();
        }
    });

    let walker = FeedWalker::new(&fetcher, config.base_url.clone()).with_cancellation(cancel);
    let coordinator = Coordinator::new(walker, config.concurrency);
    let report = coordinator
        .run(&config.query, config.partition_by, &config.partitions)
        .await;

    persist_report(&report, &config.sink, config.strict).await
}

/// Write the records of a finished crawl and decide the run's outcome.
///
/// The sink is written even when some partitions failed. A sink failure is
/// returned as [`AppError::Sink`]. In strict mode, any partition failure is
/// then reported as [`AppError::PartitionsFailed`].
///
/// # Arguments
///
/// * `report` - Records and failures gathered by the coordinator
/// * `sink` - Destination for the records
/// * `strict` - Whether partition failures fail the run
///
/// # Returns
///
/// `Ok(())` when the records were written and the run counts as a success.
async fn persist_report(report: &RunReport, sink: &SinkConfig, strict: bool) -> Result<(), AppError> {
    for failure in &report.failures {
        warn!(partition = %failure.partition, error = %failure.source, "Partition skipped");
    }

    match outputs::write_records(sink, &report.records).await {
        Ok(written) => info!(written, sink = sink.kind(), "Records persisted"),
        Err(e) => {
            error!(error = %e, sink = sink.kind(), "Failed to write records");
            return Err(e.into());
        }
    }

    if strict && !report.failures.is_empty() {
        return Err(AppError::PartitionsFailed {
            failed: report.failures.len(),
            total: report.partitions,
        });
    }

    Ok(())
}
