//! Output sinks for the merged record set.
//!
//! # Submodules
//!
//! - [`csv`]: header row plus one row per record
//! - [`json`]: JSON Lines, one object per record
//! - [`postgres`]: one transaction of parameterised inserts (feature `postgres`)
//!
//! Every sink writes each record exactly once, in the order given. Monetary
//! columns go through [`ContractRecord::typed_values`] so empty amounts land
//! as empty cells, JSON `null`, or SQL `NULL` rather than zero.

pub mod csv;
pub mod json;
#[cfg(feature = "postgres")]
pub mod postgres;

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::models::ContractRecord;
use crate::utils::ensure_parent_dir;
use std::path::Path;
use tracing::{info, instrument};

/// A destination for decoded records.
pub trait RecordSink {
    /// Persist `records`, returning how many were written.
    async fn write_records(&self, records: &[ContractRecord]) -> Result<usize, SinkError>;
}

/// Write `records` to the sink described by `config`.
///
/// # Arguments
///
/// * `config` - Which sink to use and where it writes
/// * `records` - Records to persist, in the order they are written
///
/// # Returns
///
/// The number of records written, or a [`SinkError`] if nothing could be
/// persisted.
#[instrument(level = "info", skip_all, fields(sink = config.kind(), records = records.len()))]
pub async fn write_records(config: &SinkConfig, records: &[ContractRecord]) -> Result<usize, SinkError> {
    let written = match config {
        SinkConfig::Csv { path } => self::csv::CsvSink::new(path).write_records(records).await?,
        SinkConfig::JsonLines { path } => {
            self::json::JsonLinesSink::new(path)
                .write_records(records)
                .await?
        }
        #[cfg(feature = "postgres")]
        SinkConfig::Postgres {
            database_url,
            table,
            create_table,
        } => {
            self::postgres::PgSink::connect(database_url, table, *create_table)
                .await?
                .write_records(records)
                .await?
        }
        #[cfg(not(feature = "postgres"))]
        SinkConfig::Postgres { .. } => {
            return Err(SinkError::Config(
                "built without the `postgres` feature".to_string(),
            ));
        }
    };
    info!(written, "Sink write complete");
    Ok(written)
}

/// Write a fully encoded file, creating its parent directory first.
pub(crate) async fn write_file(path: &Path, bytes: Vec<u8>) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.display().to_string(),
        source,
    };
    ensure_parent_dir(path).await.map_err(io_err)?;
    tokio::fs::write(path, bytes).await.map_err(io_err)?;
    info!(path = %path.display(), "Wrote output file");
    Ok(())
}
