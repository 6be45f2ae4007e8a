//! Delimited output with a header row.
//!
//! The header is written even when there are no records, so downstream
//! loaders always see the full column layout.

use super::{RecordSink, write_file};
use crate::error::SinkError;
use crate::models::{ContractRecord, columns};
use std::path::PathBuf;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Encode records as CSV bytes; monetary nulls become empty cells.
pub fn encode(records: &[ContractRecord]) -> Result<Vec<u8>, SinkError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns())?;
    for record in records {
        writer.write_record(record.typed_values().map(|value| value.to_cell()))?;
    }
    writer
        .into_inner()
        .map_err(|e| SinkError::Csv(csv::Error::from(e.into_error())))
}

impl RecordSink for CsvSink {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn write_records(&self, records: &[ContractRecord]) -> Result<usize, SinkError> {
        let bytes = encode(records)?;
        write_file(&self.path, bytes).await?;
        Ok(records.len())
    }
}
