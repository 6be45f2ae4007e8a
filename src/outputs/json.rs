//! JSON Lines output.
//!
//! One object per line, keyed by column name. Monetary fields are JSON
//! numbers, or `null` when the feed left them empty.

use super::{RecordSink, write_file};
use crate::error::SinkError;
use crate::models::ContractRecord;
use std::path::PathBuf;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn encode(records: &[ContractRecord]) -> Result<Vec<u8>, SinkError> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}

impl RecordSink for JsonLinesSink {
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    async fn write_records(&self, records: &[ContractRecord]) -> Result<usize, SinkError> {
        let bytes = encode(records)?;
        write_file(&self.path, bytes).await?;
        Ok(records.len())
    }
}
