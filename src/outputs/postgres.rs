//! PostgreSQL output.
//!
//! All records go in through one transaction, one parameterised `INSERT` per
//! record. Column names are emitted unquoted, so they fold to lower case the
//! same way a hand-written `CREATE TABLE` would.

use super::RecordSink;
use crate::config::validate_table_name;
use crate::error::SinkError;
use crate::feed::decoder::FIELDS;
use crate::models::{ContractRecord, FieldKind, FieldValue, columns};
use itertools::Itertools;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Instant;
use tracing::{info, instrument};

pub struct PgSink {
    pool: PgPool,
    table: String,
    create_table: bool,
}

impl PgSink {
    pub async fn connect(database_url: &str, table: &str, create_table: bool) -> Result<Self, SinkError> {
        validate_table_name(table).map_err(|e| SinkError::Config(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            table: table.to_string(),
            create_table,
        })
    }
}

pub fn insert_statement(table: &str) -> String {
    let placeholders = (1..=FIELDS.len()).map(|i| format!("${i}")).join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns().join(", ")
    )
}

pub fn create_table_statement(table: &str) -> String {
    let column_defs = FIELDS
        .iter()
        .map(|spec| {
            let sql_type = match spec.kind {
                FieldKind::Text => "TEXT",
                FieldKind::Money => "DOUBLE PRECISION",
            };
            format!("{} {sql_type}", spec.column)
        })
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {table} (id BIGSERIAL PRIMARY KEY, {column_defs})")
}

impl RecordSink for PgSink {
    #[instrument(level = "info", skip_all, fields(table = %self.table))]
    async fn write_records(&self, records: &[ContractRecord]) -> Result<usize, SinkError> {
        let t0 = Instant::now();
        let mut tx = self.pool.begin().await?;

        if self.create_table {
            sqlx::query(&create_table_statement(&self.table))
                .execute(&mut *tx)
                .await?;
        }

        let statement = insert_statement(&self.table);
        let mut inserted = 0usize;
        for record in records {
            let mut query = sqlx::query(&statement);
            for value in record.typed_values() {
                query = match value {
                    FieldValue::Text(text) => query.bind(text),
                    FieldValue::Number(n) => query.bind(Some(n)),
                    FieldValue::Null => query.bind(None::<f64>),
                };
            }
            query.execute(&mut *tx).await?;
            inserted += 1;
        }

        tx.commit().await?;
        info!(
            inserted,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Committed records"
        );
        Ok(inserted)
    }
}
