//! Run configuration.
//!
//! Settings come from three layers, highest priority first: command-line
//! flags (and their environment fallbacks), an optional YAML file, and
//! built-in defaults. Everything is validated here so that a bad identifier
//! or date fails the run before any request is made.
//!
//! ```yaml
//! start_date: 2024-02-13
//! end_date: 2024-02-14
//! partition_by: funding_agency_id
//! partitions: ["1*", "2*", "3*"]
//! naics: "541611"
//! sink: postgres
//! table: fpds_raw
//! create_table: true
//! ```

use crate::cli::Cli;
use crate::coordinator::DEFAULT_CONCURRENCY;
use crate::error::ConfigError;
use crate::feed::query::{ATOM_FEED_BASE_URL, DateRange, FilterField, Query};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TABLE: &str = "fpds_raw";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CSV_PATH: &str = "fpds_data.csv";
const DEFAULT_JSONL_PATH: &str = "fpds_data.jsonl";

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(?:\.[A-Za-z_][A-Za-z0-9_]{0,62})?$").unwrap()
});

/// Accepts `table` or `schema.table` made of plain identifier characters.
pub fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    if TABLE_NAME.is_match(table) {
        Ok(())
    } else {
        Err(ConfigError::TableName(table.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    Csv,
    Jsonl,
    Postgres,
}

/// Where the merged records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    Csv {
        path: PathBuf,
    },
    JsonLines {
        path: PathBuf,
    },
    Postgres {
        database_url: String,
        table: String,
        create_table: bool,
    },
}

impl SinkConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SinkConfig::Csv { .. } => "csv",
            SinkConfig::JsonLines { .. } => "jsonl",
            SinkConfig::Postgres { .. } => "postgres",
        }
    }

    /// Output file, for the file-backed sinks.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            SinkConfig::Csv { path } | SinkConfig::JsonLines { path } => Some(path),
            SinkConfig::Postgres { .. } => None,
        }
    }
}

/// Contents of a `--config` YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub partition_by: Option<FilterField>,
    pub partitions: Option<Vec<String>>,
    pub ultimate_uei: Option<String>,
    pub funding_agency_id: Option<String>,
    pub contracting_agency_id: Option<String>,
    pub naics: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<usize>,
    pub strict: Option<bool>,
    pub sink: Option<SinkKind>,
    pub output: Option<PathBuf>,
    pub database_url: Option<String>,
    pub table: Option<String>,
    pub create_table: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: Url,
    /// Shared criteria applied to every partition.
    pub query: Query,
    pub partition_by: FilterField,
    pub partitions: Vec<String>,
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: usize,
    pub strict: bool,
    pub sink: SinkConfig,
}

impl RunConfig {
    /// Load the config file named by `cli` (if any) and merge it under the CLI.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let base_url_raw = cli
            .base_url
            .clone()
            .or(file.base_url)
            .unwrap_or_else(|| ATOM_FEED_BASE_URL.to_string());
        let base_url = Url::parse(&base_url_raw).map_err(|source| ConfigError::BaseUrl {
            value: base_url_raw.clone(),
            source,
        })?;

        let start = cli.start_date.clone().or(file.start_date);
        let end = cli.end_date.clone().or(file.end_date);
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::parse(&start, &end)?),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteDateRange),
        };

        let mut query = Query {
            date_range,
            filters: Vec::new(),
        };
        let shared = [
            (FilterField::UltimateUei, cli.ultimate_uei.clone().or(file.ultimate_uei)),
            (FilterField::FundingAgencyId, cli.funding_agency_id.clone().or(file.funding_agency_id)),
            (
                FilterField::ContractingAgencyId,
                cli.contracting_agency_id.clone().or(file.contracting_agency_id),
            ),
            (FilterField::PrincipalNaicsCode, cli.naics.clone().or(file.naics)),
        ];
        for (field, value) in shared {
            if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                field.validate(&value)?;
                query = query.with_filter(field, value);
            }
        }

        let partition_by = cli
            .partition_by
            .or(file.partition_by)
            .unwrap_or(FilterField::UltimateUei);
        let partitions: Vec<String> = if cli.partitions.is_empty() {
            file.partitions.unwrap_or_default()
        } else {
            cli.partitions.clone()
        }
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
        for value in &partitions {
            partition_by.validate(value)?;
        }

        let concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        let timeout_secs = cli
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }

        let output = cli.output.clone().or(file.output);
        let sink = match cli.sink.or(file.sink).unwrap_or(SinkKind::Csv) {
            SinkKind::Csv => SinkConfig::Csv {
                path: output.unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH)),
            },
            SinkKind::Jsonl => SinkConfig::JsonLines {
                path: output.unwrap_or_else(|| PathBuf::from(DEFAULT_JSONL_PATH)),
            },
            SinkKind::Postgres => {
                let database_url = cli
                    .database_url
                    .clone()
                    .or(file.database_url)
                    .ok_or_else(|| {
                        ConfigError::Invalid(
                            "the postgres sink needs --database-url or DATABASE_URL".to_string(),
                        )
                    })?;
                let table = cli
                    .table
                    .clone()
                    .or(file.table)
                    .unwrap_or_else(|| DEFAULT_TABLE.to_string());
                validate_table_name(&table)?;
                SinkConfig::Postgres {
                    database_url,
                    table,
                    create_table: cli.create_table || file.create_table.unwrap_or(false),
                }
            }
        };

        Ok(RunConfig {
            base_url,
            query,
            partition_by,
            partitions,
            concurrency,
            timeout: Duration::from_secs(timeout_secs),
            retries: cli.retries.or(file.retries).unwrap_or(0),
            strict: cli.strict || file.strict.unwrap_or(false),
            sink,
        })
    }
}
