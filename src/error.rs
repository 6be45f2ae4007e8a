//! Typed errors for fetching, configuration, and output.
//!
//! Feed failures ([`FetchError`]) are scoped to a single partition and never
//! abort the run; the coordinator wraps them in [`PartitionFailure`]. Sink
//! failures ([`SinkError`]) are fatal for the whole run and reach `main`
//! through [`AppError`].

use std::io;
use thiserror::Error;

/// Failure while fetching or parsing one page of the feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or HTTP-level failure.
    #[error("transport error fetching {url}: {message}")]
    Transport {
        url: String,
        /// HTTP status when the server answered with a non-success code.
        status: Option<u16>,
        message: String,
    },

    /// Body is not parseable XML or is not an Atom feed document.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// The run was cancelled before this page was requested.
    #[error("walk cancelled before fetching {url}")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Connection-level failures and 408/429/5xx responses are retryable;
    /// malformed bodies and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { status: None, .. } => true,
            FetchError::Transport {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || *code >= 500,
            FetchError::Malformed { .. } | FetchError::Cancelled { .. } => false,
        }
    }
}

/// A fetch error scoped to the partition whose walk it ended.
#[derive(Debug, Error)]
#[error("partition {partition} failed: {source}")]
pub struct PartitionFailure {
    /// Label of the partition (its filter value, or `all`).
    pub partition: String,
    pub source: FetchError,
}

/// Failure writing records to the output destination.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("sink is misconfigured: {0}")]
    Config(String),
}

/// Invalid or unreadable run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    Date { value: String },

    #[error("start date {start} is after end date {end}")]
    DateOrder { start: String, end: String },

    #[error("both a start date and an end date are required for a date range")]
    IncompleteDateRange,

    #[error("invalid {field} value '{value}'")]
    FilterValue { field: &'static str, value: String },

    #[error("invalid base URL '{value}': {source}")]
    BaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid table name '{0}'")]
    TableName(String),

    #[error("{0}")]
    Invalid(String),
}

/// Top-level error surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not write output: {0}")]
    Sink(#[from] SinkError),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{failed} of {total} partitions failed")]
    PartitionsFailed { failed: usize, total: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(status: Option<u16>) -> FetchError {
        FetchError::Transport {
            url: "https://feed.test/atom".to_string(),
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_connection_failures_are_retryable() {
        assert!(transport(None).is_retryable());
    }

    #[test]
    fn test_status_retryability() {
        assert!(transport(Some(503)).is_retryable());
        assert!(transport(Some(429)).is_retryable());
        assert!(transport(Some(408)).is_retryable());
        assert!(!transport(Some(404)).is_retryable());
        assert!(!transport(Some(400)).is_retryable());
    }

    #[test]
    fn test_malformed_and_cancelled_are_final() {
        let malformed = FetchError::Malformed {
            url: "u".to_string(),
            reason: "not xml".to_string(),
        };
        let cancelled = FetchError::Cancelled {
            url: "u".to_string(),
        };
        assert!(!malformed.is_retryable());
        assert!(!cancelled.is_retryable());
    }

    #[test]
    fn test_partition_failure_message_names_partition() {
        let failure = PartitionFailure {
            partition: "541330".to_string(),
            source: transport(Some(500)),
        };
        let msg = failure.to_string();
        assert!(msg.contains("541330"));
        assert!(msg.contains("transport error"));
    }
}
