//! Command-line interface definitions.
//!
//! Every setting is optional on the command line so that a `--config` file
//! can supply it; see [`RunConfig::resolve`](crate::config::RunConfig::resolve)
//! for how the two are merged.

use crate::config::SinkKind;
use crate::feed::query::FilterField;
use clap::Parser;
use std::path::PathBuf;

/// Crawl FPDS contract awards and export them as CSV, JSON Lines, or PostgreSQL rows.
///
/// # Examples
///
/// ```sh
/// # Two UEIs over a date window, to CSV
/// fpds_feed_etl --start-date 2024-02-13 --end-date 2024-02-14 \
///     -p JF4LNSAWQ3K5 -p QVZMH5JLF274 --naics 541611 -o awards.csv
///
/// # Every funding agency, partitioned by leading digit, into PostgreSQL
/// fpds_feed_etl --start-date 2024-02-13 --end-date 2024-02-14 \
///     --partition-by funding-agency-id -p '1*,2*,3*,4*,5*,6*,7*,8*,9*,0*' \
///     --sink postgres --database-url postgres://localhost/fpds
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// First LAST_MOD_DATE day to include (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last LAST_MOD_DATE day to include (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Field each parallel walk filters on [default: ultimate-uei]
    #[arg(long, value_enum)]
    pub partition_by: Option<FilterField>,

    /// Partition value; repeat the flag or separate values with commas
    #[arg(short = 'p', long = "partition", value_delimiter = ',')]
    pub partitions: Vec<String>,

    /// Restrict every partition to one vendor UEI
    #[arg(long)]
    pub ultimate_uei: Option<String>,

    /// Restrict every partition to one funding agency
    #[arg(long)]
    pub funding_agency_id: Option<String>,

    /// Restrict every partition to one contracting agency
    #[arg(long)]
    pub contracting_agency_id: Option<String>,

    /// Restrict every partition to a NAICS code or prefix (e.g. 5413*)
    #[arg(long)]
    pub naics: Option<String>,

    /// Output destination [default: csv]
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// Output file for the csv and jsonl sinks
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// PostgreSQL connection string for the postgres sink
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Target table for the postgres sink [default: fpds_raw]
    #[arg(long)]
    pub table: Option<String>,

    /// Create the target table if it does not exist
    #[arg(long)]
    pub create_table: bool,

    /// Maximum number of partitions walked at once [default: 10]
    #[arg(long, env = "FPDS_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds [default: 60]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries per page for transient fetch failures [default: 0]
    #[arg(long)]
    pub retries: Option<usize>,

    /// Exit non-zero if any partition fails
    #[arg(long)]
    pub strict: bool,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feed endpoint
    #[arg(long, env = "FPDS_BASE_URL")]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "fpds_feed_etl",
            "--start-date",
            "2024-02-13",
            "--end-date",
            "2024-02-14",
            "--partition-by",
            "funding-agency-id",
            "--partition",
            "1*",
            "--partition",
            "2*",
            "--naics",
            "541611",
            "--sink",
            "jsonl",
            "--strict",
        ]);

        assert_eq!(cli.start_date.as_deref(), Some("2024-02-13"));
        assert_eq!(cli.end_date.as_deref(), Some("2024-02-14"));
        assert_eq!(cli.partition_by, Some(FilterField::FundingAgencyId));
        assert_eq!(cli.partitions, vec!["1*", "2*"]);
        assert_eq!(cli.naics.as_deref(), Some("541611"));
        assert_eq!(cli.sink, Some(SinkKind::Jsonl));
        assert!(cli.strict);
        assert!(!cli.create_table);
    }

    #[test]
    fn test_cli_short_flags_and_comma_values() {
        let cli = Cli::parse_from([
            "fpds_feed_etl",
            "-p",
            "JF4LNSAWQ3K5,QVZMH5JLF274",
            "-o",
            "/tmp/awards.csv",
            "-c",
            "/tmp/fpds.yaml",
        ]);

        assert_eq!(cli.partitions, vec!["JF4LNSAWQ3K5", "QVZMH5JLF274"]);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/awards.csv")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fpds.yaml")));
        assert!(cli.partition_by.is_none());
    }

    #[test]
    fn test_cli_rejects_unknown_sink() {
        assert!(Cli::try_parse_from(["fpds_feed_etl", "--sink", "parquet"]).is_err());
    }
}
