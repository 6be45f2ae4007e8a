//! Search criteria and request URL construction.
//!
//! The feed takes a single `q` parameter made of clauses such as
//! `LAST_MOD_DATE:[2023-01-01,2024-02-14]` or `ULTIMATE_UEI:"JF4LNSAWQ3K5"`,
//! separated by `+`. Only clauses that are actually set are emitted.

use crate::error::ConfigError;
use chrono::NaiveDate;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

/// Public Atom endpoint of the FPDS ezsearch feed.
pub const ATOM_FEED_BASE_URL: &str = "https://www.fpds.gov/ezsearch/FEEDS/ATOM";

const DATE_FORMAT: &str = "%Y-%m-%d";

static UEI_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{12}$").unwrap());
static AGENCY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z0-9]{4}|[A-Za-z0-9]{1,3}\*)$").unwrap());
static NAICS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[0-9]{2,6}|[0-9]{1,5}\*)$").unwrap());

/// A feed field that queries can filter and partition on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    UltimateUei,
    FundingAgencyId,
    ContractingAgencyId,
    PrincipalNaicsCode,
}

impl FilterField {
    /// Field name as the feed's query language spells it.
    pub fn feed_name(self) -> &'static str {
        match self {
            FilterField::UltimateUei => "ULTIMATE_UEI",
            FilterField::FundingAgencyId => "FUNDING_AGENCY_ID",
            FilterField::ContractingAgencyId => "CONTRACTING_AGENCY_ID",
            FilterField::PrincipalNaicsCode => "PRINCIPAL_NAICS_CODE",
        }
    }

    /// Check a value before it is interpolated into a quoted clause.
    ///
    /// Agency IDs and NAICS codes may end in `*` to match a prefix
    /// (`1*`, `5413*`).
    pub fn validate(self, value: &str) -> Result<(), ConfigError> {
        let pattern = match self {
            FilterField::UltimateUei => &UEI_PATTERN,
            FilterField::FundingAgencyId | FilterField::ContractingAgencyId => &AGENCY_PATTERN,
            FilterField::PrincipalNaicsCode => &NAICS_PATTERN,
        };
        if pattern.is_match(value) {
            Ok(())
        } else {
            Err(ConfigError::FilterValue {
                field: self.feed_name(),
                value: value.to_string(),
            })
        }
    }
}

/// Inclusive `LAST_MOD_DATE` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::DateOrder {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    fn clause(&self) -> String {
        format!(
            "LAST_MOD_DATE:[{},{}]",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ConfigError::Date {
        value: value.to_string(),
    })
}

/// An exact-match filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: FilterField,
    pub value: String,
}

impl Filter {
    fn clause(&self) -> String {
        format!("{}:\"{}\"", self.field.feed_name(), self.value)
    }
}

/// Immutable search criteria for the first page of a walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub date_range: Option<DateRange>,
    pub filters: Vec<Filter>,
}

impl Query {
    /// Copy of this query with `field` set to `value`, replacing any
    /// existing filter on the same field.
    pub fn with_filter(&self, field: FilterField, value: impl Into<String>) -> Query {
        let mut filters: Vec<Filter> = self
            .filters
            .iter()
            .filter(|f| f.field != field)
            .cloned()
            .collect();
        filters.push(Filter {
            field,
            value: value.into(),
        });
        Query {
            date_range: self.date_range,
            filters,
        }
    }

    /// The non-empty clauses of this query, date range first.
    pub fn clauses(&self) -> Vec<String> {
        self.date_range
            .iter()
            .map(DateRange::clause)
            .chain(
                self.filters
                    .iter()
                    .filter(|f| !f.value.is_empty())
                    .map(Filter::clause),
            )
            .collect()
    }

    /// Request URL for the first page of this query.
    ///
    /// Clauses are space-separated in `q`, which form encoding renders as `+`.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair("FEEDNAME", "PUBLIC")
            .append_pair("q", &self.clauses().join(" "));
        url
    }
}
