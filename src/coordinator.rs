//! Bounded fan-out of one walk per partition value.
//!
//! Every partition is the base query with the partition field set to one
//! value. At most `concurrency` walks are in flight at once. A partition that
//! fails is logged and reported but does not stop the others, and none of
//! its records are kept.

use crate::api::FeedFetcher;
use crate::error::PartitionFailure;
use crate::feed::query::{FilterField, Query};
use crate::feed::walker::FeedWalker;
use crate::models::ContractRecord;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Instant;
use tracing::{Instrument, error, info, info_span};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Label used when there are no partition values and the base query runs once.
pub const UNPARTITIONED: &str = "all";

/// Outcome of a fan-out run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Records of every successful partition. Partition order is completion
    /// order; within a partition, records keep page order.
    pub records: Vec<ContractRecord>,
    pub failures: Vec<PartitionFailure>,
    pub partitions: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.partitions - self.failures.len()
    }
}

pub struct Coordinator<'a, F> {
    walker: FeedWalker<'a, F>,
    concurrency: usize,
}

impl<'a, F> Coordinator<'a, F>
where
    F: FeedFetcher,
{
    /// A concurrency of 0 is treated as 1.
    pub fn new(walker: FeedWalker<'a, F>, concurrency: usize) -> Self {
        Self {
            walker,
            concurrency: concurrency.max(1),
        }
    }

    /// Walk `base` once per distinct value in `values`, filtered on `field`.
    ///
    /// Blank values are ignored and duplicates run once. When no usable
    /// value remains, the base query runs as a single partition.
    ///
    /// # Arguments
    ///
    /// * `base` - Criteria shared by every partition
    /// * `field` - Dimension each partition filters on
    /// * `values` - One partition per distinct value
    ///
    /// # Returns
    ///
    /// A [`RunReport`] with the records of every successful partition and one
    /// [`PartitionFailure`] per failed partition. This never fails as a whole.
    pub async fn run(&self, base: &Query, field: FilterField, values: &[String]) -> RunReport {
        let mut partitions: Vec<(String, Query)> = values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unique()
            .map(|v| (v.to_string(), base.with_filter(field, v)))
            .collect();
        if partitions.is_empty() {
            partitions.push((UNPARTITIONED.to_string(), base.clone()));
        }

        let total = partitions.len();
        info!(
            partitions = total,
            field = field.feed_name(),
            concurrency = self.concurrency,
            "Starting partitioned crawl"
        );

        let walker = &self.walker;
        let results: Vec<(String, Result<Vec<ContractRecord>, _>)> = stream::iter(partitions)
            .map(|(label, query)| {
                let span = info_span!("partition", value = %label);
                async move {
                    let t0 = Instant::now();
                    let result = walker.walk_query(&query).await;
                    match &result {
                        Ok(records) => info!(
                            records = records.len(),
                            elapsed_ms = t0.elapsed().as_millis() as u64,
                            "Partition complete"
                        ),
                        Err(e) => error!(error = %e, "Partition failed; skipping its records"),
                    }
                    (label, result)
                }
                .instrument(span)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = RunReport {
            partitions: total,
            ..RunReport::default()
        };
        for (partition, result) in results {
            match result {
                Ok(records) => report.records.extend(records),
                Err(source) => report.failures.push(PartitionFailure { partition, source }),
            }
        }

        info!(
            partitions = report.partitions,
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            records = report.records.len(),
            "Partitioned crawl finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::query::DateRange;
    use crate::error::FetchError;
    use crate::test_support::{FixtureFetcher, feed_page};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    /// Answers every URL with a one-entry page after a short delay, tracking
    /// the highest number of fetches in flight at once.
    #[derive(Default)]
    struct SlowFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FeedFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(feed_page(&["X"], None))
        }
    }

    fn base_url() -> Url {
        Url::parse("https://feed.test/atom").unwrap()
    }

    fn base_query() -> Query {
        Query {
            date_range: Some(DateRange::parse("2023-01-01", "2024-02-14").unwrap()),
            filters: vec![],
        }
    }

    fn url_for(value: &str) -> String {
        base_query()
            .with_filter(FilterField::UltimateUei, value)
            .to_url(&base_url())
            .to_string()
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sorted_piids(report: &RunReport) -> Vec<String> {
        report
            .records
            .iter()
            .map(|r| r.get("PIID").unwrap().to_string())
            .sorted()
            .collect()
    }

    #[tokio::test]
    async fn test_failed_partition_contributes_no_records() {
        let second_page = "https://feed.test/atom?uei2=next";
        let fetcher = FixtureFetcher::new()
            .with_page(&url_for("AAAAAAAAAAA1"), &feed_page(&["A1", "A2"], None))
            .with_page(&url_for("BBBBBBBBBBB2"), &feed_page(&["B1"], Some(second_page)))
            .with_failure(second_page, 500)
            .with_page(&url_for("CCCCCCCCCCC3"), &feed_page(&["C1"], None));
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 2);

        let report = coordinator
            .run(
                &base_query(),
                FilterField::UltimateUei,
                &values(&["AAAAAAAAAAA1", "BBBBBBBBBBB2", "CCCCCCCCCCC3"]),
            )
            .await;

        assert_eq!(report.partitions, 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].partition, "BBBBBBBBBBB2");
        assert_eq!(sorted_piids(&report), vec!["A1", "A2", "C1"]);
    }

    #[tokio::test]
    async fn test_records_within_partition_keep_page_order() {
        let next = "https://feed.test/atom?p=2";
        let fetcher = FixtureFetcher::new()
            .with_page(&url_for("AAAAAAAAAAA1"), &feed_page(&["A1", "A2"], Some(next)))
            .with_page(next, &feed_page(&["A3"], None));
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), DEFAULT_CONCURRENCY);

        let report = coordinator
            .run(&base_query(), FilterField::UltimateUei, &values(&["AAAAAAAAAAA1"]))
            .await;
        let piids: Vec<_> = report.records.iter().map(|r| r.get("PIID").unwrap()).collect();
        assert_eq!(piids, vec!["A1", "A2", "A3"]);
    }

    #[tokio::test]
    async fn test_duplicate_values_walk_once() {
        let fetcher = FixtureFetcher::new()
            .with_page(&url_for("AAAAAAAAAAA1"), &feed_page(&["A1"], None));
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 4);

        let report = coordinator
            .run(
                &base_query(),
                FilterField::UltimateUei,
                &values(&["AAAAAAAAAAA1", "AAAAAAAAAAA1", " AAAAAAAAAAA1 "]),
            )
            .await;
        assert_eq!(report.partitions, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_no_values_runs_base_query_once() {
        let url = base_query().to_url(&base_url()).to_string();
        let fetcher = FixtureFetcher::new().with_page(&url, &feed_page(&["X"], None));
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 0);

        let report = coordinator.run(&base_query(), FilterField::UltimateUei, &[]).await;
        assert_eq!(report.partitions, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(fetcher.requests(), vec![url]);
    }

    #[tokio::test]
    async fn test_all_partitions_failing_yields_empty_records() {
        let fetcher = FixtureFetcher::new();
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 3);

        let report = coordinator
            .run(
                &base_query(),
                FilterField::UltimateUei,
                &values(&["AAAAAAAAAAA1", "BBBBBBBBBBB2"]),
            )
            .await;
        assert!(report.records.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.succeeded(), 0);
    }

    #[tokio::test]
    async fn test_walks_in_flight_never_exceed_concurrency() {
        let fetcher = SlowFetcher::default();
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 3);
        let uei: Vec<String> = (0..12).map(|i| format!("PARTITION{i:03}")).collect();

        let report = coordinator.run(&base_query(), FilterField::UltimateUei, &uei).await;
        assert_eq!(report.partitions, 12);
        assert_eq!(report.records.len(), 12);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_values_fall_back_to_base_query() {
        let url = base_query().to_url(&base_url()).to_string();
        let fetcher = FixtureFetcher::new().with_page(&url, &feed_page(&["X"], None));
        let coordinator = Coordinator::new(FeedWalker::new(&fetcher, base_url()), 2);

        let report = coordinator
            .run(&base_query(), FilterField::UltimateUei, &values(&["  ", ""]))
            .await;
        assert_eq!(report.partitions, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(fetcher.requests(), vec![url]);
    }
}
