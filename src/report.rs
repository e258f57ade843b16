//! Report runs: fetch, join and classify the variants of one or more
//! samples.
//!
//! [`ReportRunner`] sits on top of the [`FetchCoordinator`] and owns the
//! retry policy. A fetch is retried only when every failing store failed
//! with a connection error, at most `max_retries` times, waiting
//! `backoff_base * 2^attempt` between attempts. Rejected queries, timeouts
//! and cancellation are returned right away.
//!
//! A run yields either a complete [`SampleReport`] or an error; records
//! fetched by a failed attempt are never reported. Besides the classified
//! variants a report carries per-category and per-reason counts and a
//! [`CoverageSummary`] of the coverage fetched for the range.

use std::collections::BTreeMap;
use std::time::{
    Duration,
    Instant,
};

use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use uuid::Uuid;

use crate::classify::classify_all;
use crate::config::ReportConfig;
use crate::data_structs::coords::ChromRange;
use crate::data_structs::typedef::DepthType;
use crate::data_structs::{
    Category,
    ClassifiedRecord,
    CoverageRecord,
    Reason,
    VariantRecord,
};
use crate::error::{
    ConfigError,
    FetchError,
    ReportError,
};
use crate::fetch::{
    CancelToken,
    FetchCoordinator,
    FetchedData,
};
use crate::join::{
    best_coverage,
    join,
};
use crate::store::StoreClient;
use crate::utils::{
    backoff_delay,
    THREAD_POOL,
};

/// Longest uninterrupted sleep while waiting out a backoff.
const BACKOFF_POLL: Duration = Duration::from_millis(20);

/// One sample and region to report on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRequest {
    pub sample_id: String,
    pub range:     ChromRange,
}

impl SampleRequest {
    pub fn new<S: Into<String>>(
        sample_id: S,
        range: ChromRange,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            range,
        }
    }
}

/// Number of records per category and per raised reason. Every category
/// and reason is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total:   usize,
    pub counts:  BTreeMap<Category, usize>,
    pub reasons: BTreeMap<Reason, usize>,
}

impl ReportSummary {
    pub fn from_records(records: &[ClassifiedRecord]) -> Self {
        let mut counts = Category::ALL
            .iter()
            .map(|category| (*category, 0usize))
            .collect::<BTreeMap<_, _>>();
        let mut reasons = Reason::ALL
            .iter()
            .map(|reason| (*reason, 0usize))
            .collect::<BTreeMap<_, _>>();
        for record in records {
            *counts.entry(record.category).or_default() += 1;
            for reason in record.reasons.iter() {
                *reasons.entry(*reason).or_default() += 1;
            }
        }
        Self {
            total: records.len(),
            counts,
            reasons,
        }
    }

    pub fn count(
        &self,
        category: Category,
    ) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Number of records that raised `reason`.
    pub fn reason_count(
        &self,
        reason: Reason,
    ) -> usize {
        self.reasons.get(&reason).copied().unwrap_or(0)
    }
}

/// Coverage of a sample over the reported range.
///
/// Computed over one record per coordinate, the deepest one, as the join
/// picks it. Positions without any coverage row are not counted. Means are
/// 0 when there is no coverage; non-finite mapping qualities are left out
/// of `mean_mapq`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Distinct covered positions.
    pub positions:       usize,
    pub mean_depth:      f64,
    /// Covered positions with depth below `min_depth`.
    pub below_min_depth: usize,
    pub mean_mapq:       f64,
}

impl CoverageSummary {
    pub fn from_coverage(
        coverage: &[CoverageRecord],
        min_depth: DepthType,
    ) -> Self {
        let best = best_coverage(coverage);
        if best.is_empty() {
            return Self::default();
        }
        let total_depth = best.iter().map(|c| c.depth as u64).sum::<u64>();
        let mapqs = best
            .iter()
            .map(|c| c.mapping_quality)
            .filter(|q| q.is_finite())
            .collect::<Vec<_>>();
        let mean_mapq = if mapqs.is_empty() {
            0.0
        }
        else {
            mapqs.iter().sum::<f64>() / mapqs.len() as f64
        };
        Self {
            positions: best.len(),
            mean_depth: total_depth as f64 / best.len() as f64,
            below_min_depth: best.iter().filter(|c| c.depth < min_depth).count(),
            mean_mapq,
        }
    }
}

/// Classified records of one sample, in the order the variant store
/// returned them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub run_id:    Uuid,
    pub sample_id: String,
    pub range:     ChromRange,
    /// Fetch attempts it took, starting at 1.
    pub attempts:  u32,
    pub records:   Vec<ClassifiedRecord>,
    pub summary:   ReportSummary,
    pub coverage:  CoverageSummary,
}

pub struct ReportRunner<V, C> {
    coordinator: FetchCoordinator<V, C>,
    config:      ReportConfig,
}

impl<V, C> ReportRunner<V, C>
where
    V: StoreClient<Record = VariantRecord>,
    C: StoreClient<Record = CoverageRecord>,
{
    /// Validates `config` and sets the coordinator timeout from it.
    pub fn try_new(
        variant_client: V,
        coverage_client: C,
        config: ReportConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let coordinator = FetchCoordinator::new(variant_client, coverage_client)
            .with_timeout(config.fetch_timeout());
        Ok(Self {
            coordinator,
            config,
        })
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &FetchCoordinator<V, C> {
        &self.coordinator
    }

    pub fn run(
        &self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<SampleReport, ReportError> {
        self.run_cancellable(sample_id, range, &CancelToken::new())
    }

    pub fn run_cancellable(
        &self,
        sample_id: &str,
        range: &ChromRange,
        cancel: &CancelToken,
    ) -> Result<SampleReport, ReportError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!("[{}] Report run for {} in {}", run_id, sample_id, range);

        let (fetched, attempts) = self.fetch_with_retry(sample_id, range, cancel)?;
        let joined = join(&fetched.variants, &fetched.coverage)?;
        let records = classify_all(&joined, &self.config.thresholds);
        let summary = ReportSummary::from_records(&records);
        let coverage = CoverageSummary::from_coverage(
            &fetched.coverage,
            self.config.thresholds.min_depth,
        );

        info!(
            "[{}] {}: {} records ({} PASS) in {:?}",
            run_id,
            sample_id,
            summary.total,
            summary.count(Category::Pass),
            started.elapsed()
        );
        info!(
            "[{}] {}: filtered {}",
            run_id,
            sample_id,
            summary
                .reasons
                .iter()
                .map(|(reason, count)| format!("{reason}={count}"))
                .join(", ")
        );
        info!(
            "[{}] {}: {} covered positions, mean depth {:.2}, {} below {}",
            run_id,
            sample_id,
            coverage.positions,
            coverage.mean_depth,
            coverage.below_min_depth,
            self.config.thresholds.min_depth
        );
        Ok(SampleReport {
            run_id,
            sample_id: sample_id.to_string(),
            range: range.clone(),
            attempts,
            records,
            summary,
            coverage,
        })
    }

    /// Runs every request on the crate thread pool. Results follow the
    /// order of `requests`; one failing sample does not affect the others.
    pub fn run_many(
        &self,
        requests: &[SampleRequest],
    ) -> Vec<Result<SampleReport, ReportError>> {
        self.run_many_with(requests, &CancelToken::new(), |_| {})
    }

    /// Same as [`ReportRunner::run_many`]. `on_finished` is called from the
    /// worker thread as soon as a sample is done.
    pub fn run_many_with<F>(
        &self,
        requests: &[SampleRequest],
        cancel: &CancelToken,
        on_finished: F,
    ) -> Vec<Result<SampleReport, ReportError>>
    where
        F: Fn(&Result<SampleReport, ReportError>) + Send + Sync, {
        debug!(
            "Running {} samples on {} threads",
            requests.len(),
            THREAD_POOL.current_num_threads()
        );
        THREAD_POOL.install(|| {
            requests
                .par_iter()
                .map(|request| {
                    let result = self.run_cancellable(
                        &request.sample_id,
                        &request.range,
                        cancel,
                    );
                    if let Err(err) = &result {
                        warn!("Report for {} failed: {}", request.sample_id, err);
                    }
                    on_finished(&result);
                    result
                })
                .collect()
        })
    }

    fn fetch_with_retry(
        &self,
        sample_id: &str,
        range: &ChromRange,
        cancel: &CancelToken,
    ) -> Result<(FetchedData, u32), FetchError> {
        let mut attempt = 0u32;
        loop {
            match self
                .coordinator
                .fetch_all_cancellable(sample_id, range, cancel)
            {
                Ok(fetched) => return Ok((fetched, attempt + 1)),
                Err(err)
                    if err.is_retryable()
                        && attempt < self.config.max_retries
                        && !cancel.is_cancelled() =>
                {
                    let delay = backoff_delay(self.config.backoff_base(), attempt);
                    warn!(
                        "Attempt {} for {} failed: {}; retrying in {:?}",
                        attempt + 1,
                        sample_id,
                        err,
                        delay
                    );
                    if !wait_unless_cancelled(delay, cancel) {
                        return Err(FetchError::Cancelled {
                            sample_id: sample_id.to_string(),
                        });
                    }
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

/// Sleeps for `delay`. Returns false if `cancel` was tripped meanwhile.
fn wait_unless_cancelled(
    delay: Duration,
    cancel: &CancelToken,
) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(BACKOFF_POLL));
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::data_structs::{
        Genotype,
        JoinedRecord,
    };

    fn classified(category: Category) -> ClassifiedRecord {
        let variant =
            VariantRecord::new("S1", "chr1", 1, "A", "T", 30.0, Genotype::Het);
        ClassifiedRecord {
            joined: JoinedRecord::uncovered(variant),
            category,
            reasons: [Reason::NoCoverageData].into_iter().collect(),
        }
    }

    #[test]
    fn test_summary_counts_every_reason() {
        let mut low = classified(Category::LowQuality);
        low.reasons.insert(Reason::QualityBelowThreshold);
        let records = vec![classified(Category::LowCoverage), low];
        let summary = ReportSummary::from_records(&records);
        assert_eq!(summary.reasons.len(), Reason::ALL.len());
        assert_eq!(summary.reason_count(Reason::NoCoverageData), 2);
        assert_eq!(summary.reason_count(Reason::QualityBelowThreshold), 1);
        assert_eq!(summary.reason_count(Reason::MapqBelowThreshold), 0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["reasons"]["no_coverage_data"], 2);
    }

    #[test]
    fn test_coverage_summary() {
        let coverage = vec![
            CoverageRecord::new("S1", "chr1", 100, 50, 40.0),
            CoverageRecord::new("S1", "chr1", 200, 5, 60.0),
            CoverageRecord::new("S1", "chr1", 200, 20, f64::NAN),
            CoverageRecord::new("S1", "chr1", 300, 9, 20.0),
        ];
        let summary = CoverageSummary::from_coverage(&coverage, 10);
        assert_eq!(summary.positions, 3);
        assert_approx_eq!(summary.mean_depth, (50.0 + 20.0 + 9.0) / 3.0);
        assert_eq!(summary.below_min_depth, 1);
        assert_approx_eq!(summary.mean_mapq, 30.0);
    }

    #[test]
    fn test_coverage_summary_empty() {
        assert_eq!(
            CoverageSummary::from_coverage(&[], 10),
            CoverageSummary::default()
        );
    }

    #[test]
    fn test_summary_counts_every_category() {
        let records = vec![
            classified(Category::Pass),
            classified(Category::LowCoverage),
            classified(Category::LowCoverage),
        ];
        let summary = ReportSummary::from_records(&records);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.counts.len(), Category::ALL.len());
        assert_eq!(summary.count(Category::Pass), 1);
        assert_eq!(summary.count(Category::LowCoverage), 2);
        assert_eq!(summary.count(Category::FilteredArtifact), 0);
    }

    #[test]
    fn test_summary_serializes_category_names() {
        let summary = ReportSummary::from_records(&[classified(Category::LowQuality)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["counts"]["LOW_QUALITY"], 1);
        assert_eq!(json["counts"]["PASS"], 0);
    }

    #[test]
    fn test_wait_is_interrupted_by_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let started = Instant::now();
        assert!(!wait_unless_cancelled(Duration::from_secs(10), &cancel));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(wait_unless_cancelled(Duration::from_millis(5), &CancelToken::new()));
    }
}
