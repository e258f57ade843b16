use std::time::{
    Duration,
    Instant,
};

use assert_approx_eq::assert_approx_eq;
use ddb_report::prelude::*;
use rstest::{
    fixture,
    rstest,
};

const VARIANTS_CSV: &str = "\
sample,chr,pos,ref,alt,quality,genotype
S1,chr1,400,G,A,45.0,1/1
S1,chr1,100,A,G,40.0,0/1
S1,chr1,200,C,T,15.0,0|1
S1,chr1,300,T,C,40.0,1/1
S1,chr2,100,A,C,50.0,0/1
S2,chr1,100,A,G,60.0,0/1
S2,chr1,500,A,G,60.0,.
";

const COVERAGE_CSV: &str = "\
sample,chr,pos,depth,mapq
S1,chr1,100,50,40.0
S1,chr1,200,50,40.0
S1,chr1,400,15,20.0
S1,chr1,400,30,60.0
S1,chr2,100,80,60.0
S2,chr1,100,5,60.0
S2,chr1,500,40,10.0
";

type Runner = ReportRunner<VariantClient<MemorySession>, CoverageClient<MemorySession>>;

fn runner_with(config: ReportConfig) -> Runner {
    let _ = pretty_env_logger::try_init();
    let variants = MemorySession::new("variantstore")
        .load_delimited("sample_variants", VARIANTS_CSV.as_bytes(), b',')
        .unwrap();
    let coverage = MemorySession::new("coveragestore")
        .load_delimited("sample_coverage", COVERAGE_CSV.as_bytes(), b',')
        .unwrap();
    ReportRunner::try_new(
        VariantClient::try_new(config.variant_store.clone(), variants).unwrap(),
        CoverageClient::try_new(config.coverage_store.clone(), coverage).unwrap(),
        config,
    )
    .unwrap()
}

#[fixture]
fn runner() -> Runner {
    runner_with(ReportConfig::default().with_backoff_base_ms(1))
}

fn chr1() -> ChromRange {
    "chr1:1-1,000".parse().unwrap()
}

fn variant_session(runner: &Runner) -> &MemorySession {
    runner.coordinator().variant_client().session()
}

fn coverage_session(runner: &Runner) -> &MemorySession {
    runner.coordinator().coverage_client().session()
}

#[rstest]
fn test_end_to_end(runner: Runner) {
    let report = runner.run("S1", &chr1()).unwrap();

    assert_eq!(report.sample_id, "S1");
    assert_eq!(report.attempts, 1);
    let summary = report
        .records
        .iter()
        .map(|r| (r.joined.variant().position, r.category))
        .collect::<Vec<_>>();
    assert_eq!(summary, vec![
        (100, Category::Pass),
        (200, Category::LowQuality),
        (300, Category::LowCoverage),
        (400, Category::Pass),
    ]);

    // Deeper of the two coverage rows at chr1:400.
    let covered = report.records[3].joined.coverage().unwrap();
    assert_eq!(covered.depth, 30);
    assert_eq!(covered.mapping_quality, 60.0);

    assert!(report.records[1].has_reason(Reason::QualityBelowThreshold));
    assert!(!report.records[1].has_reason(Reason::MapqBelowThreshold));
    assert!(report.records[2].has_reason(Reason::NoCoverageData));
    assert_eq!(report.records[1].joined.variant().genotype, Genotype::Het);

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.count(Category::Pass), 2);
    assert_eq!(report.summary.count(Category::FilteredArtifact), 0);
    assert_eq!(report.summary.reason_count(Reason::NoCoverageData), 1);
    assert_eq!(report.summary.reason_count(Reason::QualityBelowThreshold), 1);
}

#[rstest]
fn test_coverage_summary(runner: Runner) {
    let report = runner.run("S1", &chr1()).unwrap();
    // chr1:100, 200 and the deeper row at 400.
    assert_eq!(report.coverage.positions, 3);
    assert_approx_eq!(report.coverage.mean_depth, (50.0 + 50.0 + 30.0) / 3.0);
    assert_eq!(report.coverage.below_min_depth, 0);
    assert_approx_eq!(report.coverage.mean_mapq, (40.0 + 40.0 + 60.0) / 3.0);

    let strict = runner_with(ReportConfig::from_json(r#"{"min_depth": 40}"#).unwrap())
        .run("S1", &chr1())
        .unwrap();
    assert_eq!(strict.coverage.below_min_depth, 1);

    let empty = runner.run("S3", &chr1()).unwrap();
    assert_eq!(empty.coverage, CoverageSummary::default());
}

#[rstest]
fn test_thresholds_from_config() {
    let config = ReportConfig::from_json(r#"{"min_depth": 60, "min_mapq": 50}"#).unwrap();
    let report = runner_with(config).run("S1", &chr1()).unwrap();
    let categories = report
        .records
        .iter()
        .map(|r| r.category)
        .collect::<Vec<_>>();
    assert_eq!(categories, vec![
        Category::LowCoverage,
        Category::LowCoverage,
        Category::LowCoverage,
        Category::LowCoverage,
    ]);
    assert!(report.records[0].has_reason(Reason::MapqBelowThreshold));
    assert!(!report.records[3].has_reason(Reason::MapqBelowThreshold));
}

#[rstest]
fn test_small_pages_give_same_report(runner: Runner) {
    let config = ReportConfig::default()
        .with_variant_store(KeyspaceConfig::variant_default().with_page_size(1))
        .with_coverage_store(KeyspaceConfig::coverage_default().with_page_size(2));
    let paged_runner = runner_with(config);

    let paged = paged_runner.run("S1", &chr1()).unwrap();
    let reference = runner.run("S1", &chr1()).unwrap();
    assert_eq!(paged.records, reference.records);
    assert!(variant_session(&paged_runner).request_count() >= 4);
}

#[rstest]
fn test_retry_after_transient_failure(runner: Runner) {
    variant_session(&runner)
        .fail_next(StoreError::connection("variantstore", "connection reset"));
    variant_session(&runner)
        .fail_next(StoreError::connection("variantstore", "connection reset"));

    let report = runner.run("S1", &chr1()).unwrap();
    assert_eq!(report.attempts, 3);
    assert_eq!(report.records.len(), 4);
    assert_eq!(variant_session(&runner).request_count(), 3);
    assert_eq!(coverage_session(&runner).request_count(), 3);
}

#[rstest]
fn test_retries_exhausted(runner: Runner) {
    coverage_session(&runner).set_reachable(false);

    let err = runner.run("S1", &chr1()).unwrap_err();
    match &err {
        ReportError::Fetch(FetchError::Partial(PartialFetchError::CoverageStore(
            StoreError::Connection { keyspace, .. },
        ))) => assert_eq!(keyspace, "coveragestore"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("coverage store failed"));
    // First attempt plus the default three retries.
    assert_eq!(coverage_session(&runner).request_count(), 4);
}

#[rstest]
fn test_no_retry_on_rejected_query(runner: Runner) {
    // QUORUM over three replicas needs two.
    variant_session(&runner).set_live_replicas(1);

    let err = runner.run("S1", &chr1()).unwrap_err();
    match &err {
        ReportError::Fetch(FetchError::Partial(partial)) => {
            assert_eq!(partial.failed_source(), FailedSource::VariantStore);
            assert!(matches!(partial.causes()[0], StoreError::Query { .. }));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("variant store failed"));
    assert_eq!(variant_session(&runner).request_count(), 1);
}

#[rstest]
fn test_no_retry_when_one_failure_is_permanent(runner: Runner) {
    variant_session(&runner).set_reachable(false);
    coverage_session(&runner).set_live_replicas(0);

    let err = runner.run("S1", &chr1()).unwrap_err();
    match &err {
        ReportError::Fetch(FetchError::Partial(partial)) => {
            assert_eq!(partial.failed_source(), FailedSource::BothStores);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().starts_with("both stores failed"));
    assert_eq!(variant_session(&runner).request_count(), 1);
    assert_eq!(coverage_session(&runner).request_count(), 1);
}

#[rstest]
fn test_malformed_range_is_not_retried(runner: Runner) {
    let inverted = ChromRange::new("chr1", 500, 100);
    let err = runner.run("S1", &inverted).unwrap_err();
    assert!(!matches!(&err, ReportError::Fetch(e) if e.is_retryable()));
    assert_eq!(variant_session(&runner).request_count(), 0);
}

#[rstest]
fn test_cancel_during_backoff() {
    let runner = runner_with(ReportConfig::default().with_backoff_base_ms(10_000));
    variant_session(&runner).set_reachable(false);
    let cancel = CancelToken::new();

    let started = Instant::now();
    let result = std::thread::scope(|s| {
        let canceller = cancel.clone();
        s.spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });
        runner.run_cancellable("S1", &chr1(), &cancel)
    });

    assert!(matches!(
        result,
        Err(ReportError::Fetch(FetchError::Cancelled { .. }))
    ));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(variant_session(&runner).request_count(), 1);
}

#[rstest]
fn test_run_many(runner: Runner) {
    let requests = vec![
        SampleRequest::new("S1", chr1()),
        SampleRequest::new("S2", chr1()),
        SampleRequest::new("S3", chr1()),
        SampleRequest::new("S1", ChromRange::whole("chr2")),
    ];
    let results = runner.run_many(&requests);
    assert_eq!(results.len(), requests.len());

    let reports = results
        .into_iter()
        .map(|result| result.unwrap())
        .collect::<Vec<_>>();
    for (request, report) in requests.iter().zip(reports.iter()) {
        assert_eq!(report.sample_id, request.sample_id);
        assert_eq!(report.range, request.range);
    }
    assert_eq!(reports[0].records.len(), 4);

    let s2 = reports[1]
        .records
        .iter()
        .map(|r| (r.category, r.reasons.len()))
        .collect::<Vec<_>>();
    assert_eq!(s2, vec![
        (Category::LowCoverage, 1),
        (Category::FilteredArtifact, 1),
    ]);
    assert_eq!(reports[1].records[1].joined.variant().genotype, Genotype::Unknown);

    assert!(reports[2].records.is_empty());
    assert_eq!(reports[2].summary.total, 0);
    assert_eq!(reports[3].summary.count(Category::Pass), 1);
    assert_ne!(reports[0].run_id, reports[1].run_id);
}

#[rstest]
fn test_zero_padded_sample_ids() {
    let variants = MemorySession::new("variantstore")
        .load_delimited(
            "sample_variants",
            "sample,chr,pos,ref,alt,quality,genotype\n007,chr1,100,A,G,40.0,0/1\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
    let coverage = MemorySession::new("coveragestore")
        .load_delimited(
            "sample_coverage",
            "sample,chr,pos,depth,mapq\n007,chr1,100,50,40.0\n".as_bytes(),
            b',',
        )
        .unwrap();
    let config = ReportConfig::default();
    let runner = ReportRunner::try_new(
        VariantClient::try_new(config.variant_store.clone(), variants).unwrap(),
        CoverageClient::try_new(config.coverage_store.clone(), coverage).unwrap(),
        config,
    )
    .unwrap();

    let report = runner.run("007", &chr1()).unwrap();
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].joined.variant().sample_id, "007");
    assert_eq!(report.records[0].category, Category::Pass);
    assert!(runner.run("7", &chr1()).unwrap().records.is_empty());
}

#[rstest]
fn test_report_serializes(runner: Runner) {
    let report = runner.run("S1", &chr1()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["records"][0]["category"], "PASS");
    assert_eq!(json["records"][1]["reasons"][0], "quality_below_threshold");
    assert_eq!(json["records"][0]["joined"]["variant"]["genotype"], "HET");
    assert_eq!(json["summary"]["counts"]["LOW_COVERAGE"], 1);
    assert_eq!(json["summary"]["reasons"]["no_coverage_data"], 1);
    assert_eq!(json["coverage"]["positions"], 3);
}
