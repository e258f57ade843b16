//! Clinical filtering rules.
//!
//! Rules are evaluated in a fixed priority order:
//!
//! 1. no coverage at the variant coordinate: [`Category::LowCoverage`]
//! 2. `depth < min_depth`: [`Category::LowCoverage`]
//! 3. `quality_score < min_quality`: [`Category::LowQuality`]
//! 4. `mapping_quality < min_mapq`: [`Category::FilteredArtifact`]
//! 5. otherwise [`Category::Pass`]
//!
//! The category comes from the first rule that holds, but the reason of
//! every rule that holds is recorded. Rules 2 and 4 look at coverage and
//! never hold for an uncovered variant. A NaN score counts as below its
//! threshold.

use std::collections::BTreeSet;

use log::debug;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::typedef::{
    DepthType,
    QualityType,
};
use crate::data_structs::{
    Category,
    ClassifiedRecord,
    JoinedRecord,
    Reason,
};
use crate::error::ConfigError;
use crate::utils::THREAD_POOL;
use crate::with_field_fn;

pub const DEFAULT_MIN_DEPTH: DepthType = 10;
pub const DEFAULT_MIN_QUALITY: QualityType = 20.0;
pub const DEFAULT_MIN_MAPQ: QualityType = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_depth:   DepthType,
    pub min_quality: QualityType,
    pub min_mapq:    QualityType,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_depth:   DEFAULT_MIN_DEPTH,
            min_quality: DEFAULT_MIN_QUALITY,
            min_mapq:    DEFAULT_MIN_MAPQ,
        }
    }
}

impl Thresholds {
    with_field_fn!(min_depth, DepthType);

    with_field_fn!(min_quality, QualityType);

    with_field_fn!(min_mapq, QualityType);

    /// Quality thresholds must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("min_quality", self.min_quality),
            ("min_mapq", self.min_mapq),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    name,
                    value: value.to_string(),
                    message: "must be a finite number",
                });
            }
            if value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    name,
                    value: value.to_string(),
                    message: "must not be negative",
                });
            }
        }
        Ok(())
    }
}

fn below(
    value: QualityType,
    threshold: QualityType,
) -> bool {
    value.is_nan() || value < threshold
}

/// Classifies a single joined record.
pub fn classify(
    record: &JoinedRecord,
    thresholds: &Thresholds,
) -> ClassifiedRecord {
    let variant = record.variant();
    let mut hits: Vec<(Category, Reason)> = Vec::with_capacity(4);

    match record.coverage() {
        None => hits.push((Category::LowCoverage, Reason::NoCoverageData)),
        Some(coverage) if coverage.depth < thresholds.min_depth => {
            hits.push((Category::LowCoverage, Reason::DepthBelowThreshold))
        },
        Some(_) => {},
    }
    if below(variant.quality_score, thresholds.min_quality) {
        hits.push((Category::LowQuality, Reason::QualityBelowThreshold));
    }
    if let Some(coverage) = record.coverage() {
        if below(coverage.mapping_quality, thresholds.min_mapq) {
            hits.push((Category::FilteredArtifact, Reason::MapqBelowThreshold));
        }
    }

    let category = hits
        .first()
        .map(|(category, _)| *category)
        .unwrap_or(Category::Pass);
    let reasons = hits
        .into_iter()
        .map(|(_, reason)| reason)
        .collect::<BTreeSet<_>>();

    ClassifiedRecord {
        joined: record.clone(),
        category,
        reasons,
    }
}

/// Classifies a batch on the crate thread pool. Output order follows
/// `records`.
pub fn classify_all(
    records: &[JoinedRecord],
    thresholds: &Thresholds,
) -> Vec<ClassifiedRecord> {
    let classified = THREAD_POOL.install(|| {
        records
            .par_iter()
            .map(|record| classify(record, thresholds))
            .collect::<Vec<_>>()
    });
    debug!("Classified {} records", classified.len());
    classified
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use rstest::{
        fixture,
        rstest,
    };

    use super::*;
    use crate::data_structs::{
        CoverageRecord,
        Genotype,
        VariantRecord,
    };

    fn joined(
        quality: f64,
        coverage: Option<(u32, f64)>,
    ) -> JoinedRecord {
        let variant =
            VariantRecord::new("S1", "chr1", 100, "C", "T", quality, Genotype::HomAlt);
        let coverage = coverage
            .map(|(depth, mapq)| CoverageRecord::new("S1", "chr1", 100, depth, mapq));
        JoinedRecord::try_new(variant, coverage).unwrap()
    }

    #[fixture]
    fn thresholds() -> Thresholds {
        Thresholds::default()
    }

    #[rstest]
    fn test_defaults(thresholds: Thresholds) {
        assert_eq!(thresholds.min_depth, 10);
        assert_approx_eq!(thresholds.min_quality, 20.0);
        assert_approx_eq!(thresholds.min_mapq, 30.0);
    }

    #[rstest]
    #[case::no_coverage(40.0, None, Category::LowCoverage, vec![Reason::NoCoverageData])]
    #[case::low_quality(15.0, Some((50, 40.0)), Category::LowQuality, vec![Reason::QualityBelowThreshold])]
    #[case::pass(40.0, Some((50, 40.0)), Category::Pass, vec![])]
    #[case::low_depth(40.0, Some((9, 40.0)), Category::LowCoverage, vec![Reason::DepthBelowThreshold])]
    #[case::low_mapq(40.0, Some((50, 29.9)), Category::FilteredArtifact, vec![Reason::MapqBelowThreshold])]
    #[case::at_thresholds(20.0, Some((10, 30.0)), Category::Pass, vec![])]
    #[case::all_below(
        5.0,
        Some((3, 10.0)),
        Category::LowCoverage,
        vec![Reason::DepthBelowThreshold, Reason::QualityBelowThreshold, Reason::MapqBelowThreshold]
    )]
    #[case::no_coverage_low_quality(
        5.0,
        None,
        Category::LowCoverage,
        vec![Reason::NoCoverageData, Reason::QualityBelowThreshold]
    )]
    #[case::quality_and_mapq(
        10.0,
        Some((50, 10.0)),
        Category::LowQuality,
        vec![Reason::QualityBelowThreshold, Reason::MapqBelowThreshold]
    )]
    #[case::nan_quality(f64::NAN, Some((50, 40.0)), Category::LowQuality, vec![Reason::QualityBelowThreshold])]
    fn test_classify(
        thresholds: Thresholds,
        #[case] quality: f64,
        #[case] coverage: Option<(u32, f64)>,
        #[case] category: Category,
        #[case] reasons: Vec<Reason>,
    ) {
        let classified = classify(&joined(quality, coverage), &thresholds);
        assert_eq!(classified.category, category);
        assert_eq!(
            classified.reasons,
            reasons.into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[rstest]
    fn test_classify_is_idempotent(thresholds: Thresholds) {
        let record = joined(15.0, Some((8, 12.0)));
        let first = classify(&record, &thresholds);
        let second = classify(&record, &thresholds);
        assert_eq!(first, second);
        assert_eq!(first.joined, record);
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = Thresholds::default()
            .with_min_depth(60)
            .with_min_quality(10.0)
            .with_min_mapq(0.0);
        let classified = classify(&joined(15.0, Some((50, 5.0))), &thresholds);
        assert_eq!(classified.category, Category::LowCoverage);
        assert!(classified.has_reason(Reason::DepthBelowThreshold));
        assert_eq!(classified.reasons.len(), 1);
    }

    #[rstest]
    fn test_classify_all_preserves_order(thresholds: Thresholds) {
        let records = (0..500)
            .map(|i| {
                match i % 3 {
                    0 => joined(40.0, Some((50, 40.0))),
                    1 => joined(40.0, None),
                    _ => joined(5.0, Some((50, 40.0))),
                }
            })
            .collect::<Vec<_>>();
        let classified = classify_all(&records, &thresholds);
        assert_eq!(classified.len(), records.len());
        for (record, result) in records.iter().zip(classified.iter()) {
            assert_eq!(result, &classify(record, &thresholds));
        }
    }

    #[rstest]
    #[case::negative_quality(Thresholds::default().with_min_quality(-1.0), "min_quality")]
    #[case::nan_mapq(Thresholds::default().with_min_mapq(f64::NAN), "min_mapq")]
    #[case::infinite_quality(Thresholds::default().with_min_quality(f64::INFINITY), "min_quality")]
    fn test_invalid_thresholds(
        #[case] thresholds: Thresholds,
        #[case] field: &str,
    ) {
        match thresholds.validate() {
            Err(ConfigError::InvalidValue { name, .. }) => assert_eq!(name, field),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[rstest]
    fn test_valid_thresholds(thresholds: Thresholds) {
        assert!(thresholds.validate().is_ok());
        assert!(Thresholds::default().with_min_mapq(0.0).validate().is_ok());
    }
}
