//! Outer join of variant calls with coverage, keyed on the variant side.
//!
//! Coverage is indexed by (chromosome, position) in one pass, then every
//! variant looks up the index once, so a join is linear in the total number
//! of records. Each variant produces exactly one [`JoinedRecord`], in input
//! order, with `coverage` left empty when nothing was found at its
//! coordinate.
//!
//! When several coverage records share a coordinate the one with the
//! highest depth is kept; on equal depth the first one seen wins.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use log::debug;

use crate::data_structs::coords::GenomicPosition;
use crate::data_structs::typedef::PosType;
use crate::data_structs::{
    CoverageRecord,
    JoinedRecord,
    VariantRecord,
};
use crate::error::JoinError;

const VARIANT_KIND: &str = "variant";
const COVERAGE_KIND: &str = "coverage";

/// Joins `variants` with `coverage`.
///
/// Fails on records with an empty chromosome name and on records belonging
/// to a different sample than the first variant.
pub fn join(
    variants: &[VariantRecord],
    coverage: &[CoverageRecord],
) -> Result<Vec<JoinedRecord>, JoinError> {
    let expected_sample = variants
        .first()
        .map(|v| v.sample_id.as_str())
        .or_else(|| coverage.first().map(|c| c.sample_id.as_str()));

    for record in variants {
        check_record(
            VARIANT_KIND,
            &record.sample_id,
            &record.chromosome,
            record.position,
            expected_sample,
        )?;
    }

    for record in coverage {
        check_record(
            COVERAGE_KIND,
            &record.sample_id,
            &record.chromosome,
            record.position,
            expected_sample,
        )?;
    }
    let (index, duplicates) = index_coverage(coverage);

    let joined = variants
        .iter()
        .map(|variant| {
            let found = index
                .get(&(variant.chromosome.as_str(), variant.position))
                .map(|record| (*record).clone());
            JoinedRecord::try_new(variant.clone(), found)
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Joined {} variants with {} coverage records ({} duplicate coordinates, {} \
         variants uncovered)",
        variants.len(),
        coverage.len(),
        duplicates,
        joined.iter().filter(|j| j.coverage().is_none()).count()
    );
    Ok(joined)
}

/// One coverage record per coordinate, picked the same way as [`join`]
/// does. Ordered by chromosome, then position.
pub fn best_coverage(coverage: &[CoverageRecord]) -> Vec<&CoverageRecord> {
    let (index, _) = index_coverage(coverage);
    let mut best = index.into_values().collect::<Vec<_>>();
    best.sort_by(|a, b| {
        (a.chromosome.as_str(), a.position).cmp(&(b.chromosome.as_str(), b.position))
    });
    best
}

/// Coverage keyed by coordinate, plus the number of records that hit an
/// already indexed coordinate.
fn index_coverage(
    coverage: &[CoverageRecord]
) -> (HashMap<(&str, PosType), &CoverageRecord>, usize) {
    let mut index: HashMap<(&str, PosType), &CoverageRecord> =
        HashMap::with_capacity(coverage.len());
    let mut duplicates = 0usize;
    for record in coverage {
        match index.entry((record.chromosome.as_str(), record.position)) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            },
            Entry::Occupied(mut entry) => {
                duplicates += 1;
                if record.depth > entry.get().depth {
                    entry.insert(record);
                }
            },
        }
    }
    (index, duplicates)
}

fn check_record(
    kind: &'static str,
    sample_id: &str,
    chromosome: &str,
    position: PosType,
    expected_sample: Option<&str>,
) -> Result<(), JoinError> {
    if chromosome.is_empty() {
        return Err(JoinError::EmptyChromosome { kind, position });
    }
    match expected_sample {
        Some(expected) if expected != sample_id => {
            Err(JoinError::SampleMismatch {
                kind,
                position: GenomicPosition::new(chromosome, position),
                expected: expected.to_string(),
                found: sample_id.to_string(),
            })
        },
        _ => Ok(()),
    }
}
