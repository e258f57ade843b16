use std::collections::BTreeSet;

use serde::{
    Deserialize,
    Serialize,
};

use super::coords::GenomicPosition;
use super::enums::{
    Category,
    Genotype,
    Reason,
};
use super::typedef::{
    DepthType,
    PosType,
    QualityType,
};
use crate::error::JoinError;

/// A variant call for one sample, as stored in the variant keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub sample_id:     String,
    pub chromosome:    String,
    pub position:      PosType,
    pub ref_allele:    String,
    pub alt_allele:    String,
    pub quality_score: QualityType,
    pub genotype:      Genotype,
}

impl VariantRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new<S: Into<String>>(
        sample_id: S,
        chromosome: S,
        position: PosType,
        ref_allele: S,
        alt_allele: S,
        quality_score: QualityType,
        genotype: Genotype,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            chromosome: chromosome.into(),
            position,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
            quality_score,
            genotype,
        }
    }

    pub fn gpos(&self) -> GenomicPosition {
        GenomicPosition::new(self.chromosome.clone(), self.position)
    }
}

/// Per-position read coverage for one sample, as stored in the coverage
/// keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub sample_id:       String,
    pub chromosome:      String,
    pub position:        PosType,
    pub depth:           DepthType,
    pub mapping_quality: QualityType,
}

impl CoverageRecord {
    pub fn new<S: Into<String>>(
        sample_id: S,
        chromosome: S,
        position: PosType,
        depth: DepthType,
        mapping_quality: QualityType,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            chromosome: chromosome.into(),
            position,
            depth,
            mapping_quality,
        }
    }

    pub fn gpos(&self) -> GenomicPosition {
        GenomicPosition::new(self.chromosome.clone(), self.position)
    }
}

/// A variant together with the coverage observed at its coordinate.
///
/// When `coverage` is present it always sits at the same chromosome and
/// position as the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    variant:  VariantRecord,
    coverage: Option<CoverageRecord>,
}

impl JoinedRecord {
    /// Joins a variant with coverage at the same coordinate.
    pub fn try_new(
        variant: VariantRecord,
        coverage: Option<CoverageRecord>,
    ) -> Result<Self, JoinError> {
        if let Some(coverage) = coverage.as_ref() {
            if coverage.chromosome != variant.chromosome
                || coverage.position != variant.position
            {
                return Err(JoinError::CoordinateMismatch {
                    variant:  variant.gpos(),
                    coverage: coverage.gpos(),
                });
            }
        }
        Ok(Self { variant, coverage })
    }

    /// A variant with no coverage data.
    pub fn uncovered(variant: VariantRecord) -> Self {
        Self {
            variant,
            coverage: None,
        }
    }

    pub fn variant(&self) -> &VariantRecord {
        &self.variant
    }

    pub fn coverage(&self) -> Option<&CoverageRecord> {
        self.coverage.as_ref()
    }

    pub fn into_parts(self) -> (VariantRecord, Option<CoverageRecord>) {
        (self.variant, self.coverage)
    }
}

/// Output of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub joined:   JoinedRecord,
    pub category: Category,
    pub reasons:  BTreeSet<Reason>,
}

impl ClassifiedRecord {
    pub fn is_pass(&self) -> bool {
        self.category == Category::Pass
    }

    pub fn has_reason(
        &self,
        reason: Reason,
    ) -> bool {
        self.reasons.contains(&reason)
    }
}
