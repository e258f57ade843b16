use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

/// Serialized as its enum name; deserialized through [`FromStr`], so VCF
/// calls are accepted too.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Genotype {
    /// Homozygous reference (`0/0`).
    HomRef,
    /// Heterozygous (`0/1`).
    Het,
    /// Homozygous alternative (`1/1`).
    HomAlt,
    /// No call, or a genotype string that could not be interpreted.
    #[default]
    Unknown,
}

impl Display for Genotype {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Genotype::HomRef => write!(f, "HOM_REF"),
            Genotype::Het => write!(f, "HET"),
            Genotype::HomAlt => write!(f, "HOM_ALT"),
            Genotype::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for Genotype {
    type Err = Infallible;

    /// Accepts VCF style calls (`0/1`, `1|1`, ...) and the enum names.
    /// Anything else becomes [`Genotype::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let genotype = match s.trim().to_uppercase().as_str() {
            "0/0" | "0|0" | "HOM_REF" => Genotype::HomRef,
            "0/1" | "1/0" | "0|1" | "1|0" | "HET" => Genotype::Het,
            "1/1" | "1|1" | "HOM_ALT" => Genotype::HomAlt,
            _ => Genotype::Unknown,
        };
        Ok(genotype)
    }
}

impl From<String> for Genotype {
    fn from(s: String) -> Self {
        Genotype::from_str(&s).unwrap_or_default()
    }
}

/// Primary category assigned by the classifier.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Pass,
    LowCoverage,
    LowQuality,
    FilteredArtifact,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Pass,
        Category::LowCoverage,
        Category::LowQuality,
        Category::FilteredArtifact,
    ];
}

impl Display for Category {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", match self {
            Category::Pass => "PASS",
            Category::LowCoverage => "LOW_COVERAGE",
            Category::LowQuality => "LOW_QUALITY",
            Category::FilteredArtifact => "FILTERED_ARTIFACT",
        })
    }
}

/// A single concern raised by a classification rule.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NoCoverageData,
    DepthBelowThreshold,
    QualityBelowThreshold,
    MapqBelowThreshold,
}

impl Reason {
    pub const ALL: [Reason; 4] = [
        Reason::NoCoverageData,
        Reason::DepthBelowThreshold,
        Reason::QualityBelowThreshold,
        Reason::MapqBelowThreshold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NoCoverageData => "no_coverage_data",
            Reason::DepthBelowThreshold => "depth_below_threshold",
            Reason::QualityBelowThreshold => "quality_below_threshold",
            Reason::MapqBelowThreshold => "mapq_below_threshold",
        }
    }
}

impl Display for Reason {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
