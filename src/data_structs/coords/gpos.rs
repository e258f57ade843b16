use std::cmp::Ordering;
use std::fmt::Display;

use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::typedef::PosType;

/// A single genomic coordinate: chromosome name and position.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicPosition {
    chromosome: String,
    position:   PosType,
}

impl GenomicPosition {
    /// Creates a new `GenomicPosition`.
    pub fn new<S: Into<String>>(
        chromosome: S,
        position: PosType,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
        }
    }

    /// Returns the chromosome name.
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    /// Returns the position.
    pub fn position(&self) -> PosType {
        self.position
    }
}

#[allow(clippy::non_canonical_partial_ord_impl)]
impl PartialOrd for GenomicPosition {
    /// Positions are only comparable on the same chromosome.
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        if self.chromosome == other.chromosome {
            self.position.partial_cmp(&other.position)
        }
        else {
            None
        }
    }
}

impl Display for GenomicPosition {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.position)
    }
}
