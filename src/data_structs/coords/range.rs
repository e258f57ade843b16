use std::fmt::Display;
use std::str::FromStr;

use serde::{
    Deserialize,
    Serialize,
};

use super::GenomicPosition;
use crate::data_structs::typedef::PosType;
use crate::error::RangeParseError;

/// An inclusive position range on a single chromosome.
///
/// A range is allowed to be malformed (empty chromosome, `start > end`):
/// store clients reject such ranges with a query error instead of the
/// constructor panicking, so a bad range coming from user input surfaces as
/// a normal error of the run.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromRange {
    chromosome: String,
    start:      PosType,
    end:        PosType,
}

impl ChromRange {
    /// Creates a new `ChromRange` covering `start..=end`.
    pub fn new<S: Into<String>>(
        chromosome: S,
        start: PosType,
        end: PosType,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    /// Range covering a whole chromosome.
    pub fn whole<S: Into<String>>(chromosome: S) -> Self {
        Self::new(chromosome, 0, PosType::MAX)
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> PosType {
        self.start
    }

    pub fn end(&self) -> PosType {
        self.end
    }

    pub fn start_gpos(&self) -> GenomicPosition {
        GenomicPosition::new(self.chromosome.clone(), self.start)
    }

    pub fn end_gpos(&self) -> GenomicPosition {
        GenomicPosition::new(self.chromosome.clone(), self.end)
    }

    /// Returns a description of what is wrong with the range, if anything.
    pub fn malformed_reason(&self) -> Option<String> {
        if self.chromosome.trim().is_empty() {
            Some("empty chromosome name".to_string())
        }
        else if self.start > self.end {
            Some(format!(
                "start {} is greater than end {}",
                self.start, self.end
            ))
        }
        else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.malformed_reason().is_none()
    }

    /// Checks if the coordinate lies within the range.
    pub fn contains(
        &self,
        chromosome: &str,
        position: PosType,
    ) -> bool {
        self.chromosome == chromosome
            && position >= self.start
            && position <= self.end
    }

    pub fn contains_gpos(
        &self,
        gpos: &GenomicPosition,
    ) -> bool {
        self.contains(gpos.chromosome(), gpos.position())
    }
}

impl Display for ChromRange {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        if self.start == 0 && self.end == PosType::MAX {
            write!(f, "{}", self.chromosome)
        }
        else {
            write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
        }
    }
}

impl FromStr for ChromRange {
    type Err = RangeParseError;

    /// Parses `chr1:100-200` (thousands separators allowed) or a bare
    /// chromosome name meaning the whole chromosome.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((chromosome, span)) = s.rsplit_once(':')
        else {
            if s.is_empty() {
                return Err(RangeParseError::EmptyChromosome(s.to_string()));
            }
            return Ok(Self::whole(s));
        };
        if chromosome.is_empty() {
            return Err(RangeParseError::EmptyChromosome(s.to_string()));
        }

        let (start, end) = span
            .split_once('-')
            .ok_or_else(|| RangeParseError::MissingSpan(s.to_string()))?;
        let parse_pos = |value: &str| {
            value
                .replace(',', "")
                .trim()
                .parse::<PosType>()
                .map_err(|_| {
                    RangeParseError::InvalidPosition {
                        range: s.to_string(),
                        value: value.to_string(),
                    }
                })
        };
        let (start, end) = (parse_pos(start)?, parse_pos(end)?);
        if start > end {
            return Err(RangeParseError::Inverted(s.to_string()));
        }

        Ok(Self::new(chromosome, start, end))
    }
}
