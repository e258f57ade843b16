//! Core data types of a report run.
//!
//! - [`VariantRecord`] and [`CoverageRecord`]: rows fetched from the variant
//!   and coverage keyspaces.
//! - [`JoinedRecord`]: a variant with the coverage found at its coordinate.
//! - [`ClassifiedRecord`]: a joined record with its [`Category`] and the
//!   set of [`Reason`]s raised by the classification rules.
//! - [`coords`]: [`coords::GenomicPosition`] and [`coords::ChromRange`].
//! - [`typedef`]: type aliases for positions, depths and quality scores.
//!
//! All records are created per run and are read-only after construction.

pub mod coords;
mod enums;
mod records;
pub mod typedef;


pub use enums::{
    Category,
    Genotype,
    Reason,
};
pub use records::{
    ClassifiedRecord,
    CoverageRecord,
    JoinedRecord,
    VariantRecord,
};
