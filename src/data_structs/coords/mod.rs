//! Genomic coordinate types.
//!
//! - [`GenomicPosition`]: a single (chromosome, position) pair. This is the
//!   key variant and coverage records are joined on.
//! - [`ChromRange`]: an inclusive position range on one chromosome, the unit
//!   store queries are issued for.

mod gpos;
mod range;

pub use gpos::GenomicPosition;
pub use range::ChromRange;
