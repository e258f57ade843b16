//! # ddb-report
//!
//! Builds clinical variant reports from two independently replicated
//! column-store keyspaces: one holding variant calls, one holding per
//! position read coverage.
//!
//! For each sample a run
//!
//! 1. fetches variants and coverage concurrently ([`fetch`]),
//! 2. joins them by genomic coordinate ([`join`]),
//! 3. classifies every variant against quality thresholds ([`classify`]),
//!
//! and hands the classified records to the report assembler as a
//! [`report::SampleReport`].
//!
//! The cluster driver is abstracted behind [`store::Session`].
//! [`store::MemorySession`] serves tables held in memory, optionally
//! loaded from CSV dumps.
//!
//! ```no_run
//! use ddb_report::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let variants = MemorySession::new("variantstore")
//!     .load_path("sample_variants", "variants.csv")?;
//! let coverage = MemorySession::new("coveragestore")
//!     .load_path("sample_coverage", "coverage.csv")?;
//! let runner = ReportRunner::try_new(
//!     VariantClient::try_new(KeyspaceConfig::variant_default(), variants)?,
//!     CoverageClient::try_new(KeyspaceConfig::coverage_default(), coverage)?,
//!     ReportConfig::default(),
//! )?;
//! let report = runner.run("S1", &"chr1:1-1000000".parse()?)?;
//! println!("{} PASS", report.summary.count(Category::Pass));
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod data_structs;
pub mod error;
pub mod fetch;
pub mod join;
pub mod prelude;
pub mod report;
pub mod store;
pub mod utils;
