//! Error types of the crate.
//!
//! Store clients fail with [`StoreError`]. The fetch coordinator wraps those
//! unmodified into a [`PartialFetchError`] naming the failing source(s).
//! [`JoinError`] and [`ConfigError`] describe malformed input and invalid
//! configuration and are never retried. [`ReportError`] is what a report run
//! returns.

use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::data_structs::coords::GenomicPosition;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("range '{0}' has an empty chromosome name")]
    EmptyChromosome(String),

    #[error("range '{0}' is missing a 'start-end' span after ':'")]
    MissingSpan(String),

    #[error("range '{range}' has an invalid position '{value}'")]
    InvalidPosition { range: String, value: String },

    #[error("range '{0}' has start greater than end")]
    Inverted(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The cluster could not be reached. Transient.
    #[error("keyspace '{keyspace}' is unreachable: {message}")]
    Connection { keyspace: String, message: String },

    /// The query was rejected. Not retryable.
    #[error("query rejected by keyspace '{keyspace}': {message}")]
    Query { keyspace: String, message: String },

    #[error("fetch from keyspace '{keyspace}' was cancelled")]
    Cancelled { keyspace: String },
}

impl StoreError {
    pub fn connection<K: Into<String>, M: Display>(
        keyspace: K,
        message: M,
    ) -> Self {
        StoreError::Connection {
            keyspace: keyspace.into(),
            message:  message.to_string(),
        }
    }

    pub fn query<K: Into<String>, M: Display>(
        keyspace: K,
        message: M,
    ) -> Self {
        StoreError::Query {
            keyspace: keyspace.into(),
            message:  message.to_string(),
        }
    }

    pub fn keyspace(&self) -> &str {
        match self {
            StoreError::Connection { keyspace, .. }
            | StoreError::Query { keyspace, .. }
            | StoreError::Cancelled { keyspace } => keyspace,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }
}

/// Which of the two stores failed during a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailedSource {
    VariantStore,
    CoverageStore,
    BothStores,
}

impl Display for FailedSource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(match self {
            FailedSource::VariantStore => "variant store failed",
            FailedSource::CoverageStore => "coverage store failed",
            FailedSource::BothStores => "both stores failed",
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartialFetchError {
    #[error("variant store failed: {0}")]
    VariantStore(StoreError),

    #[error("coverage store failed: {0}")]
    CoverageStore(StoreError),

    #[error("both stores failed: variant: {variant}; coverage: {coverage}")]
    BothStores {
        variant:  StoreError,
        coverage: StoreError,
    },
}

impl PartialFetchError {
    pub fn failed_source(&self) -> FailedSource {
        match self {
            PartialFetchError::VariantStore(_) => FailedSource::VariantStore,
            PartialFetchError::CoverageStore(_) => FailedSource::CoverageStore,
            PartialFetchError::BothStores { .. } => FailedSource::BothStores,
        }
    }

    /// Underlying store errors, variant store first.
    pub fn causes(&self) -> Vec<&StoreError> {
        match self {
            PartialFetchError::VariantStore(e)
            | PartialFetchError::CoverageStore(e) => vec![e],
            PartialFetchError::BothStores { variant, coverage } => {
                vec![variant, coverage]
            },
        }
    }

    /// True if every failing source failed with a transient error.
    pub fn is_retryable(&self) -> bool {
        self.causes().iter().all(|e| e.is_transient())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Partial(#[from] PartialFetchError),

    #[error("fetch for sample '{sample_id}' was cancelled")]
    Cancelled { sample_id: String },

    #[error("fetch for sample '{sample_id}' timed out after {timeout:?}")]
    TimedOut {
        sample_id: String,
        timeout:   Duration,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Partial(e) => e.is_retryable(),
            FetchError::Cancelled { .. } | FetchError::TimedOut { .. } => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("{kind} record at position {position} has an empty chromosome name")]
    EmptyChromosome {
        kind:     &'static str,
        position: u64,
    },

    #[error(
        "{kind} record at {position} belongs to sample '{found}', expected \
         '{expected}'"
    )]
    SampleMismatch {
        kind:     &'static str,
        position: GenomicPosition,
        expected: String,
        found:    String,
    },

    #[error("coverage at {coverage} cannot be attached to variant at {variant}")]
    CoordinateMismatch {
        variant:  GenomicPosition,
        coverage: GenomicPosition,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value} for '{name}': {message}")]
    InvalidValue {
        name:    &'static str,
        value:   String,
        message: &'static str,
    },

    #[error("cannot read configuration file {path:?}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot join records: {0}")]
    Join(#[from] JoinError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
