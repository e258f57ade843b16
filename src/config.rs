//! Run configuration.
//!
//! A [`ReportConfig`] is usually read from a JSON file where every key is
//! optional:
//!
//! ```json
//! {
//!     "min_depth": 10,
//!     "min_quality": 20.0,
//!     "min_mapq": 30.0,
//!     "max_retries": 3,
//!     "backoff_base_ms": 500,
//!     "fetch_timeout_ms": 60000,
//!     "variant_store": { "keyspace": "variantstore", "table": "sample_variants" },
//!     "coverage_store": { "keyspace": "coveragestore", "table": "sample_coverage" }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{
    Deserialize,
    Serialize,
};

use crate::classify::Thresholds;
use crate::error::ConfigError;
use crate::store::KeyspaceConfig;
use crate::with_field_fn;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    #[serde(flatten)]
    pub thresholds:       Thresholds,
    /// Retries of a fetch that failed with connection errors only.
    pub max_retries:      u32,
    pub backoff_base_ms:  u64,
    /// No timeout when absent.
    pub fetch_timeout_ms: Option<u64>,
    pub variant_store:    KeyspaceConfig,
    pub coverage_store:   KeyspaceConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            thresholds:       Thresholds::default(),
            max_retries:      DEFAULT_MAX_RETRIES,
            backoff_base_ms:  DEFAULT_BACKOFF_BASE_MS,
            fetch_timeout_ms: None,
            variant_store:    KeyspaceConfig::variant_default(),
            coverage_store:   KeyspaceConfig::coverage_default(),
        }
    }
}

impl ReportConfig {
    with_field_fn!(thresholds, Thresholds);

    with_field_fn!(max_retries, u32);

    with_field_fn!(backoff_base_ms, u64);

    with_field_fn!(fetch_timeout_ms, Option<u64>);

    with_field_fn!(variant_store, KeyspaceConfig);

    with_field_fn!(coverage_store, KeyspaceConfig);

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                name:    "fetch_timeout_ms",
                value:   "0".to_string(),
                message: "must be positive; omit it to disable the timeout",
            });
        }
        self.variant_store.validate()?;
        self.coverage_store.validate()?;
        Ok(())
    }
}
