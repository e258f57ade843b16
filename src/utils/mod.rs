//! Small helpers shared by the rest of the crate.
//!
//! - [`THREAD_POOL`]: the rayon pool used for batch classification and
//!   multi-sample runs. Its size is taken from the `DDB_NUM_THREADS`
//!   environment variable.
//! - Macros for builder-style `with_*` setters and plain getters.
//! - Exponential backoff computation used by the report runner.

use std::time::Duration;

use once_cell::sync::Lazy;
use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
};

pub const NUM_THREADS_ENV: &str = "DDB_NUM_THREADS";

/// Largest exponent applied to the backoff base.
const MAX_BACKOFF_EXPONENT: u32 = 10;

pub static THREAD_POOL: Lazy<ThreadPool> = Lazy::new(|| {
    let num_threads: Option<usize> = std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|str| str.parse::<usize>().ok());
    ThreadPoolBuilder::new()
        .num_threads(num_threads.unwrap_or(0))
        .thread_name(|idx| format!("ddb-report-{idx}"))
        .build()
        .expect("Failed to create thread pool")
});

pub fn n_threads() -> usize {
    THREAD_POOL.current_num_threads()
}

/// Delay before retry number `attempt` (zero-based): `base * 2^attempt`.
pub fn backoff_delay(
    base: Duration,
    attempt: u32,
) -> Duration {
    let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
    base.saturating_mul(factor)
}

#[macro_export]
macro_rules! getter_fn {
    ($field_name: ident, $field_type: ty) => {
        pub fn $field_name(&self) -> &$field_type {
            &self.$field_name
        }
    };
}
pub use getter_fn;

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
            self.$field_name = value;
            self
            }
        }
    };
}
pub use with_field_fn;
