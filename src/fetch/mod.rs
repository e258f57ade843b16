//! Concurrent fetch from the variant and coverage stores.
//!
//! [`FetchCoordinator::fetch_all`] issues both store requests at the same
//! time on scoped threads and waits at a channel barrier until both have
//! finished, successfully or not. A failure on one side never cuts the
//! other short, and the error names every side that failed.
//!
//! Workers check a stop flag before pulling each record, so a timeout or a
//! tripped [`CancelToken`] stops them after at most one in-flight page.
//! Whatever was fetched up to that point is dropped.
//!
//! The coordinator never retries; see [`crate::report::ReportRunner`].

use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use crossbeam::channel::RecvTimeoutError;
use log::{
    debug,
    info,
    warn,
};

use crate::data_structs::coords::ChromRange;
use crate::data_structs::{
    CoverageRecord,
    VariantRecord,
};
use crate::error::{
    FetchError,
    PartialFetchError,
    StoreError,
};
use crate::store::StoreClient;


/// Shared flag used to abort a run from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Records of one sample from both stores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedData {
    pub variants: Vec<VariantRecord>,
    pub coverage: Vec<CoverageRecord>,
}

enum Outcome {
    Variants(Result<Vec<VariantRecord>, StoreError>),
    Coverage(Result<Vec<CoverageRecord>, StoreError>),
}

pub struct FetchCoordinator<V, C> {
    variant_client:  V,
    coverage_client: C,
    timeout:         Option<Duration>,
}

impl<V, C> FetchCoordinator<V, C>
where
    V: StoreClient<Record = VariantRecord>,
    C: StoreClient<Record = CoverageRecord>,
{
    pub fn new(
        variant_client: V,
        coverage_client: C,
    ) -> Self {
        Self {
            variant_client,
            coverage_client,
            timeout: None,
        }
    }

    /// Upper bound on the wall time of one `fetch_all` call.
    pub fn with_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn variant_client(&self) -> &V {
        &self.variant_client
    }

    pub fn coverage_client(&self) -> &C {
        &self.coverage_client
    }

    pub fn fetch_all(
        &self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<FetchedData, FetchError> {
        self.fetch_all_cancellable(sample_id, range, &CancelToken::new())
    }

    /// Same as [`FetchCoordinator::fetch_all`], aborting when `cancel` is
    /// tripped.
    pub fn fetch_all_cancellable(
        &self,
        sample_id: &str,
        range: &ChromRange,
        cancel: &CancelToken,
    ) -> Result<FetchedData, FetchError> {
        info!("Fetching sample {} in {}", sample_id, range);
        let started = Instant::now();
        let deadline = self.timeout.map(|timeout| started + timeout);
        // Set on timeout. Kept apart from `cancel` so the caller's token is
        // left untouched.
        let stop = AtomicBool::new(false);
        let should_stop = &|| stop.load(Ordering::SeqCst) || cancel.is_cancelled();

        let (sender, receiver) = crossbeam::channel::bounded(2);
        let scoped = crossbeam::thread::scope(|s| {
            let variant_sender = sender.clone();
            s.spawn(move |_| {
                let result =
                    drain(&self.variant_client, sample_id, range, should_stop);
                let _ = variant_sender.send(Outcome::Variants(result));
            });
            let coverage_sender = sender.clone();
            s.spawn(move |_| {
                let result =
                    drain(&self.coverage_client, sample_id, range, should_stop);
                let _ = coverage_sender.send(Outcome::Coverage(result));
            });
            drop(sender);

            let mut variants = None;
            let mut coverage = None;
            let mut timed_out = false;
            while variants.is_none() || coverage.is_none() {
                let received = match deadline {
                    Some(deadline) => receiver.recv_deadline(deadline),
                    None => {
                        receiver
                            .recv()
                            .map_err(|_| RecvTimeoutError::Disconnected)
                    },
                };
                match received {
                    Ok(Outcome::Variants(result)) => {
                        debug!(
                            "Variant store finished for {} after {:?}",
                            sample_id,
                            started.elapsed()
                        );
                        variants = Some(result);
                    },
                    Ok(Outcome::Coverage(result)) => {
                        debug!(
                            "Coverage store finished for {} after {:?}",
                            sample_id,
                            started.elapsed()
                        );
                        coverage = Some(result);
                    },
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        stop.store(true, Ordering::SeqCst);
                        break;
                    },
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            (variants, coverage, timed_out)
        });
        let (variants, coverage, timed_out) = match scoped {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        if timed_out {
            let timeout = self.timeout.unwrap_or_default();
            warn!("Fetch for {} timed out after {:?}", sample_id, timeout);
            return Err(FetchError::TimedOut {
                sample_id: sample_id.to_string(),
                timeout,
            });
        }
        if cancel.is_cancelled() {
            warn!("Fetch for {} cancelled", sample_id);
            return Err(FetchError::Cancelled {
                sample_id: sample_id.to_string(),
            });
        }

        let cancelled = |client_keyspace: &str| {
            StoreError::Cancelled {
                keyspace: client_keyspace.to_string(),
            }
        };
        let variants = variants
            .unwrap_or_else(|| Err(cancelled(self.variant_client.keyspace())));
        let coverage = coverage
            .unwrap_or_else(|| Err(cancelled(self.coverage_client.keyspace())));

        match (variants, coverage) {
            (Ok(variants), Ok(coverage)) => {
                info!(
                    "Fetched {} variants and {} coverage records for {} in {:?}",
                    variants.len(),
                    coverage.len(),
                    sample_id,
                    started.elapsed()
                );
                Ok(FetchedData { variants, coverage })
            },
            (Err(variant), Ok(_)) => {
                warn!("Variant store failed for {}: {}", sample_id, variant);
                Err(PartialFetchError::VariantStore(variant).into())
            },
            (Ok(_), Err(coverage)) => {
                warn!("Coverage store failed for {}: {}", sample_id, coverage);
                Err(PartialFetchError::CoverageStore(coverage).into())
            },
            (Err(variant), Err(coverage)) => {
                warn!(
                    "Both stores failed for {}: {}; {}",
                    sample_id, variant, coverage
                );
                Err(PartialFetchError::BothStores { variant, coverage }.into())
            },
        }
    }
}

/// Pulls every record of one store, checking `should_stop` before each.
fn drain<S, F>(
    client: &S,
    sample_id: &str,
    range: &ChromRange,
    should_stop: &F,
) -> Result<Vec<S::Record>, StoreError>
where
    S: StoreClient,
    F: Fn() -> bool, {
    let cancelled = || {
        StoreError::Cancelled {
            keyspace: client.keyspace().to_string(),
        }
    };
    if should_stop() {
        return Err(cancelled());
    }

    let mut records = Vec::new();
    let mut iter = client.fetch(sample_id, range)?;
    loop {
        if should_stop() {
            return Err(cancelled());
        }
        match iter.next() {
            Some(record) => records.push(record?),
            None => break,
        }
    }
    Ok(records)
}
