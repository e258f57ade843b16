use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use hashbrown::{
    HashMap,
    HashSet,
};
use log::{
    debug,
    info,
    warn,
};

use super::query::{
    Page,
    PagingState,
    Query,
    Session,
    CHROMOSOME_COLUMN,
    POSITION_COLUMN,
    SAMPLE_COLUMN,
};
use super::row::{
    Row,
    Value,
    TEXT_COLUMNS,
};
use crate::data_structs::typedef::PosType;
use crate::error::StoreError;

/// Rows of one `(sample, chromosome)` partition, in clustering order:
/// position ascending, insertion order within a position.
#[derive(Default)]
struct Partition {
    rows:    Vec<(PosType, Row)>,
    /// Rendered `pos` cells that are not a non-negative integer.
    invalid: Vec<String>,
}

/// Table partitioned by sample, then chromosome.
#[derive(Default)]
struct Table {
    partitions: HashMap<String, HashMap<String, Partition>>,
}

impl Table {
    fn insert(
        &mut self,
        rows: Vec<Row>,
    ) -> usize {
        let mut unkeyed = 0;
        let mut touched = HashSet::new();
        for row in rows {
            let (Some(sample), Some(chromosome)) = (
                row.optional_text(SAMPLE_COLUMN),
                row.optional_text(CHROMOSOME_COLUMN),
            )
            else {
                unkeyed += 1;
                continue;
            };
            let partition = self
                .partitions
                .entry(sample.clone())
                .or_default()
                .entry(chromosome.clone())
                .or_default();
            let position = match row.get(POSITION_COLUMN) {
                Some(Value::Int(pos)) if *pos >= 0 => Ok(*pos as PosType),
                Some(other) => Err(other.to_string()),
                None => Err("missing".to_string()),
            };
            match position {
                Ok(pos) => partition.rows.push((pos, row)),
                Err(bad) => partition.invalid.push(bad),
            }
            touched.insert((sample, chromosome));
        }
        for (sample, chromosome) in touched {
            if let Some(partition) = self
                .partitions
                .get_mut(&sample)
                .and_then(|p| p.get_mut(&chromosome))
            {
                // Stable, so rows keep insertion order within a position.
                partition.rows.sort_by_key(|(pos, _)| *pos);
            }
        }
        unkeyed
    }

    fn partition(
        &self,
        sample: &str,
        chromosome: &str,
    ) -> Option<&Partition> {
        self.partitions.get(sample)?.get(chromosome)
    }
}

/// In-memory keyspace.
///
/// Tables are partitioned by `(sample, chr)` and kept sorted by position,
/// so a page request is a binary search plus a slice. Besides serving
/// queries it can simulate an unreachable cluster, injected failures,
/// reduced replica availability and per-request latency.
pub struct MemorySession {
    keyspace:           String,
    tables:             HashMap<String, Table>,
    text_columns:       HashSet<String>,
    replication_factor: usize,
    live_replicas:      AtomicUsize,
    reachable:          AtomicBool,
    pending_failures:   Mutex<VecDeque<StoreError>>,
    latency:            Duration,
    requests:           AtomicUsize,
}

impl MemorySession {
    pub fn new<S: Into<String>>(keyspace: S) -> Self {
        Self {
            keyspace:           keyspace.into(),
            tables:             HashMap::new(),
            text_columns:       TEXT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            replication_factor: 3,
            live_replicas:      AtomicUsize::new(3),
            reachable:          AtomicBool::new(true),
            pending_failures:   Mutex::new(VecDeque::new()),
            latency:            Duration::ZERO,
            requests:           AtomicUsize::new(0),
        }
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn with_rows<S: Into<String>>(
        mut self,
        table: S,
        rows: Vec<Row>,
    ) -> Self {
        self.insert_rows(table.into(), rows);
        self
    }

    /// Columns loaded as raw text by [`MemorySession::load_delimited`].
    /// Defaults to [`TEXT_COLUMNS`].
    pub fn with_text_columns<I, S>(
        mut self,
        columns: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>, {
        self.text_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the replication factor; all replicas start alive.
    pub fn with_replication_factor(
        mut self,
        replication_factor: usize,
    ) -> Self {
        self.replication_factor = replication_factor;
        self.live_replicas = AtomicUsize::new(replication_factor);
        self
    }

    /// Delay applied to every request.
    pub fn with_latency(
        mut self,
        latency: Duration,
    ) -> Self {
        self.latency = latency;
        self
    }

    /// Appends rows read from a delimited file with a header line. Text
    /// columns are kept verbatim, other cell types are inferred, see
    /// [`Value::infer`].
    pub fn load_delimited<R: Read>(
        mut self,
        table: &str,
        reader: R,
        delimiter: u8,
    ) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader
            .headers()
            .context("Failed to read header line")?
            .clone();
        let parsers = headers
            .iter()
            .map(|column| {
                if self.text_columns.contains(column) {
                    Value::text_cell as fn(&str) -> Value
                }
                else {
                    Value::infer
                }
            })
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (idx, record) in csv_reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Failed to read line {}", idx + 2))?;
            rows.push(
                headers
                    .iter()
                    .zip(parsers.iter())
                    .zip(record.iter())
                    .map(|((column, parse), raw)| (column, parse(raw)))
                    .collect::<Row>(),
            );
        }
        info!(
            "Loaded {} rows into {}.{}",
            rows.len(),
            self.keyspace,
            table
        );
        self.insert_rows(table.to_string(), rows);
        Ok(self)
    }

    /// Same as [`MemorySession::load_delimited`], reading from a file. Files
    /// ending in `.tsv` or `.txt` are read as tab separated.
    pub fn load_path<P: AsRef<Path>>(
        self,
        table: &str,
        path: P,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("txt") => b'\t',
            _ => b',',
        };
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        self.load_delimited(table, file, delimiter)
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn set_reachable(
        &self,
        reachable: bool,
    ) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_live_replicas(
        &self,
        live: usize,
    ) {
        self.live_replicas.store(live, Ordering::SeqCst);
    }

    /// The next request fails with `error`. Calls queue up.
    pub fn fail_next(
        &self,
        error: StoreError,
    ) {
        self.pending_failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(error);
    }

    /// Number of requests served or rejected so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn insert_rows(
        &mut self,
        table: String,
        rows: Vec<Row>,
    ) {
        let unkeyed = self.tables.entry(table.clone()).or_default().insert(rows);
        if unkeyed > 0 {
            warn!(
                "{}.{}: skipped {} rows without {} or {}",
                self.keyspace, table, unkeyed, SAMPLE_COLUMN, CHROMOSOME_COLUMN
            );
        }
    }
}

/// Rows of `partition` inside `start..=end`.
fn in_range(
    partition: &Partition,
    start: PosType,
    end: PosType,
) -> &[(PosType, Row)] {
    let lo = partition.rows.partition_point(|(pos, _)| *pos < start);
    let hi = partition.rows.partition_point(|(pos, _)| *pos <= end);
    partition.rows.get(lo..hi.max(lo)).unwrap_or_default()
}

fn encode_offset(offset: usize) -> PagingState {
    PagingState((offset as u64).to_be_bytes().to_vec())
}

fn decode_offset(state: &PagingState) -> Option<usize> {
    let bytes: [u8; 8] = state.0.as_slice().try_into().ok()?;
    usize::try_from(u64::from_be_bytes(bytes)).ok()
}

impl Session for MemorySession {
    fn execute(
        &self,
        query: &Query,
        paging_state: Option<&PagingState>,
    ) -> Result<Page, StoreError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::connection(
                &query.keyspace,
                "no hosts available",
            ));
        }
        let injected = self
            .pending_failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        if let Some(error) = injected {
            return Err(error);
        }

        if query.keyspace != self.keyspace {
            return Err(StoreError::query(
                &query.keyspace,
                format!("keyspace does not exist (session is bound to {})", self.keyspace),
            ));
        }
        let live = self.live_replicas.load(Ordering::SeqCst);
        let required = query.consistency.required_replicas(self.replication_factor);
        if live < required {
            return Err(StoreError::query(
                &query.keyspace,
                format!(
                    "consistency {} not achievable: {} replicas required, {} alive",
                    query.consistency, required, live
                ),
            ));
        }
        let table = self.tables.get(&query.table).ok_or_else(|| {
            StoreError::query(
                &query.keyspace,
                format!("unconfigured table {}", query.table),
            )
        })?;
        if query.page_size == 0 {
            return Err(StoreError::query(&query.keyspace, "page size must be positive"));
        }

        let offset = match paging_state {
            None => 0,
            Some(state) => {
                decode_offset(state).ok_or_else(|| {
                    StoreError::query(&query.keyspace, "invalid paging state")
                })?
            },
        };
        let matching = match table.partition(&query.sample_id, &query.chromosome) {
            None => &[][..],
            Some(partition) => {
                if let Some(bad) = partition.invalid.first() {
                    return Err(StoreError::query(
                        &query.keyspace,
                        format!(
                            "{} rows of partition ({}, {}) have an invalid {} (first: {})",
                            partition.invalid.len(),
                            query.sample_id,
                            query.chromosome,
                            POSITION_COLUMN,
                            bad
                        ),
                    ));
                }
                in_range(partition, query.start, query.end)
            },
        };
        let end = offset.saturating_add(query.page_size).min(matching.len());
        let page_rows = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(_, row)| row.clone())
            .collect::<Vec<_>>();
        let paging_state = (end < matching.len()).then(|| encode_offset(end));
        debug!(
            "{}.{}: served rows {}..{} of {}",
            query.keyspace,
            query.table,
            offset,
            end,
            matching.len()
        );

        Ok(Page {
            rows: page_rows,
            paging_state,
        })
    }
}
