use std::collections::VecDeque;
use std::marker::PhantomData;

use itertools::Itertools;
use log::{
    debug,
    trace,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::query::{
    PagingState,
    Query,
    Session,
};
use super::row::{
    FromRow,
    Row,
};
use super::{
    Consistency,
    RecordIter,
    StoreClient,
};
use crate::data_structs::coords::ChromRange;
use crate::data_structs::{
    CoverageRecord,
    VariantRecord,
};
use crate::error::{
    ConfigError,
    StoreError,
};
use crate::with_field_fn;

pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Which keyspace and table a client reads, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceConfig {
    pub keyspace:    String,
    pub table:       String,
    #[serde(default)]
    pub consistency: Consistency,
    #[serde(default = "default_page_size")]
    pub page_size:   usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl KeyspaceConfig {
    with_field_fn!(consistency, Consistency);
    with_field_fn!(page_size, usize);

    pub fn new<S: Into<String>>(
        keyspace: S,
        table: S,
    ) -> Self {
        Self {
            keyspace:    keyspace.into(),
            table:       table.into(),
            consistency: Consistency::default(),
            page_size:   DEFAULT_PAGE_SIZE,
        }
    }

    pub fn variant_default() -> Self {
        Self::new("variantstore", "sample_variants")
    }

    pub fn coverage_default() -> Self {
        Self::new("coveragestore", "sample_coverage")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyspace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name:    "keyspace",
                value:   format!("{:?}", self.keyspace),
                message: "must not be empty",
            });
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name:    "table",
                value:   format!("{:?}", self.table),
                message: "must not be empty",
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                name:    "page_size",
                value:   self.page_size.to_string(),
                message: "must be positive",
            });
        }
        Ok(())
    }
}

/// Store client bound to a single keyspace, table and consistency level.
///
/// Holds the session for its whole lifetime; the session is released when
/// the client is dropped.
pub struct KeyspaceClient<S, R> {
    config:  KeyspaceConfig,
    session: S,
    _record: PhantomData<fn() -> R>,
}

pub type VariantClient<S> = KeyspaceClient<S, VariantRecord>;
pub type CoverageClient<S> = KeyspaceClient<S, CoverageRecord>;

impl<S, R> KeyspaceClient<S, R>
where
    S: Session,
    R: FromRow,
{
    pub fn try_new(
        config: KeyspaceConfig,
        session: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            "Bound client to {}.{} at consistency {}",
            config.keyspace, config.table, config.consistency
        );
        Ok(Self {
            config,
            session,
            _record: PhantomData,
        })
    }

    pub fn config(&self) -> &KeyspaceConfig {
        &self.config
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn build_query(
        &self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<Query, StoreError> {
        let keyspace = &self.config.keyspace;
        if sample_id.trim().is_empty() {
            return Err(StoreError::query(keyspace, "empty sample id"));
        }
        if let Some(reason) = range.malformed_reason() {
            return Err(StoreError::query(
                keyspace,
                format!("malformed range {range}: {reason}"),
            ));
        }
        if !self.config.consistency.is_readable() {
            return Err(StoreError::query(
                keyspace,
                format!(
                    "consistency {} cannot be used for reads",
                    self.config.consistency
                ),
            ));
        }

        Ok(Query {
            keyspace:    keyspace.clone(),
            table:       self.config.table.clone(),
            columns:     R::COLUMNS,
            sample_id:   sample_id.to_string(),
            chromosome:  range.chromosome().to_string(),
            start:       range.start(),
            end:         range.end(),
            consistency: self.config.consistency,
            page_size:   self.config.page_size,
        })
    }
}

impl<S, R> StoreClient for KeyspaceClient<S, R>
where
    S: Session,
    R: FromRow + 'static,
{
    type Record = R;

    fn keyspace(&self) -> &str {
        &self.config.keyspace
    }

    fn fetch<'a>(
        &'a self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<RecordIter<'a, R>, StoreError> {
        let query = self.build_query(sample_id, range)?;
        debug!(
            "{} [{}]",
            query.cql(),
            query.values().iter().join(", ")
        );
        // The first page is requested eagerly so an unreachable cluster is
        // reported by `fetch` itself.
        let first = self.session.execute(&query, None)?;
        trace!(
            "{}: first page with {} rows, more: {}",
            query.keyspace,
            first.rows.len(),
            first.paging_state.is_some()
        );

        Ok(Box::new(RecordStream::<S, R> {
            session:      &self.session,
            buffer:       first.rows.into(),
            paging_state: first.paging_state,
            rows_seen:    0,
            finished:     false,
            query,
            _record:      PhantomData,
        }))
    }
}

impl<S, R> Drop for KeyspaceClient<S, R> {
    fn drop(&mut self) {
        debug!("Releasing session for keyspace {}", self.config.keyspace);
    }
}

/// Lazy page-by-page iterator over the rows of one query.
///
/// Stops after the first error.
struct RecordStream<'a, S, R> {
    session:      &'a S,
    query:        Query,
    buffer:       VecDeque<Row>,
    paging_state: Option<PagingState>,
    rows_seen:    usize,
    finished:     bool,
    _record:      PhantomData<fn() -> R>,
}

impl<S, R> Iterator for RecordStream<'_, S, R>
where
    S: Session,
    R: FromRow,
{
    type Item = Result<R, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(row) = self.buffer.pop_front() {
                self.rows_seen += 1;
                let record = R::from_row(&row).map_err(|e| {
                    StoreError::query(
                        &self.query.keyspace,
                        format!("row {} cannot be read: {e}", self.rows_seen),
                    )
                });
                if record.is_err() {
                    self.finished = true;
                }
                return Some(record);
            }

            let Some(state) = self.paging_state.take()
            else {
                self.finished = true;
                return None;
            };
            match self.session.execute(&self.query, Some(&state)) {
                Ok(page) => {
                    trace!(
                        "{}: next page with {} rows",
                        self.query.keyspace,
                        page.rows.len()
                    );
                    self.buffer.extend(page.rows);
                    self.paging_state = page.paging_state;
                },
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                },
            }
        }
    }
}
