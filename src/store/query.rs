use std::sync::Arc;

use itertools::Itertools;

use super::row::{
    Row,
    Value,
};
use super::Consistency;
use crate::data_structs::coords::ChromRange;
use crate::data_structs::typedef::PosType;
use crate::error::StoreError;

/// Key columns every sample table is partitioned and clustered by.
pub const SAMPLE_COLUMN: &str = "sample";
pub const CHROMOSOME_COLUMN: &str = "chr";
pub const POSITION_COLUMN: &str = "pos";

/// A parameterized range query for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub keyspace:    String,
    pub table:       String,
    pub columns:     &'static [&'static str],
    pub sample_id:   String,
    pub chromosome:  String,
    pub start:       PosType,
    pub end:         PosType,
    pub consistency: Consistency,
    pub page_size:   usize,
}

impl Query {
    /// CQL statement with bind markers, in the order of [`Query::values`].
    pub fn cql(&self) -> String {
        format!(
            "SELECT {} FROM {}.{} WHERE {SAMPLE_COLUMN} = ? AND \
             {CHROMOSOME_COLUMN} = ? AND {POSITION_COLUMN} >= ? AND \
             {POSITION_COLUMN} <= ?",
            self.columns.iter().join(", "),
            self.keyspace,
            self.table
        )
    }

    pub fn values(&self) -> Vec<Value> {
        let clamp = |pos: PosType| i64::try_from(pos).unwrap_or(i64::MAX);
        vec![
            Value::Text(self.sample_id.clone()),
            Value::Text(self.chromosome.clone()),
            Value::Int(clamp(self.start)),
            Value::Int(clamp(self.end)),
        ]
    }

    pub fn range(&self) -> ChromRange {
        ChromRange::new(self.chromosome.clone(), self.start, self.end)
    }
}

/// Opaque continuation token handed back by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingState(pub Vec<u8>);

/// One bounded chunk of a result set.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows:         Vec<Row>,
    pub paging_state: Option<PagingState>,
}

impl Page {
    pub fn last(rows: Vec<Row>) -> Self {
        Self {
            rows,
            paging_state: None,
        }
    }
}

/// Connection to one cluster keyspace.
///
/// Implemented by cluster drivers. Sessions are shared between concurrent
/// runs, so they must be thread-safe (a connection pool, typically).
/// Dropping the session releases its connections.
pub trait Session: Send + Sync {
    fn execute(
        &self,
        query: &Query,
        paging_state: Option<&PagingState>,
    ) -> Result<Page, StoreError>;
}

impl<S: Session + ?Sized> Session for Arc<S> {
    fn execute(
        &self,
        query: &Query,
        paging_state: Option<&PagingState>,
    ) -> Result<Page, StoreError> {
        (**self).execute(query, paging_state)
    }
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn execute(
        &self,
        query: &Query,
        paging_state: Option<&PagingState>,
    ) -> Result<Page, StoreError> {
        (**self).execute(query, paging_state)
    }
}
