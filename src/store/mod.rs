//! Store clients for the variant and coverage keyspaces.
//!
//! A [`StoreClient`] fetches the records of one sample within a
//! [`ChromRange`] as a lazy, finite sequence. A fresh call to
//! [`StoreClient::fetch`] restarts the sequence from the beginning.
//!
//! [`KeyspaceClient`] is the implementation over a cluster [`Session`]: it
//! is bound to one keyspace, table and [`Consistency`] level at construction
//! and pages through results `page_size` rows at a time. The variant and
//! coverage clients are the same type with a different record type, see
//! [`VariantClient`] and [`CoverageClient`].
//!
//! The cluster wire protocol lives behind [`Session`]. [`MemorySession`] is
//! an in-memory implementation that can be loaded from CSV table dumps.

mod client;
mod consistency;
mod memory;
mod query;
mod row;


use std::sync::Arc;

pub use client::{
    CoverageClient,
    KeyspaceClient,
    KeyspaceConfig,
    VariantClient,
    DEFAULT_PAGE_SIZE,
};
pub use consistency::Consistency;
pub use memory::MemorySession;
pub use query::{
    Page,
    PagingState,
    Query,
    Session,
    CHROMOSOME_COLUMN,
    POSITION_COLUMN,
    SAMPLE_COLUMN,
};
pub use row::{
    FromRow,
    Row,
    RowError,
    Value,
    TEXT_COLUMNS,
};

use crate::data_structs::coords::ChromRange;
use crate::error::StoreError;

/// Lazy sequence of fetched records. Errors end the sequence.
pub type RecordIter<'a, R> =
    Box<dyn Iterator<Item = Result<R, StoreError>> + Send + 'a>;

pub trait StoreClient: Send + Sync {
    type Record: Send + 'static;

    /// Name of the keyspace the client is bound to.
    fn keyspace(&self) -> &str;

    /// Fetches the records of `sample_id` within `range`.
    ///
    /// Fails with [`StoreError::Connection`] when the cluster cannot be
    /// reached and with [`StoreError::Query`] when the query is rejected.
    fn fetch<'a>(
        &'a self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<RecordIter<'a, Self::Record>, StoreError>;
}

impl<C: StoreClient + ?Sized> StoreClient for &C {
    type Record = C::Record;

    fn keyspace(&self) -> &str {
        (**self).keyspace()
    }

    fn fetch<'a>(
        &'a self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<RecordIter<'a, Self::Record>, StoreError> {
        (**self).fetch(sample_id, range)
    }
}

impl<C: StoreClient + ?Sized> StoreClient for Arc<C> {
    type Record = C::Record;

    fn keyspace(&self) -> &str {
        (**self).keyspace()
    }

    fn fetch<'a>(
        &'a self,
        sample_id: &str,
        range: &ChromRange,
    ) -> Result<RecordIter<'a, Self::Record>, StoreError> {
        (**self).fetch(sample_id, range)
    }
}
