pub use crate::classify::{
    classify,
    classify_all,
    Thresholds,
};
pub use crate::config::ReportConfig;
pub use crate::data_structs::coords::{
    ChromRange,
    GenomicPosition,
};
pub use crate::data_structs::{
    Category,
    ClassifiedRecord,
    CoverageRecord,
    Genotype,
    JoinedRecord,
    Reason,
    VariantRecord,
};
pub use crate::error::{
    ConfigError,
    FailedSource,
    FetchError,
    JoinError,
    PartialFetchError,
    ReportError,
    StoreError,
};
pub use crate::fetch::{
    CancelToken,
    FetchCoordinator,
    FetchedData,
};
pub use crate::join::{
    best_coverage,
    join,
};
pub use crate::report::{
    CoverageSummary,
    ReportRunner,
    ReportSummary,
    SampleReport,
    SampleRequest,
};
pub use crate::store::{
    Consistency,
    CoverageClient,
    KeyspaceClient,
    KeyspaceConfig,
    MemorySession,
    Session,
    StoreClient,
    VariantClient,
};
