//! Workload tables backed by kube-state-metrics.
//!
//! A primary, table-shaped query discovers one row per workload. Only the
//! rows on the current page get the per-row secondary queries, and their
//! results are joined back by identity at render time.
//!
//! ```text
//! primary query -> TableOrchestrator rows -> visible ids -> row queries
//!     -> QueryRunner -> SecondaryResults -> render() via series lookup
//! ```

pub mod error;
pub mod expanded;
pub mod orchestrator;
pub mod page;
pub mod query;
pub mod runner;
pub mod series;
pub mod time_range;
pub mod variables;
pub mod workload;

pub use error::{QueryError, VariableError};
pub use expanded::{ExpandedData, ExpandedRowBuilder, ExpandedRowCache, ExpandedView};
pub use orchestrator::{
    DecoratedRow, FetchOutcome, FetchTicket, PrimaryRow, Signature, TableOrchestrator,
    TablePhase, TableView,
};
pub use page::Pagination;
pub use query::{QueryFormat, QuerySpec, QueryTemplate};
pub use runner::{DatasourceRef, PrometheusRunner, QueryRunner, run_fetch};
pub use series::{SecondaryResults, SeriesResult};
pub use time_range::TimeRange;
pub use variables::{Variable, VariableKind, VariableSet, resolve};
pub use workload::{ColumnSource, ColumnSpec, FieldValue, WorkloadKind, WorkloadSpec};
