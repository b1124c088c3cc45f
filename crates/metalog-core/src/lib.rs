//! Selection and refresh state machine for the metalog dashboard.
//!
//! The store is abstracted behind [`LogStore`]; everything here is synchronous
//! and free of terminal or database concerns.

pub mod dashboard;
pub mod model;
pub mod scheduler;
pub mod selection;
pub mod store;
pub mod view;

pub use dashboard::{Dashboard, RefreshReport};
pub use model::{
    parse_metadata, sort_processes, sort_runs, GroupSummary, LogEntry, ProcessKey, ProcessRecord, RunSummary, StatusCounts,
    TaskStatus,
};
pub use scheduler::{RefreshScheduler, RefreshTrigger, DEFAULT_REFRESH_PERIOD};
pub use selection::{Reconciled, Selection, SelectionController};
pub use store::LogStore;
pub use view::{DashboardView, MetadataPane};
