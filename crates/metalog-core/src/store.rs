use crate::model::{GroupSummary, ProcessRecord, RunSummary};

/// Read-only view over the pipeline event log.
///
/// Implementations must treat "no rows" as a normal answer and return an empty
/// vector; `Err` is reserved for a store that cannot be read at all.
pub trait LogStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs ordered by most recent ingestion first, ties broken by name.
    fn list_runs(&self) -> Result<Vec<RunSummary>, Self::Error>;

    /// Per-group status counts for one run, ordered by group id.
    fn summarize_groups(&self, run_name: &str) -> Result<Vec<GroupSummary>, Self::Error>;

    /// Raw entries for one run and group, newest first.
    fn list_processes(
        &self,
        run_name: &str,
        group_id: &str,
    ) -> Result<Vec<ProcessRecord>, Self::Error>;
}
