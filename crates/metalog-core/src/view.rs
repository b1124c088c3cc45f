use crate::model::{GroupSummary, ProcessKey, ProcessRecord, RunSummary};
use crate::selection::Selection;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum MetadataPane {
    #[default]
    NoSelection,
    /// A process is selected but has no usable metadata (or vanished).
    NoData,
    Document(Value),
}

impl MetadataPane {
    pub fn for_process(records: &[ProcessRecord], key: Option<&ProcessKey>) -> Self {
        let Some(key) = key else {
            return MetadataPane::NoSelection;
        };
        match records.iter().find(|record| record.matches(key)) {
            Some(ProcessRecord {
                metadata: Some(document),
                ..
            }) => MetadataPane::Document(document.clone()),
            _ => MetadataPane::NoData,
        }
    }
}

/// Everything the render surface needs, rebuilt from the latest snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    pub runs: Vec<RunSummary>,
    pub groups: Vec<GroupSummary>,
    pub processes: Vec<ProcessRecord>,
    pub metadata: MetadataPane,
    pub selection: Selection,
}

impl DashboardView {
    pub fn run_cursor(&self) -> Option<usize> {
        let run = self.selection.run.as_deref()?;
        self.runs.iter().position(|row| row.run_name == run)
    }

    pub fn group_cursor(&self) -> Option<usize> {
        let group = self.selection.group.as_deref()?;
        self.groups.iter().position(|row| row.group_id == group)
    }

    pub fn process_cursor(&self) -> Option<usize> {
        let key = self.selection.process.as_ref()?;
        self.processes.iter().position(|row| row.matches(key))
    }

    pub fn selected_process(&self) -> Option<&ProcessRecord> {
        self.process_cursor().and_then(|idx| self.processes.get(idx))
    }
}
