//! Three-level selection (run, group, process) with cascade invalidation.
//!
//! Every selection is held by identity: `run_name`, `group_id` and the
//! `(process, task_id)` pair. Positional cursors are derived from these after
//! each update and are never the source of truth.

use crate::model::{GroupSummary, ProcessKey, ProcessRecord, RunSummary};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub run: Option<String>,
    pub group: Option<String>,
    pub process: Option<ProcessKey>,
}

/// Outcome of reconciling one level against freshly fetched rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reconciled {
    /// The selected entity is still present.
    Kept,
    /// The selected entity vanished; it and everything beneath it was cleared.
    Cleared,
    /// Nothing was selected and the first row was picked as the default.
    Defaulted,
    /// Nothing was selected and nothing was picked.
    Unset,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selection: Selection,
    run_defaulted: bool,
    group_defaulted: bool,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn run(&self) -> Option<&str> {
        self.selection.run.as_deref()
    }

    pub fn group(&self) -> Option<&str> {
        self.selection.group.as_deref()
    }

    pub fn process(&self) -> Option<&ProcessKey> {
        self.selection.process.as_ref()
    }

    /// Returns `true` when the run actually changed. A new run always clears
    /// group and process, even if the new run has a group with the same id.
    pub fn set_run(&mut self, run: Option<String>) -> bool {
        if self.selection.run == run {
            return false;
        }
        self.selection.run = run;
        self.clear_group();
        // A different run gets its own first-group default.
        self.group_defaulted = false;
        true
    }

    /// Ignored while no run is selected.
    pub fn set_group(&mut self, group: Option<String>) -> bool {
        if group.is_some() && self.selection.run.is_none() {
            return false;
        }
        if self.selection.group == group {
            return false;
        }
        self.selection.group = group;
        self.selection.process = None;
        true
    }

    /// Ignored while no group is selected.
    pub fn set_process(&mut self, process: Option<ProcessKey>) -> bool {
        if process.is_some() && self.selection.group.is_none() {
            return false;
        }
        if self.selection.process == process {
            return false;
        }
        self.selection.process = process;
        true
    }

    pub fn reconcile_runs(&mut self, runs: &[RunSummary]) -> Reconciled {
        if let Some(current) = self.selection.run.as_deref() {
            if runs.iter().any(|run| run.run_name == current) {
                return Reconciled::Kept;
            }
            self.selection.run = None;
            self.clear_group();
            return Reconciled::Cleared;
        }

        if self.run_defaulted {
            return Reconciled::Unset;
        }
        match runs.first() {
            Some(first) => {
                self.set_run(Some(first.run_name.clone()));
                self.run_defaulted = true;
                Reconciled::Defaulted
            }
            None => Reconciled::Unset,
        }
    }

    pub fn reconcile_groups(&mut self, groups: &[GroupSummary]) -> Reconciled {
        if let Some(current) = self.selection.group.as_deref() {
            if groups.iter().any(|group| group.group_id == current) {
                return Reconciled::Kept;
            }
            self.clear_group();
            return Reconciled::Cleared;
        }

        if self.group_defaulted || self.selection.run.is_none() {
            return Reconciled::Unset;
        }
        match groups.first() {
            Some(first) => {
                self.set_group(Some(first.group_id.clone()));
                self.group_defaulted = true;
                Reconciled::Defaulted
            }
            None => Reconciled::Unset,
        }
    }

    /// Processes are never picked by default.
    pub fn reconcile_processes(&mut self, records: &[ProcessRecord]) -> Reconciled {
        let Some(current) = self.selection.process.as_ref() else {
            return Reconciled::Unset;
        };
        if records.iter().any(|record| record.matches(current)) {
            return Reconciled::Kept;
        }
        self.selection.process = None;
        Reconciled::Cleared
    }

    fn clear_group(&mut self) {
        self.selection.group = None;
        self.selection.process = None;
    }
}
