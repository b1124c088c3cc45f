use crate::model::ProcessKey;
use crate::scheduler::RefreshTrigger;
use crate::selection::{Reconciled, SelectionController};
use crate::store::LogStore;
use crate::view::{DashboardView, MetadataPane};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub trigger: RefreshTrigger,
    pub runs: usize,
    pub groups: usize,
    pub processes: usize,
    pub run: Reconciled,
    pub group: Reconciled,
    pub process: Reconciled,
}

/// Owns the store, the selection and the latest view, and runs the top-down
/// refresh cascade. Every public mutation runs to completion before returning.
pub struct Dashboard<S> {
    store: S,
    selection: SelectionController,
    view: DashboardView,
}

impl<S: LogStore> Dashboard<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            selection: SelectionController::new(),
            view: DashboardView::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// Full cascade: runs, then groups of the selected run, then processes of
    /// the selected group, then the metadata pane.
    pub fn refresh(&mut self, trigger: RefreshTrigger) -> Result<RefreshReport, S::Error> {
        let runs = self.store.list_runs()?;
        let run = self.selection.reconcile_runs(&runs);
        self.view.runs = runs;

        let group = self.sync_groups()?;
        let process = self.sync_processes()?;
        self.sync_metadata();

        let report = RefreshReport {
            trigger,
            runs: self.view.runs.len(),
            groups: self.view.groups.len(),
            processes: self.view.processes.len(),
            run,
            group,
            process,
        };
        debug!(
            trigger = trigger.label(),
            runs = report.runs,
            groups = report.groups,
            processes = report.processes,
            run = ?report.run,
            group = ?report.group,
            process = ?report.process,
            "refresh cascade complete"
        );
        Ok(report)
    }

    /// run-changed(value). Unknown run names are ignored so the selection never
    /// points outside the current view.
    pub fn select_run(&mut self, run_name: &str) -> Result<bool, S::Error> {
        if !self.view.runs.iter().any(|run| run.run_name == run_name) {
            return Ok(false);
        }
        if !self.selection.set_run(Some(run_name.to_string())) {
            return Ok(false);
        }
        debug!(run = run_name, "run selected");
        self.sync_groups()?;
        self.sync_processes()?;
        self.sync_metadata();
        Ok(true)
    }

    pub fn highlight_run(&mut self, index: usize) -> Result<bool, S::Error> {
        let Some(run_name) = self.view.runs.get(index).map(|run| run.run_name.clone()) else {
            return Ok(false);
        };
        self.select_run(&run_name)
    }

    /// group-row-highlighted(index).
    pub fn highlight_group(&mut self, index: usize) -> Result<bool, S::Error> {
        let Some(group_id) = self
            .view
            .groups
            .get(index)
            .map(|group| group.group_id.clone())
        else {
            return Ok(false);
        };
        if !self.selection.set_group(Some(group_id)) {
            return Ok(false);
        }
        debug!(group = ?self.selection.group(), "group selected");
        self.sync_processes()?;
        self.sync_metadata();
        Ok(true)
    }

    /// process-row-highlighted(index). Served from the current snapshot; the
    /// next refresh re-reads the rows.
    pub fn highlight_process(&mut self, index: usize) -> bool {
        let Some(key) = self.view.processes.get(index).map(|record| record.key()) else {
            return false;
        };
        if !self.selection.set_process(Some(key)) {
            return false;
        }
        self.sync_metadata();
        true
    }

    fn sync_groups(&mut self) -> Result<Reconciled, S::Error> {
        let reconciled = match self.selection.run().map(str::to_owned) {
            Some(run) => {
                let groups = self.store.summarize_groups(&run)?;
                let reconciled = self.selection.reconcile_groups(&groups);
                self.view.groups = groups;
                reconciled
            }
            None => {
                self.view.groups.clear();
                Reconciled::Unset
            }
        };
        self.capture_selection();
        Ok(reconciled)
    }

    fn sync_processes(&mut self) -> Result<Reconciled, S::Error> {
        let scope = match (self.selection.run(), self.selection.group()) {
            (Some(run), Some(group)) => Some((run.to_owned(), group.to_owned())),
            _ => None,
        };
        let reconciled = match scope {
            Some((run, group)) => {
                let records = self.store.list_processes(&run, &group)?;
                let reconciled = self.selection.reconcile_processes(&records);
                self.view.processes = records;
                reconciled
            }
            None => {
                self.view.processes.clear();
                Reconciled::Unset
            }
        };
        self.capture_selection();
        Ok(reconciled)
    }

    fn sync_metadata(&mut self) {
        let key: Option<&ProcessKey> = self.selection.process();
        self.view.metadata = MetadataPane::for_process(&self.view.processes, key);
        self.capture_selection();
    }

    fn capture_selection(&mut self) {
        self.view.selection = self.selection.selection().clone();
    }
}
