use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use metalog_core::{Dashboard, Reconciled, RefreshReport, RefreshScheduler, RefreshTrigger};
use metalog_storage::MetalogStore;
use ratatui::widgets::TableState;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Runs,
    Groups,
    Processes,
    Metadata,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Runs => Focus::Groups,
            Focus::Groups => Focus::Processes,
            Focus::Processes => Focus::Metadata,
            Focus::Metadata => Focus::Runs,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Focus::Runs => Focus::Metadata,
            Focus::Groups => Focus::Runs,
            Focus::Processes => Focus::Groups,
            Focus::Metadata => Focus::Processes,
        }
    }
}

/// Everything the loop feeds into [`App::dispatch`], one at a time.
#[derive(Debug)]
pub enum AppEvent {
    Input(Event),
    Tick,
}

pub struct App {
    pub config: Config,
    pub dashboard: Dashboard<MetalogStore>,
    pub scheduler: RefreshScheduler,
    pub focus: Focus,
    pub run_state: TableState,
    pub group_state: TableState,
    pub process_state: TableState,
    pub metadata_scroll: u16,
    pub metadata_max_scroll: u16,
    pub show_help: bool,
    pub last_refresh: Option<DateTime<Local>>,
    pub entry_count: u64,
    pub status_note: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, store: MetalogStore) -> Self {
        let scheduler = RefreshScheduler::new(config.refresh_period);
        Self {
            config,
            dashboard: Dashboard::new(store),
            scheduler,
            focus: Focus::Runs,
            run_state: TableState::default(),
            group_state: TableState::default(),
            process_state: TableState::default(),
            metadata_scroll: 0,
            metadata_max_scroll: 0,
            show_help: false,
            last_refresh: None,
            entry_count: 0,
            status_note: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn next_refresh_deadline(&self, now: Instant) -> Instant {
        self.scheduler.next_deadline(now)
    }

    /// Handles one event and any refresh it makes due. Returns only after the
    /// whole cascade has finished.
    pub fn dispatch(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Input(Event::Key(key)) => {
                if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    self.handle_key(key)?;
                }
            }
            AppEvent::Input(_) | AppEvent::Tick => {}
        }
        self.refresh_if_due(Instant::now())?;
        Ok(())
    }

    pub fn refresh_if_due(&mut self, now: Instant) -> Result<Option<RefreshReport>> {
        let Some(trigger) = self.scheduler.due(now) else {
            return Ok(None);
        };
        let report = self
            .dashboard
            .refresh(trigger)
            .with_context(|| format!("{} refresh of {} failed", trigger.label(), self.config.db_path.display()))?;
        self.entry_count = self
            .dashboard
            .store()
            .entry_count()
            .context("failed to count log entries")?;
        self.scheduler.complete(now);
        self.last_refresh = Some(Local::now());

        if trigger == RefreshTrigger::Startup {
            info!(
                path = %self.config.db_path.display(),
                runs = report.runs,
                entries = self.entry_count,
                "initial load complete"
            );
        }
        self.status_note = cleared_note(&report);
        if report.process == Reconciled::Cleared {
            self.metadata_scroll = 0;
        }
        self.sync_cursors();
        Ok(Some(report))
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Ok(());
        }
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Char('r') => {
                debug!("manual refresh requested");
                self.scheduler.request_manual();
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
            }
            KeyCode::BackTab => {
                self.focus = self.focus.prev();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_cursor(1)?;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_cursor(-1)?;
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.jump(false)?;
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.jump(true)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn focused_len(&self) -> usize {
        let view = self.dashboard.view();
        match self.focus {
            Focus::Runs => view.runs.len(),
            Focus::Groups => view.groups.len(),
            Focus::Processes => view.processes.len(),
            Focus::Metadata => 0,
        }
    }

    fn focused_cursor(&self) -> Option<usize> {
        let view = self.dashboard.view();
        match self.focus {
            Focus::Runs => view.run_cursor(),
            Focus::Groups => view.group_cursor(),
            Focus::Processes => view.process_cursor(),
            Focus::Metadata => None,
        }
    }

    fn move_cursor(&mut self, delta: isize) -> Result<()> {
        if self.focus == Focus::Metadata {
            self.metadata_scroll = if delta < 0 {
                self.metadata_scroll.saturating_sub(1)
            } else {
                self.metadata_scroll
                    .saturating_add(1)
                    .min(self.metadata_max_scroll)
            };
            return Ok(());
        }

        let len = self.focused_len();
        if len == 0 {
            return Ok(());
        }
        let len = len as isize;
        let next = match self.focused_cursor() {
            Some(current) => {
                let mut next = wrap(current as isize + delta, len);
                // A repeated (process, task_id) resolves to its first row, so
                // step over rows that share the current key.
                if self.focus == Focus::Processes {
                    let processes = &self.dashboard.view().processes;
                    if let Some(key) = processes.get(current).map(|record| record.key()) {
                        let mut steps = 1;
                        while steps < len
                            && processes
                                .get(next as usize)
                                .is_some_and(|record| record.matches(&key))
                        {
                            next = wrap(next + delta, len);
                            steps += 1;
                        }
                    }
                }
                next
            }
            None if delta < 0 => len - 1,
            None => 0,
        };
        self.select_at(next as usize)
    }

    fn jump(&mut self, to_end: bool) -> Result<()> {
        if self.focus == Focus::Metadata {
            self.metadata_scroll = if to_end { self.metadata_max_scroll } else { 0 };
            return Ok(());
        }
        let len = self.focused_len();
        if len == 0 {
            return Ok(());
        }
        self.select_at(if to_end { len - 1 } else { 0 })
    }

    fn select_at(&mut self, index: usize) -> Result<()> {
        let changed = match self.focus {
            Focus::Runs => self
                .dashboard
                .highlight_run(index)
                .context("failed to load the selected run")?,
            Focus::Groups => self
                .dashboard
                .highlight_group(index)
                .context("failed to load the selected group")?,
            Focus::Processes => self.dashboard.highlight_process(index),
            Focus::Metadata => false,
        };
        if changed {
            self.metadata_scroll = 0;
            self.status_note = None;
        }
        self.sync_cursors();
        Ok(())
    }

    /// Table cursors are derived from the identity-based selection, never the
    /// other way round.
    pub fn sync_cursors(&mut self) {
        let view = self.dashboard.view();
        let (run, group, process) = (view.run_cursor(), view.group_cursor(), view.process_cursor());
        self.run_state.select(run);
        self.group_state.select(group);
        self.process_state.select(process);
    }
}

fn wrap(index: isize, len: isize) -> isize {
    if index < 0 {
        len - 1
    } else if index >= len {
        0
    } else {
        index
    }
}

fn cleared_note(report: &RefreshReport) -> Option<String> {
    if report.run == Reconciled::Cleared {
        Some("selected run is no longer in the log".to_string())
    } else if report.group == Reconciled::Cleared {
        Some("selected group is no longer in this run".to_string())
    } else if report.process == Reconciled::Cleared {
        Some("selected process is no longer in this group".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use metalog_core::MetadataPane;
    use rusqlite::Connection;
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Input(Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }))
    }

    fn insert(path: &Path, rows: &[(&str, &str, &str, &str, &str, &str, Option<&str>)]) {
        let conn = Connection::open(path).expect("open writer");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metalog (
                run_name TEXT, group_id TEXT, ingested TEXT, process TEXT,
                task_id TEXT, status TEXT, metadata TEXT
            )",
        )
        .expect("create table");
        for (run, group, ingested, process, task_id, status, metadata) in rows {
            conn.execute(
                "INSERT INTO metalog VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![run, group, ingested, process, task_id, status, metadata],
            )
            .expect("insert row");
        }
    }

    fn seeded() -> (NamedTempFile, App) {
        let file = NamedTempFile::new().expect("temp db");
        insert(
            file.path(),
            &[
                ("run_a", "w0", "2025-01-01T10:00:00", "align", "t1", "COMPLETED", None),
                ("run_a", "w0", "2025-01-01T10:01:00", "sort", "t2", "FAILED", Some(r#"{"error":"Out of memory","retry_count":2}"#)),
                ("run_a", "w1", "2025-01-01T10:02:00", "call", "t3", "RUNNING", None),
                ("run_b", "w0", "2025-01-02T09:00:00", "align", "t1", "CACHED", None),
            ],
        );
        let config = Config {
            db_path: file.path().to_path_buf(),
            refresh_period: Duration::from_secs(5),
            log_file: None,
        };
        let store = MetalogStore::open(file.path()).expect("open store");
        let mut app = App::new(config, store);
        app.refresh_if_due(Instant::now())
            .expect("startup refresh")
            .expect("startup is due");
        (file, app)
    }

    #[test]
    fn startup_selects_newest_run() {
        let (_file, app) = seeded();
        let view = app.dashboard.view();
        assert_eq!(view.selection.run.as_deref(), Some("run_b"));
        assert_eq!(view.selection.group.as_deref(), Some("w0"));
        assert_eq!(app.run_state.selected(), Some(0));
        assert_eq!(app.group_state.selected(), Some(0));
        assert_eq!(app.process_state.selected(), None);
        assert_eq!(app.entry_count, 4);
        assert!(app.last_refresh.is_some());
    }

    #[test]
    fn moving_run_cursor_cascades_to_groups() {
        let (_file, mut app) = seeded();
        app.dispatch(key(KeyCode::Char('j'))).expect("move");
        let view = app.dashboard.view();
        assert_eq!(view.selection.run.as_deref(), Some("run_a"));
        assert_eq!(view.groups.len(), 2);
        assert_eq!(view.selection.group.as_deref(), Some("w0"));
        assert_eq!(view.processes.len(), 2);
        assert_eq!(app.run_state.selected(), Some(1));
    }

    #[test]
    fn process_highlight_fills_metadata_pane() {
        let (_file, mut app) = seeded();
        app.dispatch(key(KeyCode::Char('j'))).expect("pick run_a");
        app.dispatch(key(KeyCode::Tab)).expect("focus groups");
        app.dispatch(key(KeyCode::Tab)).expect("focus processes");
        assert_eq!(app.focus, Focus::Processes);
        app.dispatch(key(KeyCode::Char('j'))).expect("first process");

        assert_eq!(app.process_state.selected(), Some(0));
        assert_eq!(
            app.dashboard.view().metadata,
            MetadataPane::Document(json!({"error": "Out of memory", "retry_count": 2}))
        );
    }

    #[test]
    fn user_selection_survives_following_tick() {
        let (file, mut app) = seeded();
        app.dispatch(key(KeyCode::Char('j'))).expect("pick run_a");
        app.dispatch(key(KeyCode::Tab)).expect("focus groups");
        app.dispatch(key(KeyCode::Char('j'))).expect("pick w1");
        assert_eq!(app.dashboard.view().selection.group.as_deref(), Some("w1"));

        insert(
            file.path(),
            &[("run_a", "w0", "2025-01-01T10:05:00", "merge", "t4", "SUBMITTED", None)],
        );
        app.scheduler.request_manual();
        app.dispatch(AppEvent::Tick).expect("refresh");

        let view = app.dashboard.view();
        assert_eq!(view.selection.run.as_deref(), Some("run_a"));
        assert_eq!(view.selection.group.as_deref(), Some("w1"));
        assert_eq!(app.group_state.selected(), Some(1));
        assert_eq!(app.entry_count, 5);
    }

    #[test]
    fn manual_refresh_key_runs_cascade_immediately() {
        let (file, mut app) = seeded();
        let before = app.scheduler.completed();
        insert(
            file.path(),
            &[("run_c", "w0", "2025-01-03T08:00:00", "align", "t1", "SUBMITTED", None)],
        );
        app.dispatch(key(KeyCode::Char('r'))).expect("refresh");

        assert_eq!(app.scheduler.completed(), before + 1);
        let view = app.dashboard.view();
        assert_eq!(view.runs[0].run_name, "run_c");
        // The default only applies on the first listing; the operator's run stays.
        assert_eq!(view.selection.run.as_deref(), Some("run_b"));
        assert_eq!(app.run_state.selected(), Some(1));
    }

    #[test]
    fn cursor_steps_over_repeated_process_keys() {
        let (file, mut app) = seeded();
        insert(
            file.path(),
            &[
                ("run_b", "w1", "2025-01-02T08:03:00", "dup", "t1", "FAILED", None),
                ("run_b", "w1", "2025-01-02T08:02:00", "dup", "t1", "COMPLETED", None),
                ("run_b", "w1", "2025-01-02T08:01:00", "other", "t2", "COMPLETED", None),
            ],
        );
        app.dispatch(key(KeyCode::Char('r'))).expect("refresh");
        app.dispatch(key(KeyCode::Tab)).expect("focus groups");
        app.dispatch(key(KeyCode::Char('j'))).expect("pick w1");
        assert_eq!(app.dashboard.view().selection.group.as_deref(), Some("w1"));

        app.dispatch(key(KeyCode::Tab)).expect("focus processes");
        app.dispatch(key(KeyCode::Char('j'))).expect("first row");
        assert_eq!(app.process_state.selected(), Some(0));

        app.dispatch(key(KeyCode::Char('j'))).expect("past the repeat");
        let selected = app.dashboard.view().selection.process.as_ref().map(ToString::to_string);
        assert_eq!(selected.as_deref(), Some("other/t2"));
        assert_eq!(app.process_state.selected(), Some(2));

        app.dispatch(key(KeyCode::Char('k'))).expect("back up");
        assert_eq!(app.process_state.selected(), Some(0));
    }

    #[test]
    fn tick_before_period_does_not_query() {
        let (_file, mut app) = seeded();
        let before = app.scheduler.completed();
        assert!(app
            .refresh_if_due(Instant::now())
            .expect("no refresh")
            .is_none());
        assert_eq!(app.scheduler.completed(), before);
    }

    #[test]
    fn help_swallows_keys_until_closed() {
        let (_file, mut app) = seeded();
        app.dispatch(key(KeyCode::Char('?'))).expect("open help");
        assert!(app.show_help);
        app.dispatch(key(KeyCode::Char('j'))).expect("ignored");
        assert_eq!(
            app.dashboard.view().selection.run.as_deref(),
            Some("run_b")
        );
        app.dispatch(key(KeyCode::Esc)).expect("close help");
        assert!(!app.show_help);
        assert!(!app.should_quit());
        app.dispatch(key(KeyCode::Char('q'))).expect("quit");
        assert!(app.should_quit());
    }

    #[test]
    fn metadata_focus_scrolls_within_bounds() {
        let (_file, mut app) = seeded();
        app.focus = Focus::Metadata;
        app.metadata_max_scroll = 2;
        for _ in 0..5 {
            app.dispatch(key(KeyCode::Down)).expect("scroll");
        }
        assert_eq!(app.metadata_scroll, 2);
        app.dispatch(key(KeyCode::Char('g'))).expect("top");
        assert_eq!(app.metadata_scroll, 0);
    }
}
