use chrono::{DateTime, NaiveDateTime};
use metalog_core::{
    parse_metadata, sort_processes, sort_runs, GroupSummary, LogStore, ProcessRecord, RunSummary,
    StatusCounts, TaskStatus,
};
use rusqlite::{Connection, OpenFlags, Row};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const LOG_TABLE: &str = "metalog";
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("log database not found: {}", .0.display())]
    NotFound(PathBuf),
}

/// Name of the column holding the group id. Older logs call it `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupColumn {
    GroupId,
    Id,
}

impl GroupColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupColumn::GroupId => "group_id",
            GroupColumn::Id => "id",
        }
    }
}

/// Read-only handle on a metalog SQLite file that an executor may still be
/// appending to.
pub struct MetalogStore {
    conn: Connection,
    path: PathBuf,
    group_column: OnceCell<GroupColumn>,
}

impl MetalogStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // Fails fast on files that are not SQLite databases.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            group_column: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` while the log table does not exist yet (or lacks a group column).
    pub fn group_column(&self) -> Result<Option<GroupColumn>, StorageError> {
        if let Some(column) = self.group_column.get() {
            return Ok(Some(*column));
        }

        let mut statement = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = statement
            .query_map([LOG_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let column = if names.iter().any(|name| name == "group_id") {
            Some(GroupColumn::GroupId)
        } else if names.iter().any(|name| name == "id") {
            Some(GroupColumn::Id)
        } else {
            None
        };

        match column {
            Some(column) => {
                debug!(column = column.as_str(), "resolved group column");
                let _ = self.group_column.set(column);
            }
            None if !names.is_empty() => {
                debug!(table = LOG_TABLE, "log table has no group column");
            }
            None => {}
        }
        Ok(column)
    }

    pub fn entry_count(&self) -> Result<u64, StorageError> {
        if self.group_column()?.is_none() {
            return Ok(0);
        }
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM metalog", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl LogStore for MetalogStore {
    type Error = StorageError;

    fn list_runs(&self) -> Result<Vec<RunSummary>, StorageError> {
        if self.group_column()?.is_none() {
            return Ok(Vec::new());
        }

        // Timestamps mix separators and offsets, so text order is not time
        // order. Aggregate on parsed values instead of MAX(ingested).
        let mut statement = self.conn.prepare(
            "SELECT COALESCE(run_name, ''), CAST(ingested AS TEXT) FROM metalog",
        )?;
        let mut rows = statement.query([])?;

        let mut by_run: BTreeMap<String, RunSummary> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let run_name: String = row.get(0)?;
            let ingested = ingested_column(row, 1)?;
            let run = by_run
                .entry(run_name)
                .or_insert_with_key(|name| RunSummary {
                    run_name: name.clone(),
                    last_ingested: None,
                    total_tasks: 0,
                });
            run.total_tasks += 1;
            run.last_ingested = run.last_ingested.max(ingested);
        }

        let mut runs: Vec<RunSummary> = by_run.into_values().collect();
        sort_runs(&mut runs);
        Ok(runs)
    }

    fn summarize_groups(&self, run_name: &str) -> Result<Vec<GroupSummary>, StorageError> {
        let Some(column) = self.group_column()? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "
            SELECT
                COALESCE(CAST({column} AS TEXT), '') AS grp,
                COUNT(*) AS total_tasks,
                SUM(CASE WHEN UPPER(TRIM(status)) = 'SUBMITTED' THEN 1 ELSE 0 END),
                SUM(CASE WHEN UPPER(TRIM(status)) = 'RUNNING' THEN 1 ELSE 0 END),
                SUM(CASE WHEN UPPER(TRIM(status)) = 'COMPLETED' THEN 1 ELSE 0 END),
                SUM(CASE WHEN UPPER(TRIM(status)) = 'FAILED' THEN 1 ELSE 0 END),
                SUM(CASE WHEN UPPER(TRIM(status)) = 'CACHED' THEN 1 ELSE 0 END)
            FROM metalog
            WHERE COALESCE(run_name, '') = ?1
            GROUP BY grp
            ORDER BY grp ASC
            ",
            column = column.as_str()
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement.query_map([run_name], |row| {
            let total_tasks = count_column(row, 1)?;
            let mut counts = StatusCounts {
                submitted: count_column(row, 2)?,
                running: count_column(row, 3)?,
                completed: count_column(row, 4)?,
                failed: count_column(row, 5)?,
                cached: count_column(row, 6)?,
                unknown: 0,
            };
            counts.unknown = total_tasks.saturating_sub(counts.sum());
            Ok(GroupSummary {
                group_id: row.get(0)?,
                total_tasks,
                counts,
            })
        })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    fn list_processes(
        &self,
        run_name: &str,
        group_id: &str,
    ) -> Result<Vec<ProcessRecord>, StorageError> {
        let Some(column) = self.group_column()? else {
            return Ok(Vec::new());
        };

        let sql = format!(
            "
            SELECT
                COALESCE(process, '') AS proc,
                COALESCE(CAST(task_id AS TEXT), '') AS task,
                status,
                CAST(ingested AS TEXT),
                CAST(metadata AS TEXT)
            FROM metalog
            WHERE COALESCE(run_name, '') = ?1
              AND COALESCE(CAST({column} AS TEXT), '') = ?2
            ",
            column = column.as_str()
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement.query_map([run_name, group_id], |row| {
            let status: Option<String> = row.get(2)?;
            let metadata: Option<String> = row.get(4)?;
            Ok(ProcessRecord {
                process: row.get(0)?,
                task_id: row.get(1)?,
                status: status
                    .as_deref()
                    .map(TaskStatus::from_log)
                    .unwrap_or(TaskStatus::Unknown),
                ingested: ingested_column(row, 3)?,
                metadata: parse_metadata(metadata.as_deref()),
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        sort_processes(&mut records);
        Ok(records)
    }
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: Option<i64> = row.get(idx)?;
    Ok(value.unwrap_or(0).max(0) as u64)
}

/// A missing or unreadable timestamp degrades the row instead of failing the
/// query; the writer is outside our control.
fn ingested_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    match parse_timestamp(raw) {
        Ok(timestamp) => Ok(Some(timestamp)),
        Err(err) => {
            debug!(error = %err, "unreadable ingested timestamp");
            Ok(None)
        }
    }
}

/// Accepts the executor's naive ISO-8601 form (`T` or space separated, with
/// optional fraction) and RFC 3339 with an offset, which is normalized to UTC.
fn parse_timestamp(value: String) -> Result<NaiveDateTime, StorageError> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp);
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|timestamp| timestamp.naive_utc())
        .map_err(|err| StorageError::Timestamp(format!("{trimmed:?}: {err}")))
}
