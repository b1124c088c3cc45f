use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Cached,
    Unknown,
}

impl TaskStatus {
    pub const KNOWN: [TaskStatus; 5] = [
        TaskStatus::Submitted,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cached,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cached => "CACHED",
            TaskStatus::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse used for rows coming from the log; never fails.
    pub fn from_log(input: &str) -> Self {
        input.parse().unwrap_or(TaskStatus::Unknown)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "SUBMITTED" => Ok(TaskStatus::Submitted),
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            "CACHED" => Ok(TaskStatus::Cached),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

/// One row of the external log. The dashboard never writes these; they exist
/// so fixtures and in-memory stores can describe log contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub run_name: String,
    pub group_id: String,
    pub process: String,
    pub task_id: String,
    pub status: TaskStatus,
    pub ingested: NaiveDateTime,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_name: String,
    /// `None` when no row of the run carries a readable timestamp.
    pub last_ingested: Option<NaiveDateTime>,
    pub total_tasks: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub submitted: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cached: u64,
    pub unknown: u64,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Submitted => self.submitted,
            TaskStatus::Running => self.running,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
            TaskStatus::Cached => self.cached,
            TaskStatus::Unknown => self.unknown,
        }
    }

    pub fn record(&mut self, status: TaskStatus) {
        let slot = match status {
            TaskStatus::Submitted => &mut self.submitted,
            TaskStatus::Running => &mut self.running,
            TaskStatus::Completed => &mut self.completed,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::Cached => &mut self.cached,
            TaskStatus::Unknown => &mut self.unknown,
        };
        *slot += 1;
    }

    pub fn sum(&self) -> u64 {
        self.submitted + self.running + self.completed + self.failed + self.cached + self.unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub total_tasks: u64,
    pub counts: StatusCounts,
}

/// Identity of a process row across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProcessKey {
    pub process: String,
    pub task_id: String,
}

impl ProcessKey {
    pub fn new(process: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.process, self.task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub process: String,
    pub task_id: String,
    pub status: TaskStatus,
    /// `None` when the writer left the timestamp empty or unreadable.
    pub ingested: Option<NaiveDateTime>,
    /// `None` when the row carries no usable metadata document.
    pub metadata: Option<Value>,
}

impl ProcessRecord {
    pub fn key(&self) -> ProcessKey {
        ProcessKey::new(self.process.clone(), self.task_id.clone())
    }

    pub fn matches(&self, key: &ProcessKey) -> bool {
        self.process == key.process && self.task_id == key.task_id
    }
}

/// Newest run first. Runs without any readable timestamp go last; ties break
/// by name.
pub fn sort_runs(runs: &mut [RunSummary]) {
    runs.sort_by(|a, b| {
        b.last_ingested
            .cmp(&a.last_ingested)
            .then_with(|| a.run_name.cmp(&b.run_name))
    });
}

/// Newest record first, undated records last, then by `(process, task_id)`.
pub fn sort_processes(records: &mut [ProcessRecord]) {
    records.sort_by(|a, b| {
        b.ingested
            .cmp(&a.ingested)
            .then_with(|| a.process.cmp(&b.process))
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
}

/// Normalizes a raw metadata column value. Absent, blank, `null`, `{}` and
/// unparseable text all collapse to `None`.
pub fn parse_metadata(raw: Option<&str>) -> Option<Value> {
    let text = raw?.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => None,
        Ok(Value::Object(map)) if map.is_empty() => None,
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(error = %err, "metadata is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_is_case_insensitive_and_lenient() {
        assert_eq!("completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(" FAILED ".parse::<TaskStatus>(), Ok(TaskStatus::Failed));
        assert!("ABORTED".parse::<TaskStatus>().is_err());
        assert_eq!(TaskStatus::from_log("ABORTED"), TaskStatus::Unknown);
        assert_eq!(TaskStatus::Cached.to_string(), "CACHED");
    }

    #[test]
    fn status_counts_sum_includes_unknown() {
        let mut counts = StatusCounts::default();
        for status in [
            TaskStatus::Completed,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Unknown,
        ] {
            counts.record(status);
        }
        assert_eq!(counts.get(TaskStatus::Completed), 2);
        assert_eq!(counts.get(TaskStatus::Failed), 1);
        assert_eq!(counts.sum(), 4);
    }

    #[test]
    fn metadata_parsing_degrades_to_none() {
        assert_eq!(parse_metadata(None), None);
        assert_eq!(parse_metadata(Some("")), None);
        assert_eq!(parse_metadata(Some("null")), None);
        assert_eq!(parse_metadata(Some("{}")), None);
        assert_eq!(parse_metadata(Some("{not json")), None);
        assert_eq!(
            parse_metadata(Some(r#"{"error":"Out of memory","retry_count":2}"#)),
            Some(json!({"error": "Out of memory", "retry_count": 2}))
        );
    }

    #[test]
    fn undated_rows_sort_after_dated_ones() {
        let noon = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(12, 0, 0));
        let morning = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(9, 0, 0));
        let mut runs: Vec<RunSummary> = [("b", noon), ("z", None), ("c", morning), ("a", noon)]
            .into_iter()
            .map(|(name, last_ingested)| RunSummary {
                run_name: name.to_string(),
                last_ingested,
                total_tasks: 1,
            })
            .collect();
        sort_runs(&mut runs);
        let names: Vec<&str> = runs.iter().map(|run| run.run_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "z"]);

        let record = |process: &str, task_id: &str, ingested| ProcessRecord {
            process: process.to_string(),
            task_id: task_id.to_string(),
            status: TaskStatus::Running,
            ingested,
            metadata: None,
        };
        let mut records = vec![
            record("late", "t9", None),
            record("sort", "t2", morning),
            record("align", "t2", noon),
            record("align", "t1", noon),
        ];
        sort_processes(&mut records);
        let keys: Vec<String> = records.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["align/t1", "align/t2", "sort/t2", "late/t9"]);
    }
}
