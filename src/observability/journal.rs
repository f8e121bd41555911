/// Run journal for gradebox
/// Appends one JSON object per line describing the lifecycle of a grading run.
///
/// Every line carries the run id and a UTC timestamp so journals from several
/// runs can share one file.
use crate::config::types::{GradeError, GradedResult, Result, Verdict};
use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle events recorded by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        checks: usize,
    },
    CheckStarted {
        name: String,
        timeout_ms: Option<u64>,
    },
    CheckSkipped {
        name: String,
        verdict: Verdict,
        reason: String,
    },
    CheckFinished {
        name: String,
        verdict: Verdict,
        points: u32,
        max_points: u32,
        elapsed_ms: u64,
    },
    CheckTimedOut {
        name: String,
        limit_ms: u64,
        elapsed_ms: u64,
    },
    RunFinished {
        score: u32,
        full_score: u32,
    },
}

impl RunEvent {
    pub fn finished(name: &str, result: &GradedResult) -> Self {
        RunEvent::CheckFinished {
            name: name.to_string(),
            verdict: result.verdict,
            points: result.points,
            max_points: result.max_points,
            elapsed_ms: millis(result.elapsed),
        }
    }
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}

pub struct RunJournal {
    run_id: Uuid,
    path: PathBuf,
    file: Mutex<File>,
}

impl RunJournal {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GradeError::Config(format!("Failed to create journal directory: {}", e))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                GradeError::Config(format!("Failed to open journal {}: {}", path.display(), e))
            })?;

        let run_id = Uuid::new_v4();
        debug!("journal {} opened for run {}", path.display(), run_id);
        Ok(Self {
            run_id,
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event. Write failures are logged, never propagated.
    pub fn record(&self, event: RunEvent) {
        let entry = JournalEntry {
            run_id: self.run_id,
            timestamp: Utc::now(),
            event,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode journal entry: {}", e);
                return;
            }
        };

        if let Ok(mut file) = self.file.lock() {
            if let Err(e) = writeln!(file, "{}", line) {
                error!("Failed to write to journal {}: {}", self.path.display(), e);
            }
            if let Err(e) = file.flush() {
                error!("Failed to flush journal {}: {}", self.path.display(), e);
            }
        } else {
            error!("Failed to acquire lock on journal file");
        }
    }
}

impl std::fmt::Debug for RunJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunJournal")
            .field("run_id", &self.run_id)
            .field("path", &self.path)
            .finish()
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Parse a journal file back into entries.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    let raw = std::fs::read_to_string(path)?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                GradeError::Config(format!("invalid journal line in {}: {}", path.display(), e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_tagged_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let journal = RunJournal::open(&path).unwrap();
        assert_eq!(journal.path(), path.as_path());

        journal.record(RunEvent::RunStarted { checks: 2 });
        journal.record(RunEvent::CheckSkipped {
            name: "b".to_string(),
            verdict: Verdict::SkippedDependency,
            reason: "dependency a did not pass".to_string(),
        });

        let raw = std::fs::read_to_string(&path).unwrap();
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["event"], "run_started");
        assert_eq!(first["run_id"], journal.run_id().to_string());

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            &entries[1].event,
            RunEvent::CheckSkipped { verdict: Verdict::SkippedDependency, .. }
        ));
    }

    #[test]
    fn finished_event_from_result() {
        let result = GradedResult::zero(Verdict::Fail, 5, Some("bad".to_string()))
            .with_elapsed(Duration::from_millis(42));
        match RunEvent::finished("a", &result) {
            RunEvent::CheckFinished {
                name,
                points,
                max_points,
                elapsed_ms,
                ..
            } => {
                assert_eq!(name, "a");
                assert_eq!((points, max_points, elapsed_ms), (0, 5, 42));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
