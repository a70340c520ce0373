use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{JobId, TaskId};

/// Which side of a build pair a log belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSide {
    /// The failing run (diff side A).
    Failed,
    /// The passing run (diff side B).
    Passed,
}

impl std::fmt::Display for LogSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSide::Failed => f.write_str("failed"),
            LogSide::Passed => f.write_str("passed"),
        }
    }
}

/// Error type for log retrieval, diffing, persistence, and configuration failures.
#[derive(Debug, Error)]
pub enum HunkError {
    /// A log of the pair could not be retrieved.
    #[error("task '{task_id}' is missing its {side} log (job {job_id})")]
    MissingLog {
        /// Task the log belongs to.
        task_id: TaskId,
        /// Which side is missing.
        side: LogSide,
        /// Job id that was requested.
        job_id: JobId,
    },
    /// Both logs cleaned down to nothing.
    #[error("task '{task_id}' has no content left after cleaning")]
    EmptyInput {
        /// Task whose logs were empty.
        task_id: TaskId,
    },
    /// The diff engine could not produce a script.
    #[error("diff computation failed for task '{task_id}': {details}")]
    DiffComputation {
        /// Task being diffed.
        task_id: TaskId,
        /// Failure description.
        details: String,
    },
    /// A persisted record or manifest is absent.
    #[error("record not found at {}", path.display())]
    NotFound {
        /// Path that was resolved after remapping.
        path: PathBuf,
    },
    /// Invalid configuration or input metadata.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON encode/decode failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HunkError {
    /// True for errors that count as a "miss" rather than a "fail" at the task boundary.
    ///
    /// Missing logs and logs that clean down to nothing both produce zero
    /// hunks without anything having gone wrong.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            HunkError::MissingLog { .. } | HunkError::EmptyInput { .. }
        )
    }
}
