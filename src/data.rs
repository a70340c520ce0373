use serde::{Deserialize, Serialize};

pub use crate::types::{JobId, LogLine, LogLines, TaskId};

/// One failed/passed build pair under a project identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    /// Stable project/image identifier, unique across the task list.
    pub id: TaskId,
    /// Job whose log is the failing run.
    pub failed_log_id: JobId,
    /// Job whose log is the passing run.
    pub passed_log_id: JobId,
}

impl Task {
    /// Build a task from its three identifiers.
    pub fn new(
        id: impl Into<TaskId>,
        failed_log_id: impl Into<JobId>,
        passed_log_id: impl Into<JobId>,
    ) -> Self {
        Self {
            id: id.into(),
            failed_log_id: failed_log_id.into(),
            passed_log_id: passed_log_id.into(),
        }
    }
}

/// One contiguous diff region for a task and context window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Owning task.
    pub task_id: TaskId,
    /// Number of unchanged lines kept around each change.
    pub context_window: usize,
    /// 0-based position among the hunks emitted for this task and context
    /// window, in document order.
    ///
    /// Counted after the empty-answer policy and hunk selection ran, so it is
    /// contiguous from 0 and matches the `hunk_<n>_<index>` file names. It is
    /// not the hunk's position in the full diff.
    pub index: usize,
    /// Kept and deleted lines in order; deletions carry no marker.
    pub context_lines: LogLines,
    /// Deleted lines only: content unique to the failed run.
    pub answer_lines: LogLines,
}

impl Hunk {
    /// True when the hunk has no deleted line.
    pub fn is_pure_context(&self) -> bool {
        self.answer_lines.is_empty()
    }

    /// Convert into the atomic training example.
    pub fn into_record(self) -> DatasetRecord {
        DatasetRecord {
            task_id: self.task_id,
            hunk_index: self.index,
            context_lines: self.context_lines,
            answer_lines: self.answer_lines,
        }
    }
}

/// Atomic training example.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Owning task.
    pub task_id: TaskId,
    /// Index of the source hunk.
    pub hunk_index: usize,
    /// Model input lines.
    pub context_lines: LogLines,
    /// Target lines.
    pub answer_lines: LogLines,
}
