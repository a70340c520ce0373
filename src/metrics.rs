use std::fmt;

use serde::Serialize;

/// Outcome class of one task at the batch boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// At least one hunk was extracted.
    Success,
    /// Diffing or persistence failed.
    Fail,
    /// A log was missing or nothing was left to diff.
    Miss,
}

/// Counters accumulated over one extraction run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Tasks visited.
    pub tasks: usize,
    /// Tasks that produced hunks.
    pub success: usize,
    /// Tasks that failed.
    pub fail: usize,
    /// Tasks skipped for missing or empty logs.
    pub miss: usize,
    /// Hunks emitted across all windows.
    pub hunks: usize,
    /// Answer lines emitted across all hunks.
    pub answer_lines: usize,
}

impl BatchReport {
    /// Count one task outcome.
    pub fn record(&mut self, status: TaskStatus) {
        self.tasks += 1;
        match status {
            TaskStatus::Success => self.success += 1,
            TaskStatus::Fail => self.fail += 1,
            TaskStatus::Miss => self.miss += 1,
        }
    }

    /// Add emitted hunk totals for a successful task.
    pub fn record_hunks(&mut self, hunks: usize, answer_lines: usize) {
        self.hunks += hunks;
        self.answer_lines += answer_lines;
    }

    /// Fraction of visited tasks that succeeded; `0.0` for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.tasks == 0 {
            return 0.0;
        }
        self.success as f64 / self.tasks as f64
    }

    /// Merge counters from another report.
    pub fn merge(&mut self, other: &BatchReport) {
        self.tasks += other.tasks;
        self.success += other.success;
        self.fail += other.fail;
        self.miss += other.miss;
        self.hunks += other.hunks;
        self.answer_lines += other.answer_lines;
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success: {}, Fail: {}, Miss: {}",
            self.success, self.fail, self.miss
        )
    }
}
