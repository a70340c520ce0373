//! Task metadata: build-pair artifacts to an ordered task table.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::data::Task;
use crate::errors::HunkError;
use crate::store::validate_task_id;
use crate::types::{JobId, TaskId};

/// Insertion-ordered table of tasks keyed by id.
///
/// Re-inserting an id updates its log references in place and keeps the
/// position of the first insertion.
#[derive(Clone, Debug, Default)]
pub struct TaskTable {
    tasks: IndexMap<TaskId, Task>,
}

impl TaskTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task or update the existing entry with the same id.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.get_mut(&task.id) {
            Some(existing) => {
                existing.failed_log_id = task.failed_log_id;
                existing.passed_log_id = task.passed_log_id;
            }
            None => {
                self.tasks.insert(task.id.clone(), task);
            }
        }
    }

    /// Number of distinct tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no task was accumulated.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Lookup by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Tasks in first-insertion order.
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks.into_values().collect()
    }
}

impl FromIterator<Task> for TaskTable {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut table = TaskTable::new();
        for task in iter {
            table.upsert(task);
        }
        table
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactJob {
    job_id: Value,
}

/// The subset of a build-pair artifact entry the pipeline reads.
#[derive(Debug, Deserialize)]
struct Artifact {
    image_tag: String,
    failed_job: ArtifactJob,
    passed_job: ArtifactJob,
}

fn job_id(value: &Value, image_tag: &str) -> Result<JobId, HunkError> {
    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(HunkError::Configuration(format!(
            "artifact '{image_tag}' has unsupported job id {other}"
        ))),
    }
}

/// Parse a JSON array of build-pair artifacts into a task table.
///
/// Every `image_tag` becomes a directory name, so tags that are not a single
/// plain path component are rejected.
pub fn parse_artifacts(json: &str) -> Result<TaskTable, HunkError> {
    let artifacts: Vec<Artifact> = serde_json::from_str(json)?;
    let mut table = TaskTable::new();
    for artifact in artifacts {
        validate_task_id(&artifact.image_tag)?;
        let failed = job_id(&artifact.failed_job.job_id, &artifact.image_tag)?;
        let passed = job_id(&artifact.passed_job.job_id, &artifact.image_tag)?;
        table.upsert(Task::new(artifact.image_tag, failed, passed));
    }
    Ok(table)
}

/// Load artifacts from a JSON file.
pub fn load_artifacts(path: impl AsRef<Path>) -> Result<TaskTable, HunkError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_artifacts(&text)
}
