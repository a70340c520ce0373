//! Per-task dataset directories.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<task_id>/failed.log
//! <root>/<task_id>/passed.log
//! <root>/<task_id>/diff_<n>.log
//! <root>/<task_id>/hunk_<n>_<index>_ctx.log
//! <root>/<task_id>/hunk_<n>_<index>_ans.log
//! <root>/<task_id>/.complete
//! ```
//!
//! A task directory only counts as part of the dataset once its `.complete`
//! marker exists. Writers remove the marker before touching a task and restore
//! it after the last file is in place.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::constants::pipeline::LOG_PREFIX;
use crate::constants::store::{
    ANSWER_SUFFIX, COMPLETE_MARKER, CONTEXT_SUFFIX, DIFF_PREFIX, FAILED_LOG_NAME, HUNK_PREFIX,
    PASSED_LOG_NAME,
};
use crate::data::Hunk;
use crate::errors::HunkError;
use crate::types::{FileName, LogLines, PathString, TaskId};
use crate::utils::{join_lines, split_lines};

/// Pure string-prefix substitution applied to paths before every load.
///
/// Lets a dataset generated under one filesystem root be read from another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathRemap {
    from: PathString,
    to: PathString,
}

impl PathRemap {
    /// Replace a leading `from` with `to`.
    pub fn new(from: impl Into<PathString>, to: impl Into<PathString>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Apply the substitution; paths without the prefix pass through unchanged.
    pub fn apply(&self, path: &str) -> PathString {
        match path.strip_prefix(self.from.as_str()) {
            Some(rest) => format!("{}{}", self.to, rest),
            None => path.to_string(),
        }
    }
}

/// File names of one persisted hunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkFileRef {
    /// Hunk index within its task.
    pub index: usize,
    /// Context file name.
    pub ctx: FileName,
    /// Answer file name.
    pub ans: FileName,
}

impl HunkFileRef {
    /// Names for hunk `index` at `context_window`.
    pub fn new(context_window: usize, index: usize) -> Self {
        let stem = format!("{HUNK_PREFIX}{context_window}_{index}");
        Self {
            index,
            ctx: format!("{stem}{CONTEXT_SUFFIX}"),
            ans: format!("{stem}{ANSWER_SUFFIX}"),
        }
    }
}

/// Everything needed to locate one task's hunk files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    /// Task identifier.
    pub task_id: TaskId,
    /// Task directory as recorded at generation time.
    pub path: PathString,
    /// Context window the hunk files belong to.
    pub context_window: usize,
    /// Hunk files in index order.
    pub hunks: Vec<HunkFileRef>,
}

/// File-backed store of per-task hunk artifacts.
#[derive(Clone, Debug)]
pub struct RecordStore {
    root: PathBuf,
    context_window: usize,
    remap: Option<PathRemap>,
}

impl RecordStore {
    /// Store rooted at `root`; `load` resolves hunks for `context_window`.
    pub fn new(root: impl Into<PathBuf>, context_window: usize) -> Self {
        Self {
            root: root.into(),
            context_window,
            remap: None,
        }
    }

    /// Apply `remap` to every path before loading.
    pub fn with_remap(mut self, remap: PathRemap) -> Self {
        self.remap = Some(remap);
        self
    }

    /// Store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Context window used by [`RecordStore::load`].
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Directory holding one task's files.
    ///
    /// Fails with [`HunkError::Configuration`] when `task_id` is not a single
    /// plain path component.
    pub fn task_dir(&self, task_id: &str) -> Result<PathBuf, HunkError> {
        validate_task_id(task_id)?;
        Ok(self.root.join(task_id))
    }

    /// Mark a task as fully written so [`RecordStore::discover`] lists it.
    pub fn mark_complete(&self, task_id: &str) -> Result<(), HunkError> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(COMPLETE_MARKER), "")?;
        Ok(())
    }

    /// Withdraw a task from discovery, keeping its files.
    pub fn clear_complete(&self, task_id: &str) -> Result<(), HunkError> {
        let marker = self.task_dir(task_id)?.join(COMPLETE_MARKER);
        match fs::remove_file(&marker) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// True once [`RecordStore::mark_complete`] ran for `task_id`.
    pub fn is_complete(&self, task_id: &str) -> Result<bool, HunkError> {
        Ok(self.task_dir(task_id)?.join(COMPLETE_MARKER).is_file())
    }

    /// Write a hunk's context and answer files.
    pub fn persist(&self, task_id: &str, hunk: &Hunk) -> Result<(), HunkError> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        let names = HunkFileRef::new(hunk.context_window, hunk.index);
        fs::write(dir.join(&names.ctx), join_lines(&hunk.context_lines))?;
        fs::write(dir.join(&names.ans), join_lines(&hunk.answer_lines))?;
        Ok(())
    }

    /// Write the cleaned copies of both logs.
    pub fn persist_logs(
        &self,
        task_id: &str,
        failed: &LogLines,
        passed: &LogLines,
    ) -> Result<(), HunkError> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(FAILED_LOG_NAME), join_lines(failed))?;
        fs::write(dir.join(PASSED_LOG_NAME), join_lines(passed))?;
        Ok(())
    }

    /// Write the rendered unified diff for one context window.
    pub fn persist_diff(
        &self,
        task_id: &str,
        context_window: usize,
        rendered: &str,
    ) -> Result<(), HunkError> {
        let dir = self.task_dir(task_id)?;
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(diff_file_name(context_window)), rendered)?;
        Ok(())
    }

    /// Remove hunk files of one context window left by an earlier run.
    pub fn clear_window(&self, task_id: &str, context_window: usize) -> Result<(), HunkError> {
        let dir = self.task_dir(task_id)?;
        if !dir.is_dir() {
            return Ok(());
        }
        let prefix = format!("{HUNK_PREFIX}{context_window}_");
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Load hunk `hunk_index` of `task_id` at the store's context window.
    pub fn load(&self, task_id: &str, hunk_index: usize) -> Result<Hunk, HunkError> {
        self.load_window(task_id, self.context_window, hunk_index)
    }

    /// Load a hunk at an explicit context window.
    pub fn load_window(
        &self,
        task_id: &str,
        context_window: usize,
        hunk_index: usize,
    ) -> Result<Hunk, HunkError> {
        let dir = self.task_dir(task_id)?;
        let names = HunkFileRef::new(context_window, hunk_index);
        Ok(Hunk {
            task_id: task_id.to_string(),
            context_window,
            index: hunk_index,
            context_lines: self.read_lines(&dir.join(&names.ctx))?,
            answer_lines: self.read_lines(&dir.join(&names.ans))?,
        })
    }

    /// Load every hunk a manifest entry points at.
    pub fn load_ref(&self, task: &TaskRef) -> Result<Vec<Hunk>, HunkError> {
        let dir = PathBuf::from(&task.path);
        task.hunks
            .iter()
            .map(|file| {
                Ok(Hunk {
                    task_id: task.task_id.clone(),
                    context_window: task.context_window,
                    index: file.index,
                    context_lines: self.read_lines(&dir.join(&file.ctx))?,
                    answer_lines: self.read_lines(&dir.join(&file.ans))?,
                })
            })
            .collect()
    }

    /// List completed tasks with hunk files at `context_window`, sorted by task id.
    pub fn discover(&self, context_window: usize) -> Result<Vec<TaskRef>, HunkError> {
        if !self.root.is_dir() {
            return Err(HunkError::NotFound {
                path: self.root.clone(),
            });
        }
        let mut tasks = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
        {
            let task_id = entry.file_name().to_string_lossy().to_string();
            if !entry.path().join(COMPLETE_MARKER).is_file() {
                debug!(task_id = %task_id, "{LOG_PREFIX} incomplete task, skipping");
                continue;
            }
            let indices = hunk_indices(entry.path(), context_window)?;
            if indices.is_empty() {
                debug!(task_id = %task_id, "{LOG_PREFIX} no hunk files, skipping");
                continue;
            }
            tasks.push(TaskRef {
                task_id,
                path: entry.path().to_string_lossy().to_string(),
                context_window,
                hunks: indices
                    .into_iter()
                    .map(|index| HunkFileRef::new(context_window, index))
                    .collect(),
            });
        }
        Ok(tasks)
    }

    fn read_lines(&self, path: &Path) -> Result<LogLines, HunkError> {
        let resolved = match &self.remap {
            Some(remap) => PathBuf::from(remap.apply(&path.to_string_lossy())),
            None => path.to_path_buf(),
        };
        match fs::read_to_string(&resolved) {
            Ok(text) => Ok(split_lines(&text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(HunkError::NotFound { path: resolved })
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Name of the rendered diff file for `context_window`.
pub fn diff_file_name(context_window: usize) -> FileName {
    format!("{DIFF_PREFIX}{context_window}.log")
}

/// Reject ids that would not name exactly one directory under the store root.
pub fn validate_task_id(task_id: &str) -> Result<(), HunkError> {
    let mut components = Path::new(task_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if task_id.is_empty() || task_id.contains(['/', '\\']) || !single_normal {
        return Err(HunkError::Configuration(format!(
            "invalid task id {task_id:?}: expected a single path component"
        )));
    }
    Ok(())
}

/// Sorted indices of hunks with both files present in `dir`.
fn hunk_indices(dir: &Path, context_window: usize) -> Result<Vec<usize>, HunkError> {
    let prefix = format!("{HUNK_PREFIX}{context_window}_");
    let mut indices = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        let Some(index) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(CONTEXT_SUFFIX))
            .and_then(|index| index.parse::<usize>().ok())
        else {
            continue;
        };
        if dir.join(HunkFileRef::new(context_window, index).ans).is_file() {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices)
}
