//! Output sinks for extracted tasks.
//!
//! The pipeline hands every successful task to each sink in task order on the
//! calling thread, so sinks need no internal synchronization.
//!
//! Delivery is two-phase: every sink stages the task with
//! [`TaskSink::write_task`], then every sink commits it. If any sink fails in
//! either phase, all sinks are asked to abort, and nothing from that task may
//! be visible as part of the dataset.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::HunkError;
use crate::pipeline::TaskOutput;
use crate::store::RecordStore;
use crate::utils::flatten_lines;

/// Receives the complete output of one successful task.
pub trait TaskSink {
    /// Stage one task. Called at most once per task per run.
    fn write_task(&mut self, output: &TaskOutput) -> Result<(), HunkError>;

    /// Publish the staged task once every sink has staged it.
    fn commit_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        Ok(())
    }

    /// Discard whatever was staged for the task.
    fn abort_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        Ok(())
    }
}

impl TaskSink for RecordStore {
    fn write_task(&mut self, output: &TaskOutput) -> Result<(), HunkError> {
        let task_id = output.task.id.as_str();
        self.clear_complete(task_id)?;
        self.persist_logs(task_id, &output.failed, &output.passed)?;
        for window in &output.windows {
            self.clear_window(task_id, window.context_window)?;
            self.persist_diff(task_id, window.context_window, &window.diff_text)?;
            for hunk in &window.hunks {
                self.persist(task_id, hunk)?;
            }
        }
        Ok(())
    }

    fn commit_task(&mut self, output: &TaskOutput) -> Result<(), HunkError> {
        self.mark_complete(&output.task.id)
    }

    fn abort_task(&mut self, output: &TaskOutput) -> Result<(), HunkError> {
        self.clear_complete(&output.task.id)
    }
}

/// Shape of the records a [`JsonlSink`] emits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JsonlFormat {
    /// One `{id, index, context, hunk}` object per hunk.
    #[default]
    ContextHunk,
    /// One `{id, text}` object per task holding the rendered diff.
    Text,
}

#[derive(Serialize)]
struct ContextHunkRecord<'a> {
    id: &'a str,
    index: usize,
    context: String,
    hunk: String,
}

#[derive(Serialize)]
struct TextRecord<'a> {
    id: &'a str,
    text: &'a str,
}

/// Flat JSON-lines sink for one context window.
///
/// Records are buffered by `write_task` and only reach the writer, flushed,
/// on `commit_task`.
pub struct JsonlSink<W: Write> {
    writer: W,
    format: JsonlFormat,
    context_window: usize,
    records: usize,
    pending: Vec<u8>,
    pending_records: usize,
}

impl JsonlSink<BufWriter<File>> {
    /// Open `path` in append mode, creating it and its parent directory.
    pub fn append(
        path: impl AsRef<Path>,
        format: JsonlFormat,
        context_window: usize,
    ) -> Result<Self, HunkError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file), format, context_window))
    }
}

impl<W: Write> JsonlSink<W> {
    /// Sink writing `format` records for `context_window` into `writer`.
    pub fn new(writer: W, format: JsonlFormat, context_window: usize) -> Self {
        Self {
            writer,
            format,
            context_window,
            records: 0,
            pending: Vec::new(),
            pending_records: 0,
        }
    }

    /// Records committed so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Context window whose hunks are exported.
    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), HunkError> {
        serde_json::to_writer(&mut self.pending, record)?;
        self.pending.push(b'\n');
        self.pending_records += 1;
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
        self.pending_records = 0;
    }
}

impl<W: Write> TaskSink for JsonlSink<W> {
    fn write_task(&mut self, output: &TaskOutput) -> Result<(), HunkError> {
        self.discard_pending();
        let Some(window) = output.window(self.context_window) else {
            return Ok(());
        };
        let id = output.task.id.as_str();
        match self.format {
            JsonlFormat::ContextHunk => {
                for hunk in &window.hunks {
                    self.write_record(&ContextHunkRecord {
                        id,
                        index: hunk.index,
                        context: flatten_lines(&hunk.context_lines),
                        hunk: flatten_lines(&hunk.answer_lines),
                    })?;
                }
            }
            JsonlFormat::Text => {
                if !window.diff_text.is_empty() {
                    let text = window.diff_text.as_str();
                    self.write_record(&TextRecord { id, text })?;
                }
            }
        }
        Ok(())
    }

    fn commit_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        let staged = std::mem::take(&mut self.pending);
        let count = std::mem::take(&mut self.pending_records);
        self.writer.write_all(&staged)?;
        self.writer.flush()?;
        self.records += count;
        Ok(())
    }

    fn abort_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        self.discard_pending();
        Ok(())
    }
}
