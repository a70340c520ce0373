//! Batch extraction: clean, diff, segment and select per task, then hand the
//! results to sinks.

use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::constants::pipeline::LOG_PREFIX;
use crate::constants::store::{FAILED_LOG_NAME, PASSED_LOG_NAME};
use crate::data::{Hunk, Task};
use crate::diff::{EditScript, edit_script, render_unified};
use crate::errors::{HunkError, LogSide};
use crate::metrics::{BatchReport, TaskStatus};
use crate::noise::NoiseFilter;
use crate::segment::HunkSegmenter;
use crate::sink::TaskSink;
use crate::source::LogSource;
use crate::types::{LogLines, TaskId};

/// Extraction result of one task for one context window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowOutput {
    /// Context window the diff was rendered with.
    pub context_window: usize,
    /// Rendered unified diff; empty when the logs are identical.
    pub diff_text: String,
    /// Selected hunks, renumbered from 0 in diff order.
    pub hunks: Vec<Hunk>,
}

/// Everything one task produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskOutput {
    /// The task processed.
    pub task: Task,
    /// Cleaned failed-run log.
    pub failed: LogLines,
    /// Cleaned passed-run log.
    pub passed: LogLines,
    /// One entry per configured context window, ascending.
    pub windows: Vec<WindowOutput>,
}

impl TaskOutput {
    /// Output for `context_window`, if it was configured.
    pub fn window(&self, context_window: usize) -> Option<&WindowOutput> {
        self.windows
            .iter()
            .find(|window| window.context_window == context_window)
    }

    /// Hunks across every window.
    pub fn hunk_count(&self) -> usize {
        self.windows.iter().map(|window| window.hunks.len()).sum()
    }

    /// Answer lines across every hunk of every window.
    pub fn answer_line_count(&self) -> usize {
        self.windows
            .iter()
            .flat_map(|window| &window.hunks)
            .map(|hunk| hunk.answer_lines.len())
            .sum()
    }
}

/// Per-task extraction driver.
#[derive(Clone, Debug)]
pub struct Extractor {
    config: PipelineConfig,
    filter: NoiseFilter,
    segmenter: HunkSegmenter,
}

impl Extractor {
    /// Build an extractor from a validated configuration.
    pub fn new(config: PipelineConfig, filter: NoiseFilter) -> Result<Self, HunkError> {
        let config = config.validated()?;
        let segmenter = HunkSegmenter::new(config.content);
        Ok(Self {
            config,
            filter,
            segmenter,
        })
    }

    /// Extractor with default settings and the built-in noise patterns.
    pub fn with_defaults() -> Result<Self, HunkError> {
        Self::new(PipelineConfig::default(), NoiseFilter::builtin()?)
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Noise filter applied to raw logs.
    pub fn filter(&self) -> &NoiseFilter {
        &self.filter
    }

    /// Fetch and clean both logs of `task`.
    pub fn fetch(
        &self,
        task: &Task,
        source: &dyn LogSource,
    ) -> Result<(LogLines, LogLines), HunkError> {
        let failed = fetch_side(task, LogSide::Failed, &task.failed_log_id, source)?;
        let passed = fetch_side(task, LogSide::Passed, &task.passed_log_id, source)?;
        let failed = self.filter.clean(&failed);
        let passed = self.filter.clean(&passed);
        if failed.is_empty() && passed.is_empty() {
            return Err(HunkError::EmptyInput {
                task_id: task.id.clone(),
            });
        }
        Ok((failed, passed))
    }

    /// Diff cleaned logs and derive the selected hunks for every window.
    pub fn extract(
        &self,
        task_id: &TaskId,
        failed: &LogLines,
        passed: &LogLines,
    ) -> Result<Vec<WindowOutput>, HunkError> {
        let script = guarded_edit_script(task_id, failed, passed)?;
        Ok(self
            .config
            .context_windows
            .iter()
            .map(|&window| self.window_output(task_id, &script, window))
            .collect())
    }

    /// Run the full per-task pipeline without writing anything.
    pub fn process_task(
        &self,
        task: &Task,
        source: &dyn LogSource,
    ) -> Result<TaskOutput, HunkError> {
        let (failed, passed) = self.fetch(task, source)?;
        let windows = self.extract(&task.id, &failed, &passed)?;
        Ok(TaskOutput {
            task: task.clone(),
            failed,
            passed,
            windows,
        })
    }

    /// Process `tasks` and hand successful outputs to `sinks` in task order.
    ///
    /// Compute runs in parallel one chunk at a time; writes happen on the
    /// calling thread after a chunk completes. Per-task errors are counted and
    /// never abort the batch.
    pub fn run(
        &self,
        tasks: &[Task],
        source: &dyn LogSource,
        sinks: &mut [&mut dyn TaskSink],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        info!(
            tasks = tasks.len(),
            windows = ?self.config.context_windows,
            "{LOG_PREFIX} extraction started"
        );
        for chunk in tasks.chunks(self.config.chunk_size) {
            let results: Vec<Result<TaskOutput, HunkError>> = chunk
                .par_iter()
                .map(|task| self.process_task(task, source))
                .collect();
            for (task, result) in chunk.iter().zip(results) {
                let status = self.settle(task, result, sinks, &mut report);
                report.record(status);
            }
            debug!(done = report.tasks, "{LOG_PREFIX} chunk written");
        }
        info!(
            success = report.success,
            fail = report.fail,
            miss = report.miss,
            hunks = report.hunks,
            "{LOG_PREFIX} extraction finished"
        );
        report
    }

    fn settle(
        &self,
        task: &Task,
        result: Result<TaskOutput, HunkError>,
        sinks: &mut [&mut dyn TaskSink],
        report: &mut BatchReport,
    ) -> TaskStatus {
        let output = match result {
            Ok(output) => output,
            Err(err) if err.is_miss() => {
                info!(task_id = %task.id, "{LOG_PREFIX} miss: {err}");
                return TaskStatus::Miss;
            }
            Err(err) => {
                warn!(task_id = %task.id, "{LOG_PREFIX} failed: {err}");
                return TaskStatus::Fail;
            }
        };
        if output.hunk_count() == 0 {
            info!(task_id = %task.id, "{LOG_PREFIX} miss: no hunks extracted");
            return TaskStatus::Miss;
        }
        let delivered = sinks
            .iter_mut()
            .try_for_each(|sink| sink.write_task(&output))
            .and_then(|()| sinks.iter_mut().try_for_each(|sink| sink.commit_task(&output)));
        if let Err(err) = delivered {
            warn!(task_id = %task.id, "{LOG_PREFIX} write failed: {err}");
            for sink in sinks.iter_mut() {
                if let Err(abort_err) = sink.abort_task(&output) {
                    warn!(task_id = %task.id, "{LOG_PREFIX} abort failed: {abort_err}");
                }
            }
            return TaskStatus::Fail;
        }
        report.record_hunks(output.hunk_count(), output.answer_line_count());
        TaskStatus::Success
    }

    fn window_output(&self, task_id: &TaskId, script: &EditScript, window: usize) -> WindowOutput {
        let diff_hunks = script.hunks(window);
        let diff_text = render_unified(&diff_hunks, FAILED_LOG_NAME, PASSED_LOG_NAME);
        let hunks = self.segmenter.segment(task_id, window, &diff_hunks);
        let hunks = self.config.empty_answers.apply(hunks);
        let mut hunks = self.config.selection.apply(hunks);
        for (index, hunk) in hunks.iter_mut().enumerate() {
            hunk.index = index;
        }
        WindowOutput {
            context_window: window,
            diff_text,
            hunks,
        }
    }
}

fn fetch_side(
    task: &Task,
    side: LogSide,
    job_id: &str,
    source: &dyn LogSource,
) -> Result<String, HunkError> {
    match source.get_log(job_id) {
        Ok(Some(text)) => Ok(text),
        Ok(None) => Err(missing(task, side, job_id)),
        Err(err) => {
            debug!(task_id = %task.id, %side, "{LOG_PREFIX} log source error: {err}");
            Err(missing(task, side, job_id))
        }
    }
}

fn missing(task: &Task, side: LogSide, job_id: &str) -> HunkError {
    HunkError::MissingLog {
        task_id: task.id.clone(),
        side,
        job_id: job_id.to_string(),
    }
}

fn guarded_edit_script(
    task_id: &TaskId,
    failed: &LogLines,
    passed: &LogLines,
) -> Result<EditScript, HunkError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| edit_script(failed, passed)));
    match outcome {
        Ok(Ok(script)) => Ok(script),
        Ok(Err(HunkError::DiffComputation { details, .. })) => Err(HunkError::DiffComputation {
            task_id: task_id.clone(),
            details,
        }),
        Ok(Err(other)) => Err(other),
        Err(_) => Err(HunkError::DiffComputation {
            task_id: task_id.clone(),
            details: "diff panicked".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmptyAnswerPolicy, HunkSelection};
    use crate::source::InMemoryLogSource;
    use crate::store::RecordStore;
    use tempfile::tempdir;

    struct FailingSink;

    impl TaskSink for FailingSink {
        fn write_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
            Err(HunkError::Configuration("sink closed".to_string()))
        }
    }

    #[derive(Default)]
    struct CollectSink(Vec<TaskId>);

    impl TaskSink for CollectSink {
        fn write_task(&mut self, output: &TaskOutput) -> Result<(), HunkError> {
            self.0.push(output.task.id.clone());
            Ok(())
        }
    }

    fn extractor(config: PipelineConfig) -> Extractor {
        Extractor::new(config, NoiseFilter::builtin().unwrap()).unwrap()
    }

    #[test]
    fn extracts_single_error_line_with_context() {
        let source = InMemoryLogSource::new([("1", "a\nb\nERROR: x\nc"), ("2", "a\nb\nc")]);
        let task = Task::new("t", "1", "2");
        let output = extractor(PipelineConfig::default().with_context_windows(vec![1]))
            .process_task(&task, &source)
            .unwrap();
        let window = output.window(1).unwrap();
        assert_eq!(window.hunks.len(), 1);
        assert_eq!(window.hunks[0].context_lines, vec!["b", "ERROR: x", "c"]);
        assert_eq!(window.hunks[0].answer_lines, vec!["ERROR: x"]);
        assert!(window.diff_text.starts_with("--- failed.log\n+++ passed.log\n"));
    }

    #[test]
    fn timestamps_are_stripped_before_diffing() {
        let source = InMemoryLogSource::new([
            ("1", "2024-11-17T02:09:45.1234567Z start\n2024-11-17T02:09:46Z boom"),
            ("2", "2024-11-18T10:00:00.0000001Z start"),
        ]);
        let output = extractor(PipelineConfig::default())
            .process_task(&Task::new("t", "1", "2"), &source)
            .unwrap();
        assert_eq!(output.failed, vec!["start", "boom"]);
        assert_eq!(output.windows[0].hunks[0].answer_lines, vec!["boom"]);
    }

    #[test]
    fn missing_and_empty_logs_are_misses() {
        let source = InMemoryLogSource::new([("1", "x"), ("3", "45% (3/10)\n"), ("4", "   ")]);
        let ex = extractor(PipelineConfig::default());
        let err = ex.process_task(&Task::new("t", "1", "2"), &source).unwrap_err();
        assert!(matches!(
            &err,
            HunkError::MissingLog { side: LogSide::Passed, job_id, .. } if job_id == "2"
        ));
        assert!(err.is_miss());

        let err = ex.process_task(&Task::new("e", "3", "4"), &source).unwrap_err();
        assert!(matches!(err, HunkError::EmptyInput { .. }));
    }

    #[test]
    fn selection_keeps_trailing_hunks_renumbered() {
        let failed: Vec<String> = (0..30)
            .map(|i| if i % 10 == 5 { format!("err {i}") } else { format!("line {i}") })
            .collect();
        let passed: Vec<String> = (0..30)
            .filter(|i| i % 10 != 5)
            .map(|i| format!("line {i}"))
            .collect();
        let ex = extractor(
            PipelineConfig::default()
                .with_context_windows(vec![0])
                .with_selection(HunkSelection::LastK(2)),
        );
        let windows = ex.extract(&"t".to_string(), &failed, &passed).unwrap();
        let hunks = &windows[0].hunks;
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].index, 0);
        assert_eq!(hunks[1].index, 1);
        assert_eq!(hunks[0].answer_lines, vec!["err 15"]);
        assert_eq!(hunks[1].answer_lines, vec!["err 25"]);
    }

    #[test]
    fn drop_policy_removes_pure_insertions() {
        let failed = vec!["a".to_string(), "b".to_string()];
        let passed = vec!["a".to_string(), "new".to_string(), "b".to_string()];
        let keep = extractor(PipelineConfig::default().with_context_windows(vec![1]));
        let windows = keep.extract(&"t".to_string(), &failed, &passed).unwrap();
        assert_eq!(windows[0].hunks.len(), 1);
        assert!(windows[0].hunks[0].is_pure_context());

        let drop = extractor(
            PipelineConfig::default()
                .with_context_windows(vec![1])
                .with_empty_answers(EmptyAnswerPolicy::Drop),
        );
        let windows = drop.extract(&"t".to_string(), &failed, &passed).unwrap();
        assert!(windows[0].hunks.is_empty());
    }

    #[test]
    fn run_counts_outcomes_and_writes_successes_in_order() {
        let source = InMemoryLogSource::new([
            ("1", "a\nboom"),
            ("2", "a"),
            ("3", "same"),
            ("4", "same"),
            ("5", "z\nbang"),
            ("6", "z"),
        ]);
        let tasks = vec![
            Task::new("ok-1", "1", "2"),
            Task::new("identical", "3", "4"),
            Task::new("missing", "1", "404"),
            Task::new("ok-2", "5", "6"),
        ];
        let mut collected = CollectSink::default();
        let report = extractor(PipelineConfig::default().with_chunk_size(3)).run(
            &tasks,
            &source,
            &mut [&mut collected],
        );
        assert_eq!(report.to_string(), "Success: 2, Fail: 0, Miss: 2");
        assert_eq!(report.hunks, 2);
        assert_eq!(report.answer_lines, 2);
        assert_eq!(collected.0, vec!["ok-1", "ok-2"]);
    }

    #[test]
    fn sink_errors_count_as_failures() {
        let source = InMemoryLogSource::new([("1", "a\nboom"), ("2", "a")]);
        let mut failing = FailingSink;
        let report = extractor(PipelineConfig::default()).run(
            &[Task::new("t", "1", "2")],
            &source,
            &mut [&mut failing],
        );
        assert_eq!(report.fail, 1);
        assert_eq!(report.hunks, 0);
    }

    #[test]
    fn a_later_sink_failure_leaves_no_discoverable_task() {
        let dir = tempdir().unwrap();
        let source = InMemoryLogSource::new([("1", "a\nboom"), ("2", "a")]);
        let mut store = RecordStore::new(dir.path(), 20);
        let mut failing = FailingSink;
        let report = {
            let sinks: &mut [&mut dyn TaskSink] = &mut [&mut store, &mut failing];
            extractor(PipelineConfig::default()).run(&[Task::new("t", "1", "2")], &source, sinks)
        };
        assert_eq!(report.to_string(), "Success: 0, Fail: 1, Miss: 0");
        assert!(!store.is_complete("t").unwrap());
        assert!(store.discover(20).unwrap().is_empty());
    }

    #[test]
    fn persisted_hunk_names_follow_the_emitted_order() {
        let dir = tempdir().unwrap();
        let failed: String = (0..30)
            .map(|i| if i % 10 == 5 { format!("err {i}\n") } else { format!("line {i}\n") })
            .collect();
        let passed: String = (0..30)
            .filter(|i| i % 10 != 5)
            .map(|i| format!("line {i}\n"))
            .collect();
        let source = InMemoryLogSource::new([("1", failed.as_str()), ("2", passed.as_str())]);
        let mut store = RecordStore::new(dir.path(), 0);
        let report = extractor(
            PipelineConfig::default()
                .with_context_windows(vec![0])
                .with_selection(HunkSelection::LastK(2)),
        )
        .run(&[Task::new("t", "1", "2")], &source, &mut [&mut store]);
        assert_eq!(report.hunks, 2);

        let refs = store.discover(0).unwrap();
        let indices: Vec<usize> = refs[0].hunks.iter().map(|file| file.index).collect();
        assert_eq!(indices, vec![0, 1]);
        for index in indices {
            assert_eq!(store.load("t", index).unwrap().index, index);
        }
        assert_eq!(store.load("t", 1).unwrap().answer_lines, vec!["err 25"]);
    }
}
