use std::fs;

use serde_json::Value;
use tempfile::tempdir;

use loghunks::config::{ContentPolicy, HunkSelection, PipelineConfig, SplitConfig};
use loghunks::data::Task;
use loghunks::HunkError;
use loghunks::noise::NoiseFilter;
use loghunks::pipeline::{Extractor, TaskOutput};
use loghunks::sink::{JsonlFormat, JsonlSink, TaskSink};
use loghunks::splits::SplitManifest;
use loghunks::source::{FileLogSource, InMemoryLogSource};
use loghunks::store::RecordStore;

struct RejectingSink;

impl TaskSink for RejectingSink {
    fn write_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        Ok(())
    }

    fn commit_task(&mut self, _output: &TaskOutput) -> Result<(), HunkError> {
        Err(HunkError::Configuration("disk full".to_string()))
    }
}

fn extractor(config: PipelineConfig) -> Extractor {
    Extractor::new(config, NoiseFilter::builtin().unwrap()).unwrap()
}

#[test]
fn single_error_line_becomes_one_hunk() {
    let source = InMemoryLogSource::new([("f", "a\nb\nERROR: x\nc"), ("p", "a\nb\nc")]);
    let output = extractor(PipelineConfig::default().with_context_windows(vec![1]))
        .process_task(&Task::new("proj", "f", "p"), &source)
        .unwrap();
    let hunks = &output.window(1).unwrap().hunks;
    assert_eq!(hunks.len(), 1);
    assert_eq!(hunks[0].context_lines, vec!["b", "ERROR: x", "c"]);
    assert_eq!(hunks[0].answer_lines, vec!["ERROR: x"]);
}

#[test]
fn noisy_lines_never_reach_the_diff() {
    let failed = "\
2024-11-17T02:09:45.1234567Z Compiling foo
Receiving objects: 45% (3/10)
[INFO] Downloading from central: https://repo/a.pom
2024-11-17T02:09:47.0000001Z error[E0308]: mismatched types
2024-11-17T02:09:48.0000001Z Finished";
    let passed = "\
2024-11-18T11:00:00.0000001Z Compiling foo
Receiving objects: 100% (10/10)
2024-11-18T11:00:03.0000001Z Finished";
    let source = InMemoryLogSource::new([("f", failed), ("p", passed)]);
    let output = extractor(PipelineConfig::default().with_context_windows(vec![0]))
        .process_task(&Task::new("proj", "f", "p"), &source)
        .unwrap();
    assert_eq!(
        output.failed,
        vec!["Compiling foo", "error[E0308]: mismatched types", "Finished"]
    );
    let hunks = &output.windows[0].hunks;
    assert_eq!(hunks.len(), 1);
    assert_eq!(hunks[0].context_lines, vec!["error[E0308]: mismatched types"]);
}

#[test]
fn include_insertions_marks_passed_lines_but_answers_stay_deletions() {
    let source = InMemoryLogSource::new([("f", "a\nboom\nz"), ("p", "a\nfixed\nz")]);
    let output = extractor(
        PipelineConfig::default()
            .with_context_windows(vec![1])
            .with_content_policy(ContentPolicy::IncludeInsertions),
    )
    .process_task(&Task::new("proj", "f", "p"), &source)
    .unwrap();
    let hunk = &output.windows[0].hunks[0];
    assert_eq!(hunk.context_lines, vec!["a", "boom", "+fixed", "z"]);
    assert_eq!(hunk.answer_lines, vec!["boom"]);
}

#[test]
fn batch_over_files_writes_layout_jsonl_and_counts() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("11.log"), "setup\nFAILED test_a\nteardown\n").unwrap();
    fs::write(logs.join("12.log"), "setup\nteardown\n").unwrap();
    fs::write(logs.join("31.log"), "same\n").unwrap();
    fs::write(logs.join("32.log"), "same\n").unwrap();
    fs::write(logs.join("42.log"), "only passed\n").unwrap();

    let tasks = vec![
        Task::new("proj-1", "11", "12"),
        Task::new("proj-2", "21", "22"),
        Task::new("proj-3", "31", "32"),
        Task::new("proj-4", "41", "42"),
    ];
    let out = dir.path().join("data");
    let jsonl_path = dir.path().join("data.jsonl");
    let mut store = RecordStore::new(&out, 4);
    let mut jsonl = JsonlSink::append(&jsonl_path, JsonlFormat::ContextHunk, 4).unwrap();
    let mut text = JsonlSink::new(Vec::new(), JsonlFormat::Text, 0);

    let ex = extractor(
        PipelineConfig::default()
            .with_context_windows(vec![4, 0])
            .with_selection(HunkSelection::All),
    );
    let report = {
        let sinks: &mut [&mut dyn TaskSink] = &mut [&mut store, &mut jsonl, &mut text];
        ex.run(&tasks, &FileLogSource::new(&logs), sinks)
    };
    assert_eq!(report.to_string(), "Success: 1, Fail: 0, Miss: 3");
    assert_eq!(report.tasks, 4);
    // one hunk per window
    assert_eq!(report.hunks, 2);

    let task_dir = out.join("proj-1");
    assert_eq!(
        fs::read_to_string(task_dir.join("failed.log")).unwrap(),
        "setup\nFAILED test_a\nteardown\n"
    );
    assert_eq!(
        fs::read_to_string(task_dir.join("diff_0.log")).unwrap(),
        "--- failed.log\n+++ passed.log\n@@ -2 +1,0 @@\n-FAILED test_a\n"
    );
    assert_eq!(
        fs::read_to_string(task_dir.join("hunk_4_0_ans.log")).unwrap(),
        "FAILED test_a\n"
    );
    assert_eq!(store.load("proj-1", 0).unwrap().context_lines.len(), 3);
    assert!(!out.join("proj-2").exists());
    assert!(!out.join("proj-3").exists());

    let lines: Vec<Value> = fs::read_to_string(&jsonl_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], "proj-1");
    assert_eq!(lines[0]["context"], "setup\nFAILED test_a\nteardown");
    assert_eq!(lines[0]["hunk"], "FAILED test_a");

    let text = String::from_utf8(text.into_inner()).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("\"id\":\"proj-1\""));
}

#[test]
fn rerun_replaces_stale_hunk_files() {
    let dir = tempdir().unwrap();
    let mut store = RecordStore::new(dir.path(), 0);
    let ex = extractor(
        PipelineConfig::default()
            .with_context_windows(vec![0])
            .with_selection(HunkSelection::All),
    );
    let task = Task::new("proj", "f", "p");

    let wide = InMemoryLogSource::new([("f", "x1\nk\nx2\nk2\nx3"), ("p", "k\nk2")]);
    let report = ex.run(std::slice::from_ref(&task), &wide, &mut [&mut store]);
    assert_eq!(report.hunks, 3);
    assert!(dir.path().join("proj/hunk_0_2_ctx.log").is_file());

    let narrow = InMemoryLogSource::new([("f", "x1\nk"), ("p", "k")]);
    ex.run(std::slice::from_ref(&task), &narrow, &mut [&mut store]);
    assert!(!dir.path().join("proj/hunk_0_2_ctx.log").exists());
    assert_eq!(store.discover(0).unwrap()[0].hunks.len(), 1);
}

#[test]
fn failed_delivery_keeps_the_task_out_of_the_manifest() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("data");
    let jsonl_path = dir.path().join("data.jsonl");
    let mut store = RecordStore::new(&out, 0);
    let mut jsonl = JsonlSink::append(&jsonl_path, JsonlFormat::ContextHunk, 0).unwrap();
    let mut rejecting = RejectingSink;
    let source = InMemoryLogSource::new([("f", "a\nboom\nz"), ("p", "a\nz")]);
    let ex = extractor(PipelineConfig::default().with_context_windows(vec![0]));

    let report = {
        let sinks: &mut [&mut dyn TaskSink] = &mut [&mut store, &mut jsonl, &mut rejecting];
        ex.run(&[Task::new("proj", "f", "p")], &source, sinks)
    };
    assert_eq!(report.to_string(), "Success: 0, Fail: 1, Miss: 0");
    assert_eq!(report.hunks, 0);

    assert!(out.join("proj/hunk_0_0_ans.log").is_file());
    assert!(store.discover(0).unwrap().is_empty());
    let manifest = SplitManifest::build(&store, 0, SplitConfig::default()).unwrap();
    assert!(manifest.train.is_empty() && manifest.test.is_empty());
    assert_eq!(fs::read_to_string(&jsonl_path).unwrap(), "");
}
