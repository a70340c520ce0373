#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command line runners shared by the `loghunks` binary.
pub mod apps;
/// Pipeline, split, and policy configuration types.
pub mod config;
/// Centralized constants used across noise filtering, the pipeline, splits, and the store.
pub mod constants;
/// Task, hunk, and dataset record types.
pub mod data;
/// Line-level diff engine and unified-diff rendering.
pub mod diff;
/// Batch outcome counters.
pub mod metrics;
/// Versioned CI log noise filtering.
pub mod noise;
/// Per-task extraction and batch driver.
pub mod pipeline;
/// Hunk segmentation into context/answer pairs.
pub mod segment;
/// Hunk selection policies.
pub mod select;
/// JSON-lines and dataset directory sinks.
pub mod sink;
/// Raw log sources.
pub mod source;
/// Deterministic train/test splits and manifests.
pub mod splits;
/// On-disk dataset store.
pub mod store;
/// Build-pair artifact loading into the task table.
pub mod tasks;
/// Shared type aliases.
pub mod types;
/// Line joining helpers.
pub mod utils;

mod errors;

pub use config::{ContentPolicy, EmptyAnswerPolicy, HunkSelection, PipelineConfig, SplitConfig};
pub use data::{DatasetRecord, Hunk, Task};
pub use diff::{DiffHunk, EditOp, EditScript, HunkHeader, diff, edit_script, render_unified};
pub use errors::{HunkError, LogSide};
pub use metrics::{BatchReport, TaskStatus};
pub use noise::{NoiseFilter, NoisePatterns};
pub use pipeline::{Extractor, TaskOutput, WindowOutput};
pub use segment::HunkSegmenter;
pub use select::select_last_k;
pub use sink::{JsonlFormat, JsonlSink, TaskSink};
pub use source::{FileLogSource, InMemoryLogSource, LogSource};
pub use splits::{
    DeterministicRng, SplitBuilder, SplitLabel, SplitManifest, TrainTestSplit, shuffle_with, split,
};
pub use store::{HunkFileRef, PathRemap, RecordStore, TaskRef, validate_task_id};
pub use tasks::{TaskTable, load_artifacts, parse_artifacts};
pub use types::{FileName, JobId, LogLine, LogLines, PathString, PatternSource, TaskId};
