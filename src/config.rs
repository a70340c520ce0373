use crate::constants::pipeline::{DEFAULT_CHUNK_SIZE, DEFAULT_CONTEXT_WINDOW, DEFAULT_KEEP_LAST};
use crate::constants::splits::{DEFAULT_TEST_FRACTION, SPLIT_SEED};
use crate::errors::HunkError;

/// Controls which diff lines survive into a hunk's context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentPolicy {
    /// Keep unchanged and deleted lines only; inserted lines never appear.
    #[default]
    FailedDeletionsOnly,
    /// Also keep inserted lines in the context, marked with a leading `+`.
    IncludeInsertions,
}

/// Controls whether hunks without any deleted line are emitted to the dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyAnswerPolicy {
    /// Emit pure-context hunks alongside the others.
    #[default]
    Keep,
    /// Discard hunks whose answer is empty before selection.
    Drop,
}

/// Which hunks of a task are retained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HunkSelection {
    /// Keep every hunk.
    All,
    /// Keep only the last `k` hunks (closest to end-of-log).
    LastK(usize),
}

impl Default for HunkSelection {
    fn default() -> Self {
        HunkSelection::LastK(DEFAULT_KEEP_LAST)
    }
}

/// Deterministic train/test split settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitConfig {
    /// Shuffle seed; a fixed, versioned constant by default.
    pub seed: u64,
    /// Fraction of tasks assigned to test, in `[0.0, 1.0]`.
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: SPLIT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
        }
    }
}

impl SplitConfig {
    /// Validate that the test fraction is a finite value in `[0, 1]`.
    pub fn validated(self) -> Result<Self, HunkError> {
        if !self.test_fraction.is_finite() || !(0.0..=1.0).contains(&self.test_fraction) {
            return Err(HunkError::Configuration(format!(
                "test fraction must be within [0, 1], got {}",
                self.test_fraction
            )));
        }
        Ok(self)
    }
}

/// Top-level extraction pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Context window sizes; each task is diffed once per window.
    pub context_windows: Vec<usize>,
    /// Trailing-hunk selection applied per task and window.
    pub selection: HunkSelection,
    /// Segmenter content policy.
    pub content: ContentPolicy,
    /// Whether empty-answer hunks reach the dataset.
    pub empty_answers: EmptyAnswerPolicy,
    /// Number of tasks computed in parallel between serialized writes.
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_windows: vec![DEFAULT_CONTEXT_WINDOW],
            selection: HunkSelection::default(),
            content: ContentPolicy::default(),
            empty_answers: EmptyAnswerPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Override the context windows.
    pub fn with_context_windows(mut self, windows: Vec<usize>) -> Self {
        self.context_windows = windows;
        self
    }

    /// Override hunk selection.
    pub fn with_selection(mut self, selection: HunkSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Override the segmenter content policy.
    pub fn with_content_policy(mut self, content: ContentPolicy) -> Self {
        self.content = content;
        self
    }

    /// Override the empty-answer policy.
    pub fn with_empty_answers(mut self, empty_answers: EmptyAnswerPolicy) -> Self {
        self.empty_answers = empty_answers;
        self
    }

    /// Override the parallel chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Reject configurations that cannot produce any output.
    pub fn validated(mut self) -> Result<Self, HunkError> {
        if self.context_windows.is_empty() {
            return Err(HunkError::Configuration(
                "at least one context window is required".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(HunkError::Configuration(
                "chunk size must be positive".to_string(),
            ));
        }
        self.context_windows.sort_unstable();
        self.context_windows.dedup();
        Ok(self)
    }
}
