//! Turns rendered diff hunks into context/answer pairs.

use crate::config::ContentPolicy;
use crate::data::Hunk;
use crate::diff::{DiffHunk, EditOp};
use crate::types::TaskId;

/// Marker prefixed to inserted lines under [`ContentPolicy::IncludeInsertions`].
pub const INSERTION_MARKER: char = '+';

/// Walks rendered diff hunks and derives one [`Hunk`] per region.
///
/// The segmenter does not filter on content: regions without any deletion are
/// still emitted, numbered in diff order.
#[derive(Clone, Copy, Debug, Default)]
pub struct HunkSegmenter {
    policy: ContentPolicy,
}

impl HunkSegmenter {
    /// Create a segmenter with an explicit content policy.
    pub fn new(policy: ContentPolicy) -> Self {
        Self { policy }
    }

    /// Content policy in use.
    pub fn policy(&self) -> ContentPolicy {
        self.policy
    }

    /// Segment `diff_hunks` into task hunks for `context_window`.
    pub fn segment(
        &self,
        task_id: &TaskId,
        context_window: usize,
        diff_hunks: &[DiffHunk],
    ) -> Vec<Hunk> {
        diff_hunks
            .iter()
            .enumerate()
            .map(|(index, diff_hunk)| {
                let mut context_lines = Vec::with_capacity(diff_hunk.ops.len());
                let mut answer_lines = Vec::new();
                for op in &diff_hunk.ops {
                    match op {
                        EditOp::Keep(line) => context_lines.push(line.clone()),
                        EditOp::Delete(line) => {
                            context_lines.push(line.clone());
                            answer_lines.push(line.clone());
                        }
                        EditOp::Insert(line) => {
                            if self.policy == ContentPolicy::IncludeInsertions {
                                context_lines.push(format!("{INSERTION_MARKER}{line}"));
                            }
                        }
                    }
                }
                Hunk {
                    task_id: task_id.clone(),
                    context_window,
                    index,
                    context_lines,
                    answer_lines,
                }
            })
            .collect()
    }
}
