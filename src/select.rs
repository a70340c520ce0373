//! Hunk selection policies.

use crate::config::{EmptyAnswerPolicy, HunkSelection};
use crate::data::Hunk;

/// Return the final `k` hunks (all of them when fewer exist), in original order.
pub fn select_last_k(mut hunks: Vec<Hunk>, k: usize) -> Vec<Hunk> {
    let start = hunks.len().saturating_sub(k);
    hunks.drain(..start);
    hunks
}

impl HunkSelection {
    /// Apply this selection to a task's ordered hunks.
    pub fn apply(self, hunks: Vec<Hunk>) -> Vec<Hunk> {
        match self {
            HunkSelection::All => hunks,
            HunkSelection::LastK(k) => select_last_k(hunks, k),
        }
    }
}

impl EmptyAnswerPolicy {
    /// Drop pure-context hunks when the policy requires an answer.
    pub fn apply(self, hunks: Vec<Hunk>) -> Vec<Hunk> {
        match self {
            EmptyAnswerPolicy::Keep => hunks,
            EmptyAnswerPolicy::Drop => hunks
                .into_iter()
                .filter(|hunk| !hunk.is_pure_context())
                .collect(),
        }
    }
}
