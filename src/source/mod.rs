//! Raw log sources.
//!
//! The pipeline only asks a source for a job's raw text. Any non-success
//! result is treated as a missing log for that side of the task; retrieval
//! from remote services happens outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::HunkError;
use crate::types::JobId;

/// Filesystem-backed log source.
pub mod file_source;

pub use file_source::FileLogSource;

/// Supplies raw log text by job id.
///
/// Implementations must be safe to call from several worker threads at once.
pub trait LogSource: Send + Sync {
    /// Raw log for `job_id`, or `None` when it does not exist.
    fn get_log(&self, job_id: &str) -> Result<Option<String>, HunkError>;
}

/// In-memory log source keyed by job id.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLogSource {
    logs: Arc<HashMap<JobId, String>>,
}

impl InMemoryLogSource {
    /// Build a source from `(job_id, raw_text)` pairs.
    pub fn new<I, K, V>(logs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<JobId>,
        V: Into<String>,
    {
        Self {
            logs: Arc::new(
                logs.into_iter()
                    .map(|(id, text)| (id.into(), text.into()))
                    .collect(),
            ),
        }
    }
}

impl LogSource for InMemoryLogSource {
    fn get_log(&self, job_id: &str) -> Result<Option<String>, HunkError> {
        Ok(self.logs.get(job_id).cloned())
    }
}
