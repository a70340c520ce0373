use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::store::RAW_LOG_EXTENSION;
use crate::errors::HunkError;
use crate::source::LogSource;

/// Reads `<root>/<job_id>.log`.
///
/// Absent and zero-length files both count as missing.
#[derive(Clone, Debug)]
pub struct FileLogSource {
    root: PathBuf,
    extension: String,
}

impl FileLogSource {
    /// Source over log files directly under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: RAW_LOG_EXTENSION.to_string(),
        }
    }

    /// Override the log file extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Directory the logs are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the log for `job_id` is read from.
    pub fn log_path(&self, job_id: &str) -> PathBuf {
        self.root.join(format!("{job_id}.{}", self.extension))
    }
}

impl LogSource for FileLogSource {
    fn get_log(&self, job_id: &str) -> Result<Option<String>, HunkError> {
        let path = self.log_path(job_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        // CI logs are not guaranteed to be valid UTF-8.
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_and_empty_files_are_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("1.log"), "hello\n").unwrap();
        fs::write(dir.path().join("2.log"), "").unwrap();
        let source = FileLogSource::new(dir.path());
        assert_eq!(source.get_log("1").unwrap().as_deref(), Some("hello\n"));
        assert_eq!(source.get_log("2").unwrap(), None);
        assert_eq!(source.get_log("3").unwrap(), None);
    }

    #[test]
    fn custom_extension_and_invalid_utf8() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("7.txt"), [b'o', b'k', 0xFF]).unwrap();
        let source = FileLogSource::new(dir.path()).with_extension("txt");
        assert_eq!(source.log_path("7"), dir.path().join("7.txt"));
        assert_eq!(source.get_log("7").unwrap().as_deref(), Some("ok\u{FFFD}"));
    }
}
