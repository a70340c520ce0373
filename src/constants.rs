/// Constants that define the versioned noise pattern set.
pub mod noise {
    /// Version tag of the built-in pattern set. Bump on any pattern change.
    pub const NOISE_PATTERNS_VERSION: u32 = 1;
    /// Leading timestamp prefix, stripped in place.
    pub const TIMESTAMP_PREFIX: &str =
        r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d{1,7})?)?)?Z?\s*";
    /// Patterns whose presence anywhere disqualifies a whole line.
    pub const DROP_PATTERNS: &[&str] = &[
        // terminal erase-in-line at either end
        r"^\x1b\[[0-9]?K",
        r"\x1b\[[0-9]?K$",
        // carriage-return rewritten progress lines
        r"\r",
        r"\d+%\s*\(\d+/\d+\)",
        r"(?:^|\s)\d{1,3}(?:\.\d+)?%(?:\s|$)",
        r"(?:^|\s)[\(\[]?\d+/\d+[\)\]]?(?:\s|$)",
        r"\.{5,}",
        r"\bDownload(?:ing|ed)\b",
        r"\b\d+(?:\.\d+)?\s?(?:B|kB|KB|MB|GB|KiB|MiB|GiB)(?:/s)?\b",
    ];
}

/// Constants used by the extraction pipeline defaults.
pub mod pipeline {
    /// Default number of unchanged lines kept around each change.
    pub const DEFAULT_CONTEXT_WINDOW: usize = 20;
    /// Default number of trailing hunks retained per task.
    pub const DEFAULT_KEEP_LAST: usize = 2;
    /// Default number of tasks computed in parallel before their outputs are written.
    pub const DEFAULT_CHUNK_SIZE: usize = 64;
    /// Message prefix shared by pipeline log lines.
    pub const LOG_PREFIX: &str = "[loghunks]";
}

/// Constants used by split derivation and manifest persistence.
pub mod splits {
    /// Fixed shuffle seed. Changing it changes every published split.
    pub const SPLIT_SEED: u64 = 6745;
    /// Fraction of shuffled tasks cut from the front into the test split.
    pub const DEFAULT_TEST_FRACTION: f64 = 0.1;
    /// Default manifest filename.
    pub const DEFAULT_MANIFEST_FILENAME: &str = "train_test.json";
}

/// Constants describing the on-disk dataset layout.
pub mod store {
    /// Cleaned copy of the failed-run log inside a task directory.
    pub const FAILED_LOG_NAME: &str = "failed.log";
    /// Cleaned copy of the passed-run log inside a task directory.
    pub const PASSED_LOG_NAME: &str = "passed.log";
    /// Prefix of rendered unified-diff files (`diff_<n>.log`).
    pub const DIFF_PREFIX: &str = "diff_";
    /// Prefix of hunk files (`hunk_<n>_<index>_<kind>.log`).
    pub const HUNK_PREFIX: &str = "hunk_";
    /// Suffix of hunk context files.
    pub const CONTEXT_SUFFIX: &str = "_ctx.log";
    /// Suffix of hunk answer files.
    pub const ANSWER_SUFFIX: &str = "_ans.log";
    /// Empty marker written once every sink accepted a task; discovery requires it.
    pub const COMPLETE_MARKER: &str = ".complete";
    /// Extension used for raw job logs in a log directory.
    pub const RAW_LOG_EXTENSION: &str = "log";
}
