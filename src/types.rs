/// Stable build-pair identifier (the project image tag).
/// Example: `cbeust-testng-61702916`
pub type TaskId = String;
/// Reference to one raw CI job log.
/// Examples: `61702916`, `61702917`
pub type JobId = String;
/// One cleaned log line.
/// Example: `[ERROR] Failed to execute goal org.apache.maven.plugins`
pub type LogLine = String;
/// Ordered cleaned log content, immutable once produced by the noise filter.
pub type LogLines = Vec<LogLine>;
/// Regex source text for a noise pattern.
/// Example: `\d+%\s*\(\d+/\d+\)`
pub type PatternSource = String;
/// File name inside a task directory.
/// Examples: `hunk_20_3_ctx.log`, `failed.log`
pub type FileName = String;
/// Path text recorded in manifests, subject to prefix remapping.
/// Example: `/shared/project/data/diff_hunk_filtered/cbeust-testng-61702916`
pub type PathString = String;
