//! Line/text helpers shared by the store and sinks.

use crate::types::LogLines;

/// Join lines with a trailing newline after each one.
///
/// The inverse of [`split_lines`], including for empty lines.
pub fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out
}

/// Split newline-terminated text into lines.
pub fn split_lines(text: &str) -> LogLines {
    text.split_terminator('\n').map(str::to_string).collect()
}

/// Join lines with `\n` separators and no trailing newline (JSONL payloads).
pub fn flatten_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}
