//! Line-level diff engine.
//!
//! Alignment is a Myers O(ND) shortest edit script over exact line equality.
//! Each region is trimmed of its common prefix and suffix, then split at the
//! middle snake found by searching forward and backward at once, so memory
//! stays linear in the input length. Regions that share no line at all are
//! emitted as a plain delete block followed by an insert block. Inside every
//! changed region deletions precede insertions, and identical inputs always
//! yield the identical script.

use std::collections::HashSet;
use std::fmt;

use crate::errors::HunkError;

/// One operation of an edit script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOp {
    /// Line present on both sides.
    Keep(String),
    /// Line present only in the passed log (side B).
    Insert(String),
    /// Line present only in the failed log (side A).
    Delete(String),
}

impl EditOp {
    /// Line text without any marker.
    pub fn text(&self) -> &str {
        match self {
            EditOp::Keep(line) | EditOp::Insert(line) | EditOp::Delete(line) => line,
        }
    }

    /// True for `Keep`.
    pub fn is_keep(&self) -> bool {
        matches!(self, EditOp::Keep(_))
    }

    fn marker(&self) -> char {
        match self {
            EditOp::Keep(_) => ' ',
            EditOp::Insert(_) => '+',
            EditOp::Delete(_) => '-',
        }
    }
}

/// Ordered edit script transforming the failed log into the passed log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditScript {
    ops: Vec<EditOp>,
}

impl EditScript {
    /// Operations in document order.
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// True when the script contains no insert or delete.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(EditOp::is_keep)
    }

    /// Lines of side A (keeps and deletes).
    pub fn failed_lines(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, EditOp::Insert(_)))
            .map(EditOp::text)
            .collect()
    }

    /// Lines of side B (keeps and inserts).
    pub fn passed_lines(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, EditOp::Delete(_)))
            .map(EditOp::text)
            .collect()
    }

    /// Group the script into unified-diff hunks with `context_window` unchanged
    /// lines around each change run.
    ///
    /// Two change runs separated by at most `2 * context_window` unchanged
    /// lines share one hunk, so windows that exactly touch are merged.
    pub fn hunks(&self, context_window: usize) -> Vec<DiffHunk> {
        let runs = self.change_runs();
        if runs.is_empty() {
            return Vec::new();
        }

        let mut groups: Vec<(usize, usize)> = Vec::new();
        for (start, end) in runs {
            match groups.last_mut() {
                Some(last) if start - last.1 <= 2 * context_window => last.1 = end,
                _ => groups.push((start, end)),
            }
        }

        let (failed_at, passed_at) = self.positions();
        groups
            .into_iter()
            .map(|(start, end)| {
                let lo = start.saturating_sub(context_window);
                let hi = (end + context_window).min(self.ops.len());
                let ops = self.ops[lo..hi].to_vec();
                let failed_len = ops
                    .iter()
                    .filter(|op| !matches!(op, EditOp::Insert(_)))
                    .count();
                let passed_len = ops
                    .iter()
                    .filter(|op| !matches!(op, EditOp::Delete(_)))
                    .count();
                DiffHunk {
                    header: HunkHeader {
                        failed_start: failed_at[lo],
                        failed_len,
                        passed_start: passed_at[lo],
                        passed_len,
                    },
                    ops,
                }
            })
            .collect()
    }

    /// Half-open `[start, end)` op ranges of consecutive non-keep ops.
    fn change_runs(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut open: Option<usize> = None;
        for (idx, op) in self.ops.iter().enumerate() {
            match (op.is_keep(), open) {
                (false, None) => open = Some(idx),
                (true, Some(start)) => {
                    runs.push((start, idx));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            runs.push((start, self.ops.len()));
        }
        runs
    }

    /// 0-based line offsets into each side at every op index.
    fn positions(&self) -> (Vec<usize>, Vec<usize>) {
        let mut failed_at = Vec::with_capacity(self.ops.len() + 1);
        let mut passed_at = Vec::with_capacity(self.ops.len() + 1);
        let (mut a, mut b) = (0usize, 0usize);
        for op in &self.ops {
            failed_at.push(a);
            passed_at.push(b);
            match op {
                EditOp::Keep(_) => {
                    a += 1;
                    b += 1;
                }
                EditOp::Delete(_) => a += 1,
                EditOp::Insert(_) => b += 1,
            }
        }
        failed_at.push(a);
        passed_at.push(b);
        (failed_at, passed_at)
    }
}

/// Line ranges a hunk covers on both sides (0-based starts).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HunkHeader {
    /// First failed-side line offset.
    pub failed_start: usize,
    /// Number of failed-side lines in the hunk.
    pub failed_len: usize,
    /// First passed-side line offset.
    pub passed_start: usize,
    /// Number of passed-side lines in the hunk.
    pub passed_len: usize,
}

impl fmt::Display for HunkHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{} +{} @@",
            unified_range(self.failed_start, self.failed_len),
            unified_range(self.passed_start, self.passed_len)
        )
    }
}

fn unified_range(start: usize, len: usize) -> String {
    let mut beginning = start + 1;
    match len {
        1 => format!("{beginning}"),
        0 => {
            beginning -= 1;
            format!("{beginning},0")
        }
        _ => format!("{beginning},{len}"),
    }
}

/// One rendered diff region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffHunk {
    /// Traceability header.
    pub header: HunkHeader,
    /// Ops covered by the hunk, including surrounding context.
    pub ops: Vec<EditOp>,
}

/// Compute the edit script turning `failed` into `passed`.
pub fn edit_script<S: AsRef<str>>(failed: &[S], passed: &[S]) -> Result<EditScript, HunkError> {
    let a: Vec<&str> = failed.iter().map(|line| line.as_ref()).collect();
    let b: Vec<&str> = passed.iter().map(|line| line.as_ref()).collect();

    let ops = myers(&a, &b).map_err(|details| HunkError::DiffComputation {
        task_id: String::new(),
        details,
    })?;
    Ok(EditScript { ops })
}

/// Diff two line sequences and render hunks with `context_window` context lines.
pub fn diff<S: AsRef<str>>(
    failed: &[S],
    passed: &[S],
    context_window: usize,
) -> Result<Vec<DiffHunk>, HunkError> {
    Ok(edit_script(failed, passed)?.hunks(context_window))
}

/// Render hunks as unified diff text, one line per op.
pub fn render_unified(hunks: &[DiffHunk], failed_name: &str, passed_name: &str) -> String {
    if hunks.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(&format!("--- {failed_name}\n+++ {passed_name}\n"));
    for hunk in hunks {
        out.push_str(&hunk.header.to_string());
        out.push('\n');
        for op in &hunk.ops {
            out.push(op.marker());
            out.push_str(op.text());
            out.push('\n');
        }
    }
    out
}

fn myers(a: &[&str], b: &[&str]) -> Result<Vec<EditOp>, String> {
    let mut ops = Vec::with_capacity(a.len() + b.len());
    bisect_range(a, b, &mut ops)?;
    deletions_first(&mut ops);
    Ok(ops)
}

/// Linear-space Myers: split on the middle snake and recurse on both halves.
///
/// Each level holds two `O(n + m)` frontiers; recursion depth is logarithmic
/// in the edit distance.
fn bisect_range(a: &[&str], b: &[&str], ops: &mut Vec<EditOp>) -> Result<(), String> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    ops.extend(a[..prefix].iter().map(|line| EditOp::Keep(line.to_string())));

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    if a_mid.is_empty() || b_mid.is_empty() || !shares_a_line(a_mid, b_mid) {
        ops.extend(a_mid.iter().map(|line| EditOp::Delete(line.to_string())));
        ops.extend(b_mid.iter().map(|line| EditOp::Insert(line.to_string())));
    } else {
        let Some((x, y)) = middle_snake(a_mid, b_mid) else {
            return Err(format!(
                "no middle snake for {}x{} region",
                a_mid.len(),
                b_mid.len()
            ));
        };
        if (x, y) == (0, 0) || (x, y) == (a_mid.len(), b_mid.len()) {
            return Err(format!("middle snake at ({x}, {y}) does not split the region"));
        }
        bisect_range(&a_mid[..x], &b_mid[..y], ops)?;
        bisect_range(&a_mid[x..], &b_mid[y..], ops)?;
    }

    ops.extend(
        a[a.len() - suffix..]
            .iter()
            .map(|line| EditOp::Keep(line.to_string())),
    );
    Ok(())
}

fn shares_a_line(a: &[&str], b: &[&str]) -> bool {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let seen: HashSet<&str> = small.iter().copied().collect();
    large.iter().any(|line| seen.contains(line))
}

/// Point where the forward and reverse searches meet, as `(x, y)` offsets.
///
/// Both inputs are non-empty and differ in their first and last lines.
fn middle_snake(a: &[&str], b: &[&str]) -> Option<(usize, usize)> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max_d = (n + m + 1) / 2;
    let offset = max_d;
    let len = (2 * max_d + 2) as usize;
    let mut forward = vec![-1isize; len];
    let mut reverse = vec![-1isize; len];
    forward[(offset + 1) as usize] = 0;
    reverse[(offset + 1) as usize] = 0;
    let delta = n - m;
    let odd = delta % 2 != 0;
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let idx = (offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && forward[idx - 1] < forward[idx + 1]) {
                forward[idx + 1]
            } else {
                forward[idx - 1] + 1
            };
            let mut y1 = x1 - k1;
            while (0..n).contains(&x1)
                && (0..m).contains(&y1)
                && a[x1 as usize] == b[y1 as usize]
            {
                x1 += 1;
                y1 += 1;
            }
            forward[idx] = x1;
            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if odd {
                let k2_idx = offset + delta - k1;
                if (0..len as isize).contains(&k2_idx) && reverse[k2_idx as usize] != -1 {
                    let x2 = n - reverse[k2_idx as usize];
                    if x1 >= x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let idx = (offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && reverse[idx - 1] < reverse[idx + 1]) {
                reverse[idx + 1]
            } else {
                reverse[idx - 1] + 1
            };
            let mut y2 = x2 - k2;
            while (0..n).contains(&x2)
                && (0..m).contains(&y2)
                && a[(n - x2 - 1) as usize] == b[(m - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            reverse[idx] = x2;
            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !odd {
                let k1_idx = offset + delta - k2;
                if (0..len as isize).contains(&k1_idx) && forward[k1_idx as usize] != -1 {
                    let x1 = forward[k1_idx as usize];
                    let y1 = offset + x1 - k1_idx;
                    if x1 >= n - x2 {
                        return Some((x1 as usize, y1 as usize));
                    }
                }
            }
            k2 += 2;
        }
    }
    None
}

/// Reorder every run of consecutive changes so deletions precede insertions.
fn deletions_first(ops: &mut [EditOp]) {
    let mut start = 0;
    while start < ops.len() {
        if ops[start].is_keep() {
            start += 1;
            continue;
        }
        let end = ops[start..]
            .iter()
            .position(EditOp::is_keep)
            .map_or(ops.len(), |offset| start + offset);
        // stable: relative order within deletions and within insertions is kept
        ops[start..end].sort_by_key(|op| matches!(op, EditOp::Insert(_)));
        start = end;
    }
}
