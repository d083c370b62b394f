//! Line-level diffing.
//!
//! [`compute_diff`] turns two texts into a flat edit script of [`DiffLine`]s.
//! Changed regions always list every removed line before every added line,
//! which is what the side-by-side renderer relies on to pair them up.

pub mod render;

use serde::Serialize;
use similar::{Algorithm, DiffTag, TextDiff};

/// One row of an edit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    /// Set iff the line exists in the old text.
    pub old_line_number: Option<usize>,
    /// Set iff the line exists in the new text.
    pub new_line_number: Option<usize>,
    pub content: String,
    pub change: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    Added,
    Removed,
}

impl ChangeKind {
    pub fn symbol(&self) -> char {
        match self {
            ChangeKind::Unchanged => ' ',
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        }
    }
}

impl DiffLine {
    pub fn unchanged(old: usize, new: usize, content: impl Into<String>) -> Self {
        Self {
            old_line_number: Some(old),
            new_line_number: Some(new),
            content: content.into(),
            change: ChangeKind::Unchanged,
        }
    }

    pub fn removed(old: usize, content: impl Into<String>) -> Self {
        Self {
            old_line_number: Some(old),
            new_line_number: None,
            content: content.into(),
            change: ChangeKind::Removed,
        }
    }

    pub fn added(new: usize, content: impl Into<String>) -> Self {
        Self {
            old_line_number: None,
            new_line_number: Some(new),
            content: content.into(),
            change: ChangeKind::Added,
        }
    }
}

/// Counts per change kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn of(lines: &[DiffLine]) -> Self {
        lines.iter().fold(Self::default(), |mut stats, line| {
            match line.change {
                ChangeKind::Unchanged => stats.unchanged += 1,
                ChangeKind::Added => stats.added += 1,
                ChangeKind::Removed => stats.removed += 1,
            }
            stats
        })
    }

    pub fn is_identical(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Map a user-facing algorithm name to a diff algorithm.
pub fn algorithm_from_name(name: &str) -> Option<Algorithm> {
    match name.to_ascii_lowercase().as_str() {
        "myers" => Some(Algorithm::Myers),
        "patience" => Some(Algorithm::Patience),
        "lcs" => Some(Algorithm::Lcs),
        _ => None,
    }
}

/// Diff two texts line by line with Myers' algorithm.
pub fn compute_diff(old: &str, new: &str) -> Vec<DiffLine> {
    compute_diff_with(old, new, Algorithm::Myers)
}

pub fn compute_diff_with(old: &str, new: &str, algorithm: Algorithm) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let diff = TextDiff::configure()
        .algorithm(algorithm)
        .diff_slices(&old_lines, &new_lines);

    let mut lines = Vec::with_capacity(old_lines.len().max(new_lines.len()));
    let mut region = ChangeRegion::default();

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                region.flush(&old_lines, &new_lines, &mut lines);
                for (i, j) in old_range.zip(new_range) {
                    lines.push(DiffLine::unchanged(i + 1, j + 1, old_lines[i]));
                }
            }
            DiffTag::Delete => region.removed.extend(old_range),
            DiffTag::Insert => region.added.extend(new_range),
            DiffTag::Replace => {
                region.removed.extend(old_range);
                region.added.extend(new_range);
            }
        }
    }
    region.flush(&old_lines, &new_lines, &mut lines);

    lines
}

/// Indices of a run of adjacent non-equal opcodes.
#[derive(Default)]
struct ChangeRegion {
    removed: Vec<usize>,
    added: Vec<usize>,
}

impl ChangeRegion {
    fn flush(&mut self, old_lines: &[&str], new_lines: &[&str], out: &mut Vec<DiffLine>) {
        out.extend(self.removed.drain(..).map(|i| DiffLine::removed(i + 1, old_lines[i])));
        out.extend(self.added.drain(..).map(|j| DiffLine::added(j + 1, new_lines[j])));
    }
}
