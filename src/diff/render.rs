use super::{ChangeKind, DiffLine};
use serde::Serialize;

/// One side of a side-by-side row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideCell {
    pub line_number: usize,
    pub content: String,
}

/// Old and new line at the same visual row. A missing cell is padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideBySideRow {
    pub old: Option<SideCell>,
    pub new: Option<SideCell>,
    pub changed: bool,
}

/// Unified rendering: `- ` for removed, `+ ` for added, two spaces otherwise.
pub fn render_inline(lines: &[DiffLine], with_line_numbers: bool) -> String {
    let width = lines
        .iter()
        .flat_map(|l| [l.old_line_number, l.new_line_number])
        .flatten()
        .max()
        .map_or(1, |n| n.to_string().len());

    lines
        .iter()
        .map(|line| {
            if with_line_numbers {
                format!(
                    "{:>w$} {:>w$} {} {}",
                    number_or_blank(line.old_line_number),
                    number_or_blank(line.new_line_number),
                    line.change.symbol(),
                    line.content,
                    w = width
                )
            } else {
                format!("{} {}", line.change.symbol(), line.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn number_or_blank(number: Option<usize>) -> String {
    number.map(|n| n.to_string()).unwrap_or_default()
}

/// Pair each run of removed lines with the added lines that follow it,
/// index by index, padding the shorter side.
pub fn side_by_side(lines: &[DiffLine]) -> Vec<SideBySideRow> {
    let mut rows = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        if line.change == ChangeKind::Unchanged {
            rows.push(SideBySideRow {
                old: line.old_line_number.map(|n| cell(n, &line.content)),
                new: line.new_line_number.map(|n| cell(n, &line.content)),
                changed: false,
            });
            i += 1;
            continue;
        }

        let run_end = lines[i..]
            .iter()
            .position(|l| l.change == ChangeKind::Unchanged)
            .map_or(lines.len(), |offset| i + offset);
        let run = &lines[i..run_end];

        let removed: Vec<SideCell> = run
            .iter()
            .filter(|l| l.change == ChangeKind::Removed)
            .filter_map(|l| l.old_line_number.map(|n| cell(n, &l.content)))
            .collect();
        let added: Vec<SideCell> = run
            .iter()
            .filter(|l| l.change == ChangeKind::Added)
            .filter_map(|l| l.new_line_number.map(|n| cell(n, &l.content)))
            .collect();

        let height = removed.len().max(added.len());
        let mut removed = removed.into_iter();
        let mut added = added.into_iter();
        for _ in 0..height {
            rows.push(SideBySideRow {
                old: removed.next(),
                new: added.next(),
                changed: true,
            });
        }

        i = run_end;
    }

    rows
}

fn cell(line_number: usize, content: &str) -> SideCell {
    SideCell {
        line_number,
        content: content.to_string(),
    }
}

/// Two-column text layout; the old column is cut or padded to `width` chars.
pub fn render_side_by_side(rows: &[SideBySideRow], width: usize) -> String {
    let number_width = rows
        .iter()
        .flat_map(|r| [r.old.as_ref(), r.new.as_ref()])
        .flatten()
        .map(|c| c.line_number)
        .max()
        .map_or(1, |n| n.to_string().len());

    rows.iter()
        .map(|row| {
            let marker = if row.changed { '|' } else { ' ' };
            let (old_number, old_text) = split_cell(row.old.as_ref());
            let (new_number, new_text) = split_cell(row.new.as_ref());
            let old_text: String = old_text.chars().take(width).collect();
            format!(
                "{:>nw$} {:<w$} {} {:>nw$} {}",
                old_number,
                old_text,
                marker,
                new_number,
                new_text,
                nw = number_width,
                w = width
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_cell(cell: Option<&SideCell>) -> (String, &str) {
    match cell {
        Some(c) => (c.line_number.to_string(), c.content.as_str()),
        None => (String::new(), ""),
    }
}

/// Classic unified patch with `--- old` / `+++ new` headers, built from an
/// already computed edit script. No changes produce an empty string.
pub fn unified_patch(lines: &[DiffLine], context: usize) -> String {
    let hunks = hunk_ranges(lines, context);
    if hunks.is_empty() {
        return String::new();
    }

    let mut patch = String::from("--- old\n+++ new\n");
    for (start, end) in hunks {
        let before = &lines[..start];
        let hunk = &lines[start..end];
        let old_before = before.iter().filter(|l| l.old_line_number.is_some()).count();
        let new_before = before.iter().filter(|l| l.new_line_number.is_some()).count();
        let old_count = hunk.iter().filter(|l| l.old_line_number.is_some()).count();
        let new_count = hunk.iter().filter(|l| l.new_line_number.is_some()).count();

        patch.push_str(&format!(
            "@@ -{} +{} @@\n",
            hunk_span(old_before, old_count),
            hunk_span(new_before, new_count)
        ));
        for line in hunk {
            patch.push(line.change.symbol());
            patch.push_str(&line.content);
            patch.push('\n');
        }
    }
    patch
}

/// Half-open index ranges around each change, merged when their context
/// overlaps or touches.
fn hunk_ranges(lines: &[DiffLine], context: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.change == ChangeKind::Unchanged {
            continue;
        }
        let start = i.saturating_sub(context);
        let end = (i + context + 1).min(lines.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// `start,count` in unified notation. An empty side names the line it
/// follows.
fn hunk_span(lines_before: usize, count: usize) -> String {
    let start = if count == 0 { lines_before } else { lines_before + 1 };
    format!("{},{}", start, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_diff;

    #[test]
    fn test_render_inline() {
        let lines = compute_diff("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!(render_inline(&lines, false), "  a\n- b\n+ x\n  c");
        assert_eq!(render_inline(&lines, true), "1 1   a\n2   - b\n  2 + x\n3 3   c");
    }

    #[test]
    fn test_side_by_side_pads_shorter_run() {
        let lines = compute_diff("a\nb1\nb2\nc\n", "a\nx\nc\nd\n");
        let rows = side_by_side(&lines);

        assert_eq!(rows.len(), 5);
        assert!(!rows[0].changed);
        assert_eq!(rows[1].old, Some(cell(2, "b1")));
        assert_eq!(rows[1].new, Some(cell(2, "x")));
        assert_eq!(rows[2].old, Some(cell(3, "b2")));
        assert_eq!(rows[2].new, None);
        assert_eq!(rows[3].old, Some(cell(4, "c")));
        assert_eq!(rows[3].new, Some(cell(3, "c")));
        assert_eq!(rows[4].old, None);
        assert_eq!(rows[4].new, Some(cell(4, "d")));
    }

    #[test]
    fn test_render_side_by_side() {
        let rows = side_by_side(&compute_diff("same\nold\n", "same\nnew\n"));
        let text = render_side_by_side(&rows, 6);
        assert_eq!(text, "1 same     1 same\n2 old    | 2 new");
    }

    #[test]
    fn test_unified_patch() {
        let lines = compute_diff("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!(
            unified_patch(&lines, 3),
            "--- old\n+++ new\n@@ -1,3 +1,3 @@\n a\n-b\n+x\n c\n"
        );

        assert!(unified_patch(&compute_diff("same\n", "same\n"), 3).is_empty());
    }

    #[test]
    fn test_unified_patch_splits_distant_hunks() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = "1\nTWO\n3\n4\n5\n6\n7\n8\n9\nten\n";
        let patch = unified_patch(&compute_diff(old, new), 1);
        assert_eq!(
            patch,
            "--- old\n+++ new\n@@ -1,3 +1,3 @@\n 1\n-2\n+TWO\n 3\n@@ -9,1 +9,2 @@\n 9\n+ten\n"
        );
    }

    #[test]
    fn test_unified_patch_pure_insertion_names_preceding_line() {
        let patch = unified_patch(&compute_diff("", "new\n"), 3);
        assert!(patch.contains("@@ -0,0 +1,1 @@\n+new\n"));
    }
}
