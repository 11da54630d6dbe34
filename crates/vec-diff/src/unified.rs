//! Hunk assembly and unified diff rendering.

use bstr::{BString, ByteSlice};

use crate::{DiffLine, Edit, EditOp, Hunk};

/// Group an edit script into hunks with `context` equal lines around each
/// change; nearby changes merge into one hunk.
pub fn edits_to_hunks(
    edits: &[Edit],
    old_lines: &[&[u8]],
    new_lines: &[&[u8]],
    context: usize,
) -> Vec<Hunk> {
    // Ranges of non-Equal edits, as index ranges into `edits`.
    let mut change_ranges: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < edits.len() {
        if edits[i].op != EditOp::Equal {
            let start = i;
            while i < edits.len() && edits[i].op != EditOp::Equal {
                i += 1;
            }
            change_ranges.push((start, i));
        } else {
            i += 1;
        }
    }

    if change_ranges.is_empty() {
        return Vec::new();
    }

    // Merge ranges whose gap fits inside twice the context.
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut current = change_ranges[0];
    for &(start, end) in &change_ranges[1..] {
        if start - current.1 <= 2 * context {
            current.1 = end;
        } else {
            merged.push(current);
            current = (start, end);
        }
    }
    merged.push(current);

    let mut hunks = Vec::new();
    for (change_start, change_end) in merged {
        let lead = change_start.saturating_sub(context);
        let tail = (change_end + context).min(edits.len());

        let mut lines = Vec::new();
        let mut old_count = 0;
        let mut new_count = 0;

        for edit in &edits[lead..tail] {
            match edit.op {
                EditOp::Equal => {
                    old_count += 1;
                    new_count += 1;
                    lines.push(DiffLine {
                        op: EditOp::Equal,
                        content: BString::from(old_lines[edit.old_index]),
                    });
                }
                EditOp::Delete => {
                    old_count += 1;
                    lines.push(DiffLine {
                        op: EditOp::Delete,
                        content: BString::from(old_lines[edit.old_index]),
                    });
                }
                EditOp::Insert => {
                    new_count += 1;
                    lines.push(DiffLine {
                        op: EditOp::Insert,
                        content: BString::from(new_lines[edit.new_index]),
                    });
                }
            }
        }

        // 1-based start lines; a side with no lines reports start 0.
        let first = &edits[lead];
        let old_start = if old_count == 0 { 0 } else { first.old_index + 1 };
        let new_start = if new_count == 0 { 0 } else { first.new_index + 1 };

        hunks.push(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines,
        });
    }

    hunks
}

/// Render one file's diff in unified format.
///
/// `old_label` and `new_label` go on the `---`/`+++` lines (conventionally
/// `a/<path>` and `b/<path>`, or `/dev/null` for creation/deletion).
pub fn render_unified(old_label: &str, new_label: &str, hunks: &[Hunk]) -> BString {
    let mut out = BString::from(Vec::new());
    if hunks.is_empty() {
        return out;
    }

    out.extend_from_slice(format!("--- {old_label}\n").as_bytes());
    out.extend_from_slice(format!("+++ {new_label}\n").as_bytes());

    for hunk in hunks {
        out.extend_from_slice(
            format!(
                "@@ -{},{} +{},{} @@\n",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            )
            .as_bytes(),
        );
        for line in &hunk.lines {
            let marker = match line.op {
                EditOp::Equal => b' ',
                EditOp::Delete => b'-',
                EditOp::Insert => b'+',
            };
            out.push(marker);
            out.extend_from_slice(&line.content);
            out.push(b'\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff_hunks;

    #[test]
    fn render_single_change() {
        let hunks = diff_hunks(b"a\nb\nc\n", b"a\nX\nc\n", 3);
        let text = render_unified("a/file", "b/file", &hunks);
        let text = text.to_str_lossy();
        assert!(text.contains("--- a/file"));
        assert!(text.contains("+++ b/file"));
        assert!(text.contains("@@ -1,3 +1,3 @@"));
        assert!(text.contains("-b"));
        assert!(text.contains("+X"));
        assert!(text.contains(" a"));
    }

    #[test]
    fn no_changes_renders_empty() {
        let hunks = diff_hunks(b"same\n", b"same\n", 3);
        assert!(render_unified("a/x", "b/x", &hunks).is_empty());
    }

    #[test]
    fn added_file_against_empty() {
        let hunks = diff_hunks(b"", b"new line\n", 3);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start, 0);
        assert_eq!(hunks[0].old_count, 0);
        assert_eq!(hunks[0].new_start, 1);
        assert_eq!(hunks[0].new_count, 1);
    }

    #[test]
    fn distant_changes_make_separate_hunks() {
        let old = b"1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n";
        let new = b"X\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\nY\n";
        let hunks = diff_hunks(old, new, 2);
        assert_eq!(hunks.len(), 2);
    }

    #[test]
    fn close_changes_merge_into_one_hunk() {
        let old = b"1\n2\n3\n4\n5\n6\n";
        let new = b"X\n2\n3\n4\n5\nY\n";
        let hunks = diff_hunks(old, new, 3);
        assert_eq!(hunks.len(), 1);
    }
}
