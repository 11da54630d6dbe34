//! Line diffing: Myers edit scripts, hunk assembly, and unified rendering.
//!
//! This is the support layer for the `diff` command and for the merge
//! engine's line-level three-way merge.

pub mod myers;
pub mod unified;

use bstr::BString;

/// Errors from diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An edit operation in the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Line present in both old and new.
    Equal,
    /// Line inserted (present only in new).
    Insert,
    /// Line deleted (present only in old).
    Delete,
}

/// A single edit in the edit script, referencing lines by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub op: EditOp,
    /// Index into the old sequence (meaningful for Equal and Delete).
    pub old_index: usize,
    /// Index into the new sequence (meaningful for Equal and Insert).
    pub new_index: usize,
}

/// One line of a hunk, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub op: EditOp,
    pub content: BString,
}

/// A contiguous group of changes with surrounding context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first line in the old file (0 when the old side is empty).
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based first line in the new file (0 when the new side is empty).
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// Split bytes into lines, dropping the trailing newline of each.
///
/// A trailing final newline does not create an empty last line.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&[u8]> = data.split(|&b| b == b'\n').collect();
    if data.ends_with(b"\n") {
        lines.pop();
    }
    lines
}

/// Compute a line-level edit script between two byte buffers.
pub fn diff_edits(old: &[u8], new: &[u8]) -> Vec<Edit> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    myers::diff(&old_lines, &new_lines)
}

/// Compute hunks with `context` lines of surrounding context.
pub fn diff_hunks(old: &[u8], new: &[u8], context: usize) -> Vec<Hunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = myers::diff(&old_lines, &new_lines);
    unified::edits_to_hunks(&edits, &old_lines, &new_lines, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_basic() {
        assert_eq!(split_lines(b"a\nb\nc\n"), vec![b"a" as &[u8], b"b", b"c"]);
        assert_eq!(split_lines(b"a\nb"), vec![b"a" as &[u8], b"b"]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn identical_has_no_changes() {
        let edits = diff_edits(b"a\nb\n", b"a\nb\n");
        assert!(edits.iter().all(|e| e.op == EditOp::Equal));
    }

    #[test]
    fn single_line_change() {
        let edits = diff_edits(b"a\nb\nc\n", b"a\nX\nc\n");
        let deletes = edits.iter().filter(|e| e.op == EditOp::Delete).count();
        let inserts = edits.iter().filter(|e| e.op == EditOp::Insert).count();
        assert_eq!(deletes, 1);
        assert_eq!(inserts, 1);
    }

    #[test]
    fn hunks_carry_context() {
        let old = b"1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = b"1\n2\n3\n4\nX\n6\n7\n8\n9\n";
        let hunks = diff_hunks(old, new, 3);
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.old_start, 2);
        assert_eq!(hunk.old_count, 7);
        assert_eq!(hunk.new_start, 2);
        assert_eq!(hunk.new_count, 7);
    }
}
