//! Three-way content merge.
//!
//! Both sides are diffed against the ancestor and reduced to splices
//! (base span → replacement lines). Splices whose base spans touch are
//! grouped into clusters; each cluster then reconstructs the full text of
//! the disputed span on both sides. A cluster claimed by one side applies
//! cleanly, identical claims collapse, and everything else becomes a
//! marked conflict.

use std::ops::Range;

use vec_diff::{diff_edits, split_lines, Edit, EditOp};

/// Labels for conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels<'a> {
    pub ours: &'a str,
    pub theirs: &'a str,
}

impl Default for MergeLabels<'_> {
    fn default() -> Self {
        Self {
            ours: "ours",
            theirs: "theirs",
        }
    }
}

/// Result of a content merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMergeResult {
    /// Merged cleanly.
    Clean(Vec<u8>),
    /// Overlapping changes; the content carries conflict markers.
    Conflict {
        content: Vec<u8>,
        conflict_count: usize,
    },
}

impl ContentMergeResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(c) => c,
            Self::Conflict { content, .. } => content,
        }
    }
}

/// One side's edit against the ancestor: base\[replaces\] becomes
/// side\[with\]. A pure insertion has an empty `replaces`; a pure
/// deletion an empty `with`.
#[derive(Debug, Clone)]
struct Splice {
    replaces: Range<usize>,
    with: Range<usize>,
}

/// A maximal group of splices whose base spans contend for the same
/// stretch of the ancestor.
#[derive(Debug)]
struct Cluster {
    span: Range<usize>,
    ours: Vec<Splice>,
    theirs: Vec<Splice>,
}

/// Perform a three-way content merge of `base`, `ours`, and `theirs`.
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    // Trivial cases first: identical sides, or only one side changed.
    if ours == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }
    if base == ours {
        return ContentMergeResult::Clean(theirs.to_vec());
    }
    if base == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }

    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let clusters = group_into_clusters(
        splices(&diff_edits(base, ours)),
        splices(&diff_edits(base, theirs)),
    );

    let mut output: Vec<u8> = Vec::new();
    let mut conflict_count = 0;
    let mut cursor = 0;

    for cluster in &clusters {
        // Ancestor lines nobody touched, up to the disputed span.
        copy_lines(&mut output, &base_lines, cursor..cluster.span.start);

        let ours_text = rebuild_span(cluster, &cluster.ours, &base_lines, &ours_lines);
        let theirs_text = rebuild_span(cluster, &cluster.theirs, &base_lines, &theirs_lines);

        if cluster.theirs.is_empty() || ours_text == theirs_text {
            output.extend_from_slice(&ours_text);
        } else if cluster.ours.is_empty() {
            output.extend_from_slice(&theirs_text);
        } else {
            conflict_count += 1;
            write_markers(&mut output, &ours_text, &theirs_text, labels);
        }

        cursor = cluster.span.end;
    }
    copy_lines(&mut output, &base_lines, cursor..base_lines.len());

    if conflict_count > 0 {
        ContentMergeResult::Conflict {
            content: output,
            conflict_count,
        }
    } else {
        ContentMergeResult::Clean(output)
    }
}

/// Condense an edit script into splices. Runs of non-equal edits form one
/// splice; an equal line closes the run.
fn splices(edits: &[Edit]) -> Vec<Splice> {
    let mut result: Vec<Splice> = Vec::new();
    let mut open: Option<Splice> = None;

    for edit in edits {
        match edit.op {
            EditOp::Equal => result.extend(open.take()),
            EditOp::Delete => match open.as_mut() {
                Some(splice) => splice.replaces.end = edit.old_index + 1,
                None => {
                    open = Some(Splice {
                        replaces: edit.old_index..edit.old_index + 1,
                        with: edit.new_index..edit.new_index,
                    })
                }
            },
            EditOp::Insert => match open.as_mut() {
                Some(splice) => splice.with.end = edit.new_index + 1,
                None => {
                    open = Some(Splice {
                        replaces: edit.old_index..edit.old_index,
                        with: edit.new_index..edit.new_index + 1,
                    })
                }
            },
        }
    }
    result.extend(open);
    result
}

/// Does `a` end before `b` begins, with no contact that matters?
///
/// Touching spans stay independent, with one exception: a pure insertion
/// sitting exactly at the other span's boundary contends with it (the
/// inserted lines would land inside the other side's rewrite).
fn clear_of(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.end < b.start || (a.end == b.start && !a.is_empty())
}

/// Merge both splice lists (each already ordered) into clusters of
/// mutually contending spans.
fn group_into_clusters(ours: Vec<Splice>, theirs: Vec<Splice>) -> Vec<Cluster> {
    let mut tagged: Vec<(bool, Splice)> = ours
        .into_iter()
        .map(|s| (true, s))
        .chain(theirs.into_iter().map(|s| (false, s)))
        .collect();
    tagged.sort_by_key(|(_, s)| (s.replaces.start, s.replaces.end));

    let mut clusters: Vec<Cluster> = Vec::new();
    for (from_ours, splice) in tagged {
        let joins = clusters
            .last()
            .is_some_and(|cluster| !clear_of(&cluster.span, &splice.replaces));

        if joins {
            let cluster = clusters.last_mut().expect("joins implies a cluster");
            cluster.span.end = cluster.span.end.max(splice.replaces.end);
            if from_ours {
                cluster.ours.push(splice);
            } else {
                cluster.theirs.push(splice);
            }
        } else {
            let span = splice.replaces.clone();
            let (ours, theirs) = if from_ours {
                (vec![splice], Vec::new())
            } else {
                (Vec::new(), vec![splice])
            };
            clusters.push(Cluster { span, ours, theirs });
        }
    }
    clusters
}

/// One side's full text for a cluster's span: replaced stretches come
/// from that side, untouched stretches from the ancestor.
fn rebuild_span(
    cluster: &Cluster,
    side_splices: &[Splice],
    base_lines: &[&[u8]],
    side_lines: &[&[u8]],
) -> Vec<u8> {
    let mut text = Vec::new();
    let mut pos = cluster.span.start;
    for splice in side_splices {
        copy_lines(&mut text, base_lines, pos..splice.replaces.start);
        copy_lines(&mut text, side_lines, splice.with.clone());
        pos = splice.replaces.end;
    }
    copy_lines(&mut text, base_lines, pos..cluster.span.end);
    text
}

/// Append `lines[range]`, newline-terminated, tolerating empty or
/// out-of-range requests.
fn copy_lines(out: &mut Vec<u8>, lines: &[&[u8]], range: Range<usize>) {
    let lo = range.start.min(lines.len());
    let hi = range.end.min(lines.len()).max(lo);
    for line in &lines[lo..hi] {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
}

/// Emit `<<<<<<<`/`=======`/`>>>>>>>` conflict markers around both sides.
fn write_markers(
    output: &mut Vec<u8>,
    ours_text: &[u8],
    theirs_text: &[u8],
    labels: &MergeLabels<'_>,
) {
    output.extend_from_slice(b"<<<<<<< ");
    output.extend_from_slice(labels.ours.as_bytes());
    output.push(b'\n');
    output.extend_from_slice(ours_text);
    output.extend_from_slice(b"=======\n");
    output.extend_from_slice(theirs_text);
    output.extend_from_slice(b">>>>>>> ");
    output.extend_from_slice(labels.theirs.as_bytes());
    output.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> MergeLabels<'static> {
        MergeLabels {
            ours: "HEAD",
            theirs: "feature",
        }
    }

    #[test]
    fn identical_sides() {
        let result = merge_content(b"a\n", b"a\nb\n", b"a\nb\n", &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"a\nb\n");
    }

    #[test]
    fn only_ours_changed() {
        let result = merge_content(b"a\nb\n", b"a\nmodified\n", b"a\nb\n", &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"a\nmodified\n");
    }

    #[test]
    fn only_theirs_changed() {
        let result = merge_content(b"a\nb\n", b"a\nb\n", b"a\nmodified\n", &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"a\nmodified\n");
    }

    #[test]
    fn non_overlapping_changes_both_applied() {
        let base = b"one\ntwo\nthree\nfour\n";
        let ours = b"ONE\ntwo\nthree\nfour\n";
        let theirs = b"one\ntwo\nthree\nFOUR\n";
        let result = merge_content(base, ours, theirs, &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"ONE\ntwo\nthree\nFOUR\n");
    }

    #[test]
    fn overlapping_changes_conflict() {
        let base = b"x\n";
        let ours = b"x\ny\n";
        let theirs = b"x\nz\n";
        let result = merge_content(base, ours, theirs, &labels());
        assert!(!result.is_clean());
        let text = String::from_utf8_lossy(result.content()).to_string();
        assert!(text.contains("<<<<<<< HEAD"));
        assert!(text.contains("======="));
        assert!(text.contains(">>>>>>> feature"));
        assert!(text.contains("y\n"));
        assert!(text.contains("z\n"));
        // The unchanged prefix stays outside the markers.
        assert!(text.starts_with("x\n<<<<<<<"));
    }

    #[test]
    fn same_change_on_both_sides_is_clean() {
        let base = b"a\nold\nc\n";
        let ours = b"a\nnew\nc\n";
        let theirs = b"a\nnew\nc\n";
        let result = merge_content(base, ours, theirs, &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"a\nnew\nc\n");
    }

    #[test]
    fn add_add_from_empty_base_conflicts() {
        let result = merge_content(b"", b"mine\n", b"yours\n", &labels());
        assert!(!result.is_clean());
        if let ContentMergeResult::Conflict { conflict_count, .. } = result {
            assert_eq!(conflict_count, 1);
        }
    }

    #[test]
    fn spec_conflict_scenario() {
        // base "x\n", ours "x\ny\n", theirs "x\nz\n" — the working file
        // must contain both sides between markers.
        let result = merge_content(b"x\n", b"x\ny\n", b"x\nz\n", &MergeLabels::default());
        let expected = b"x\n<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n";
        assert_eq!(result.content(), expected);
    }

    #[test]
    fn wide_edit_absorbs_interleaved_small_edits() {
        // Ours rewrites lines 2-4 as one block; theirs edits lines 2 and 4
        // separately. All three splices contend for the same stretch, so
        // they collapse into a single conflict with coherent side texts.
        let base = b"1\n2\n3\n4\n5\n";
        let ours = b"1\nX\n5\n";
        let theirs = b"1\nY\n3\nZ\n5\n";
        let result = merge_content(base, ours, theirs, &labels());

        match result {
            ContentMergeResult::Conflict {
                content,
                conflict_count,
            } => {
                assert_eq!(conflict_count, 1);
                let text = String::from_utf8_lossy(&content).to_string();
                assert!(text.starts_with("1\n<<<<<<< HEAD\nX\n"));
                assert!(text.contains("=======\nY\n3\nZ\n>>>>>>>"));
                assert!(text.ends_with(">>>>>>> feature\n5\n"));
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[test]
    fn adjacent_changes_stay_independent() {
        // Ours rewrites line 2, theirs rewrites line 3: touching spans,
        // but neither is an insertion, so both apply cleanly.
        let base = b"1\n2\n3\n4\n";
        let ours = b"1\nTWO\n3\n4\n";
        let theirs = b"1\n2\nTHREE\n4\n";
        let result = merge_content(base, ours, theirs, &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"1\nTWO\nTHREE\n4\n");
    }

    #[test]
    fn insertion_at_rewrite_boundary_conflicts() {
        // Theirs inserts exactly where ours starts rewriting: the inserted
        // line would land inside the rewritten stretch, so they contend.
        let base = b"a\nb\n";
        let ours = b"a\nB\n";         // rewrites line 2
        let theirs = b"a\nnew\nb\n"; // inserts before line 2
        let result = merge_content(base, ours, theirs, &labels());
        assert!(!result.is_clean());
    }
}
