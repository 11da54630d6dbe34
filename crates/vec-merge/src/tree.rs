//! Three-way tree merge.
//!
//! Operates over the union of paths in the ancestor, ours, and theirs
//! trees (flattened to `path → blob`). Unchanged sides take the other
//! side's version; double edits fall through to the line-level content
//! merge; delete-vs-modify is always a conflict.

use std::collections::{BTreeMap, BTreeSet};

use bstr::BString;
use vec_hash::ObjectId;
use vec_object::{Object, ObjectKind};
use vec_odb::ObjectDatabase;
use vec_repository::checkout::TreeFile;

use crate::content::{merge_content, ContentMergeResult, MergeLabels};
use crate::{ConflictPath, MergeError, MergeStrategy};

/// Outcome of merging three flattened trees.
#[derive(Debug, Default)]
pub struct TreeMergeResult {
    /// Cleanly merged paths.
    pub merged: BTreeMap<Vec<u8>, TreeFile>,
    /// Unresolved paths with their per-side blobs.
    pub conflicts: Vec<ConflictPath>,
    /// Bytes to place in the working tree for each unresolved path
    /// (marked-up merge output, or the surviving side of delete-vs-modify).
    pub conflict_contents: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TreeMergeResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge three flattened trees.
pub fn merge_trees(
    odb: &ObjectDatabase,
    base: &BTreeMap<Vec<u8>, TreeFile>,
    ours: &BTreeMap<Vec<u8>, TreeFile>,
    theirs: &BTreeMap<Vec<u8>, TreeFile>,
    strategy: MergeStrategy,
    labels: &MergeLabels<'_>,
) -> Result<TreeMergeResult, MergeError> {
    let mut paths: BTreeSet<&Vec<u8>> = BTreeSet::new();
    paths.extend(base.keys());
    paths.extend(ours.keys());
    paths.extend(theirs.keys());

    let mut result = TreeMergeResult::default();

    for path in paths {
        let b = base.get(path);
        let o = ours.get(path);
        let t = theirs.get(path);

        // Same on both sides (including both absent): take either.
        if same(o, t) {
            if let Some(file) = o {
                result.merged.insert(path.clone(), *file);
            }
            continue;
        }
        // Unchanged on our side: theirs wins (modify or delete).
        if same(b, o) {
            if let Some(file) = t {
                result.merged.insert(path.clone(), *file);
            }
            continue;
        }
        // Unchanged on their side: ours wins.
        if same(b, t) {
            if let Some(file) = o {
                result.merged.insert(path.clone(), *file);
            }
            continue;
        }

        // Both sides changed, differently.
        match strategy {
            MergeStrategy::Ours => {
                if let Some(file) = o {
                    result.merged.insert(path.clone(), *file);
                }
            }
            MergeStrategy::Theirs => {
                if let Some(file) = t {
                    result.merged.insert(path.clone(), *file);
                }
            }
            MergeStrategy::Recursive => {
                resolve_double_change(odb, path, b, o, t, labels, &mut result)?;
            }
        }
    }

    Ok(result)
}

/// Handle a path modified (or deleted) on both sides.
fn resolve_double_change(
    odb: &ObjectDatabase,
    path: &[u8],
    base: Option<&TreeFile>,
    ours: Option<&TreeFile>,
    theirs: Option<&TreeFile>,
    labels: &MergeLabels<'_>,
    result: &mut TreeMergeResult,
) -> Result<(), MergeError> {
    match (ours, theirs) {
        (Some(o), Some(t)) => {
            // Modify/modify (or add/add): line-level three-way merge.
            let base_content = match base {
                Some(b) => read_blob(odb, &b.oid)?,
                None => Vec::new(),
            };
            let ours_content = read_blob(odb, &o.oid)?;
            let theirs_content = read_blob(odb, &t.oid)?;

            match merge_content(&base_content, &ours_content, &theirs_content, labels) {
                ContentMergeResult::Clean(merged) => {
                    let oid = odb.write_raw(ObjectKind::Blob, &merged)?;
                    result.merged.insert(
                        path.to_vec(),
                        TreeFile {
                            oid,
                            mode: o.mode,
                        },
                    );
                }
                ContentMergeResult::Conflict { content, .. } => {
                    result.conflicts.push(ConflictPath {
                        path: BString::from(path),
                        base: base.map(|b| b.oid),
                        ours: Some(o.oid),
                        theirs: Some(t.oid),
                    });
                    result.conflict_contents.insert(path.to_vec(), content);
                }
            }
        }
        // Delete vs. modify: the modified side's bytes stay in the working
        // tree while the index carries all surviving stages.
        (Some(o), None) => {
            let content = read_blob(odb, &o.oid)?;
            result.conflicts.push(ConflictPath {
                path: BString::from(path),
                base: base.map(|b| b.oid),
                ours: Some(o.oid),
                theirs: None,
            });
            result.conflict_contents.insert(path.to_vec(), content);
        }
        (None, Some(t)) => {
            let content = read_blob(odb, &t.oid)?;
            result.conflicts.push(ConflictPath {
                path: BString::from(path),
                base: base.map(|b| b.oid),
                ours: None,
                theirs: Some(t.oid),
            });
            result.conflict_contents.insert(path.to_vec(), content);
        }
        // Both deleted a path the base had: covered by the same() checks.
        (None, None) => {}
    }
    Ok(())
}

fn same(a: Option<&TreeFile>, b: Option<&TreeFile>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.oid == y.oid,
        _ => false,
    }
}

/// Read a blob's bytes.
pub(crate) fn read_blob(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Vec<u8>, MergeError> {
    match odb.read_kind(oid, ObjectKind::Blob)? {
        Object::Blob(b) => Ok(b.data.to_vec()),
        _ => unreachable!("read_kind checked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec_object::Blob;

    fn odb(dir: &std::path::Path) -> ObjectDatabase {
        ObjectDatabase::open(dir.join("objects")).unwrap()
    }

    fn file(odb: &ObjectDatabase, content: &[u8]) -> TreeFile {
        TreeFile {
            oid: odb.write(&Object::Blob(Blob::new(content))).unwrap(),
            mode: 0o100644,
        }
    }

    fn map(entries: Vec<(&str, TreeFile)>) -> BTreeMap<Vec<u8>, TreeFile> {
        entries
            .into_iter()
            .map(|(p, f)| (p.as_bytes().to_vec(), f))
            .collect()
    }

    #[test]
    fn one_side_modified() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let old = file(&db, b"old\n");
        let new = file(&db, b"new\n");

        let base = map(vec![("a", old)]);
        let ours = map(vec![("a", new)]);
        let theirs = map(vec![("a", old)]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(result.is_clean());
        assert_eq!(result.merged[b"a".as_slice()].oid, new.oid);
    }

    #[test]
    fn one_side_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let old = file(&db, b"old\n");

        let base = map(vec![("a", old)]);
        let ours = map(vec![("a", old)]);
        let theirs = map(vec![]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(result.is_clean());
        assert!(result.merged.is_empty());
    }

    #[test]
    fn both_added_same_content() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let same_file = file(&db, b"same\n");

        let base = map(vec![]);
        let ours = map(vec![("a", same_file)]);
        let theirs = map(vec![("a", same_file)]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(result.is_clean());
        assert_eq!(result.merged.len(), 1);
    }

    #[test]
    fn double_edit_merges_lines() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let base_f = file(&db, b"one\ntwo\nthree\n");
        let ours_f = file(&db, b"ONE\ntwo\nthree\n");
        let theirs_f = file(&db, b"one\ntwo\nTHREE\n");

        let base = map(vec![("a", base_f)]);
        let ours = map(vec![("a", ours_f)]);
        let theirs = map(vec![("a", theirs_f)]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(result.is_clean());
        let merged_oid = result.merged[b"a".as_slice()].oid;
        assert_eq!(read_blob(&db, &merged_oid).unwrap(), b"ONE\ntwo\nTHREE\n");
    }

    #[test]
    fn overlapping_edit_conflicts_with_stages() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let base_f = file(&db, b"x\n");
        let ours_f = file(&db, b"x\ny\n");
        let theirs_f = file(&db, b"x\nz\n");

        let base = map(vec![("a.txt", base_f)]);
        let ours = map(vec![("a.txt", ours_f)]);
        let theirs = map(vec![("a.txt", theirs_f)]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(!result.is_clean());
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.base, Some(base_f.oid));
        assert_eq!(conflict.ours, Some(ours_f.oid));
        assert_eq!(conflict.theirs, Some(theirs_f.oid));

        let content = &result.conflict_contents[b"a.txt".as_slice()];
        assert!(content.windows(7).any(|w| w == b"<<<<<<<"));
    }

    #[test]
    fn delete_vs_modify_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let base_f = file(&db, b"keep me?\n");
        let modified = file(&db, b"modified\n");

        let base = map(vec![("a", base_f)]);
        let ours = map(vec![("a", modified)]);
        let theirs = map(vec![]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Recursive,
            &MergeLabels::default(),
        )
        .unwrap();
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.theirs, None);
        assert_eq!(conflict.ours, Some(modified.oid));
        // The modified side's content survives in the working tree.
        assert_eq!(result.conflict_contents[b"a".as_slice()], b"modified\n");
    }

    #[test]
    fn strategy_ours_takes_our_side() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let base_f = file(&db, b"x\n");
        let ours_f = file(&db, b"x\ny\n");
        let theirs_f = file(&db, b"x\nz\n");

        let base = map(vec![("a", base_f)]);
        let ours = map(vec![("a", ours_f)]);
        let theirs = map(vec![("a", theirs_f)]);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Ours,
            &MergeLabels::default(),
        )
        .unwrap();
        assert!(result.is_clean());
        assert_eq!(result.merged[b"a".as_slice()].oid, ours_f.oid);

        let result = merge_trees(
            &db,
            &base,
            &ours,
            &theirs,
            MergeStrategy::Theirs,
            &MergeLabels::default(),
        )
        .unwrap();
        assert_eq!(result.merged[b"a".as_slice()].oid, theirs_f.oid);
    }
}
