//! The top-level merge driver.
//!
//! Ties together ancestor discovery, fast-forward detection, the tree
//! merge, conflict staging, and the automatic merge commit.

use std::fs;

use bstr::{BString, ByteSlice};
use vec_hash::ObjectId;
use vec_index::{IndexEntry, Stage};
use vec_object::{Commit, Object};
use vec_ref::{Head, RefName};
use vec_repository::checkout::{self, TreeFile};
use vec_repository::Repository;
use vec_revwalk::merge_base_one;

use crate::content::MergeLabels;
use crate::tree::merge_trees;
use crate::{ConflictPath, MergeError, MergeStrategy};

/// What a merge did.
#[derive(Debug)]
pub enum MergeOutcome {
    /// The other tip is already reachable from HEAD; nothing to do.
    AlreadyUpToDate,
    /// HEAD was behind the other tip; the branch moved forward with no
    /// new commit.
    FastForward { new_head: ObjectId },
    /// A true merge that committed automatically.
    Merged { commit: ObjectId },
    /// Unresolved conflicts were staged; the caller resolves and commits.
    Conflicted { paths: Vec<ConflictPath> },
}

/// Merge `theirs` (named `their_label` in messages) into HEAD.
pub fn merge(
    repo: &mut Repository,
    theirs: ObjectId,
    their_label: &str,
    strategy: MergeStrategy,
) -> Result<MergeOutcome, MergeError> {
    let ours = repo.head_oid()?.ok_or(MergeError::UnbornHead)?;

    // merge(A, A) is a no-op.
    if ours == theirs {
        return Ok(MergeOutcome::AlreadyUpToDate);
    }

    // A merge only starts from a clean state: unstaged or staged-but-
    // uncommitted changes would be clobbered by the tree rewrite.
    {
        let ignore = repo.ignore_stack()?;
        let work_tree = repo.work_tree()?.to_path_buf();
        if !repo.index()?.is_clean(&work_tree, &ignore)? {
            return Err(MergeError::DirtyWorkTree);
        }
    }

    let base = merge_base_one(repo.odb(), &ours, &theirs)?;

    match base {
        // Their tip is an ancestor of ours: already merged.
        Some(b) if b == theirs => Ok(MergeOutcome::AlreadyUpToDate),
        // Our tip is the ancestor: fast-forward, no new commit.
        Some(b) if b == ours => fast_forward(repo, ours, theirs, their_label),
        Some(base) => true_merge(repo, base, ours, theirs, their_label, strategy),
        None => Err(MergeError::NoCommonAncestor { ours, theirs }),
    }
}

fn fast_forward(
    repo: &mut Repository,
    old_head: ObjectId,
    new_head: ObjectId,
    their_label: &str,
) -> Result<MergeOutcome, MergeError> {
    checkout::checkout_commit(repo, &new_head)?;
    move_head(repo, new_head)?;
    repo.log_head_update(
        old_head,
        new_head,
        "merge",
        Some(&format!("fast-forward to {their_label}")),
    )?;
    Ok(MergeOutcome::FastForward { new_head })
}

fn true_merge(
    repo: &mut Repository,
    base: ObjectId,
    ours: ObjectId,
    theirs: ObjectId,
    their_label: &str,
    strategy: MergeStrategy,
) -> Result<MergeOutcome, MergeError> {
    let base_tree = checkout::flatten_commit_tree(repo, &base)?;
    let ours_tree = checkout::flatten_commit_tree(repo, &ours)?;
    let theirs_tree = checkout::flatten_commit_tree(repo, &theirs)?;

    let ours_label = repo
        .current_branch()?
        .unwrap_or_else(|| "HEAD".to_string());
    let labels = MergeLabels {
        ours: &ours_label,
        theirs: their_label,
    };

    let result = merge_trees(
        repo.odb(),
        &base_tree,
        &ours_tree,
        &theirs_tree,
        strategy,
        &labels,
    )?;

    apply_to_worktree(repo, &ours_tree, &result.merged, &result.conflict_contents)?;
    rebuild_index(repo, &result.merged, &result.conflicts)?;

    if !result.conflicts.is_empty() {
        // The eventual manual commit needs the second parent.
        fs::write(
            repo.vec_dir().join("MERGE_HEAD"),
            format!("{}\n", theirs.to_hex()),
        )?;
        return Ok(MergeOutcome::Conflicted {
            paths: result.conflicts,
        });
    }

    // Clean: commit the merge automatically.
    let (index, odb) = repo.index_and_odb()?;
    let tree = index.write_tree(odb)?;
    let message = format!("Merge {their_label}\n");
    let commit = Commit {
        tree,
        parents: vec![ours, theirs],
        author: repo.identity()?,
        message: BString::from(message),
    };
    let commit_oid = repo.odb().write(&Object::Commit(commit))?;

    move_head(repo, commit_oid)?;
    repo.log_head_update(ours, commit_oid, "merge", Some(their_label))?;

    Ok(MergeOutcome::Merged { commit: commit_oid })
}

/// Update the working tree from our tree to the merge result, writing
/// conflict contents over the affected paths.
fn apply_to_worktree(
    repo: &Repository,
    ours_tree: &std::collections::BTreeMap<Vec<u8>, TreeFile>,
    merged: &std::collections::BTreeMap<Vec<u8>, TreeFile>,
    conflict_contents: &std::collections::BTreeMap<Vec<u8>, Vec<u8>>,
) -> Result<(), MergeError> {
    let work_tree = repo.work_tree()?.to_path_buf();

    // Paths that existed on our side but vanished from the result.
    for path in ours_tree.keys() {
        if !merged.contains_key(path) && !conflict_contents.contains_key(path) {
            let fs_path = work_tree.join(path.to_str_lossy().as_ref());
            match fs::remove_file(&fs_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(MergeError::Io(e)),
            }
        }
    }

    // Merged results (skip files our side already has at the right value).
    for (path, file) in merged {
        if ours_tree.get(path) != Some(file) {
            checkout::write_blob_to_worktree(repo, path, file)?;
        }
    }

    // Conflict markup / surviving sides.
    for (path, content) in conflict_contents {
        let fs_path = work_tree.join(path.to_str_lossy().as_ref());
        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&fs_path, content)?;
    }

    Ok(())
}

/// Rewrite the index to the merge result: stage 0 for clean paths,
/// stages 1/2/3 for conflicts.
fn rebuild_index(
    repo: &mut Repository,
    merged: &std::collections::BTreeMap<Vec<u8>, TreeFile>,
    conflicts: &[ConflictPath],
) -> Result<(), MergeError> {
    let work_tree = repo.work_tree()?.to_path_buf();
    let index = repo.index_mut()?;
    *index = vec_index::Index::new();

    for (path, file) in merged {
        let fs_path = work_tree.join(path.to_str_lossy().as_ref());
        let (size, mtime_ns) = match fs::metadata(&fs_path) {
            Ok(meta) => vec_index::stat_fields(&meta),
            Err(_) => (0, 0),
        };
        index.add(IndexEntry::staged(
            path.as_slice(),
            file.oid,
            file.mode,
            size,
            mtime_ns,
        ));
    }

    for conflict in conflicts {
        let mode = 0o100644;
        if let Some(oid) = conflict.base {
            index.add_conflict(IndexEntry::conflict(
                conflict.path.clone(),
                oid,
                mode,
                Stage::Base,
            ));
        }
        if let Some(oid) = conflict.ours {
            index.add_conflict(IndexEntry::conflict(
                conflict.path.clone(),
                oid,
                mode,
                Stage::Ours,
            ));
        }
        if let Some(oid) = conflict.theirs {
            index.add_conflict(IndexEntry::conflict(
                conflict.path.clone(),
                oid,
                mode,
                Stage::Theirs,
            ));
        }
    }

    repo.write_index()?;
    Ok(())
}

/// Move HEAD (or the branch it is attached to) to a new commit.
fn move_head(repo: &Repository, new_head: ObjectId) -> Result<(), MergeError> {
    match repo.refs().read_head()? {
        Head::Attached(branch) => repo.refs().write_ref(&branch, &new_head)?,
        Head::Detached(_) => repo.refs().write_ref(&RefName::head(), &new_head)?,
    }
    Ok(())
}
