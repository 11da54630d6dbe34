//! The three-way status engine.
//!
//! Builds three maps keyed by relative path: blobs reachable from HEAD's
//! tree, stage-0 index entries, and working-tree files. Their per-path
//! combination yields the status category.

use std::collections::{BTreeMap, BTreeSet};

use bstr::{BStr, BString, ByteSlice};
use vec_hash::ObjectId;
use vec_object::{Object, Tree};
use vec_repository::Repository;
use vec_utils::CancelToken;

use crate::hashpool;
use crate::walker::walk_worktree;
use crate::StatusError;

/// Category of one path in the status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Tracked, staged, and identical everywhere. Not printed, but
    /// returned so callers can see the full reconciliation.
    UpToDate,
    /// Working tree differs from the index.
    ModifiedNotStaged,
    /// Index differs from HEAD; working tree matches the index.
    ModifiedStaged,
    /// Index differs from HEAD and the working tree differs again.
    ModifiedStagedAndUnstaged,
    /// In the index but not in HEAD; working tree matches the index.
    NewStaged,
    /// In the index but not in HEAD; working tree differs from the index.
    NewModified,
    /// In HEAD and the index, missing from the working tree.
    DeletedNotStaged,
    /// In HEAD only: the deletion is staged.
    DeletedStaged,
    /// Only in the working tree.
    Untracked,
    /// Deletion staged, but a file with the same name reappeared untracked.
    DeletedStagedReappeared,
    /// Unresolved merge conflict (stage 1/2/3 entries present).
    Conflicted,
}

impl StatusCode {
    /// Human label used by the long status format.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::ModifiedNotStaged => "modified (not staged)",
            Self::ModifiedStaged => "modified (staged)",
            Self::ModifiedStagedAndUnstaged => "modified (staged + unstaged)",
            Self::NewStaged => "new (staged)",
            Self::NewModified => "new + modified",
            Self::DeletedNotStaged => "deleted (not staged)",
            Self::DeletedStaged => "deleted (staged)",
            Self::Untracked => "untracked",
            Self::DeletedStagedReappeared => "deleted (staged), re-appeared (untracked)",
            Self::Conflicted => "unmerged",
        }
    }

    /// Two-letter short-format code (staged column, worktree column).
    pub fn short(&self) -> &'static str {
        match self {
            Self::UpToDate => "  ",
            Self::ModifiedNotStaged => " M",
            Self::ModifiedStaged => "M ",
            Self::ModifiedStagedAndUnstaged => "MM",
            Self::NewStaged => "A ",
            Self::NewModified => "AM",
            Self::DeletedNotStaged => " D",
            Self::DeletedStaged => "D ",
            Self::Untracked => "??",
            Self::DeletedStagedReappeared => "D?",
            Self::Conflicted => "UU",
        }
    }
}

/// One path with its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: BString,
    pub code: StatusCode,
}

/// The full reconciliation result.
#[derive(Debug)]
pub struct StatusReport {
    /// Current branch, `None` when HEAD is detached.
    pub branch: Option<String>,
    /// Entries sorted by path, `UpToDate` included.
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    /// Entries that a status listing shows (everything but up-to-date).
    pub fn changes(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.code != StatusCode::UpToDate)
    }

    /// Is the working tree clean (nothing to report)?
    pub fn is_clean(&self) -> bool {
        self.changes().next().is_none()
    }

    /// Paths with unresolved conflicts.
    pub fn conflicts(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.code == StatusCode::Conflicted)
    }
}

/// Compute the three-way status of the repository.
pub fn compute_status(
    repo: &mut Repository,
    cancel: &CancelToken,
) -> Result<StatusReport, StatusError> {
    let work_tree = repo.work_tree()?.to_path_buf();
    let branch = repo.current_branch()?;
    let ignore = repo.ignore_stack()?;

    // (a) blobs reachable from HEAD's tree, flattened to path → oid.
    let mut head_blobs: BTreeMap<BString, ObjectId> = BTreeMap::new();
    if let Some(head) = repo.head_oid()? {
        let commit = match repo.odb().read_required(&head)? {
            Object::Commit(c) => c,
            _ => {
                return Err(StatusError::Odb(vec_odb::OdbError::Corrupt {
                    oid: head,
                    reason: "HEAD does not point at a commit".into(),
                }))
            }
        };
        flatten_tree(repo, &commit.tree, b"", &mut head_blobs)?;
    }

    // (b) stage-0 index entries and conflicted paths.
    let (index_blobs, conflict_paths, stat_cache) = {
        let index = repo.index()?;
        let mut blobs: BTreeMap<BString, ObjectId> = BTreeMap::new();
        let mut stat: BTreeMap<BString, (i64, i64)> = BTreeMap::new();
        for entry in index.iter_staged() {
            blobs.insert(entry.path.clone(), entry.oid);
            stat.insert(entry.path.clone(), (entry.size, entry.mtime_ns));
        }
        let conflicts: BTreeSet<BString> = index
            .conflicts()
            .into_iter()
            .map(BString::from)
            .collect();
        (blobs, conflicts, stat)
    };

    // (c) working-tree files. Stat-matching files reuse the staged OID;
    // the rest fan out to the hashing pool.
    let files = walk_worktree(&work_tree, &ignore, cancel)?;
    let mut worktree_blobs: BTreeMap<BString, ObjectId> = BTreeMap::new();
    let mut to_hash = Vec::new();
    for file in &files {
        match stat_cache.get(&file.rel_path) {
            Some(&(size, mtime_ns)) if size == file.size && mtime_ns == file.mtime_ns => {
                worktree_blobs.insert(file.rel_path.clone(), index_blobs[&file.rel_path]);
            }
            _ => to_hash.push((file.rel_path.clone(), file.abs_path.clone())),
        }
    }
    let (hashed, _failures) = hashpool::hash_files(to_hash, hashpool::default_workers(), cancel)?;
    worktree_blobs.extend(hashed);

    // Union of all paths, categorized per the comparison table.
    let mut paths: BTreeSet<&BStr> = BTreeSet::new();
    paths.extend(head_blobs.keys().map(|p| p.as_bstr()));
    paths.extend(index_blobs.keys().map(|p| p.as_bstr()));
    paths.extend(worktree_blobs.keys().map(|p| p.as_bstr()));
    paths.extend(conflict_paths.iter().map(|p| p.as_bstr()));

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let code = if conflict_paths.contains(path.as_bytes()) {
            StatusCode::Conflicted
        } else {
            categorize(
                head_blobs.get(path.as_bytes()),
                index_blobs.get(path.as_bytes()),
                worktree_blobs.get(path.as_bytes()),
            )
        };
        entries.push(StatusEntry {
            path: BString::from(path),
            code,
        });
    }

    Ok(StatusReport { branch, entries })
}

/// The comparison table: C = HEAD commit tree, I = index, W = working tree.
fn categorize(
    commit: Option<&ObjectId>,
    index: Option<&ObjectId>,
    worktree: Option<&ObjectId>,
) -> StatusCode {
    match (commit, index, worktree) {
        (Some(c), Some(i), Some(w)) => {
            if i == c {
                if w == i {
                    StatusCode::UpToDate
                } else {
                    StatusCode::ModifiedNotStaged
                }
            } else if w == i {
                StatusCode::ModifiedStaged
            } else {
                StatusCode::ModifiedStagedAndUnstaged
            }
        }
        (None, Some(i), Some(w)) => {
            if w == i {
                StatusCode::NewStaged
            } else {
                StatusCode::NewModified
            }
        }
        (Some(_), Some(_), None) => StatusCode::DeletedNotStaged,
        (Some(_), None, None) => StatusCode::DeletedStaged,
        (None, None, Some(_)) => StatusCode::Untracked,
        (Some(_), None, Some(_)) => StatusCode::DeletedStagedReappeared,
        // Staged addition whose file has since been removed.
        (None, Some(_), None) => StatusCode::DeletedNotStaged,
        (None, None, None) => StatusCode::UpToDate,
    }
}

/// Flatten a tree recursively into `path → blob oid`.
fn flatten_tree(
    repo: &Repository,
    tree_oid: &ObjectId,
    prefix: &[u8],
    out: &mut BTreeMap<BString, ObjectId>,
) -> Result<(), StatusError> {
    let tree: Tree = match repo.odb().read_required(tree_oid)? {
        Object::Tree(t) => t,
        _ => {
            return Err(StatusError::Odb(vec_odb::OdbError::Corrupt {
                oid: *tree_oid,
                reason: "expected a tree".into(),
            }))
        }
    };

    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !prefix.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        match entry.kind {
            vec_object::ObjectKind::Tree => {
                flatten_tree(repo, &entry.oid, &path, out)?;
            }
            _ => {
                out.insert(BString::from(path), entry.oid);
            }
        }
    }
    Ok(())
}
