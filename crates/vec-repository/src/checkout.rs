//! Materializing a tree into the working directory and the index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use vec_hash::ObjectId;
use vec_index::{Index, IndexEntry};
use vec_object::{Object, ObjectKind};

use crate::{RepoError, Repository};

/// A flattened tree entry: blob OID plus its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeFile {
    pub oid: ObjectId,
    pub mode: u32,
}

/// Flatten a tree into `path → TreeFile`, recursively.
pub fn flatten_tree(
    repo: &Repository,
    tree_oid: &ObjectId,
    prefix: &[u8],
    out: &mut BTreeMap<Vec<u8>, TreeFile>,
) -> Result<(), RepoError> {
    let tree = match repo.odb().read_kind(tree_oid, ObjectKind::Tree)? {
        Object::Tree(t) => t,
        _ => unreachable!("read_kind checked"),
    };

    for entry in tree.iter() {
        let mut path = prefix.to_vec();
        if !prefix.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(&entry.name);

        match entry.kind {
            ObjectKind::Tree => flatten_tree(repo, &entry.oid, &path, out)?,
            _ => {
                out.insert(
                    path,
                    TreeFile {
                        oid: entry.oid,
                        mode: entry.mode.raw(),
                    },
                );
            }
        }
    }
    Ok(())
}

/// Flatten the tree of a commit.
pub fn flatten_commit_tree(
    repo: &Repository,
    commit_oid: &ObjectId,
) -> Result<BTreeMap<Vec<u8>, TreeFile>, RepoError> {
    let commit = match repo.odb().read_kind(commit_oid, ObjectKind::Commit)? {
        Object::Commit(c) => c,
        _ => unreachable!("read_kind checked"),
    };
    let mut out = BTreeMap::new();
    flatten_tree(repo, &commit.tree, b"", &mut out)?;
    Ok(out)
}

/// Write one blob to a working-tree path, creating parent directories.
pub fn write_blob_to_worktree(
    repo: &Repository,
    rel_path: &[u8],
    file: &TreeFile,
) -> Result<(), RepoError> {
    let work_tree = repo.work_tree()?;
    let fs_path = work_tree.join(String::from_utf8_lossy(rel_path).as_ref());
    if let Some(parent) = fs_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let blob = match repo.odb().read_kind(&file.oid, ObjectKind::Blob)? {
        Object::Blob(b) => b,
        _ => unreachable!("read_kind checked"),
    };
    fs::write(&fs_path, &blob.data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if file.mode == 0o100755 {
            fs::set_permissions(&fs_path, fs::Permissions::from_mode(0o755))?;
        }
    }

    Ok(())
}

/// Make the working tree and index match the tree of `commit_oid`.
///
/// Tracked files absent from the target tree are removed (with empty
/// parent directories trimmed); every target file is written and staged
/// with fresh stat data. Untracked files are left alone.
pub fn checkout_commit(repo: &mut Repository, commit_oid: &ObjectId) -> Result<(), RepoError> {
    let target = flatten_commit_tree(repo, commit_oid)?;
    let work_tree = repo.work_tree()?.to_path_buf();

    // Remove tracked paths that the target no longer has.
    let stale: Vec<Vec<u8>> = repo
        .index()?
        .iter_staged()
        .map(|e| e.path.to_vec())
        .filter(|p| !target.contains_key(p))
        .collect();
    for rel in stale {
        let fs_path = work_tree.join(String::from_utf8_lossy(&rel).as_ref());
        match fs::remove_file(&fs_path) {
            Ok(()) => remove_empty_parents(&work_tree, &fs_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RepoError::Io(e)),
        }
    }

    // Write target files and rebuild the index to match.
    let mut new_index = Index::new();
    for (rel, file) in &target {
        write_blob_to_worktree(repo, rel, file)?;
        let fs_path = work_tree.join(String::from_utf8_lossy(rel).as_ref());
        let meta = fs::metadata(&fs_path)?;
        let (size, mtime_ns) = vec_index::stat_fields(&meta);
        new_index.add(IndexEntry::staged(
            rel.as_slice(),
            file.oid,
            file.mode,
            size,
            mtime_ns,
        ));
    }

    *repo.index_mut()? = new_index;
    repo.write_index()?;
    Ok(())
}

/// Remove now-empty directories between a deleted file and the root.
fn remove_empty_parents(root: &Path, deleted: &Path) {
    let mut dir = deleted.parent();
    while let Some(d) = dir {
        if d == root {
            break;
        }
        if fs::remove_dir(d).is_err() {
            break; // not empty (or already gone)
        }
        dir = d.parent();
    }
}
