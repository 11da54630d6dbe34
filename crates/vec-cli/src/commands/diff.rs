use std::collections::BTreeMap;

use anyhow::Result;
use bstr::{BString, ByteSlice};
use clap::Args;
use vec_diff::unified::render_unified;
use vec_hash::ObjectId;
use vec_object::{Object, ObjectKind};
use vec_repository::checkout::{flatten_commit_tree, TreeFile};
use vec_repository::Repository;
use vec_index::Stage;

use super::{open_repo, resolve_revision};
use crate::exit;

#[derive(Args)]
pub struct DiffArgs {
    /// Compare HEAD with the index instead of the index with the
    /// working tree
    #[arg(long)]
    pub cached: bool,

    /// A revision, or a `<rev>..<rev>` range
    pub revision: Option<String>,

    /// Limit the diff to these path prefixes
    pub paths: Vec<String>,
}

/// One side of the comparison: path → blob content provider.
enum Side {
    Tree(BTreeMap<Vec<u8>, TreeFile>),
    Index,
    Worktree,
}

pub fn run(args: &DiffArgs) -> Result<i32> {
    let mut repo = open_repo()?;

    let (old_side, new_side) = match (&args.revision, args.cached) {
        (None, true) => {
            // HEAD vs index.
            let head = head_tree(&repo)?;
            (Side::Tree(head), Side::Index)
        }
        (None, false) => (Side::Index, Side::Worktree),
        (Some(range), _) if range.contains("..") => {
            let (a, b) = range.split_once("..").expect("contains ..");
            let old = flatten_commit_tree(&repo, &resolve_revision(&repo, a)?)?;
            let new = flatten_commit_tree(&repo, &resolve_revision(&repo, b)?)?;
            (Side::Tree(old), Side::Tree(new))
        }
        (Some(rev), true) => {
            let old = flatten_commit_tree(&repo, &resolve_revision(&repo, rev)?)?;
            (Side::Tree(old), Side::Index)
        }
        (Some(rev), false) => {
            let old = flatten_commit_tree(&repo, &resolve_revision(&repo, rev)?)?;
            (Side::Tree(old), Side::Worktree)
        }
    };

    let old_map = materialize(&mut repo, old_side)?;
    let new_map = materialize(&mut repo, new_side)?;

    let mut paths: Vec<&BString> = old_map.keys().chain(new_map.keys()).collect();
    paths.sort();
    paths.dedup();

    for path in paths {
        if !matches_filter(path, &args.paths) {
            continue;
        }
        let old = old_map.get(path);
        let new = new_map.get(path);
        if old == new {
            continue;
        }

        let empty: &[u8] = b"";
        let old_bytes = old.map(|v| v.as_slice()).unwrap_or(empty);
        let new_bytes = new.map(|v| v.as_slice()).unwrap_or(empty);
        let hunks = vec_diff::diff_hunks(old_bytes, new_bytes, 3);
        if hunks.is_empty() {
            continue;
        }

        let name = path.to_str_lossy();
        let old_label = if old.is_some() {
            format!("a/{name}")
        } else {
            "/dev/null".to_string()
        };
        let new_label = if new.is_some() {
            format!("b/{name}")
        } else {
            "/dev/null".to_string()
        };

        let text = render_unified(&old_label, &new_label, &hunks);
        print!("{}", text.to_str_lossy());
    }

    Ok(exit::SUCCESS)
}

fn head_tree(repo: &Repository) -> Result<BTreeMap<Vec<u8>, TreeFile>> {
    match repo.head_oid()? {
        Some(head) => Ok(flatten_commit_tree(repo, &head)?),
        None => Ok(BTreeMap::new()),
    }
}

/// Load one side into `path → content`.
fn materialize(repo: &mut Repository, side: Side) -> Result<BTreeMap<BString, Vec<u8>>> {
    let mut out = BTreeMap::new();
    match side {
        Side::Tree(tree) => {
            for (path, file) in tree {
                out.insert(BString::from(path), read_blob(repo, &file.oid)?);
            }
        }
        Side::Index => {
            let entries: Vec<(BString, ObjectId)> = repo
                .index()?
                .iter()
                .filter(|e| e.stage == Stage::Normal)
                .map(|e| (e.path.clone(), e.oid))
                .collect();
            for (path, oid) in entries {
                out.insert(path, read_blob(repo, &oid)?);
            }
        }
        Side::Worktree => {
            // Only tracked paths participate; untracked files belong to
            // status, not diff.
            let work_tree = repo.work_tree()?.to_path_buf();
            let tracked: Vec<BString> = repo
                .index()?
                .iter()
                .filter(|e| e.stage == Stage::Normal)
                .map(|e| e.path.clone())
                .collect();
            for path in tracked {
                let fs_path = work_tree.join(path.to_str_lossy().as_ref());
                match std::fs::read(&fs_path) {
                    Ok(content) => {
                        out.insert(path, content);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(out)
}

fn read_blob(repo: &Repository, oid: &ObjectId) -> Result<Vec<u8>> {
    match repo.odb().read_kind(oid, ObjectKind::Blob)? {
        Object::Blob(b) => Ok(b.data.to_vec()),
        _ => unreachable!("read_kind checked"),
    }
}

fn matches_filter(path: &BString, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    filters.iter().any(|f| path.starts_with(f.as_bytes()))
}
