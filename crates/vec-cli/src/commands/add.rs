use std::path::Path;

use anyhow::{bail, Result};
use bstr::{BStr, BString, ByteSlice};
use clap::Args;
use vec_index::{IndexEntry, Stage};
use vec_object::{Blob, Object};
use vec_repository::Repository;

use super::{open_repo, to_rel_path};
use crate::exit;

#[derive(Args)]
pub struct AddArgs {
    /// Files or directories to stage
    #[arg(required = true)]
    pub paths: Vec<String>,
}

pub fn run(args: &AddArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;
    let work_tree = repo.work_tree()?.to_path_buf();
    let ignore = repo.ignore_stack()?;

    // Expand arguments into relative file paths: a directory argument
    // covers every non-ignored file underneath it; a missing-but-tracked
    // path stages its deletion.
    let mut rel_paths: Vec<BString> = Vec::new();
    for arg in &args.paths {
        let rel = if arg == "." {
            Vec::new() // repository root: every file
        } else {
            to_rel_path(&work_tree, arg)?
        };
        let fs_path = work_tree.join(String::from_utf8_lossy(&rel).as_ref());

        if fs_path.is_dir() {
            let cancel = vec_utils::CancelToken::new();
            let files = vec_status::walk_worktree(&fs_path, &ignore, &cancel)?;
            for file in files {
                let mut full = rel.clone();
                if !full.is_empty() {
                    full.push(b'/');
                }
                full.extend_from_slice(&file.rel_path);
                rel_paths.push(BString::from(full));
            }
        } else if fs_path.is_file() {
            rel_paths.push(BString::from(rel));
        } else if repo
            .index()?
            .get(BStr::new(&rel), Stage::Normal)
            .is_some()
            || repo.index()?.has_conflict(BStr::new(&rel))
        {
            // Deleted tracked file: stage the removal.
            repo.index_mut()?.remove(BStr::new(&rel));
        } else {
            bail!("pathspec '{arg}' did not match any files");
        }
    }

    for rel in &rel_paths {
        stage_file(&mut repo, &work_tree, BStr::new(rel))?;
    }

    repo.write_index()?;
    Ok(exit::SUCCESS)
}

/// Hash one file as a blob, store it, and upsert its stage-0 entry.
fn stage_file(repo: &mut Repository, work_tree: &Path, rel: &BStr) -> Result<()> {
    let fs_path = work_tree.join(rel.to_str_lossy().as_ref());
    let content = std::fs::read(&fs_path)?;
    let meta = std::fs::metadata(&fs_path)?;

    let oid = repo.odb().write(&Object::Blob(Blob::new(content)))?;
    let (size, mtime_ns) = vec_index::stat_fields(&meta);
    let mode = file_mode(&meta);

    repo.index_mut()?
        .add(IndexEntry::staged(rel, oid, mode, size, mtime_ns));
    Ok(())
}

fn file_mode(meta: &std::fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 != 0 {
            return 0o100755;
        }
    }
    let _ = meta;
    0o100644
}
