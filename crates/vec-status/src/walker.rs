//! Working-tree enumeration.
//!
//! Walks the working directory, skipping the repository metadata directory
//! and every path the ignore stack matches. Emission order is unspecified.

use std::path::{Path, PathBuf};

use bstr::{BStr, BString};
use vec_index::IgnoreStack;
use vec_utils::CancelToken;

use crate::StatusError;

/// Directory name of the repository metadata, always skipped.
const META_DIR: &str = ".vec";

/// One file found in the working tree.
#[derive(Debug, Clone)]
pub struct WorktreeFile {
    /// Absolute path on disk.
    pub abs_path: PathBuf,
    /// Slash-separated path relative to the working-tree root.
    pub rel_path: BString,
    /// File size in bytes.
    pub size: i64,
    /// Modification time in nanoseconds since the epoch.
    pub mtime_ns: i64,
}

/// Enumerate all non-ignored files under `root`.
pub fn walk_worktree(
    root: &Path,
    ignore: &IgnoreStack,
    cancel: &CancelToken,
) -> Result<Vec<WorktreeFile>, StatusError> {
    let mut out = Vec::new();
    walk_dir(root, root, ignore, cancel, &mut out)?;
    Ok(out)
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    ignore: &IgnoreStack,
    cancel: &CancelToken,
    out: &mut Vec<WorktreeFile>,
) -> Result<(), StatusError> {
    for entry in std::fs::read_dir(dir)? {
        cancel.check()?;
        let entry = entry?;
        let path = entry.path();

        if entry.file_name() == META_DIR {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .expect("walk stays under root")
            .to_string_lossy()
            .replace('\\', "/");
        if ignore.is_ignored(BStr::new(rel.as_bytes())) {
            continue;
        }

        let meta = entry.metadata()?;
        if meta.is_dir() {
            walk_dir(root, &path, ignore, cancel, out)?;
        } else if meta.is_file() {
            let (size, mtime_ns) = vec_index::stat_fields(&meta);
            out.push(WorktreeFile {
                abs_path: path,
                rel_path: BString::from(rel),
                size,
                mtime_ns,
            });
        }
    }
    Ok(())
}
