//! Working-tree cleanliness check.
//!
//! Clean means: every stage-0 entry is present and unchanged in the
//! working tree, no tracked file has been deleted, and no new non-ignored
//! file has appeared.

use std::collections::BTreeSet;
use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use vec_hash::Hasher;

use crate::entry::stat_fields;
use crate::{IgnoreStack, Index, IndexError, Stage};

/// Directory name of the repository metadata, always skipped.
const META_DIR: &str = ".vec";

impl Index {
    /// True iff the working tree matches the stage-0 entries exactly.
    pub fn is_clean(&self, work_tree: &Path, ignore: &IgnoreStack) -> Result<bool, IndexError> {
        let mut on_disk = BTreeSet::new();
        collect_files(work_tree, work_tree, ignore, &mut on_disk)?;

        for entry in self.iter() {
            if entry.stage != Stage::Normal {
                // An unresolved conflict is never clean.
                return Ok(false);
            }
            if !on_disk.contains(&entry.path) {
                return Ok(false); // tracked file deleted
            }
            if self.entry_differs(work_tree, entry.path.as_bstr())? {
                return Ok(false); // tracked file modified
            }
        }

        // Anything on disk the index does not know about is new.
        for path in &on_disk {
            if self.get(path.as_bstr(), Stage::Normal).is_none() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Does the working-tree file differ from its stage-0 entry?
    ///
    /// Stat data short-circuits the common case; on a stat mismatch the
    /// content is hashed, so a touched-but-identical file still reads as
    /// unchanged.
    pub fn entry_differs(&self, work_tree: &Path, path: &BStr) -> Result<bool, IndexError> {
        let Some(entry) = self.get(path, Stage::Normal) else {
            return Ok(true);
        };
        let fs_path = work_tree.join(path.to_str_lossy().as_ref());
        let meta = match std::fs::metadata(&fs_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(IndexError::Io(e)),
        };

        let (size, mtime_ns) = stat_fields(&meta);
        if entry.stat_matches(size, mtime_ns) {
            return Ok(false);
        }

        let content = std::fs::read(&fs_path)?;
        Ok(Hasher::hash_object("blob", &content) != entry.oid)
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    ignore: &IgnoreStack,
    out: &mut BTreeSet<BString>,
) -> Result<(), IndexError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();

        if name == META_DIR {
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

        if path.is_dir() {
            collect_files(root, &path, ignore, out)?;
        } else if path.is_file() {
            out.insert(BString::from(rel));
        }
    }
    Ok(())
}
