//! Index file writing and tree building.
//!
//! On-disk layout:
//!
//! ```text
//! Header:  "VECI" | version (u32) | entry count (u32)
//! Entry:   path_len (u16) | path bytes | mode (u32) | hash (32 bytes)
//!          | size (i64) | mtime_ns (i64) | stage (u8)
//!          | zero padding to a 4-byte boundary
//! Trailer: SHA-256 of all preceding bytes
//! ```
//!
//! Entries are written in `(path, stage)` order; integers are big-endian.

use std::io::Write;
use std::path::Path;

use bstr::BString;
use vec_hash::{Hasher, ObjectId};
use vec_object::{FileMode, ObjectKind, Tree, TreeEntry};
use vec_odb::ObjectDatabase;

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

/// Magic bytes at the start of every index file.
pub(crate) const INDEX_SIGNATURE: &[u8; 4] = b"VECI";
/// Current format version.
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Write the index to a file atomically using a lock file.
pub fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    let mut lock =
        vec_utils::lockfile::LockFile::acquire(path).map_err(|_| IndexError::LockFailed {
            path: path.to_path_buf(),
        })?;

    let data = serialize_index(index);
    lock.write_all(&data)?;
    lock.commit().map_err(|_| IndexError::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Serialize the index to bytes, trailer included.
pub fn serialize_index(index: &Index) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(INDEX_SIGNATURE);
    buf.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    buf.extend_from_slice(&(index.len() as u32).to_be_bytes());

    for entry in index.iter() {
        write_entry(&mut buf, entry);
    }

    let checksum = Hasher::digest(&buf);
    buf.extend_from_slice(checksum.as_bytes());

    buf
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry) {
    let entry_start = buf.len();

    buf.extend_from_slice(&(entry.path.len() as u16).to_be_bytes());
    buf.extend_from_slice(&entry.path);
    buf.extend_from_slice(&entry.mode.to_be_bytes());
    buf.extend_from_slice(entry.oid.as_bytes());
    buf.extend_from_slice(&entry.size.to_be_bytes());
    buf.extend_from_slice(&entry.mtime_ns.to_be_bytes());
    buf.push(entry.stage.as_u8());

    // Pad to a 4-byte boundary.
    let entry_len = buf.len() - entry_start;
    let padded = (entry_len + 3) & !3;
    for _ in 0..padded - entry_len {
        buf.push(0);
    }
}

/// Build tree objects from the stage-0 entries and return the root OID.
///
/// Directories are derived from the slash-separated paths; empty
/// directories cannot arise because only files are recorded.
pub fn write_tree_from_index(index: &Index, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    let entries: Vec<&IndexEntry> = index.iter().filter(|e| e.stage == Stage::Normal).collect();

    if entries.is_empty() {
        let tree = Tree::new();
        return Ok(odb.write_raw(ObjectKind::Tree, &tree.serialize_body())?);
    }

    build_tree(&entries, b"", odb)
}

/// Recursively build tree objects from sorted index entries.
fn build_tree(
    entries: &[&IndexEntry],
    prefix: &[u8],
    odb: &ObjectDatabase,
) -> Result<ObjectId, IndexError> {
    let mut tree_entries: Vec<TreeEntry> = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let entry = entries[i];
        let path = &entry.path[prefix.len()..];

        if let Some(slash_pos) = path.iter().position(|&b| b == b'/') {
            // A subtree: gather every entry under this directory name.
            let dir_name = &path[..slash_pos];
            let subtree_end = entries[i..]
                .iter()
                .position(|e| {
                    let p = &e.path[prefix.len()..];
                    !p.starts_with(dir_name) || (p.len() > slash_pos && p[slash_pos] != b'/')
                })
                .map(|pos| i + pos)
                .unwrap_or(entries.len());

            let mut new_prefix = prefix.to_vec();
            new_prefix.extend_from_slice(dir_name);
            new_prefix.push(b'/');

            let subtree_oid = build_tree(&entries[i..subtree_end], &new_prefix, odb)?;

            tree_entries.push(TreeEntry {
                mode: FileMode::Tree,
                kind: ObjectKind::Tree,
                name: BString::from(dir_name),
                oid: subtree_oid,
            });

            i = subtree_end;
        } else {
            tree_entries.push(TreeEntry {
                mode: FileMode::from_raw(entry.mode),
                kind: ObjectKind::Blob,
                name: BString::from(path),
                oid: entry.oid,
            });
            i += 1;
        }
    }

    let mut tree = Tree::new();
    tree.entries = tree_entries;
    tree.sort();
    Ok(odb.write_raw(ObjectKind::Tree, &tree.serialize_body())?)
}
