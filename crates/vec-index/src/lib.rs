//! The staging index.
//!
//! A persisted, ordered list of `(path, mode, hash, size, mtime, stage)`
//! entries reconciling the working tree, the staged snapshot, and HEAD.
//! Stage 0 is the normal staged entry; stages 1/2/3 carry the ancestor,
//! ours, and theirs versions of a path during an unresolved merge.

pub mod clean;
mod entry;
pub mod ignore;
mod read;
mod write;

use std::path::Path;

use bstr::BStr;
use vec_hash::ObjectId;
use vec_odb::ObjectDatabase;

pub use entry::{stat_fields, IndexEntry};
pub use ignore::IgnoreStack;

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("index lock failed: {path}")]
    LockFailed { path: std::path::PathBuf },

    #[error("invalid ignore pattern: {0}")]
    InvalidIgnorePattern(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),
}

/// Merge stage of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Normal staged entry (stage 0).
    Normal,
    /// Common ancestor in a merge conflict (stage 1).
    Base,
    /// Our side of a merge conflict (stage 2).
    Ours,
    /// Their side of a merge conflict (stage 3).
    Theirs,
}

impl Stage {
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(n: u8) -> Result<Self, IndexError> {
        match n {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            _ => Err(IndexError::InvalidEntry {
                offset: 0,
                reason: format!("invalid stage: {n}"),
            }),
        }
    }
}

/// The staging index: entries sorted by `(path, stage)`.
#[derive(Debug, Default)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    /// A new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the index from a file. A missing file is an empty index.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let file = match std::fs::File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(IndexError::Io(e)),
        };
        let data = unsafe { memmap2::Mmap::map(&file) }?;
        read::parse_index(&data)
    }

    /// Write the index to a file atomically (lock file + rename).
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_index(self, path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by path and stage.
    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path[..] == path[..] && e.stage == stage)
    }

    /// All entries for a path, any stage.
    pub fn get_all(&self, path: &BStr) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|e| e.path[..] == path[..])
            .collect()
    }

    /// Upsert a stage-0 entry, clearing any conflict stages for the path.
    ///
    /// Stage 0 and stages 1-3 are mutually exclusive per path.
    pub fn add(&mut self, entry: IndexEntry) {
        debug_assert_eq!(entry.stage, Stage::Normal);
        self.entries.retain(|e| e.path != entry.path);
        self.insert_sorted(entry);
    }

    /// Record a conflict-stage entry, clearing any stage-0 entry for the path.
    pub fn add_conflict(&mut self, entry: IndexEntry) {
        debug_assert_ne!(entry.stage, Stage::Normal);
        self.entries
            .retain(|e| !(e.path == entry.path && (e.stage == Stage::Normal || e.stage == entry.stage)));
        self.insert_sorted(entry);
    }

    fn insert_sorted(&mut self, entry: IndexEntry) {
        let pos = self
            .entries
            .binary_search_by(|e| {
                e.path
                    .cmp(&entry.path)
                    .then(e.stage.as_u8().cmp(&entry.stage.as_u8()))
            })
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
    }

    /// Delete all stages for a path. Returns true if anything was removed.
    pub fn remove(&mut self, path: &BStr) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path[..] != path[..]);
        self.entries.len() < before
    }

    /// Does the path have any conflict-stage entries?
    pub fn has_conflict(&self, path: &BStr) -> bool {
        self.entries
            .iter()
            .any(|e| e.path[..] == path[..] && e.stage != Stage::Normal)
    }

    /// All paths with any stage > 0, deduplicated, in order.
    pub fn conflicts(&self) -> Vec<&BStr> {
        let mut paths: Vec<&BStr> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.as_ref())
            .collect();
        paths.dedup();
        paths
    }

    /// Iterate all entries in `(path, stage)` order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Iterate stage-0 entries only.
    pub fn iter_staged(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().filter(|e| e.stage == Stage::Normal)
    }

    /// Build tree objects from the stage-0 entries and return the root OID.
    pub fn write_tree(&self, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
        write::write_tree_from_index(self, odb)
    }

    pub(crate) fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<IndexEntry>) {
        self.entries = entries;
    }
}
