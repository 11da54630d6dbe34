use bstr::BString;
use vec_hash::ObjectId;

use crate::Stage;

/// A single entry in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slash-separated path relative to the working tree root.
    pub path: BString,
    /// Blob OID of the staged content.
    pub oid: ObjectId,
    /// POSIX-style file mode, retained for restore.
    pub mode: u32,
    /// File size at staging time.
    pub size: i64,
    /// File mtime at staging time, in nanoseconds since the epoch.
    pub mtime_ns: i64,
    /// Merge stage.
    pub stage: Stage,
}

impl IndexEntry {
    /// A stage-0 entry from the pieces `add` collects.
    pub fn staged(path: impl Into<BString>, oid: ObjectId, mode: u32, size: i64, mtime_ns: i64) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
            size,
            mtime_ns,
            stage: Stage::Normal,
        }
    }

    /// A conflict-stage entry (stat fields are meaningless for these).
    pub fn conflict(path: impl Into<BString>, oid: ObjectId, mode: u32, stage: Stage) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
            size: 0,
            mtime_ns: 0,
            stage,
        }
    }

    /// Does cached stat data say the file is unchanged?
    ///
    /// A match is a fast-path "unchanged"; a mismatch only means the
    /// content must be re-hashed (the file may be racily clean).
    pub fn stat_matches(&self, size: i64, mtime_ns: i64) -> bool {
        self.size == size && self.mtime_ns == mtime_ns
    }
}

/// Extract `(size, mtime_ns)` the way the index stores them.
pub fn stat_fields(meta: &std::fs::Metadata) -> (i64, i64) {
    let size = meta.len() as i64;
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    (size, mtime_ns)
}
