//! Packfile reading, writing, delta encoding, and index support.
//!
//! Packfiles store many objects in one file with delta compression; the
//! accompanying `.idx` file provides O(log n) random lookup by OID. A pack
//! is only visible to readers once its index exists, so writers publish the
//! `.pack` first and the `.idx` second.

pub mod delta;
pub mod entry;
pub mod index;
pub mod pack;
pub mod verify;
pub mod write;

use vec_hash::ObjectId;
use vec_object::ObjectKind;

/// Errors that can occur during pack operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain too deep (>{max_depth} levels) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("pack checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("packed object {oid} hashes to {actual}")]
    ObjectHashMismatch { oid: ObjectId, actual: ObjectId },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),
}

impl From<vec_utils::UtilError> for PackError {
    fn from(e: vec_utils::UtilError) -> Self {
        match e {
            vec_utils::UtilError::Cancelled => PackError::Cancelled,
            vec_utils::UtilError::Io(io) => PackError::Io(io),
            other => PackError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Kind of a packed object entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackEntryKind {
    Commit,
    Tree,
    Blob,
    /// Delta with a negative offset to a prior entry in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta referencing its base by OID.
    RefDelta { base_oid: ObjectId },
}

impl PackEntryKind {
    /// Convert a non-delta pack entry kind to an ObjectKind.
    pub fn to_object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }
}

/// Kind number for a plain (non-delta) object.
pub fn kind_number(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => 1,
        ObjectKind::Tree => 2,
        ObjectKind::Blob => 3,
    }
}

/// A fully resolved object read from a packfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 1;
pub const PACK_HEADER_SIZE: usize = 12;
/// Trailer length: one SHA-256 digest.
pub const PACK_TRAILER_LEN: usize = vec_hash::DIGEST_LEN;

/// Pack index constants.
pub const IDX_SIGNATURE: &[u8; 4] = b"VIDX";
pub const IDX_VERSION: u32 = 1;
/// One index record: 32-byte OID + u64 offset + u32 crc32.
pub const IDX_RECORD_LEN: usize = vec_hash::DIGEST_LEN + 8 + 4;

/// Maximum delta chain depth.
pub const MAX_DELTA_DEPTH: usize = 50;
/// How many neighboring objects of the same kind are tried as delta bases.
pub const DELTA_WINDOW: usize = 10;

/// Rename a corrupt pack (and its index, if present) out of the way.
///
/// Quarantined files get a `.bad` suffix so the failure is visible and the
/// pack is never half-trusted again.
pub fn quarantine(pack_path: &std::path::Path) -> std::io::Result<()> {
    let bad_pack = pack_path.with_extension("pack.bad");
    std::fs::rename(pack_path, &bad_pack)?;
    let idx_path = pack_path.with_extension("idx");
    if idx_path.exists() {
        let bad_idx = pack_path.with_extension("idx.bad");
        std::fs::rename(&idx_path, &bad_idx)?;
    }
    Ok(())
}
