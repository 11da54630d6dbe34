//! Object model: blob, tree, commit parsing and serialization.
//!
//! Provides Rust types for the three object kinds, their parsing from raw
//! bytes, serialization to the canonical wire form, and OID computation.

mod blob;
mod commit;
pub mod header;
mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use tree::{FileMode, Tree, TreeEntry};

use bstr::BString;
use vec_hash::{HashError, Hasher, ObjectId};

/// Errors produced by object operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object kind: {0}")]
    InvalidKind(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: String },

    #[error("tree entries out of order: '{prev}' before '{next}'")]
    UnsortedTree { prev: BString, next: BString },

    #[error("duplicate tree entry: '{0}'")]
    DuplicateTreeEntry(BString),

    #[error("invalid commit: missing '{field}' header")]
    MissingCommitField { field: &'static str },

    #[error("invalid file mode: {0}")]
    InvalidFileMode(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The three kinds of stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    /// Parse from the kind string in object headers and tree entries.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            _ => Err(ObjectError::InvalidKind(BString::from(s))),
        }
    }

    /// The canonical byte representation.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Blob => b"blob",
            Self::Tree => b"tree",
            Self::Commit => b"commit",
        }
    }

    /// The canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A parsed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Parse from raw framed bytes (header + body).
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (kind, body_size, header_len) = header::parse_header(data)?;
        let body = &data[header_len..];
        if body.len() != body_size {
            return Err(ObjectError::Truncated {
                expected: body_size,
                actual: body.len(),
            });
        }
        Self::parse_body(kind, body)
    }

    /// Parse from body bytes with a known kind (no header).
    pub fn parse_body(kind: ObjectKind, body: &[u8]) -> Result<Self, ObjectError> {
        match kind {
            ObjectKind::Blob => Ok(Self::Blob(Blob::parse(body))),
            ObjectKind::Tree => Ok(Self::Tree(Tree::parse(body)?)),
            ObjectKind::Commit => Ok(Self::Commit(Commit::parse(body)?)),
        }
    }

    /// Serialize to the canonical framed form (header + body).
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.serialize_body();
        let hdr = header::write_header(self.kind(), body.len());
        let mut out = Vec::with_capacity(hdr.len() + body.len());
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&body);
        out
    }

    /// Serialize just the body (no header).
    pub fn serialize_body(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.data.to_vec(),
            Self::Tree(t) => t.serialize_body(),
            Self::Commit(c) => c.serialize_body(),
        }
    }

    /// Get the object kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Compute the OID by hashing the framed form.
    pub fn compute_oid(&self) -> ObjectId {
        Hasher::hash_object(self.kind().as_str(), &self.serialize_body())
    }

    /// Size of the body (excluding header).
    pub fn body_size(&self) -> usize {
        match self {
            Self::Blob(b) => b.data.len(),
            Self::Tree(t) => t.serialize_body().len(),
            Self::Commit(c) => c.serialize_body().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_bytes() {
        assert_eq!(ObjectKind::from_bytes(b"blob").unwrap(), ObjectKind::Blob);
        assert_eq!(ObjectKind::from_bytes(b"tree").unwrap(), ObjectKind::Tree);
        assert_eq!(
            ObjectKind::from_bytes(b"commit").unwrap(),
            ObjectKind::Commit
        );
        assert!(ObjectKind::from_bytes(b"tag").is_err());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ObjectKind::Blob.to_string(), "blob");
        assert_eq!(ObjectKind::Commit.to_string(), "commit");
    }

    #[test]
    fn parse_framed_blob() {
        let obj = Object::parse(b"blob 5\0hello").unwrap();
        assert_eq!(obj.kind(), ObjectKind::Blob);
        assert_eq!(obj.serialize_body(), b"hello");
    }

    #[test]
    fn framed_size_mismatch() {
        assert!(Object::parse(b"blob 6\0hello").is_err());
    }

    #[test]
    fn oid_is_stable_across_reparse() {
        let obj = Object::Blob(Blob::new(b"stable contents".as_slice()));
        let oid = obj.compute_oid();
        let reparsed = Object::parse(&obj.serialize()).unwrap();
        assert_eq!(reparsed.compute_oid(), oid);
    }
}
