use bstr::{BStr, BString, ByteSlice};
use vec_hash::ObjectId;
use vec_utils::date::Signature;

use crate::ObjectError;

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// OID of the root tree.
    pub tree: ObjectId,
    /// Parent commit OIDs (empty for a root commit, two or more for merges).
    pub parents: Vec<ObjectId>,
    /// Author identity and timestamp.
    pub author: Signature,
    /// Commit message (everything after the blank line separator).
    pub message: BString,
}

impl Commit {
    /// Parse commit body from raw bytes (no object header).
    ///
    /// Line-oriented headers, then a blank line, then the message verbatim.
    /// Trailing whitespace on header lines is tolerated, but serialization
    /// reproduces the canonical form so hashes stay stable.
    pub fn parse(body: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;

        let mut pos = 0;
        while pos < body.len() {
            // A blank line separates headers from the message.
            if body[pos] == b'\n' {
                pos += 1;
                break;
            }

            let line_end = body[pos..]
                .find_byte(b'\n')
                .map(|p| p + pos)
                .unwrap_or(body.len());
            let line = body[pos..line_end].trim_end_with(|c| c == ' ' || c == '\r');

            let space_pos = line.find_byte(b' ').ok_or_else(|| {
                ObjectError::InvalidHeader(format!(
                    "malformed commit header line: {}",
                    line.to_str_lossy()
                ))
            })?;
            let key = &line[..space_pos];
            let value = &line[space_pos + 1..];

            match key {
                b"tree" => {
                    let hex = std::str::from_utf8(value)
                        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 tree OID".into()))?;
                    tree = Some(ObjectId::from_hex(hex)?);
                }
                b"parent" => {
                    let hex = std::str::from_utf8(value)
                        .map_err(|_| ObjectError::InvalidHeader("non-UTF8 parent OID".into()))?;
                    parents.push(ObjectId::from_hex(hex)?);
                }
                b"author" => {
                    author = Some(Signature::parse(BStr::new(value)).map_err(|e| {
                        ObjectError::InvalidIdentity(e.to_string())
                    })?);
                }
                other => {
                    return Err(ObjectError::InvalidHeader(format!(
                        "unknown commit header: {}",
                        other.to_str_lossy()
                    )));
                }
            }

            pos = if line_end < body.len() {
                line_end + 1
            } else {
                line_end
            };
        }

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let author = author.ok_or(ObjectError::MissingCommitField { field: "author" })?;
        let message = BString::from(&body[pos..]);

        Ok(Self {
            tree,
            parents,
            author,
            message,
        })
    }

    /// Serialize commit body to bytes (no object header).
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');

        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }

        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.to_bytes());
        out.push(b'\n');

        out.push(b'\n');
        out.extend_from_slice(&self.message);

        out
    }

    /// Get the first parent (or None for root commits).
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// Is this a merge commit? (more than one parent)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Is this a root commit? (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Get just the summary (first line) of the message.
    pub fn summary(&self) -> &BStr {
        let msg: &[u8] = self.message.as_ref();
        match msg.find_byte(b'\n') {
            Some(pos) => BStr::new(&msg[..pos]),
            None => BStr::new(msg),
        }
    }
}
