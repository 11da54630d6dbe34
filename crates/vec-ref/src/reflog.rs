//! Append-only reflogs.
//!
//! One log for HEAD and one per branch, under `logs/` in the metadata
//! directory. Line format:
//!
//! ```text
//! <old-hex> <new-hex> <name> <email> <unix-ts>\t<action>[: <detail>]\n
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice, ByteVec};
use vec_hash::{ObjectId, HEX_LEN};
use vec_utils::date::Signature;

use crate::name::RefName;
use crate::RefError;

/// A single reflog entry recording a ref value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old_oid: ObjectId,
    pub new_oid: ObjectId,
    pub identity: Signature,
    pub message: BString,
}

impl ReflogEntry {
    /// Build an entry with an `action[: detail]` message.
    pub fn new(
        old_oid: ObjectId,
        new_oid: ObjectId,
        identity: Signature,
        action: &str,
        detail: Option<&str>,
    ) -> Self {
        let message = match detail {
            Some(d) => BString::from(format!("{action}: {d}")),
            None => BString::from(action),
        };
        Self {
            old_oid,
            new_oid,
            identity,
            message,
        }
    }

    /// Parse a reflog entry from a single line.
    pub fn parse(line: &BStr) -> Result<Self, RefError> {
        let line = line.as_bytes();

        // Two hex OIDs plus separating spaces.
        if line.len() < 2 * HEX_LEN + 2 {
            return Err(RefError::Parse(format!(
                "reflog line too short: {} bytes",
                line.len()
            )));
        }

        let old_hex = std::str::from_utf8(&line[..HEX_LEN])
            .map_err(|_| RefError::Parse("invalid UTF-8 in old hash".into()))?;
        let old_oid = ObjectId::from_hex(old_hex)?;

        if line[HEX_LEN] != b' ' {
            return Err(RefError::Parse("expected space after old hash".into()));
        }

        let new_hex = std::str::from_utf8(&line[HEX_LEN + 1..2 * HEX_LEN + 1])
            .map_err(|_| RefError::Parse("invalid UTF-8 in new hash".into()))?;
        let new_oid = ObjectId::from_hex(new_hex)?;

        if line[2 * HEX_LEN + 1] != b' ' {
            return Err(RefError::Parse("expected space after new hash".into()));
        }

        // Rest is: identity \t message
        let rest = &line[2 * HEX_LEN + 2..];
        let (identity_part, message) = match rest.find_byte(b'\t') {
            Some(tab_pos) => (&rest[..tab_pos], &rest[tab_pos + 1..]),
            None => (rest, &b""[..]),
        };

        let identity = Signature::parse(identity_part.as_bstr())
            .map_err(|e| RefError::Parse(format!("invalid identity in reflog: {e}")))?;

        let message = message.strip_suffix(b"\n").unwrap_or(message);

        Ok(Self {
            old_oid,
            new_oid,
            identity,
            message: BString::from(message),
        })
    }

    /// Serialize to the reflog line format (without trailing newline).
    pub fn to_bytes(&self) -> BString {
        let mut out = BString::from(Vec::with_capacity(256));
        out.push_str(self.old_oid.to_hex().as_bytes());
        out.push(b' ');
        out.push_str(self.new_oid.to_hex().as_bytes());
        out.push(b' ');
        out.push_str(&self.identity.to_bytes());
        out.push(b'\t');
        out.push_str(&self.message);
        out
    }
}

/// Reflog file path for a ref.
pub fn reflog_path(vec_dir: &Path, name: &RefName) -> PathBuf {
    vec_dir.join("logs").join(name.as_str())
}

/// Read all reflog entries for a ref, newest first.
pub fn read_reflog(vec_dir: &Path, name: &RefName) -> Result<Vec<ReflogEntry>, RefError> {
    let path = reflog_path(vec_dir, name);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read(&path).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;

    let mut entries = Vec::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        entries.push(ReflogEntry::parse(line.as_bstr())?);
    }

    // The file is oldest first.
    entries.reverse();
    Ok(entries)
}

/// Append a reflog entry for a ref. The log directory is created lazily.
pub fn append_reflog(
    vec_dir: &Path,
    name: &RefName,
    entry: &ReflogEntry,
) -> Result<(), RefError> {
    let path = reflog_path(vec_dir, name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut line = entry.to_bytes();
    line.push(b'\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| RefError::IoPath {
            path: path.clone(),
            source: e,
        })?;
    file.write_all(&line).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;

    Ok(())
}

/// All OIDs mentioned by any reflog with a timestamp inside the grace
/// window (`None` = no cutoff). Used as extra GC roots.
pub fn reflog_oids(
    vec_dir: &Path,
    names: &[RefName],
    not_before: Option<i64>,
) -> Result<Vec<ObjectId>, RefError> {
    let mut oids = Vec::new();
    for name in names {
        for entry in read_reflog(vec_dir, name)? {
            if let Some(cutoff) = not_before {
                if entry.identity.when < cutoff {
                    continue;
                }
            }
            if !entry.old_oid.is_null() {
                oids.push(entry.old_oid);
            }
            if !entry.new_oid.is_null() {
                oids.push(entry.new_oid);
            }
        }
    }
    oids.sort();
    oids.dedup();
    Ok(oids)
}
