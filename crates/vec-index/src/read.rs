//! Index file parsing.

use bstr::BString;
use vec_hash::{Hasher, ObjectId, DIGEST_LEN};

use crate::entry::IndexEntry;
use crate::write::{FORMAT_VERSION, INDEX_SIGNATURE};
use crate::{Index, IndexError, Stage};

/// Parse the binary index format (see `write.rs` for the layout).
pub fn parse_index(data: &[u8]) -> Result<Index, IndexError> {
    if data.len() < 12 + DIGEST_LEN {
        return Err(IndexError::InvalidHeader("file too small".into()));
    }

    if &data[0..4] != INDEX_SIGNATURE {
        return Err(IndexError::InvalidHeader("bad signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;

    // Trailer first: nothing in the body is trusted until the hash checks out.
    let body = &data[..data.len() - DIGEST_LEN];
    let stored = ObjectId::from_bytes(&data[data.len() - DIGEST_LEN..])
        .map_err(|_| IndexError::ChecksumMismatch)?;
    if Hasher::digest(body) != stored {
        return Err(IndexError::ChecksumMismatch);
    }

    let mut entries = Vec::with_capacity(entry_count);
    let mut pos = 12;

    for _ in 0..entry_count {
        let entry_start = pos;

        let need = |pos: usize, n: usize| -> Result<(), IndexError> {
            if pos + n > body.len() {
                Err(IndexError::InvalidEntry {
                    offset: pos,
                    reason: "truncated entry".into(),
                })
            } else {
                Ok(())
            }
        };

        need(pos, 2)?;
        let path_len = u16::from_be_bytes([body[pos], body[pos + 1]]) as usize;
        pos += 2;

        need(pos, path_len)?;
        let path = BString::from(&body[pos..pos + path_len]);
        pos += path_len;

        need(pos, 4 + DIGEST_LEN + 8 + 8 + 1)?;
        let mode = u32::from_be_bytes(body[pos..pos + 4].try_into().expect("4 bytes"));
        pos += 4;

        let oid = ObjectId::from_bytes(&body[pos..pos + DIGEST_LEN]).map_err(|_| {
            IndexError::InvalidEntry {
                offset: pos,
                reason: "bad hash".into(),
            }
        })?;
        pos += DIGEST_LEN;

        let size = i64::from_be_bytes(body[pos..pos + 8].try_into().expect("8 bytes"));
        pos += 8;
        let mtime_ns = i64::from_be_bytes(body[pos..pos + 8].try_into().expect("8 bytes"));
        pos += 8;

        let stage = Stage::from_u8(body[pos])?;
        pos += 1;

        // Zero padding to the next 4-byte boundary.
        let entry_len = pos - entry_start;
        let padded = (entry_len + 3) & !3;
        let pad = padded - entry_len;
        need(pos, pad)?;
        if body[pos..pos + pad].iter().any(|&b| b != 0) {
            return Err(IndexError::InvalidEntry {
                offset: pos,
                reason: "nonzero padding".into(),
            });
        }
        pos += pad;

        entries.push(IndexEntry {
            path,
            oid,
            mode,
            size,
            mtime_ns,
            stage,
        });
    }

    if pos != body.len() {
        return Err(IndexError::InvalidHeader(format!(
            "{} trailing bytes after {} entries",
            body.len() - pos,
            entry_count
        )));
    }

    // Entries must arrive sorted by (path, stage) with no duplicates.
    for pair in entries.windows(2) {
        let key = |e: &IndexEntry| (e.path.clone(), e.stage.as_u8());
        if key(&pair[0]) >= key(&pair[1]) {
            return Err(IndexError::InvalidEntry {
                offset: 0,
                reason: format!(
                    "entries out of order: '{}' then '{}'",
                    pair[0].path, pair[1].path
                ),
            });
        }
    }

    let mut index = Index::new();
    index.set_entries(entries);
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::serialize_index;
    use bstr::BStr;

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn sample_index() -> Index {
        let mut idx = Index::new();
        idx.add(IndexEntry::staged("src/main.rs", oid(1), 0o100644, 120, 999));
        idx.add(IndexEntry::staged("README.md", oid(2), 0o100644, 64, 888));
        idx.add_conflict(IndexEntry::conflict("conflicted", oid(3), 0o100644, Stage::Base));
        idx.add_conflict(IndexEntry::conflict("conflicted", oid(4), 0o100644, Stage::Ours));
        idx.add_conflict(IndexEntry::conflict("conflicted", oid(5), 0o100644, Stage::Theirs));
        idx
    }

    #[test]
    fn roundtrip() {
        let idx = sample_index();
        let data = serialize_index(&idx);
        let parsed = parse_index(&data).unwrap();

        assert_eq!(parsed.len(), idx.len());
        let entry = parsed.get(BStr::new("src/main.rs"), Stage::Normal).unwrap();
        assert_eq!(entry.oid, oid(1));
        assert_eq!(entry.size, 120);
        assert_eq!(entry.mtime_ns, 999);
        assert_eq!(parsed.conflicts().len(), 1);
    }

    #[test]
    fn corrupt_trailer_rejected() {
        let data = {
            let mut d = serialize_index(&sample_index());
            let last = d.len() - 1;
            d[last] ^= 0xFF;
            d
        };
        assert!(matches!(
            parse_index(&data),
            Err(IndexError::ChecksumMismatch)
        ));
    }

    #[test]
    fn corrupt_body_rejected() {
        let mut data = serialize_index(&sample_index());
        data[20] ^= 0xFF;
        assert!(matches!(
            parse_index(&data),
            Err(IndexError::ChecksumMismatch)
        ));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut data = serialize_index(&Index::new());
        data[7] = 99;
        // Fix the checksum so only the version check can fire.
        let body_len = data.len() - DIGEST_LEN;
        let checksum = Hasher::digest(&data[..body_len]);
        data.truncate(body_len);
        data.extend_from_slice(checksum.as_bytes());
        assert!(matches!(
            parse_index(&data),
            Err(IndexError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn empty_index_roundtrip() {
        let data = serialize_index(&Index::new());
        let parsed = parse_index(&data).unwrap();
        assert!(parsed.is_empty());
    }
}
