//! Pack integrity verification.
//!
//! Recomputes the trailer checksum, the per-entry CRCs recorded in the
//! index, and every object's OID. Any disagreement is an error; callers
//! quarantine the pack rather than continue with it.

use vec_hash::{Hasher, ObjectId};
use vec_utils::CancelToken;

use crate::pack::PackFile;
use crate::{PackEntryKind, PackError, PACK_TRAILER_LEN};

/// Statistics from a successful verification.
#[derive(Debug, Default)]
pub struct VerifyStats {
    pub num_objects: u32,
    pub num_deltas: u32,
    pub max_chain_depth: usize,
}

/// Fully verify a pack against its index.
pub fn verify_pack(pack: &PackFile, cancel: &CancelToken) -> Result<VerifyStats, PackError> {
    // 1. Trailer: SHA-256 of everything before it.
    let data = pack.data();
    let body = &data[..data.len() - PACK_TRAILER_LEN];
    let actual = Hasher::digest(body);
    let stored = pack.trailer();
    if actual != stored {
        return Err(PackError::ChecksumMismatch {
            expected: stored.to_hex(),
            actual: actual.to_hex(),
        });
    }

    // 2. The index's own checksum.
    pack.index().verify_checksum()?;

    let mut stats = VerifyStats {
        num_objects: pack.num_objects(),
        ..Default::default()
    };

    // 3. Every entry: CRC over the raw entry bytes, then full resolution
    //    and OID recomputation.
    let records: Vec<(ObjectId, u64)> = pack.index().iter().collect();
    let mut sorted_offsets: Vec<u64> = records.iter().map(|(_, off)| *off).collect();
    sorted_offsets.sort_unstable();

    for (i, (oid, offset)) in records.iter().enumerate() {
        cancel.check()?;

        let entry = pack.entry_at(*offset)?;
        if matches!(
            entry.kind,
            PackEntryKind::OfsDelta { .. } | PackEntryKind::RefDelta { .. }
        ) {
            stats.num_deltas += 1;
        }

        // The raw entry spans from its offset to the next entry (or the
        // trailer). CRC covers header + base reference + compressed payload.
        let end = next_offset(&sorted_offsets, *offset)
            .unwrap_or((data.len() - PACK_TRAILER_LEN) as u64);
        let mut crc = crc32fast::Hasher::new();
        crc.update(&data[*offset as usize..end as usize]);
        let actual_crc = crc.finalize();
        if actual_crc != pack.index().crc32_at(i) {
            return Err(PackError::CorruptEntry(*offset));
        }

        let obj = pack.read_at_offset(*offset)?;
        let actual_oid = Hasher::hash_object(obj.kind.as_str(), &obj.data);
        if actual_oid != *oid {
            return Err(PackError::ObjectHashMismatch {
                oid: *oid,
                actual: actual_oid,
            });
        }

        stats.max_chain_depth = stats.max_chain_depth.max(chain_depth(pack, *offset)?);
    }

    Ok(stats)
}

/// The offset of the entry that follows `offset`, if any.
fn next_offset(sorted_offsets: &[u64], offset: u64) -> Option<u64> {
    match sorted_offsets.binary_search(&offset) {
        Ok(pos) => sorted_offsets.get(pos + 1).copied(),
        Err(_) => None,
    }
}

/// Length of the delta chain below the entry at `offset`.
fn chain_depth(pack: &PackFile, offset: u64) -> Result<usize, PackError> {
    let mut depth = 0;
    let mut current = offset;
    loop {
        let entry = pack.entry_at(current)?;
        match entry.kind {
            PackEntryKind::OfsDelta { base_offset } => {
                depth += 1;
                current = base_offset;
            }
            PackEntryKind::RefDelta { base_oid } => {
                depth += 1;
                match pack.index().lookup(&base_oid) {
                    Some(base_offset) => current = base_offset,
                    None => return Ok(depth),
                }
            }
            _ => return Ok(depth),
        }
        if depth > crate::MAX_DELTA_DEPTH {
            return Err(PackError::DeltaChainTooDeep {
                offset,
                max_depth: crate::MAX_DELTA_DEPTH,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::write_pack;
    use vec_object::ObjectKind;

    fn blob(content: &[u8]) -> (ObjectId, ObjectKind, Vec<u8>) {
        (
            Hasher::hash_object("blob", content),
            ObjectKind::Blob,
            content.to_vec(),
        )
    }

    #[test]
    fn verify_clean_pack() {
        let dir = tempfile::tempdir().unwrap();
        let base: Vec<u8> = (0..1024).map(|i| (i % 97) as u8).collect();
        let mut near = base.clone();
        near[10] = 0xEE;
        let objects = vec![blob(&base), blob(&near), blob(b"unrelated")];

        let result = write_pack(dir.path(), &objects, &CancelToken::new()).unwrap();
        let pack = PackFile::open(&result.pack_path).unwrap();

        let stats = verify_pack(&pack, &CancelToken::new()).unwrap();
        assert_eq!(stats.num_objects, 3);
        assert_eq!(stats.num_deltas, 1);
        assert_eq!(stats.max_chain_depth, 1);
    }

    #[test]
    fn corrupted_trailer_detected() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            write_pack(dir.path(), &[blob(b"payload")], &CancelToken::new()).unwrap();

        let mut data = std::fs::read(&result.pack_path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        std::fs::write(&result.pack_path, &data).unwrap();

        // The trailer no longer matches the index's copy, so open fails;
        // if the index copy were also stale, verify would catch it.
        assert!(PackFile::open(&result.pack_path).is_err());
    }

    #[test]
    fn corrupted_payload_detected() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_pack(
            dir.path(),
            &[blob(b"a somewhat longer payload so zlib has room")],
            &CancelToken::new(),
        )
        .unwrap();

        let mut data = std::fs::read(&result.pack_path).unwrap();
        let target = crate::PACK_HEADER_SIZE + 6;
        data[target] ^= 0xFF;
        std::fs::write(&result.pack_path, &data).unwrap();

        let pack = PackFile::open(&result.pack_path).unwrap();
        assert!(verify_pack(&pack, &CancelToken::new()).is_err());
    }
}
