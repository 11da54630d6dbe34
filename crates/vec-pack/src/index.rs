//! Pack index reading and lookup.
//!
//! The index provides fast OID → offset mapping using a fan-out table and
//! binary search. Format:
//!
//! ```text
//! Header:  "VIDX" | version (u32) | object count (u32)
//! Fanout:  256 × u32 big-endian cumulative counts by first OID byte
//! Records: N × (oid: 32 bytes | offset: u64 | crc32: u32), sorted by OID
//! Trailer: 32-byte pack checksum | 32-byte index checksum
//! ```

use std::path::{Path, PathBuf};

use memmap2::Mmap;
use vec_hash::{Hasher, ObjectId, DIGEST_LEN};

use crate::{PackError, IDX_RECORD_LEN, IDX_SIGNATURE, IDX_VERSION};

const HEADER_LEN: usize = 12;
const FANOUT_LEN: usize = 256 * 4;

/// Pack index providing OID → offset mapping.
pub struct PackIndex {
    data: Mmap,
    version: u32,
    num_objects: u32,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open a pack index file and validate its structure.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < HEADER_LEN + FANOUT_LEN + 2 * DIGEST_LEN {
            return Err(PackError::InvalidIndex("file too small".into()));
        }
        if &data[0..4] != IDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            )));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let expected_len = HEADER_LEN
            + FANOUT_LEN
            + num_objects as usize * IDX_RECORD_LEN
            + 2 * DIGEST_LEN;
        if data.len() != expected_len {
            return Err(PackError::InvalidIndex(format!(
                "file size {} does not match {} objects",
                data.len(),
                num_objects
            )));
        }

        let index = Self {
            data,
            version,
            num_objects,
            idx_path,
        };

        // The last fanout bucket must agree with the object count.
        if index.fanout_entry(255) != num_objects {
            return Err(PackError::InvalidIndex(
                "fanout table disagrees with object count".into(),
            ));
        }

        Ok(index)
    }

    /// Look up an OID, returning the offset in the pack file.
    pub fn lookup(&self, oid: &ObjectId) -> Option<u64> {
        let (lo, hi) = self.fanout_range(oid.first_byte());
        if lo >= hi {
            return None;
        }
        let target = oid.as_bytes();

        let mut low = lo;
        let mut high = hi;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(target.as_slice()) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Some(self.offset_at(mid)),
            }
        }
        None
    }

    /// Look up by OID prefix bytes, returning all matches as (OID, offset) pairs.
    pub fn lookup_prefix(&self, prefix: &[u8]) -> Vec<(ObjectId, u64)> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let (lo, hi) = self.fanout_range(prefix[0]);

        let mut results = Vec::new();
        for i in lo..hi {
            let oid_bytes = self.oid_bytes_at(i);
            if oid_bytes[..prefix.len().min(DIGEST_LEN)] == *prefix {
                if let Ok(oid) = ObjectId::from_bytes(oid_bytes) {
                    results.push((oid, self.offset_at(i)));
                }
            }
        }
        results
    }

    /// Get the OID at the given sorted record position.
    pub fn oid_at(&self, index: u32) -> ObjectId {
        ObjectId::from_bytes(self.oid_bytes_at(index as usize)).expect("valid OID in index")
    }

    /// Get the pack file offset at the given sorted record position.
    pub fn offset_at(&self, index: usize) -> u64 {
        let pos = self.record_pos(index) + DIGEST_LEN;
        u64::from_be_bytes(self.data[pos..pos + 8].try_into().expect("8 bytes"))
    }

    /// Get the CRC32 at the given sorted record position.
    pub fn crc32_at(&self, index: usize) -> u32 {
        let pos = self.record_pos(index) + DIGEST_LEN + 8;
        u32::from_be_bytes(self.data[pos..pos + 4].try_into().expect("4 bytes"))
    }

    /// Total number of objects in this index.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Index format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Path to the .idx file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// Pack checksum copied into the index trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        let start = self.data.len() - 2 * DIGEST_LEN;
        ObjectId::from_bytes(&self.data[start..start + DIGEST_LEN])
            .expect("valid checksum in index trailer")
    }

    /// The index's own trailing checksum.
    pub fn index_checksum(&self) -> ObjectId {
        let start = self.data.len() - DIGEST_LEN;
        ObjectId::from_bytes(&self.data[start..]).expect("valid checksum in index trailer")
    }

    /// Recompute the index checksum and compare against the stored one.
    pub fn verify_checksum(&self) -> Result<(), PackError> {
        let body = &self.data[..self.data.len() - DIGEST_LEN];
        let actual = Hasher::digest(body);
        let stored = self.index_checksum();
        if actual != stored {
            return Err(PackError::ChecksumMismatch {
                expected: stored.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(())
    }

    /// Iterate over all (OID, offset) pairs in sorted order.
    pub fn iter(&self) -> PackIndexIter<'_> {
        PackIndexIter {
            index: self,
            pos: 0,
        }
    }

    /// Fan-out range for a first byte: (start, end) record positions.
    fn fanout_range(&self, first_byte: u8) -> (usize, usize) {
        let end = self.fanout_entry(first_byte) as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fanout_entry(first_byte - 1) as usize
        };
        (start, end)
    }

    fn fanout_entry(&self, index: u8) -> u32 {
        let pos = HEADER_LEN + index as usize * 4;
        u32::from_be_bytes(self.data[pos..pos + 4].try_into().expect("4 bytes"))
    }

    fn record_pos(&self, index: usize) -> usize {
        HEADER_LEN + FANOUT_LEN + index * IDX_RECORD_LEN
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let pos = self.record_pos(index);
        &self.data[pos..pos + DIGEST_LEN]
    }
}

/// Iterator over (OID, offset) pairs in a pack index.
pub struct PackIndexIter<'a> {
    index: &'a PackIndex,
    pos: u32,
}

impl Iterator for PackIndexIter<'_> {
    type Item = (ObjectId, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.index.num_objects {
            return None;
        }
        let oid = self.index.oid_at(self.pos);
        let offset = self.index.offset_at(self.pos as usize);
        self.pos += 1;
        Some((oid, offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.index.num_objects - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PackIndexIter<'_> {}

/// Serialize a pack index from entries and the pack checksum.
///
/// `entries` is sorted by OID in place.
pub fn serialize_index(
    entries: &mut [(ObjectId, u64, u32)],
    pack_checksum: &ObjectId,
) -> Vec<u8> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::with_capacity(
        HEADER_LEN + FANOUT_LEN + entries.len() * IDX_RECORD_LEN + 2 * DIGEST_LEN,
    );

    buf.extend_from_slice(IDX_SIGNATURE);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    let mut fanout = [0u32; 256];
    for (oid, _, _) in entries.iter() {
        fanout[oid.first_byte() as usize] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        buf.extend_from_slice(&count.to_be_bytes());
    }

    for (oid, offset, crc) in entries.iter() {
        buf.extend_from_slice(oid.as_bytes());
        buf.extend_from_slice(&offset.to_be_bytes());
        buf.extend_from_slice(&crc.to_be_bytes());
    }

    buf.extend_from_slice(pack_checksum.as_bytes());

    let idx_checksum = Hasher::digest(&buf);
    buf.extend_from_slice(idx_checksum.as_bytes());

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_oid(first_byte: u8, suffix: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[0] = first_byte;
        bytes[31] = suffix;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn write_index(dir: &Path, entries: &[(ObjectId, u64, u32)]) -> PathBuf {
        let mut entries = entries.to_vec();
        let data = serialize_index(&mut entries, &ObjectId::NULL);
        let path = dir.join("test.idx");
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn open_and_lookup_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = make_oid(0xab, 0x01);
        let path = write_index(dir.path(), &[(oid, 12, 0xdeadbeef)]);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 1);
        assert_eq!(idx.version(), 1);
        assert_eq!(idx.lookup(&oid), Some(12));
        assert_eq!(idx.crc32_at(0), 0xdeadbeef);

        let missing = make_oid(0xab, 0x02);
        assert_eq!(idx.lookup(&missing), None);
    }

    #[test]
    fn lookup_multiple_objects() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x00, 0x01), 100, 0x111),
            (make_oid(0x00, 0x02), 200, 0x222),
            (make_oid(0x0a, 0x01), 300, 0x333),
            (make_oid(0xff, 0x01), 400, 0x444),
        ];
        let path = write_index(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 4);
        for (oid, offset, _) in &entries {
            assert_eq!(idx.lookup(oid), Some(*offset));
        }
    }

    #[test]
    fn records_come_back_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0xff, 0x01), 100, 0),
            (make_oid(0x00, 0x01), 200, 0),
            (make_oid(0x55, 0x01), 300, 0),
        ];
        let path = write_index(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.oid_at(0), make_oid(0x00, 0x01));
        assert_eq!(idx.oid_at(1), make_oid(0x55, 0x01));
        assert_eq!(idx.oid_at(2), make_oid(0xff, 0x01));
    }

    #[test]
    fn large_offsets_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let big: u64 = 5 * 1024 * 1024 * 1024; // past the u32 range
        let oid = make_oid(0x42, 0x01);
        let path = write_index(dir.path(), &[(oid, big, 0)]);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.lookup(&oid), Some(big));
    }

    #[test]
    fn iterator_yields_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x01, 0x01), 100, 0),
            (make_oid(0x02, 0x01), 200, 0),
            (make_oid(0x03, 0x01), 300, 0),
        ];
        let path = write_index(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        let items: Vec<_> = idx.iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].0, make_oid(0x01, 0x01));
        assert_eq!(items[0].1, 100);
    }

    #[test]
    fn lookup_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0xab, 0x01), 100, 0),
            (make_oid(0xab, 0x02), 200, 0),
            (make_oid(0xac, 0x01), 300, 0),
        ];
        let path = write_index(dir.path(), &entries);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.lookup_prefix(&[0xab]).len(), 2);
        assert_eq!(idx.lookup_prefix(&[0xac]).len(), 1);
        assert_eq!(idx.lookup_prefix(&[0x01]).len(), 0);
    }

    #[test]
    fn empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[]);

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 0);
        assert_eq!(idx.lookup(&make_oid(0x00, 0x00)), None);
        assert_eq!(idx.iter().count(), 0);
    }

    #[test]
    fn checksum_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[(make_oid(0x10, 1), 50, 7)]);
        let idx = PackIndex::open(&path).unwrap();
        idx.verify_checksum().unwrap();
    }

    #[test]
    fn truncated_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[(make_oid(0x10, 1), 50, 7)]);
        let mut data = std::fs::read(&path).unwrap();
        data.truncate(data.len() - 10);
        std::fs::write(&path, &data).unwrap();
        assert!(PackIndex::open(&path).is_err());
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &[]);
        let mut data = std::fs::read(&path).unwrap();
        data[0] = b'X';
        std::fs::write(&path, &data).unwrap();
        assert!(PackIndex::open(&path).is_err());
    }
}
