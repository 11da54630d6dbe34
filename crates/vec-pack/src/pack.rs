//! PackFile: reading .pack files.
//!
//! A pack file contains a header, a sequence of compressed entries
//! (possibly deltified), and a trailing SHA-256 checksum over everything
//! before it.

use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::bufread::ZlibDecoder;
use lru::LruCache;
use memmap2::Mmap;
use vec_hash::{Hasher, ObjectId};
use vec_object::ObjectKind;

use crate::entry::{parse_entry_header, PackEntry};
use crate::index::PackIndex;
use crate::{
    PackEntryKind, PackError, PackedObject, MAX_DELTA_DEPTH, PACK_HEADER_SIZE, PACK_SIGNATURE,
    PACK_TRAILER_LEN, PACK_VERSION,
};

/// Capacity of the per-pack delta-base cache.
const BASE_CACHE_SIZE: usize = 64;

/// A memory-mapped packfile with its index.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
    /// Resolved (kind, data) memoized by entry offset. Delta chains revisit
    /// base entries constantly; the cache bounds that cost.
    base_cache: Mutex<LruCache<u64, (ObjectKind, Vec<u8>)>>,
}

impl PackFile {
    /// Open a pack file and its associated index.
    ///
    /// Given a `.pack` file path, opens both the pack and its `.idx` file
    /// and cross-checks the trailer checksum recorded in the index.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < PACK_HEADER_SIZE + PACK_TRAILER_LEN {
            return Err(PackError::InvalidHeader("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let index = PackIndex::open(&idx_path)?;

        if index.num_objects() != num_objects {
            return Err(PackError::InvalidHeader(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        // The index carries a copy of the pack trailer; disagreement means
        // one of the two files is not the one the other was built from.
        let trailer_start = data.len() - PACK_TRAILER_LEN;
        let trailer = ObjectId::from_bytes(&data[trailer_start..])
            .map_err(|_| PackError::InvalidHeader("bad trailer".into()))?;
        if trailer != index.pack_checksum() {
            return Err(PackError::ChecksumMismatch {
                expected: index.pack_checksum().to_hex(),
                actual: trailer.to_hex(),
            });
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
            base_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(BASE_CACHE_SIZE).expect("nonzero"),
            )),
        })
    }

    /// Read an object by OID, verifying that the reconstructed bytes hash
    /// back to the requested OID.
    ///
    /// Returns `None` if the OID is not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        let Some(offset) = self.index.lookup(oid) else {
            return Ok(None);
        };
        let obj = self.read_at_offset(offset)?;

        let actual = Hasher::hash_object(obj.kind.as_str(), &obj.data);
        if actual != *oid {
            return Err(PackError::ObjectHashMismatch { oid: *oid, actual });
        }
        Ok(Some(obj))
    }

    /// Read an object at a known offset in the pack.
    ///
    /// Resolves delta chains iteratively (not recursively) so arbitrary
    /// chain depths cannot overflow the stack.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        self.read_at_offset_with_resolver(offset, |_| None)
    }

    /// Read an object by OID with an external resolver for ref-delta bases
    /// that live outside this pack.
    pub fn read_object_with_resolver(
        &self,
        oid: &ObjectId,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectKind, Vec<u8>)>,
    ) -> Result<Option<PackedObject>, PackError> {
        let Some(offset) = self.index.lookup(oid) else {
            return Ok(None);
        };
        let obj = self.read_at_offset_with_resolver(offset, resolver)?;

        let actual = Hasher::hash_object(obj.kind.as_str(), &obj.data);
        if actual != *oid {
            return Err(PackError::ObjectHashMismatch { oid: *oid, actual });
        }
        Ok(Some(obj))
    }

    fn read_at_offset_with_resolver(
        &self,
        offset: u64,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectKind, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        if let Some((kind, data)) = self.cache_get(offset) {
            return Ok(PackedObject { kind, data });
        }

        // Collect the delta chain (outermost delta first, base last).
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut current_offset = offset;

        for _depth in 0..=MAX_DELTA_DEPTH {
            // A memoized intermediate base terminates the walk early.
            if !chain.is_empty() {
                if let Some((kind, data)) = self.cache_get(current_offset) {
                    return self.resolve_chain(offset, kind, data, &chain);
                }
            }

            let entry = self.entry_at(current_offset)?;
            let decompressed = self.decompress_entry(&entry, current_offset)?;

            match entry.kind {
                PackEntryKind::Commit | PackEntryKind::Tree | PackEntryKind::Blob => {
                    let kind = entry.kind.to_object_kind().expect("non-delta kind");
                    self.cache_put(current_offset, kind, &decompressed);
                    return self.resolve_chain(offset, kind, decompressed, &chain);
                }
                PackEntryKind::OfsDelta { base_offset } => {
                    chain.push(decompressed);
                    current_offset = base_offset;
                }
                PackEntryKind::RefDelta { base_oid } => {
                    chain.push(decompressed);
                    if let Some(base_offset) = self.index.lookup(&base_oid) {
                        current_offset = base_offset;
                    } else if let Some((kind, base_data)) = resolver(&base_oid) {
                        return self.resolve_chain(offset, kind, base_data, &chain);
                    } else {
                        return Err(PackError::MissingBase(base_oid));
                    }
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_DELTA_DEPTH,
        })
    }

    /// Apply a collected delta chain to its base and memoize the result.
    fn resolve_chain(
        &self,
        offset: u64,
        kind: ObjectKind,
        base: Vec<u8>,
        chain: &[Vec<u8>],
    ) -> Result<PackedObject, PackError> {
        let mut data = base;
        for delta in chain.iter().rev() {
            data = crate::delta::apply_delta(&data, delta)?;
        }
        self.cache_put(offset, kind, &data);
        Ok(PackedObject { kind, data })
    }

    /// Parse the entry header at an offset.
    pub(crate) fn entry_at(&self, offset: u64) -> Result<PackEntry, PackError> {
        let start = offset as usize;
        if start >= self.data.len() - PACK_TRAILER_LEN {
            return Err(PackError::CorruptEntry(offset));
        }
        parse_entry_header(&self.data[start..], offset)
    }

    /// Decompress an entry's payload, validating the declared size.
    pub(crate) fn decompress_entry(
        &self,
        entry: &PackEntry,
        offset: u64,
    ) -> Result<Vec<u8>, PackError> {
        let compressed = &self.data[entry.data_offset as usize..];
        let mut decoder = ZlibDecoder::new(compressed);
        let mut buf = Vec::with_capacity(entry.uncompressed_size);
        decoder
            .read_to_end(&mut buf)
            .map_err(|_| PackError::CorruptEntry(offset))?;
        if buf.len() != entry.uncompressed_size {
            return Err(PackError::CorruptEntry(offset));
        }
        Ok(buf)
    }

    /// Check if this pack contains the given OID.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.lookup(oid).is_some()
    }

    /// Number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The pack index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Path to the .pack file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// The raw memory-mapped pack bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The trailer checksum stored at the end of the pack.
    pub fn trailer(&self) -> ObjectId {
        let start = self.data.len() - PACK_TRAILER_LEN;
        ObjectId::from_bytes(&self.data[start..]).expect("trailer is 32 bytes")
    }

    fn cache_get(&self, offset: u64) -> Option<(ObjectKind, Vec<u8>)> {
        let mut cache = self.base_cache.lock().unwrap();
        cache.get(&offset).cloned()
    }

    fn cache_put(&self, offset: u64, kind: ObjectKind, data: &[u8]) {
        let mut cache = self.base_cache.lock().unwrap();
        cache.put(offset, (kind, data.to_vec()));
    }
}
