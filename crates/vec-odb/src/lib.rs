//! Unified object database.
//!
//! Provides a single interface to read and write objects across loose
//! storage and packfiles. Writes always land in the loose store; packs are
//! produced by explicit packing (gc). A pack is only honored once both its
//! `.pack` and `.idx` exist; a pack that fails to load is quarantined with
//! a `.bad` suffix rather than silently skipped.

mod prefix;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use lru::LruCache;
use vec_hash::ObjectId;
use vec_loose::LooseStore;
use vec_object::{Object, ObjectKind};
use vec_pack::pack::PackFile;

pub use prefix::resolve_prefix;

/// Capacity of the parsed-object cache.
const OBJECT_CACHE_SIZE: usize = 1024;

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("no object matches prefix '{0}'")]
    PrefixNotFound(String),

    #[error("ambiguous object name: {prefix} matches {count} objects")]
    Ambiguous { prefix: String, count: usize },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("object {oid} is a {actual}, expected {expected}")]
    WrongKind {
        oid: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error(transparent)]
    Loose(#[from] vec_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] vec_pack::PackError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lightweight object info (header only, no content).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub kind: ObjectKind,
    pub size: usize,
}

/// Unified object database over loose and packed storage.
pub struct ObjectDatabase {
    loose: LooseStore,
    /// Open pack files (RwLock so refresh after gc can swap the set).
    packs: RwLock<Vec<PackFile>>,
    /// Parsed-object cache.
    cache: Mutex<LruCache<ObjectId, Object>>,
    objects_dir: PathBuf,
}

impl ObjectDatabase {
    /// Open the object database at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let loose = LooseStore::open(&objects_dir);
        let packs = discover_packs(&objects_dir)?;

        Ok(Self {
            loose,
            packs: RwLock::new(packs),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(OBJECT_CACHE_SIZE).expect("nonzero"),
            )),
            objects_dir,
        })
    }

    /// Read an object by OID (loose first, then every pack).
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(obj) = cache.get(oid) {
                return Ok(Some(obj.clone()));
            }
        }

        let found = self.read_uncached(oid)?;
        if let Some(ref obj) = found {
            let mut cache = self.cache.lock().unwrap();
            cache.put(*oid, obj.clone());
        }
        Ok(found)
    }

    /// Read an object, failing with `NotFound` when absent.
    pub fn read_required(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.read(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    /// Read an object and insist on its kind.
    pub fn read_kind(&self, oid: &ObjectId, expected: ObjectKind) -> Result<Object, OdbError> {
        let obj = self.read_required(oid)?;
        if obj.kind() != expected {
            return Err(OdbError::WrongKind {
                oid: *oid,
                expected,
                actual: obj.kind(),
            });
        }
        Ok(obj)
    }

    fn read_uncached(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(obj) = self.loose.read(oid)? {
            return Ok(Some(obj));
        }

        // One read guard covers the whole search; the ref-delta resolver
        // reuses it rather than re-locking.
        let packs = self.packs.read().unwrap();
        for (i, pack) in packs.iter().enumerate() {
            let resolver = |base: &ObjectId| -> Option<(ObjectKind, Vec<u8>)> {
                if let Ok(Some(obj)) = self.loose.read(base) {
                    return Some((obj.kind(), obj.serialize_body()));
                }
                packs
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .find_map(|(_, other)| match other.read_object(base) {
                        Ok(Some(packed)) => Some((packed.kind, packed.data)),
                        _ => None,
                    })
            };
            if let Some(packed) = pack.read_object_with_resolver(oid, resolver)? {
                let obj = Object::parse_body(packed.kind, &packed.data)?;
                return Ok(Some(obj));
            }
        }

        Ok(None)
    }

    /// Read just the header (kind + size) without materializing the body.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<ObjectInfo>, OdbError> {
        if let Some((kind, size)) = self.loose.read_header(oid)? {
            return Ok(Some(ObjectInfo { kind, size }));
        }
        // Packed entries resolve fully; header-only access is a loose-store
        // optimization.
        if let Some(obj) = self.read(oid)? {
            return Ok(Some(ObjectInfo {
                kind: obj.kind(),
                size: obj.body_size(),
            }));
        }
        Ok(None)
    }

    /// Check if an object exists anywhere.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        if self.loose.contains(oid) {
            return true;
        }
        let packs = self.packs.read().unwrap();
        packs.iter().any(|p| p.contains(oid))
    }

    /// Write a new object (always to the loose store).
    pub fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write(obj)?)
    }

    /// Write raw body bytes with a known kind (always to the loose store).
    pub fn write_raw(&self, kind: ObjectKind, body: &[u8]) -> Result<ObjectId, OdbError> {
        Ok(self.loose.write_raw(kind, body)?)
    }

    /// Resolve a (possibly partial) hex string to a full OID.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId, OdbError> {
        prefix::resolve_prefix(self, prefix)
    }

    /// Re-scan the pack directory (call after gc/repack).
    pub fn refresh(&self) -> Result<(), OdbError> {
        let new_packs = discover_packs(&self.objects_dir)?;
        let mut packs = self.packs.write().unwrap();
        *packs = new_packs;
        self.cache.lock().unwrap().clear();
        Ok(())
    }

    /// Iterate over every known OID, loose and packed (for gc).
    pub fn all_oids(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut oids: Vec<ObjectId> = Vec::new();
        for oid in self.loose.iter()? {
            oids.push(oid?);
        }
        let packs = self.packs.read().unwrap();
        for pack in packs.iter() {
            for (oid, _offset) in pack.index().iter() {
                oids.push(oid);
            }
        }
        oids.sort();
        oids.dedup();
        Ok(oids)
    }

    /// OIDs that live only in the loose store.
    pub fn loose_oids(&self) -> Result<Vec<ObjectId>, OdbError> {
        let mut oids = Vec::new();
        for oid in self.loose.iter()? {
            oids.push(oid?);
        }
        Ok(oids)
    }

    /// Packed OIDs whose raw digest starts with `prefix_bytes`, across
    /// every loaded pack (fanout-bounded, no full scans).
    pub fn packed_prefix_matches(&self, prefix_bytes: &[u8]) -> Vec<ObjectId> {
        let packs = self.packs.read().unwrap();
        let mut out = Vec::new();
        for pack in packs.iter() {
            for (oid, _offset) in pack.index().lookup_prefix(prefix_bytes) {
                out.push(oid);
            }
        }
        out
    }

    /// Paths of all currently loaded packs.
    pub fn pack_paths(&self) -> Vec<PathBuf> {
        let packs = self.packs.read().unwrap();
        packs.iter().map(|p| p.path().to_path_buf()).collect()
    }

    /// OIDs contained in the pack at `path`.
    pub fn pack_contents(&self, path: &Path) -> Vec<ObjectId> {
        let packs = self.packs.read().unwrap();
        packs
            .iter()
            .filter(|p| p.path() == path)
            .flat_map(|p| p.index().iter().map(|(oid, _)| oid))
            .collect()
    }

    /// Access the loose store.
    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// Path to the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Path to the pack directory.
    pub fn pack_dir(&self) -> PathBuf {
        self.objects_dir.join("pack")
    }
}

/// Discover pack files under `objects/pack/`.
///
/// A `.pack` without its `.idx` is skipped: the writer publishes the pack
/// first and the index second, so a lone `.pack` is a write in progress.
/// A pack that exists but fails to load is quarantined (renamed `.bad`).
fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut packs = Vec::new();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&pack_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "pack"))
        .collect();
    paths.sort();

    for path in paths {
        if !path.with_extension("idx").exists() {
            continue;
        }
        match PackFile::open(&path) {
            Ok(pack) => packs.push(pack),
            Err(_) => {
                vec_pack::quarantine(&path)?;
            }
        }
    }

    Ok(packs)
}
