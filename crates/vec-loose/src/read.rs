use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use vec_hash::{Hasher, ObjectId};
use vec_object::{header, Object, ObjectKind};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Check if a loose object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read a loose object by OID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` if the object exists but is corrupt.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, LooseError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let decompressed = decompress_all(&compressed, oid)?;
        let obj = Object::parse(&decompressed)?;
        Ok(Some(obj))
    }

    /// Read just the header (kind + size) without parsing the full body.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectKind, usize)>, LooseError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        // Decompress just enough to read "<kind> <size>\0". Headers are
        // well under 32 bytes, so 64 is plenty of room.
        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut buf = [0u8; 64];
        let mut filled = 0;

        loop {
            if filled >= buf.len() {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "header exceeds 64 bytes".into(),
                });
            }
            let n = decoder
                .read(&mut buf[filled..])
                .map_err(|e| LooseError::Decompress {
                    oid: oid.to_hex(),
                    source: e,
                })?;
            if n == 0 {
                return Err(LooseError::Corrupt {
                    oid: oid.to_hex(),
                    reason: "unexpected EOF before header null terminator".into(),
                });
            }
            filled += n;
            if buf[..filled].contains(&0) {
                break;
            }
        }

        let (kind, body_size, _header_len) = header::parse_header(&buf[..filled])?;
        Ok(Some((kind, body_size)))
    }

    /// Read a loose object and verify its hash matches the expected OID.
    pub fn read_verified(&self, oid: &ObjectId) -> Result<Option<Object>, LooseError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let decompressed = decompress_all(&compressed, oid)?;

        let actual_oid = Hasher::digest(&decompressed);
        if actual_oid != *oid {
            return Err(LooseError::HashMismatch {
                path,
                expected: oid.to_hex(),
                actual: actual_oid.to_hex(),
            });
        }

        let obj = Object::parse(&decompressed)?;
        Ok(Some(obj))
    }

    /// Remove a loose object file. Missing objects are a no-op.
    pub fn remove(&self, oid: &ObjectId) -> Result<(), LooseError> {
        let path = self.object_path(oid);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(_) => {
                // Object files are stored read-only; restore the write bit
                // and retry once before giving up.
                if let Ok(meta) = fs::metadata(&path) {
                    let mut perms = meta.permissions();
                    #[allow(clippy::permissions_set_readonly_false)]
                    perms.set_readonly(false);
                    let _ = fs::set_permissions(&path, perms);
                }
                fs::remove_file(&path)?;
            }
        }
        self.prune_fanout_dir(oid)
    }

    /// Remove the fan-out directory if the deleted object was its last entry.
    fn prune_fanout_dir(&self, oid: &ObjectId) -> Result<(), LooseError> {
        if let Some(parent) = self.object_path(oid).parent() {
            if parent
                .read_dir()
                .map(|mut e| e.next().is_none())
                .unwrap_or(false)
            {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }
}

/// Zlib-decompress the full contents of a loose object file.
fn decompress_all(compressed: &[u8], oid: &ObjectId) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LooseError::Decompress {
            oid: oid.to_hex(),
            source: e,
        })?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec_object::Blob;

    #[test]
    fn read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = ObjectId::NULL;
        assert!(store.read(&oid).unwrap().is_none());
        assert!(store.read_header(&oid).unwrap().is_none());
    }

    #[test]
    fn read_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = store
            .write(&Object::Blob(Blob::new(b"twelve bytes".as_slice())))
            .unwrap();

        let (kind, size) = store.read_header(&oid).unwrap().unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(size, 12);
    }

    #[test]
    fn corrupt_object_is_an_error_not_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = store
            .write(&Object::Blob(Blob::new(b"payload".as_slice())))
            .unwrap();

        // Truncate the stored file so decompression fails.
        let path = store.object_path(&oid);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        }
        fs::write(&path, b"not zlib at all").unwrap();

        assert!(store.read(&oid).is_err());
    }

    #[test]
    fn read_verified_detects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = store
            .write(&Object::Blob(Blob::new(b"original".as_slice())))
            .unwrap();

        // Store a valid object under the wrong name.
        let other = store
            .write(&Object::Blob(Blob::new(b"impostor".as_slice())))
            .unwrap();
        let oid_path = store.object_path(&oid);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&oid_path, fs::Permissions::from_mode(0o644)).unwrap();
        }
        fs::copy(store.object_path(&other), &oid_path).unwrap();

        assert!(matches!(
            store.read_verified(&oid),
            Err(LooseError::HashMismatch { .. })
        ));
    }

    #[test]
    fn remove_then_gone() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = store
            .write(&Object::Blob(Blob::new(b"to be removed".as_slice())))
            .unwrap();
        assert!(store.contains(&oid));

        store.remove(&oid).unwrap();
        assert!(!store.contains(&oid));

        // Removing again is a no-op.
        store.remove(&oid).unwrap();
    }
}
