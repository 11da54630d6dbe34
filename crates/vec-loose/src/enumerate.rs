use std::fs;
use std::path::PathBuf;

use vec_hash::{hex, ObjectId};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Iterate over all loose object OIDs.
    pub fn iter(&self) -> Result<LooseObjectIter, LooseError> {
        Ok(LooseObjectIter {
            objects_dir: self.objects_dir().to_path_buf(),
            fanout_dirs: read_fanout_dirs(self)?,
            current_files: Vec::new(),
        })
    }

    /// Find all loose OIDs whose hex form starts with `prefix`.
    ///
    /// Only the fan-out directory named by the first two hex digits is
    /// scanned, so this is cheap even for large stores.
    pub fn find_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>, LooseError> {
        let prefix = prefix.to_ascii_lowercase();
        if prefix.len() < 2 {
            return Ok(Vec::new());
        }
        let dir = self.objects_dir().join(&prefix[..2]);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(rest) = name.to_str() else { continue };
            let full_hex = format!("{}{}", &prefix[..2], rest);
            if full_hex.len() == vec_hash::HEX_LEN
                && full_hex.starts_with(&prefix)
                && hex::is_hex(&full_hex)
            {
                if let Ok(oid) = ObjectId::from_hex(&full_hex) {
                    matches.push(oid);
                }
            }
        }
        Ok(matches)
    }
}

/// Collect the two-hex-digit fan-out directory names, sorted.
fn read_fanout_dirs(store: &LooseStore) -> Result<Vec<String>, LooseError> {
    let mut dirs = Vec::new();
    let entries = match fs::read_dir(store.objects_dir()) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
        Err(e) => return Err(LooseError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.len() == 2 && hex::is_hex(name) && entry.path().is_dir() {
            dirs.push(name.to_string());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Iterator over loose object OIDs, one fan-out directory at a time.
pub struct LooseObjectIter {
    objects_dir: PathBuf,
    fanout_dirs: Vec<String>,
    current_files: Vec<ObjectId>,
}

impl Iterator for LooseObjectIter {
    type Item = Result<ObjectId, LooseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(oid) = self.current_files.pop() {
                return Some(Ok(oid));
            }
            let fanout = self.fanout_dirs.pop()?;
            let dir = self.objects_dir.join(&fanout);
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) => return Some(Err(LooseError::Io(e))),
            };
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(rest) = name.to_str() else { continue };
                let full_hex = format!("{fanout}{rest}");
                if full_hex.len() == vec_hash::HEX_LEN {
                    if let Ok(oid) = ObjectId::from_hex(&full_hex) {
                        self.current_files.push(oid);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec_object::{Blob, Object};

    #[test]
    fn iterate_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());

        let mut written = Vec::new();
        for i in 0..5u8 {
            let oid = store
                .write(&Object::Blob(Blob::new(vec![b'x', i])))
                .unwrap();
            written.push(oid);
        }

        let mut seen: Vec<ObjectId> = store.iter().unwrap().map(|r| r.unwrap()).collect();
        seen.sort();
        written.sort();
        assert_eq!(seen, written);
    }

    #[test]
    fn iterate_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        assert_eq!(store.iter().unwrap().count(), 0);
    }

    #[test]
    fn prefix_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path());
        let oid = store
            .write(&Object::Blob(Blob::new(b"prefix me".as_slice())))
            .unwrap();

        let hits = store.find_prefix(&oid.to_hex()[..6]).unwrap();
        assert_eq!(hits, vec![oid]);

        let misses = store.find_prefix("000000").unwrap();
        assert!(misses.is_empty());
    }
}
