use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use vec_hash::ObjectId;
use vec_utils::lockfile::LockFile;

use crate::name::RefName;
use crate::{RefError, Reference};

/// Maximum symbolic-ref chain length before resolution gives up.
pub const MAX_SYMREF_DEPTH: usize = 5;

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Attached to a branch (which may not exist yet in a fresh repository).
    Attached(RefName),
    /// Detached at a specific commit.
    Detached(ObjectId),
}

/// File-backed reference store rooted at the repository metadata directory.
pub struct RefStore {
    vec_dir: PathBuf,
}

impl RefStore {
    pub fn new(vec_dir: impl AsRef<Path>) -> Self {
        Self {
            vec_dir: vec_dir.as_ref().to_path_buf(),
        }
    }

    /// The metadata directory this store is rooted at.
    pub fn vec_dir(&self) -> &Path {
        &self.vec_dir
    }

    /// Read HEAD: either `ref: refs/heads/<name>` or a raw commit hash.
    pub fn read_head(&self) -> Result<Head, RefError> {
        match self.read_ref_file(&RefName::head())? {
            Some(Reference::Symbolic { target, .. }) => Ok(Head::Attached(target)),
            Some(Reference::Direct { target, .. }) => Ok(Head::Detached(target)),
            None => Err(RefError::NotFound("HEAD".to_string())),
        }
    }

    /// Resolve a ref name to an OID, following symbolic refs up to
    /// [`MAX_SYMREF_DEPTH`] hops. `Ok(None)` means the chain ends at a ref
    /// that does not exist yet (e.g. HEAD on an unborn branch).
    pub fn resolve(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let mut current = name.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read_ref_file(&current)? {
                Some(Reference::Direct { target, .. }) => return Ok(Some(target)),
                Some(Reference::Symbolic { target, .. }) => current = target,
                None => return Ok(None),
            }
        }
        Err(RefError::SymrefDepthExceeded {
            name: name.to_string(),
            max: MAX_SYMREF_DEPTH,
        })
    }

    /// Write a direct ref atomically (lock file + rename).
    pub fn write_ref(&self, name: &RefName, oid: &ObjectId) -> Result<(), RefError> {
        let path = self.ref_path(name);
        self.check_dir_file_conflict(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut lock = LockFile::acquire(&path)?;
        lock.write_all(format!("{}\n", oid.to_hex()).as_bytes())
            .map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;
        lock.commit()?;
        Ok(())
    }

    /// Point a symbolic ref (usually HEAD) at another ref, atomically.
    pub fn write_symbolic(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut lock = LockFile::acquire(&path)?;
        lock.write_all(format!("ref: {target}\n").as_bytes())
            .map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;
        lock.commit()?;
        Ok(())
    }

    /// Detach HEAD to a specific commit.
    pub fn detach_head(&self, oid: &ObjectId) -> Result<(), RefError> {
        self.write_ref(&RefName::head(), oid)
    }

    /// Delete a ref. Refuses to delete the branch HEAD is attached to.
    pub fn delete_ref(&self, name: &RefName) -> Result<(), RefError> {
        if let Ok(Head::Attached(current)) = self.read_head() {
            if current == *name {
                return Err(RefError::DeleteCurrentBranch(name.to_string()));
            }
        }

        let path = self.ref_path(name);
        if !path.exists() {
            return Err(RefError::NotFound(name.to_string()));
        }
        fs::remove_file(&path).map_err(|e| RefError::IoPath {
            path: path.clone(),
            source: e,
        })?;

        // Trim now-empty parent directories under refs/.
        let refs_dir = self.vec_dir.join("refs");
        let mut dir = path.parent().map(|p| p.to_path_buf());
        while let Some(d) = dir {
            if d == refs_dir || d == self.vec_dir {
                break;
            }
            if d.read_dir().map(|mut e| e.next().is_none()).unwrap_or(false) {
                let _ = fs::remove_dir(&d);
                dir = d.parent().map(|p| p.to_path_buf());
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Does a ref file exist for this name?
    pub fn exists(&self, name: &RefName) -> bool {
        self.ref_path(name).is_file()
    }

    /// List refs under a prefix (e.g. `refs/heads/`), sorted by name.
    pub fn list(&self, prefix: &str) -> Result<Vec<(RefName, ObjectId)>, RefError> {
        let sub = prefix.strip_prefix("refs/").unwrap_or(prefix);
        let base = self.vec_dir.join("refs");
        let start = if sub.is_empty() {
            base.clone()
        } else {
            base.join(sub.trim_end_matches('/'))
        };

        let mut result = Vec::new();
        if start.is_dir() {
            self.collect_refs(&start, &mut result)?;
        }
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }

    fn collect_refs(
        &self,
        dir: &Path,
        result: &mut Vec<(RefName, ObjectId)>,
    ) -> Result<(), RefError> {
        for entry in fs::read_dir(dir).map_err(|e| RefError::IoPath {
            path: dir.to_path_buf(),
            source: e,
        })? {
            let entry = entry.map_err(|e| RefError::IoPath {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_refs(&path, result)?;
                continue;
            }
            let rel = path
                .strip_prefix(&self.vec_dir)
                .map_err(|_| RefError::Parse("ref path outside store".into()))?;
            let Some(name_str) = rel.to_str() else { continue };
            if name_str.ends_with(".lock") {
                continue;
            }
            let Ok(name) = RefName::full(name_str) else {
                continue;
            };
            if let Some(oid) = self.resolve(&name)? {
                result.push((name, oid));
            }
        }
        Ok(())
    }

    /// File path for a ref.
    pub fn ref_path(&self, name: &RefName) -> PathBuf {
        self.vec_dir.join(name.as_str())
    }

    /// Read one ref file without following symbolic targets.
    pub fn read_ref_file(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        let path = self.ref_path(name);
        let contents = match fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        let trimmed = contents.trim();
        if let Some(target_bytes) = trimmed.strip_prefix(b"ref: ") {
            let target_str = std::str::from_utf8(target_bytes.trim())
                .map_err(|_| RefError::Parse("invalid UTF-8 in symbolic ref target".into()))?;
            let target = RefName::full(target_str)?;
            Ok(Some(Reference::Symbolic {
                name: name.clone(),
                target,
            }))
        } else {
            let hex = std::str::from_utf8(trimmed)
                .map_err(|_| RefError::Parse("invalid UTF-8 in ref hash".into()))?;
            let oid = ObjectId::from_hex(hex)?;
            Ok(Some(Reference::Direct {
                name: name.clone(),
                target: oid,
            }))
        }
    }

    /// A ref may not shadow a directory of refs and vice versa.
    fn check_dir_file_conflict(&self, name: &RefName) -> Result<(), RefError> {
        let ref_path = self.ref_path(name);

        let mut current = self.vec_dir.clone();
        for component in name.as_str().split('/') {
            current = current.join(component);
            if current == ref_path {
                break;
            }
            if current.is_file() {
                return Err(RefError::DirectoryConflict {
                    name: name.to_string(),
                    conflict: current
                        .strip_prefix(&self.vec_dir)
                        .unwrap_or(&current)
                        .display()
                        .to_string(),
                });
            }
        }

        if ref_path.is_dir() {
            return Err(RefError::DirectoryConflict {
                name: name.to_string(),
                conflict: format!("{} (is a directory)", name),
            });
        }
        Ok(())
    }
}
