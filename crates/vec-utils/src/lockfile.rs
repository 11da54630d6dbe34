//! Exclusive file locks.
//!
//! A writer claims a file by creating `<target>.lock` with
//! O_CREAT|O_EXCL, streams the replacement content into it, and publishes
//! with a single rename over the target. Dropping an uncommitted guard
//! deletes the `.lock`, so a failed or interrupted rewrite leaves the
//! target exactly as it was.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{LockError, UtilError};
use crate::Result;

/// Suffix appended to the target name while a lock is held.
const SUFFIX: &str = ".lock";

/// The `.lock` path belonging to a target file.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(SUFFIX);
    PathBuf::from(name)
}

/// How long the lock on `target` has been held, if anyone holds it.
pub fn held_since(target: impl AsRef<Path>) -> Option<Duration> {
    let meta = fs::metadata(lock_path_for(target.as_ref())).ok()?;
    let taken_at = meta.modified().ok()?;
    SystemTime::now().duration_since(taken_at).ok()
}

/// Remove a lock that has been held for at least `max_age`.
///
/// Returns true when a stale lock was removed. This is an explicit
/// recovery step for the operator, never automatic cleanup.
pub fn break_stale(target: impl AsRef<Path>, max_age: Duration) -> Result<bool> {
    match held_since(&target) {
        Some(age) if age >= max_age => {
            fs::remove_file(lock_path_for(target.as_ref()))?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Guard for an exclusive rewrite of one file.
///
/// The open `.lock` handle doubles as the guard's armed state: `commit`
/// and `discard` take it, after which the drop handler has nothing left
/// to clean up.
pub struct LockFile {
    target: PathBuf,
    handle: Option<File>,
}

impl LockFile {
    /// Claim the lock for `target`.
    ///
    /// Creating the `.lock` file is the lock operation itself; if the
    /// file already exists another writer holds it and this fails with
    /// [`LockError::AlreadyLocked`].
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let lock_path = lock_path_for(&target);

        let handle = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| {
                UtilError::Lock(if source.kind() == io::ErrorKind::AlreadyExists {
                    LockError::AlreadyLocked { path: lock_path.clone() }
                } else {
                    LockError::Create {
                        path: lock_path.clone(),
                        source,
                    }
                })
            })?;

        Ok(Self {
            target,
            handle: Some(handle),
        })
    }

    /// Non-blocking variant: `Ok(None)` when another writer holds the lock.
    pub fn try_acquire(target: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(target) {
            Ok(guard) => Ok(Some(guard)),
            Err(UtilError::Lock(LockError::AlreadyLocked { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The file this guard will replace on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The `.lock` file currently on disk.
    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.target)
    }

    /// Publish: flush the staged content to stable storage, then rename
    /// it over the target. The rename is what makes the update atomic.
    pub fn commit(mut self) -> Result<()> {
        let handle = self.handle.take().expect("a live guard holds its handle");
        let lock_path = lock_path_for(&self.target);

        handle.sync_all().map_err(|source| LockError::Commit {
            path: lock_path.clone(),
            source,
        })?;
        drop(handle);

        fs::rename(&lock_path, &self.target).map_err(|source| LockError::Commit {
            path: lock_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Abandon the rewrite, deleting the `.lock` immediately.
    pub fn discard(mut self) -> Result<()> {
        self.release()?;
        Ok(())
    }

    /// Delete the lock file if this guard still owns it.
    fn release(&mut self) -> io::Result<()> {
        if self.handle.take().is_none() {
            return Ok(());
        }
        match fs::remove_file(lock_path_for(&self.target)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.handle.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("lock already released")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.handle.as_mut() {
            Some(file) => file.flush(),
            None => Err(io::Error::other("lock already released")),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
