use std::path::{Path, PathBuf};
use std::time::Duration;

use vec_utils::lockfile::{self, LockFile};
use vec_utils::{LockError, UtilError};

use crate::RepoError;

/// Age beyond which a repository lock is reported as stale.
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(3600);

/// The single advisory lock guarding mutating operations.
///
/// Taken at the start of any mutating command and released on every exit
/// path (the guard removes the lock file on drop). Readers never take it:
/// stored objects are immutable and metadata is replaced atomically, so
/// concurrent reads without a writer are safe.
pub struct RepoLock {
    _lock: LockFile,
}

impl RepoLock {
    const LOCK_NAME: &'static str = "vec";

    /// Acquire the lock, reporting how long a conflicting lock has been
    /// held so the user can decide whether to break it.
    pub fn acquire(vec_dir: &Path) -> Result<Self, RepoError> {
        let target = vec_dir.join(Self::LOCK_NAME);
        match LockFile::acquire(&target) {
            Ok(lock) => Ok(Self { _lock: lock }),
            Err(UtilError::Lock(LockError::AlreadyLocked { path })) => {
                let held = lockfile::held_since(&target).unwrap_or_default();
                Err(RepoError::Locked {
                    path,
                    held_secs: held.as_secs(),
                })
            }
            Err(e) => Err(RepoError::Io(std::io::Error::other(e.to_string()))),
        }
    }

    /// Remove a lock older than [`STALE_LOCK_AGE`]. An explicit user
    /// action, never automatic.
    pub fn break_stale(vec_dir: &Path) -> Result<bool, RepoError> {
        let target = vec_dir.join(Self::LOCK_NAME);
        lockfile::break_stale(target, STALE_LOCK_AGE)
            .map_err(|e| RepoError::Io(std::io::Error::other(e.to_string())))
    }

    /// The lock file path for a given metadata directory.
    pub fn lock_path(vec_dir: &Path) -> PathBuf {
        vec_dir.join(format!("{}.lock", Self::LOCK_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_file_lives_in_vec_dir() {
        let dir = tempfile::tempdir().unwrap();
        let guard = RepoLock::acquire(dir.path()).unwrap();
        assert!(RepoLock::lock_path(dir.path()).exists());
        drop(guard);
        assert!(!RepoLock::lock_path(dir.path()).exists());
    }

    #[test]
    fn reports_hold_duration() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = RepoLock::acquire(dir.path()).unwrap();
        match RepoLock::acquire(dir.path()) {
            Err(RepoError::Locked { held_secs, .. }) => assert!(held_secs < 60),
            Err(other) => panic!("expected Locked, got {other}"),
            Ok(_) => panic!("expected Locked, got a second guard"),
        }
    }
}
