//! Parallel blob hashing for status.
//!
//! Working-tree files whose stat data does not match the index must be
//! hashed to decide whether they really changed. Hashing fans out over a
//! fixed-size worker pool fed by a channel; results land in a shared map
//! behind a mutex.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use bstr::BString;
use crossbeam::channel;
use vec_hash::{Hasher, ObjectId};
use vec_utils::CancelToken;

use crate::{HashFailure, StatusError};

/// Lower bound on pool size.
const MIN_WORKERS: usize = 4;
/// Upper bound on pool size.
const MAX_WORKERS: usize = 8;

/// The worker count: available parallelism clamped to 4-8.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_WORKERS)
        .clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Hash the given `(rel_path, abs_path)` pairs as blobs.
///
/// Returns the map of successfully hashed paths plus the failures
/// (a file vanishing mid-walk is not fatal to the whole status run).
pub fn hash_files(
    files: Vec<(BString, PathBuf)>,
    workers: usize,
    cancel: &CancelToken,
) -> Result<(HashMap<BString, ObjectId>, Vec<HashFailure>), StatusError> {
    let results: Mutex<HashMap<BString, ObjectId>> = Mutex::new(HashMap::new());
    let failures: Mutex<Vec<HashFailure>> = Mutex::new(Vec::new());

    let (tx, rx) = channel::unbounded::<(BString, PathBuf)>();
    for item in files {
        tx.send(item).expect("receiver alive");
    }
    drop(tx);

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let rx = rx.clone();
            let results = &results;
            let failures = &failures;
            let cancel = cancel.clone();
            scope.spawn(move || {
                while let Ok((rel, abs)) = rx.recv() {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match std::fs::read(&abs) {
                        Ok(content) => {
                            let oid = Hasher::hash_object("blob", &content);
                            results.lock().unwrap().insert(rel, oid);
                        }
                        Err(error) => {
                            failures.lock().unwrap().push(HashFailure { path: rel, error });
                        }
                    }
                }
            });
        }
    });

    cancel.check().map_err(StatusError::from)?;

    Ok((
        results.into_inner().unwrap(),
        failures.into_inner().unwrap(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn hashes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut work = Vec::new();
        for i in 0..20 {
            let rel = format!("file-{i}.txt");
            let abs = dir.path().join(&rel);
            fs::write(&abs, format!("content {i}")).unwrap();
            work.push((BString::from(rel), abs));
        }

        let (map, failures) = hash_files(work, 4, &CancelToken::new()).unwrap();
        assert_eq!(map.len(), 20);
        assert!(failures.is_empty());

        let expected = Hasher::hash_object("blob", b"content 7");
        assert_eq!(map[&BString::from("file-7.txt")], expected);
    }

    #[test]
    fn missing_file_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("here.txt");
        fs::write(&present, b"x").unwrap();

        let work = vec![
            (BString::from("here.txt"), present),
            (BString::from("gone.txt"), dir.path().join("gone.txt")),
        ];
        let (map, failures) = hash_files(work, 4, &CancelToken::new()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "gone.txt");
    }

    #[test]
    fn empty_input() {
        let (map, failures) = hash_files(Vec::new(), 4, &CancelToken::new()).unwrap();
        assert!(map.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn cancellation_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("a.txt");
        fs::write(&abs, b"x").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            hash_files(vec![(BString::from("a.txt"), abs)], 2, &cancel),
            Err(StatusError::Cancelled)
        ));
    }
}
