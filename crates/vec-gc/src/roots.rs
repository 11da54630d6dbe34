//! GC root collection.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use vec_hash::ObjectId;
use vec_ref::{reflog, RefName};
use vec_repository::Repository;

use crate::GcError;

/// Every OID the collector must treat as live: HEAD, all refs under
/// `refs/`, and reflog entries within the window (`None` = all entries).
pub fn collect_roots(
    repo: &Repository,
    reflog_window_secs: Option<u64>,
) -> Result<Vec<ObjectId>, GcError> {
    let mut roots = Vec::new();

    if let Some(head) = repo.head_oid()? {
        roots.push(head);
    }

    for (_name, oid) in repo.refs().list("refs/")? {
        roots.push(oid);
    }

    // Reflogs, including logs of branches that were since deleted.
    let log_names = enumerate_log_names(repo.vec_dir())?;
    let cutoff = reflog_window_secs.map(|window| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        now - window as i64
    });
    roots.extend(reflog::reflog_oids(repo.vec_dir(), &log_names, cutoff)?);

    roots.sort();
    roots.dedup();
    Ok(roots)
}

/// Names of every reflog file under `logs/`.
fn enumerate_log_names(vec_dir: &Path) -> Result<Vec<RefName>, GcError> {
    let logs_dir = vec_dir.join("logs");
    let mut names = Vec::new();
    if logs_dir.is_dir() {
        collect_log_names(&logs_dir, &logs_dir, &mut names)?;
    }
    Ok(names)
}

fn collect_log_names(
    base: &Path,
    dir: &Path,
    out: &mut Vec<RefName>,
) -> Result<(), GcError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_log_names(base, &path, out)?;
        } else if path.is_file() {
            let rel = path.strip_prefix(base).expect("walk stays under base");
            if let Some(name) = rel.to_str() {
                if let Ok(ref_name) = RefName::full(name) {
                    out.push(ref_name);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use vec_index::{Index, IndexEntry};
    use vec_object::{Blob, Object};
    use vec_repository::InitOptions;
    use vec_utils::date::Signature;

    fn commit_file(repo: &Repository, content: &[u8], branch: &str) -> ObjectId {
        let blob = repo
            .odb()
            .write(&Object::Blob(Blob::new(content)))
            .unwrap();
        let mut index = Index::new();
        index.add(IndexEntry::staged("f.txt", blob, 0o100644, 0, 0));
        let tree = index.write_tree(repo.odb()).unwrap();
        let commit = vec_object::Commit {
            tree,
            parents: vec![],
            author: Signature::new("T", "t@example.com", 1),
            message: BString::from("m"),
        };
        let oid = repo.odb().write(&Object::Commit(commit)).unwrap();
        repo.refs()
            .write_ref(&RefName::branch(branch).unwrap(), &oid)
            .unwrap();
        oid
    }

    #[test]
    fn refs_and_head_are_roots() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), &InitOptions::default()).unwrap();

        let main = commit_file(&repo, b"on main", "main");
        let feature = commit_file(&repo, b"on feature", "feature");

        let roots = collect_roots(&repo, None).unwrap();
        assert!(roots.contains(&main));
        assert!(roots.contains(&feature));
    }

    #[test]
    fn reflog_entries_root_deleted_branches() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), &InitOptions::default()).unwrap();
        commit_file(&repo, b"keep main alive", "main");
        let doomed = commit_file(&repo, b"short lived", "doomed");

        // Log the branch creation, then delete the branch.
        let name = RefName::branch("doomed").unwrap();
        reflog::append_reflog(
            repo.vec_dir(),
            &name,
            &reflog::ReflogEntry::new(
                ObjectId::NULL,
                doomed,
                Signature::new("T", "t@example.com", 100),
                "branch",
                Some("created"),
            ),
        )
        .unwrap();
        repo.refs().delete_ref(&name).unwrap();

        let roots = collect_roots(&repo, None).unwrap();
        assert!(roots.contains(&doomed), "reflog entry must keep it rooted");

        // A zero-second window drops the old entry.
        let recent_only = collect_roots(&repo, Some(0)).unwrap();
        assert!(!recent_only.contains(&doomed));
    }
}
