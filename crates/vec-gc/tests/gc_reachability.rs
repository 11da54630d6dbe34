//! End-to-end collector behavior: reachable objects survive, unreachable
//! ones are pruned or parked, repack consolidates.

use std::time::Duration;

use bstr::BString;
use vec_gc::{run_gc, GcOptions};
use vec_hash::ObjectId;
use vec_index::{Index, IndexEntry};
use vec_object::{Blob, Object};
use vec_ref::RefName;
use vec_repository::{InitOptions, Repository};
use vec_utils::date::Signature;
use vec_utils::CancelToken;

fn init_repo(dir: &std::path::Path) -> Repository {
    Repository::init(dir, &InitOptions::default()).unwrap()
}

/// Write blob + tree + commit, point `branch` at the commit.
/// Returns (commit, tree, blob).
fn commit_file(
    repo: &Repository,
    branch: &str,
    content: &[u8],
) -> (ObjectId, ObjectId, ObjectId) {
    let blob = repo
        .odb()
        .write(&Object::Blob(Blob::new(content)))
        .unwrap();
    let mut index = Index::new();
    index.add(IndexEntry::staged("file.txt", blob, 0o100644, 0, 0));
    let tree = index.write_tree(repo.odb()).unwrap();
    let commit = vec_object::Commit {
        tree,
        parents: vec![],
        author: Signature::new("T", "t@example.com", 1),
        message: BString::from("snapshot"),
    };
    let commit_oid = repo.odb().write(&Object::Commit(commit)).unwrap();
    repo.refs()
        .write_ref(&RefName::branch(branch).unwrap(), &commit_oid)
        .unwrap();
    (commit_oid, tree, blob)
}

fn prune_now() -> GcOptions {
    GcOptions {
        prune: true,
        force: true,
        ..Default::default()
    }
}

#[test]
fn reachable_objects_survive_prune() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let (commit, tree, blob) = commit_file(&repo, "main", b"hello");

    let stats = run_gc(&repo, &prune_now(), &CancelToken::new()).unwrap();
    assert_eq!(stats.pruned, 0);
    assert!(stats.reachable >= 3);

    for oid in [commit, tree, blob] {
        assert!(repo.odb().contains(&oid), "{oid} must survive");
    }
}

#[test]
fn unreachable_objects_pruned_after_ref_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "main", b"keep the repo alive");
    let (commit, tree, blob) = commit_file(&repo, "doomed", b"prune me");

    repo.refs()
        .delete_ref(&RefName::branch("doomed").unwrap())
        .unwrap();

    let stats = run_gc(&repo, &prune_now(), &CancelToken::new()).unwrap();
    assert_eq!(stats.pruned, 3);

    for oid in [commit, tree, blob] {
        assert!(!repo.odb().contains(&oid), "{oid} must be gone");
        assert!(repo.odb().read(&oid).unwrap().is_none());
    }
}

#[test]
fn grace_period_blocks_fresh_deletions() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "main", b"anchor");
    let (commit, _, _) = commit_file(&repo, "doomed", b"too young to die");
    repo.refs()
        .delete_ref(&RefName::branch("doomed").unwrap())
        .unwrap();

    let opts = GcOptions {
        prune: true,
        force: false,
        grace: Duration::from_secs(14 * 24 * 60 * 60),
        ..Default::default()
    };
    let stats = run_gc(&repo, &opts, &CancelToken::new()).unwrap();
    assert_eq!(stats.pruned, 0);
    assert_eq!(stats.retained_young, 3);
    assert!(repo.odb().contains(&commit));
}

#[test]
fn dry_run_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "main", b"anchor");
    let (commit, _, _) = commit_file(&repo, "doomed", b"still here after -n");
    repo.refs()
        .delete_ref(&RefName::branch("doomed").unwrap())
        .unwrap();

    let opts = GcOptions {
        prune: true,
        force: true,
        dry_run: true,
        ..Default::default()
    };
    let stats = run_gc(&repo, &opts, &CancelToken::new()).unwrap();
    assert_eq!(stats.unreachable, 3);
    assert_eq!(stats.pruned, 0);
    assert!(repo.odb().contains(&commit));
}

#[test]
fn without_prune_unreachables_are_parked_in_unref_pack() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    commit_file(&repo, "main", b"anchor");
    let (commit, _, _) = commit_file(&repo, "doomed", b"park me");
    repo.refs()
        .delete_ref(&RefName::branch("doomed").unwrap())
        .unwrap();

    let stats = run_gc(&repo, &GcOptions::default(), &CancelToken::new()).unwrap();
    assert_eq!(stats.parked, 3);
    assert_eq!(stats.packs_written, 1);

    // Still readable (from the unref pack), but no longer loose.
    assert!(repo.odb().contains(&commit));
    assert!(!repo.odb().loose().contains(&commit));

    let unref_packs: Vec<_> = std::fs::read_dir(repo.odb().pack_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("unref-") && name.ends_with(".pack")
        })
        .collect();
    assert_eq!(unref_packs.len(), 1);
}

#[test]
fn repack_consolidates_reachable_objects() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let (c1, t1, b1) = commit_file(&repo, "main", b"first");
    let (c2, t2, b2) = commit_file(&repo, "feature", b"second");

    let opts = GcOptions {
        repack: true,
        ..Default::default()
    };
    let stats = run_gc(&repo, &opts, &CancelToken::new()).unwrap();
    assert_eq!(stats.packs_written, 1);
    assert!(stats.loose_absorbed >= 6);

    // Everything still reads back, now from the pack.
    for oid in [c1, t1, b1, c2, t2, b2] {
        assert!(repo.odb().contains(&oid));
        assert!(!repo.odb().loose().contains(&oid));
    }
    assert_eq!(repo.odb().pack_paths().len(), 1);
}
