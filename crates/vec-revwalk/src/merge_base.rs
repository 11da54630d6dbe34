//! Lowest-common-ancestor discovery.
//!
//! A breadth-first walk from each tip marks ancestors with a side flag;
//! a commit marked by both sides is a common ancestor. Bases that are
//! ancestors of other bases are dropped, leaving the lowest ones.

use std::collections::{HashMap, HashSet, VecDeque};

use vec_hash::ObjectId;
use vec_odb::ObjectDatabase;

use crate::{read_commit, RevWalkError};

const SIDE_A: u8 = 1;
const SIDE_B: u8 = 2;
const RECORDED: u8 = 4;

/// Find all merge bases of two commits.
///
/// Returns the lowest common ancestors: commits reachable from both `a`
/// and `b` that are not ancestors of any other common ancestor. The result
/// may be empty (unrelated histories) or contain several bases (criss-cross
/// merges); any member is acceptable for a three-way merge.
pub fn merge_base(
    odb: &ObjectDatabase,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    if a == b {
        return Ok(vec![*a]);
    }

    let candidates = mark_common(odb, a, b)?;
    remove_redundant(odb, candidates)
}

/// Find the single best merge base of two commits.
///
/// Ties between multiple lowest common ancestors are broken by greatest
/// commit timestamp (then hash order) so the choice is deterministic.
pub fn merge_base_one(
    odb: &ObjectDatabase,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Option<ObjectId>, RevWalkError> {
    let bases = merge_base(odb, a, b)?;
    let mut best: Option<(i64, ObjectId)> = None;
    for base in bases {
        let when = read_commit(odb, &base)?.author.when;
        match best {
            Some((best_when, best_oid)) if (best_when, best_oid) >= (when, base) => {}
            _ => best = Some((when, base)),
        }
    }
    Ok(best.map(|(_, oid)| oid))
}

/// Is `ancestor` an ancestor of (or equal to) `descendant`?
pub fn is_ancestor(
    odb: &ObjectDatabase,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    if ancestor == descendant {
        return Ok(true);
    }

    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(*descendant);
    visited.insert(*descendant);

    while let Some(current) = queue.pop_front() {
        if current == *ancestor {
            return Ok(true);
        }
        let commit = read_commit(odb, &current)?;
        for parent in &commit.parents {
            if visited.insert(*parent) {
                queue.push_back(*parent);
            }
        }
    }

    Ok(false)
}

/// BFS from both tips; the first commits painted with both flags are the
/// common-ancestor candidates.
fn mark_common(
    odb: &ObjectDatabase,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    let mut flags: HashMap<ObjectId, u8> = HashMap::new();
    let mut queue: VecDeque<ObjectId> = VecDeque::new();
    let mut results = Vec::new();

    flags.insert(*a, SIDE_A);
    flags.insert(*b, SIDE_B);
    queue.push_back(*a);
    queue.push_back(*b);

    while let Some(current) = queue.pop_front() {
        let current_flags = flags[&current];

        if current_flags & (SIDE_A | SIDE_B) == SIDE_A | SIDE_B {
            // Both sides have met here. Record once and stop expanding:
            // anything below is an ancestor of this candidate.
            if current_flags & RECORDED == 0 {
                flags.insert(current, current_flags | RECORDED);
                results.push(current);
            }
            continue;
        }

        let commit = read_commit(odb, &current)?;
        for parent in &commit.parents {
            let entry = flags.entry(*parent).or_insert(0);
            let merged = *entry | current_flags;
            if merged != *entry {
                *entry = merged;
                queue.push_back(*parent);
            }
        }
    }

    Ok(results)
}

/// Drop any base that is an ancestor of another base.
fn remove_redundant(
    odb: &ObjectDatabase,
    bases: Vec<ObjectId>,
) -> Result<Vec<ObjectId>, RevWalkError> {
    if bases.len() <= 1 {
        return Ok(bases);
    }

    let mut dropped: HashSet<usize> = HashSet::new();
    for i in 0..bases.len() {
        if dropped.contains(&i) {
            continue;
        }
        for j in 0..bases.len() {
            if i == j || dropped.contains(&j) {
                continue;
            }
            if is_ancestor(odb, &bases[i], &bases[j])? {
                dropped.insert(i);
                break;
            }
        }
    }

    Ok(bases
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !dropped.contains(idx))
        .map(|(_, oid)| oid)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use vec_object::{Object, ObjectKind, Tree};
    use vec_utils::date::Signature;

    fn odb(dir: &std::path::Path) -> ObjectDatabase {
        ObjectDatabase::open(dir.join("objects")).unwrap()
    }

    fn commit(db: &ObjectDatabase, parents: Vec<ObjectId>, when: i64, msg: &str) -> ObjectId {
        let tree = db
            .write_raw(ObjectKind::Tree, &Tree::new().serialize_body())
            .unwrap();
        let c = vec_object::Commit {
            tree,
            parents,
            author: Signature::new("T", "t@example.com", when),
            message: BString::from(msg),
        };
        db.write(&Object::Commit(c)).unwrap()
    }

    #[test]
    fn same_commit_is_its_own_base() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let c = commit(&db, vec![], 1, "only");
        assert_eq!(merge_base(&db, &c, &c).unwrap(), vec![c]);
    }

    #[test]
    fn linear_ancestor_is_base() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let c1 = commit(&db, vec![], 100, "one");
        let c2 = commit(&db, vec![c1], 200, "two");
        let c3 = commit(&db, vec![c2], 300, "three");

        assert_eq!(merge_base(&db, &c1, &c3).unwrap(), vec![c1]);
        assert_eq!(merge_base_one(&db, &c3, &c1).unwrap(), Some(c1));
    }

    #[test]
    fn forked_history_meets_at_fork_point() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let root = commit(&db, vec![], 100, "root");
        let fork = commit(&db, vec![root], 200, "fork");
        let left = commit(&db, vec![fork], 300, "left");
        let right = commit(&db, vec![fork], 310, "right");

        assert_eq!(merge_base(&db, &left, &right).unwrap(), vec![fork]);
    }

    #[test]
    fn unrelated_histories_have_no_base() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let a = commit(&db, vec![], 100, "island a");
        let b = commit(&db, vec![], 110, "island b");
        assert!(merge_base(&db, &a, &b).unwrap().is_empty());
        assert_eq!(merge_base_one(&db, &a, &b).unwrap(), None);
    }

    #[test]
    fn criss_cross_returns_set_and_picks_newest() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        // Classic criss-cross: two merges each having both X and Y as parents.
        let root = commit(&db, vec![], 50, "root");
        let x = commit(&db, vec![root], 100, "x");
        let y = commit(&db, vec![root], 110, "y");
        let m1 = commit(&db, vec![x, y], 200, "m1");
        let m2 = commit(&db, vec![y, x], 210, "m2");

        let mut bases = merge_base(&db, &m1, &m2).unwrap();
        bases.sort();
        let mut expected = vec![x, y];
        expected.sort();
        assert_eq!(bases, expected);

        // Deterministic single pick: y has the greater timestamp.
        assert_eq!(merge_base_one(&db, &m1, &m2).unwrap(), Some(y));
    }

    #[test]
    fn ancestor_checks() {
        let dir = tempfile::tempdir().unwrap();
        let db = odb(dir.path());
        let c1 = commit(&db, vec![], 100, "one");
        let c2 = commit(&db, vec![c1], 200, "two");
        let other = commit(&db, vec![], 150, "other");

        assert!(is_ancestor(&db, &c1, &c2).unwrap());
        assert!(!is_ancestor(&db, &c2, &c1).unwrap());
        assert!(is_ancestor(&db, &c1, &c1).unwrap());
        assert!(!is_ancestor(&db, &other, &c2).unwrap());
    }
}
