//! Full object reachability.
//!
//! From a set of root OIDs (commit tips, usually every ref plus reflog
//! entries), marks every reachable commit, its tree, all subtrees, and all
//! blobs. The collector's mark phase.

use std::collections::HashSet;

use vec_hash::ObjectId;
use vec_object::{Object, ObjectKind};
use vec_odb::ObjectDatabase;
use vec_utils::CancelToken;

use crate::RevWalkError;

/// Collect every object reachable from the given roots.
///
/// Roots that do not exist are skipped rather than failing the walk: a
/// reflog may legitimately mention objects that have already been pruned.
pub fn reachable_objects(
    odb: &ObjectDatabase,
    roots: &[ObjectId],
    cancel: &CancelToken,
) -> Result<HashSet<ObjectId>, RevWalkError> {
    let mut reachable: HashSet<ObjectId> = HashSet::new();
    let mut stack: Vec<ObjectId> = roots.to_vec();

    while let Some(oid) = stack.pop() {
        cancel.check()?;
        if !reachable.insert(oid) {
            continue;
        }

        let Some(obj) = odb.read(&oid)? else {
            // A vanished root; nothing below it to mark.
            reachable.remove(&oid);
            continue;
        };

        match obj {
            Object::Commit(commit) => {
                stack.push(commit.tree);
                stack.extend(commit.parents.iter().copied());
            }
            Object::Tree(tree) => {
                for entry in tree.iter() {
                    match entry.kind {
                        ObjectKind::Tree | ObjectKind::Blob => stack.push(entry.oid),
                        ObjectKind::Commit => {}
                    }
                }
            }
            Object::Blob(_) => {}
        }
    }

    Ok(reachable)
}
