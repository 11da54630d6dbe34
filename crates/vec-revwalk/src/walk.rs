//! History walking for `log`.
//!
//! Yields commits newest-first by timestamp (hash order breaks ties so the
//! walk is deterministic), following all parents.

use std::collections::{BinaryHeap, HashSet};

use vec_hash::ObjectId;
use vec_object::Commit;
use vec_odb::ObjectDatabase;

use crate::{read_commit, RevWalkError};

/// Priority-queue entry ordered by (timestamp, hash).
struct QueueEntry {
    oid: ObjectId,
    when: i64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap by timestamp; hash as the deterministic tie-break.
        self.when
            .cmp(&other.when)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

/// An iterator over commits reachable from a set of tips, newest first.
pub struct CommitWalk<'a> {
    odb: &'a ObjectDatabase,
    queue: BinaryHeap<QueueEntry>,
    seen: HashSet<ObjectId>,
}

impl<'a> CommitWalk<'a> {
    /// Start a walk from a single tip.
    pub fn from_tip(odb: &'a ObjectDatabase, tip: ObjectId) -> Result<Self, RevWalkError> {
        Self::from_tips(odb, &[tip])
    }

    /// Start a walk from several tips.
    pub fn from_tips(odb: &'a ObjectDatabase, tips: &[ObjectId]) -> Result<Self, RevWalkError> {
        let mut walk = Self {
            odb,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        for tip in tips {
            walk.push(*tip)?;
        }
        Ok(walk)
    }

    fn push(&mut self, oid: ObjectId) -> Result<(), RevWalkError> {
        if self.seen.insert(oid) {
            let commit = read_commit(self.odb, &oid)?;
            self.queue.push(QueueEntry {
                oid,
                when: commit.author.when,
            });
        }
        Ok(())
    }
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<(ObjectId, Commit), RevWalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.queue.pop()?;
        let commit = match read_commit(self.odb, &entry.oid) {
            Ok(c) => c,
            Err(e) => return Some(Err(e)),
        };
        for parent in &commit.parents {
            if let Err(e) = self.push(*parent) {
                return Some(Err(e));
            }
        }
        Some(Ok((entry.oid, commit)))
    }
}
