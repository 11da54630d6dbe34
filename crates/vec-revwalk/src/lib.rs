//! Commit graph operations: history walking, lowest-common-ancestor
//! discovery, and full object reachability for the collector.
//!
//! All functions take the object database explicitly; commits reference
//! each other by hash only, so walks load commits on demand.

pub mod merge_base;
pub mod objects;
pub mod walk;

use vec_hash::ObjectId;
use vec_object::{Commit, Object};
use vec_odb::ObjectDatabase;

pub use merge_base::{is_ancestor, merge_base, merge_base_one};
pub use objects::reachable_objects;
pub use walk::CommitWalk;

/// Errors from revision walking.
#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    #[error("object {0} is not a commit")]
    NotACommit(ObjectId),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),
}

impl From<vec_utils::UtilError> for RevWalkError {
    fn from(e: vec_utils::UtilError) -> Self {
        match e {
            vec_utils::UtilError::Cancelled => RevWalkError::Cancelled,
            other => RevWalkError::Odb(vec_odb::OdbError::Io(std::io::Error::other(
                other.to_string(),
            ))),
        }
    }
}

/// Load a commit by OID.
pub fn read_commit(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Commit, RevWalkError> {
    match odb.read(oid)? {
        Some(Object::Commit(c)) => Ok(c),
        Some(_) => Err(RevWalkError::NotACommit(*oid)),
        None => Err(RevWalkError::CommitNotFound(*oid)),
    }
}
