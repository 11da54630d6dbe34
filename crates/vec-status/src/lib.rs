//! Working-tree status: three-way reconciliation between the HEAD tree,
//! the index, and the working tree.

pub mod hashpool;
pub mod status;
pub mod walker;

use bstr::BString;

pub use status::{compute_status, StatusCode, StatusEntry, StatusReport};
pub use walker::{walk_worktree, WorktreeFile};

/// Errors from status computation.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repo(#[from] vec_repository::RepoError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Index(#[from] vec_index::IndexError),

    #[error(transparent)]
    Object(#[from] vec_object::ObjectError),
}

impl From<vec_utils::UtilError> for StatusError {
    fn from(e: vec_utils::UtilError) -> Self {
        match e {
            vec_utils::UtilError::Cancelled => StatusError::Cancelled,
            vec_utils::UtilError::Io(io) => StatusError::Io(io),
            other => StatusError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// A path that failed to hash inside the worker pool.
#[derive(Debug)]
pub struct HashFailure {
    pub path: BString,
    pub error: std::io::Error,
}
