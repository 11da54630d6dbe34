//! The merge engine.
//!
//! Finds the common ancestor, detects fast-forwards, performs a three-way
//! tree merge with file-level content merging, and stages conflicts as
//! index entries at stages 1/2/3.

pub mod content;
mod driver;
pub mod tree;

pub use content::{merge_content, ContentMergeResult, MergeLabels};
pub use driver::{merge, MergeOutcome};
pub use tree::{merge_trees, TreeMergeResult};

use bstr::BString;
use vec_hash::ObjectId;

/// Errors from merge operations.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("no common ancestor between {ours} and {theirs}")]
    NoCommonAncestor { ours: ObjectId, theirs: ObjectId },

    #[error("cannot merge: HEAD has no commits yet")]
    UnbornHead,

    #[error("cannot merge with a dirty working tree; commit or restore your changes first")]
    DirtyWorkTree,

    #[error("unknown merge strategy: {0}")]
    UnknownStrategy(String),

    #[error(transparent)]
    Repo(#[from] vec_repository::RepoError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Index(#[from] vec_index::IndexError),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    RevWalk(#[from] vec_revwalk::RevWalkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How conflicting changes are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Full three-way merge; overlapping changes become marked conflicts.
    #[default]
    Recursive,
    /// On conflict, keep our side verbatim.
    Ours,
    /// On conflict, keep their side verbatim.
    Theirs,
}

impl MergeStrategy {
    /// Parse a strategy name (`--strategy=` argument).
    pub fn from_name(name: &str) -> Result<Self, MergeError> {
        match name {
            "recursive" => Ok(Self::Recursive),
            "ours" => Ok(Self::Ours),
            "theirs" => Ok(Self::Theirs),
            other => Err(MergeError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Recursive => "recursive",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

/// A path left unresolved by the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPath {
    pub path: BString,
    /// Ancestor blob, if the path existed in the base.
    pub base: Option<ObjectId>,
    /// Our blob, if present on our side.
    pub ours: Option<ObjectId>,
    /// Their blob, if present on their side.
    pub theirs: Option<ObjectId>,
}
