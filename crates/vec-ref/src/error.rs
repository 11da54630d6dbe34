use std::path::PathBuf;

/// Errors produced by reference operations.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("invalid ref name: '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("symbolic ref chain exceeds depth {max} at '{name}'")]
    SymrefDepthExceeded { name: String, max: usize },

    #[error("cannot delete '{0}': it is the current branch")]
    DeleteCurrentBranch(String),

    #[error("ref '{name}' conflicts with existing entry '{conflict}'")]
    DirectoryConflict { name: String, conflict: String },

    #[error("ref parse error: {0}")]
    Parse(String),

    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),

    #[error(transparent)]
    Lock(#[from] vec_utils::UtilError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
