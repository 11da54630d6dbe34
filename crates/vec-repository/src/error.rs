use std::path::PathBuf;

/// Errors produced by repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a vec repository (or any parent up to filesystem root): {0}")]
    NotFound(PathBuf),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("this operation must be run in a work tree")]
    BareNoWorkTree,

    #[error("no identity configured; set user.name and user.email (or VEC_AUTHOR_NAME / VEC_AUTHOR_EMAIL)")]
    MissingIdentity,

    #[error("another vec process holds the repository lock at {path} (held for {held_secs}s); remove the stale lock if that process is gone")]
    Locked { path: PathBuf, held_secs: u64 },

    #[error(transparent)]
    Config(#[from] vec_config::ConfigError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Index(#[from] vec_index::IndexError),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
