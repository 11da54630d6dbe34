//! Exit-code policy.
//!
//! 0 success, 1 user error, 2 repository error, 3 unresolved merge
//! conflicts. Errors bubbling out of commands are classified by their
//! concrete type; anything unrecognized counts as a repository error.

use vec_merge::MergeError;
use vec_odb::OdbError;
use vec_ref::RefError;
use vec_repository::RepoError;

pub const SUCCESS: i32 = 0;
pub const USER_ERROR: i32 = 1;
pub const REPOSITORY_ERROR: i32 = 2;
pub const MERGE_CONFLICT: i32 = 3;

/// Map a bubbled error to an exit code.
///
/// Known library errors are classified by type; storage-level errors are
/// repository errors, everything else (including plain argument/pathspec
/// messages raised by commands) is a user error.
pub fn classify(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(merge) = cause.downcast_ref::<MergeError>() {
            return match merge {
                MergeError::NoCommonAncestor { .. }
                | MergeError::UnbornHead
                | MergeError::DirtyWorkTree
                | MergeError::UnknownStrategy(_) => USER_ERROR,
                _ => REPOSITORY_ERROR,
            };
        }
        if let Some(repo) = cause.downcast_ref::<RepoError>() {
            return match repo {
                RepoError::MissingIdentity | RepoError::BareNoWorkTree => USER_ERROR,
                RepoError::AlreadyInitialized(_) => USER_ERROR,
                _ => REPOSITORY_ERROR,
            };
        }
        if let Some(r) = cause.downcast_ref::<RefError>() {
            return match r {
                RefError::InvalidName { .. }
                | RefError::NotFound(_)
                | RefError::DeleteCurrentBranch(_) => USER_ERROR,
                _ => REPOSITORY_ERROR,
            };
        }
        if let Some(odb) = cause.downcast_ref::<OdbError>() {
            return match odb {
                OdbError::NotFound(_)
                | OdbError::PrefixNotFound(_)
                | OdbError::Ambiguous { .. }
                | OdbError::Hash(_) => USER_ERROR,
                _ => REPOSITORY_ERROR,
            };
        }
        if cause.downcast_ref::<vec_config::ConfigError>().is_some() {
            return USER_ERROR;
        }
        if cause.downcast_ref::<std::io::Error>().is_some()
            || cause.downcast_ref::<vec_index::IndexError>().is_some()
            || cause.downcast_ref::<vec_pack::PackError>().is_some()
            || cause.downcast_ref::<vec_status::StatusError>().is_some()
            || cause.downcast_ref::<vec_gc::GcError>().is_some()
        {
            return REPOSITORY_ERROR;
        }
    }
    USER_ERROR
}
