use std::fs;
use std::path::{Path, PathBuf};

use crate::{RepoError, VEC_DIR};

/// Options for repository initialization.
pub struct InitOptions {
    /// Create a bare repository (metadata at the target path itself).
    pub bare: bool,
    /// Name of the initial branch.
    pub default_branch: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            bare: false,
            default_branch: "main".to_string(),
        }
    }
}

/// Create the on-disk repository layout.
///
/// ```text
/// HEAD                 ref: refs/heads/<default branch>
/// config               empty key=value file
/// objects/             loose fan-out dirs created lazily
/// objects/pack/
/// refs/heads/
/// refs/remotes/
/// logs/                reflog files created lazily
/// ```
///
/// Returns `(vec_dir, work_tree)`.
pub(crate) fn init_repository(
    path: &Path,
    opts: &InitOptions,
) -> Result<(PathBuf, Option<PathBuf>), RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };

    let (vec_dir, work_tree) = if opts.bare {
        (path.clone(), None)
    } else {
        (path.join(VEC_DIR), Some(path.clone()))
    };

    if vec_dir.join("HEAD").is_file() {
        return Err(RepoError::AlreadyInitialized(vec_dir));
    }

    fs::create_dir_all(&vec_dir)?;
    fs::create_dir_all(vec_dir.join("objects").join("pack"))?;
    fs::create_dir_all(vec_dir.join("refs").join("heads"))?;
    fs::create_dir_all(vec_dir.join("refs").join("remotes"))?;
    fs::create_dir_all(vec_dir.join("logs"))?;

    vec_ref::validate_branch_name(&opts.default_branch)?;
    fs::write(
        vec_dir.join("HEAD"),
        format!("ref: refs/heads/{}\n", opts.default_branch),
    )?;

    fs::write(vec_dir.join("config"), "")?;

    Ok((vec_dir, work_tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_layout() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("repo.vec");
        let opts = InitOptions {
            bare: true,
            ..Default::default()
        };
        let (vec_dir, work_tree) = init_repository(&target, &opts).unwrap();
        assert_eq!(vec_dir, target);
        assert_eq!(work_tree, None);
        assert!(target.join("HEAD").is_file());
    }

    #[test]
    fn custom_default_branch() {
        let dir = tempfile::tempdir().unwrap();
        let opts = InitOptions {
            bare: false,
            default_branch: "trunk".to_string(),
        };
        let (vec_dir, _) = init_repository(dir.path(), &opts).unwrap();
        assert_eq!(
            fs::read_to_string(vec_dir.join("HEAD")).unwrap(),
            "ref: refs/heads/trunk\n"
        );
    }

    #[test]
    fn invalid_branch_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = InitOptions {
            bare: false,
            default_branch: "has space".to_string(),
        };
        assert!(init_repository(dir.path(), &opts).is_err());
    }
}
