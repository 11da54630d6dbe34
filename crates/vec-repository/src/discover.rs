use std::path::{Path, PathBuf};

use crate::{RepoError, VEC_DIR};

/// Walk up from `start` until a directory containing `.vec` is found.
///
/// Returns `(vec_dir, work_tree)`.
pub(crate) fn discover_vec_dir(start: &Path) -> Result<(PathBuf, Option<PathBuf>), RepoError> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()?.join(start)
    };

    let mut current = Some(start.as_path());
    while let Some(dir) = current {
        let candidate = dir.join(VEC_DIR);
        if candidate.is_dir() && candidate.join("HEAD").is_file() {
            return Ok((candidate, Some(dir.to_path_buf())));
        }
        current = dir.parent();
    }

    Err(RepoError::NotFound(start))
}
