//! Ignore pattern handling.
//!
//! Patterns come from a global file (`.vecignore` in the home directory)
//! and the repo-local `.vecignore` at the working-tree root, one glob per
//! line. Lines starting with `#` and blank lines are skipped. A missing
//! ignore file is an empty pattern set.
//!
//! Each pattern is matched against every path component and against each
//! parent prefix of the candidate path, so `build` ignores `build/any/thing`
//! and `*.o` ignores any object file anywhere.

use std::path::Path;

use bstr::{BStr, BString, ByteSlice};
use vec_utils::glob::{glob_match, glob_match_path};

use crate::IndexError;

/// Name of the ignore file at the working-tree root.
pub const IGNORE_FILE_NAME: &str = ".vecignore";

/// A single parsed ignore pattern.
#[derive(Debug, Clone)]
struct IgnorePattern {
    raw: BString,
    /// Patterns containing `/` match against path prefixes; others match
    /// against individual components.
    anchored: bool,
}

/// An ordered set of ignore patterns (global first, then repo-local).
#[derive(Debug, Clone, Default)]
pub struct IgnoreStack {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the conventional layering: global ignore file (if a home
    /// directory is known) then the repo-local file.
    pub fn load(work_tree: &Path) -> Result<Self, IndexError> {
        let mut stack = Self::new();
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            stack.add_file(&Path::new(&home).join(IGNORE_FILE_NAME))?;
        }
        stack.add_file(&work_tree.join(IGNORE_FILE_NAME))?;
        Ok(stack)
    }

    /// Add patterns from an ignore file. Missing files are fine.
    pub fn add_file(&mut self, path: &Path) -> Result<(), IndexError> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(IndexError::Io(e)),
        };
        self.add_patterns(&content);
        Ok(())
    }

    /// Parse and add patterns from raw ignore-file content.
    pub fn add_patterns(&mut self, content: &[u8]) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line[0] == b'#' {
                continue;
            }
            let line = line.strip_prefix(b"/").unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            self.patterns.push(IgnorePattern {
                raw: BString::from(line),
                anchored: line.contains(&b'/'),
            });
        }
    }

    /// Is the relative path ignored?
    pub fn is_ignored(&self, rel_path: &BStr) -> bool {
        self.patterns.iter().any(|p| pattern_hits(p, rel_path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn pattern_hits(pattern: &IgnorePattern, path: &BStr) -> bool {
    if pattern.anchored {
        // Match the whole path and every parent prefix.
        for prefix in path_prefixes(path) {
            if glob_match_path(&pattern.raw, prefix) {
                return true;
            }
        }
        false
    } else {
        // Match each individual component.
        path.split(|&b| b == b'/')
            .any(|component| glob_match(&pattern.raw, component))
    }
}

/// Every prefix of a slash-separated path, shortest first, including the
/// path itself.
fn path_prefixes(path: &BStr) -> impl Iterator<Item = &[u8]> {
    let bytes: &[u8] = path.as_ref();
    let mut ends: Vec<usize> = bytes
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == b'/')
        .map(|(i, _)| i)
        .collect();
    ends.push(bytes.len());
    ends.into_iter().map(move |end| &bytes[..end])
}
