use std::fmt;

use crate::RefError;

/// Characters forbidden in branch and remote names (besides whitespace).
const FORBIDDEN: &[char] = &['/', '\\', '~', '^', ':', '?', '*', '[', ']'];

/// Validate a branch (or remote) name component.
///
/// Whitespace and `/ \ ~ ^ : ? * [ ]` are forbidden; so are empty names,
/// a leading dash, and the `.lock` suffix the lock protocol reserves.
pub fn validate_branch_name(name: &str) -> Result<(), RefError> {
    let fail = |reason: &str| {
        Err(RefError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return fail("empty name");
    }
    if name.starts_with('-') {
        return fail("leading dash");
    }
    if name == "." || name == ".." {
        return fail("reserved name");
    }
    if name.ends_with(".lock") {
        return fail("'.lock' suffix is reserved");
    }
    for c in name.chars() {
        if c.is_whitespace() {
            return fail("whitespace is not allowed");
        }
        if c.is_control() {
            return fail("control characters are not allowed");
        }
        if FORBIDDEN.contains(&c) {
            return fail("forbidden character");
        }
    }
    Ok(())
}

/// A validated full ref name: `HEAD`, `refs/heads/<branch>`, or
/// `refs/remotes/<remote>/<branch>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefName(String);

impl RefName {
    /// The symbolic HEAD ref.
    pub fn head() -> Self {
        Self("HEAD".to_string())
    }

    /// Build `refs/heads/<branch>`, validating the branch name.
    pub fn branch(branch: &str) -> Result<Self, RefError> {
        validate_branch_name(branch)?;
        Ok(Self(format!("refs/heads/{branch}")))
    }

    /// Build `refs/remotes/<remote>/<branch>`, validating both components.
    pub fn remote(remote: &str, branch: &str) -> Result<Self, RefError> {
        validate_branch_name(remote)?;
        validate_branch_name(branch)?;
        Ok(Self(format!("refs/remotes/{remote}/{branch}")))
    }

    /// Accept a full ref path (`HEAD` or something under `refs/`).
    pub fn full(name: &str) -> Result<Self, RefError> {
        if name == "HEAD" {
            return Ok(Self::head());
        }
        let Some(rest) = name.strip_prefix("refs/") else {
            return Err(RefError::InvalidName {
                name: name.to_string(),
                reason: "expected HEAD or a refs/ path".to_string(),
            });
        };
        if rest.is_empty() {
            return Err(RefError::InvalidName {
                name: name.to_string(),
                reason: "empty refs/ path".to_string(),
            });
        }
        for component in rest.split('/') {
            validate_branch_name(component).map_err(|_| RefError::InvalidName {
                name: name.to_string(),
                reason: format!("invalid component '{component}'"),
            })?;
        }
        Ok(Self(name.to_string()))
    }

    /// The full ref path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The branch name if this is a local branch ref.
    pub fn branch_name(&self) -> Option<&str> {
        self.0.strip_prefix("refs/heads/")
    }

    /// Is this a local branch ref?
    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Is this a remote-tracking ref?
    pub fn is_remote(&self) -> bool {
        self.0.starts_with("refs/remotes/")
    }

    /// A short human form: the branch name for branches, the full path
    /// otherwise.
    pub fn short(&self) -> &str {
        self.branch_name().unwrap_or(&self.0)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_branch_names() {
        for name in ["main", "feature-1", "fix.bug", "v1.0", "a_b", "UPPER"] {
            assert!(validate_branch_name(name).is_ok(), "rejected: {name}");
        }
    }

    #[test]
    fn invalid_branch_names() {
        for name in [
            "", "has space", "tab\there", "a/b", "back\\slash", "til~de", "car^et",
            "co:lon", "que?st", "st*ar", "br[ack", "brack]", "-lead", "x.lock", ".", "..",
        ] {
            assert!(validate_branch_name(name).is_err(), "accepted: {name}");
        }
    }

    #[test]
    fn branch_ref_path() {
        let name = RefName::branch("main").unwrap();
        assert_eq!(name.as_str(), "refs/heads/main");
        assert_eq!(name.branch_name(), Some("main"));
        assert!(name.is_branch());
        assert_eq!(name.short(), "main");
    }

    #[test]
    fn remote_ref_path() {
        let name = RefName::remote("origin", "main").unwrap();
        assert_eq!(name.as_str(), "refs/remotes/origin/main");
        assert!(name.is_remote());
        assert!(!name.is_branch());
    }

    #[test]
    fn full_accepts_head_and_refs() {
        assert_eq!(RefName::full("HEAD").unwrap().as_str(), "HEAD");
        assert_eq!(
            RefName::full("refs/heads/main").unwrap().as_str(),
            "refs/heads/main"
        );
        assert!(RefName::full("heads/main").is_err());
        assert!(RefName::full("refs/").is_err());
        assert!(RefName::full("refs/heads/has space").is_err());
    }

    #[test]
    fn head_short_form() {
        assert_eq!(RefName::head().short(), "HEAD");
    }
}
