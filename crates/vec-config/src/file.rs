use std::fs;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// One configuration file: ordered `key=value` entries.
///
/// Blank lines and `#` comments are tolerated on read and dropped on write.
/// A line without `=` is a parse error, not a warning.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    entries: Vec<(String, String)>,
}

impl ConfigFile {
    /// An empty, pathless layer.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a file; a missing file is an empty layer that remembers
    /// its path for later writes.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: Some(path.to_path_buf()),
                    entries: Vec::new(),
                })
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let mut entries = Vec::new();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(eq) = line.find('=') else {
                return Err(ConfigError::MalformedLine {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    content: raw.to_string(),
                });
            };
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();
            if key.is_empty() {
                return Err(ConfigError::MalformedLine {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    content: raw.to_string(),
                });
            }
            entries.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    /// Get the value for a key (last occurrence wins).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, replacing any existing occurrence.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        if key.is_empty() || key.contains('=') || key.contains('\n') {
            return Err(ConfigError::InvalidKey(key.to_string()));
        }
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
        Ok(())
    }

    /// Remove a key. Returns true if it was present.
    pub fn unset(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() < before
    }

    /// Write the file back to its path. A pathless layer is a no-op.
    pub fn write(&self) -> Result<(), ConfigError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push('=');
            out.push_str(v);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Iterate entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(
            &path,
            "# identity\nuser.name=Jane\nuser.email=jane@example.com\n\nremote.origin.url=https://example.com/repo\n",
        )
        .unwrap();

        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.get("user.name"), Some("Jane"));
        assert_eq!(cfg.get("remote.origin.url"), Some("https://example.com/repo"));
        assert_eq!(cfg.get("nope"), None);
    }

    #[test]
    fn malformed_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "user.name=ok\nthis line has no equals\n").unwrap();

        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::MalformedLine { line: 2, .. })
        ));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ConfigFile::load(&dir.path().join("config")).unwrap();
        assert!(cfg.is_empty());
    }

    #[test]
    fn set_write_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");

        let mut cfg = ConfigFile::load(&path).unwrap();
        cfg.set("user.name", "Jane").unwrap();
        cfg.set("user.name", "Janet").unwrap(); // replace, not append
        cfg.set("core.bare", "false").unwrap();
        cfg.write().unwrap();

        let reloaded = ConfigFile::load(&path).unwrap();
        assert_eq!(reloaded.get("user.name"), Some("Janet"));
        assert_eq!(reloaded.get("core.bare"), Some("false"));
        assert_eq!(reloaded.iter().count(), 2);
    }

    #[test]
    fn unset_removes() {
        let mut cfg = ConfigFile::empty();
        cfg.set("a.b", "1").unwrap();
        assert!(cfg.unset("a.b"));
        assert!(!cfg.unset("a.b"));
        assert_eq!(cfg.get("a.b"), None);
    }

    #[test]
    fn values_may_contain_equals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "remote.origin.auth=token=abc123\n").unwrap();
        let cfg = ConfigFile::load(&path).unwrap();
        assert_eq!(cfg.get("remote.origin.auth"), Some("token=abc123"));
    }

    #[test]
    fn invalid_key_rejected() {
        let mut cfg = ConfigFile::empty();
        assert!(cfg.set("", "x").is_err());
        assert!(cfg.set("a=b", "x").is_err());
    }
}
