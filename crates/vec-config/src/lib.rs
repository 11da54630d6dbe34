//! Configuration: `key=value` text files, one entry per line.
//!
//! Two layers: the repository-local `config` inside the metadata directory
//! and the user-global `.vecconfig` in the home directory. Local values
//! shadow global ones. `VEC_AUTHOR_NAME` / `VEC_AUTHOR_EMAIL` supply the
//! commit identity when neither layer configures one.

mod file;

pub use file::ConfigFile;

use std::path::{Path, PathBuf};

/// Errors from configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed config line {line} in {path}: '{content}'")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("missing required config value '{0}'")]
    MissingValue(String),

    #[error("invalid config key: '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Name of the global config file in the home directory.
pub const GLOBAL_CONFIG_NAME: &str = ".vecconfig";

/// Layered configuration: local values shadow global ones.
pub struct ConfigSet {
    global: ConfigFile,
    local: ConfigFile,
}

impl ConfigSet {
    /// Load the global layer (from `$HOME`/`%USERPROFILE%`) and the local
    /// layer from the repository metadata directory. Missing files load as
    /// empty layers.
    pub fn load(vec_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let global = match global_config_path() {
            Some(path) => ConfigFile::load(&path)?,
            None => ConfigFile::empty(),
        };
        let local = match vec_dir {
            Some(dir) => ConfigFile::load(&dir.join("config"))?,
            None => ConfigFile::empty(),
        };
        Ok(Self { global, local })
    }

    /// Build from already-loaded layers (used by tests).
    pub fn from_layers(global: ConfigFile, local: ConfigFile) -> Self {
        Self { global, local }
    }

    /// Get a value, local layer first.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.local.get(key).or_else(|| self.global.get(key))
    }

    /// Get a value or fail with `MissingValue`.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingValue(key.to_string()))
    }

    /// Set a key in the local layer (persist with `write_local`).
    pub fn set_local(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.local.set(key, value)
    }

    /// Persist the local layer back to its file.
    pub fn write_local(&self) -> Result<(), ConfigError> {
        self.local.write()
    }

    /// The commit identity: `user.name` / `user.email` from config, with
    /// the `VEC_AUTHOR_NAME` / `VEC_AUTHOR_EMAIL` environment as a fallback
    /// when config is silent. Returns `None` when neither source has both.
    pub fn identity(&self) -> Option<(String, String)> {
        let name = self
            .get("user.name")
            .map(str::to_string)
            .or_else(|| std::env::var("VEC_AUTHOR_NAME").ok())?;
        let email = self
            .get("user.email")
            .map(str::to_string)
            .or_else(|| std::env::var("VEC_AUTHOR_EMAIL").ok())?;
        if name.is_empty() || email.is_empty() {
            return None;
        }
        Some((name, email))
    }

    /// The local layer.
    pub fn local(&self) -> &ConfigFile {
        &self.local
    }

    /// The global layer.
    pub fn global(&self) -> &ConfigFile {
        &self.global
    }
}

/// Path of the global config file, if a home directory is known.
pub fn global_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(GLOBAL_CONFIG_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_shadows_global() {
        let mut global = ConfigFile::empty();
        global.set("user.name", "Global Name").unwrap();
        global.set("user.email", "global@example.com").unwrap();
        let mut local = ConfigFile::empty();
        local.set("user.name", "Local Name").unwrap();

        let set = ConfigSet::from_layers(global, local);
        assert_eq!(set.get("user.name"), Some("Local Name"));
        assert_eq!(set.get("user.email"), Some("global@example.com"));
        assert_eq!(set.get("user.missing"), None);
    }

    #[test]
    fn require_missing() {
        let set = ConfigSet::from_layers(ConfigFile::empty(), ConfigFile::empty());
        assert!(matches!(
            set.require("remote.origin.url"),
            Err(ConfigError::MissingValue(_))
        ));
    }

    #[test]
    fn identity_from_config() {
        let mut local = ConfigFile::empty();
        local.set("user.name", "Jane").unwrap();
        local.set("user.email", "jane@example.com").unwrap();
        let set = ConfigSet::from_layers(ConfigFile::empty(), local);
        assert_eq!(
            set.identity(),
            Some(("Jane".to_string(), "jane@example.com".to_string()))
        );
    }
}
