//! Shared test harness for vec-cli integration tests.
//!
//! Runs the compiled `vec` binary in scratch directories with a pinned
//! environment so output is deterministic across machines.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured output from running a command.
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn assert_ok(&self) -> &Self {
        assert_eq!(
            self.exit_code, 0,
            "expected success\nstdout: {}\nstderr: {}",
            self.stdout, self.stderr
        );
        self
    }

    pub fn assert_code(&self, code: i32) -> &Self {
        assert_eq!(
            self.exit_code, code,
            "expected exit {code}\nstdout: {}\nstderr: {}",
            self.stdout, self.stderr
        );
        self
    }
}

/// Path of the compiled `vec` binary.
pub fn vec_bin() -> PathBuf {
    let mut path = std::env::current_exe()
        .unwrap()
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf();
    path.push("vec");
    path
}

/// Run `vec` in `dir` with a pinned identity and environment.
pub fn vec(dir: &Path, args: &[&str]) -> CommandResult {
    let mut cmd = Command::new(vec_bin());
    cmd.args(args)
        .current_dir(dir)
        .env("VEC_AUTHOR_NAME", "Test Author")
        .env("VEC_AUTHOR_EMAIL", "test@example.com")
        .env("HOME", dir)
        .env("TZ", "UTC")
        .env("LC_ALL", "C");
    let output = cmd.output().expect("failed to run vec");
    CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

/// Run `vec` with the identity environment scrubbed.
pub fn vec_no_identity(dir: &Path, args: &[&str]) -> CommandResult {
    let mut cmd = Command::new(vec_bin());
    cmd.args(args)
        .current_dir(dir)
        .env_remove("VEC_AUTHOR_NAME")
        .env_remove("VEC_AUTHOR_EMAIL")
        .env("HOME", dir)
        .env("TZ", "UTC")
        .env("LC_ALL", "C");
    let output = cmd.output().expect("failed to run vec");
    CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

/// Create a file (and its parent directories) under `dir`.
pub fn write_file(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Read a file under `dir` as a string.
pub fn read_file(dir: &Path, rel: &str) -> String {
    std::fs::read_to_string(dir.join(rel)).unwrap()
}

/// Initialize a repo in a fresh temp dir.
pub fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    vec(dir.path(), &["init"]).assert_ok();
    dir
}

/// Initialize a repo with one committed file (scenario 1 baseline).
pub fn repo_with_first_commit() -> tempfile::TempDir {
    let dir = init_repo();
    write_file(dir.path(), "README.md", "hello");
    vec(dir.path(), &["add", "README.md"]).assert_ok();
    vec(dir.path(), &["commit", "-m", "init"]).assert_ok();
    dir
}
