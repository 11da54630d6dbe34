pub mod add;
pub mod branch;
pub mod cat_file;
pub mod checkout;
pub mod commit;
pub mod diff;
pub mod gc;
pub mod init;
pub mod log;
pub mod merge;
pub mod restore;
pub mod rm;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Subcommand;
use vec_repository::Repository;

use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty repository
    Init(init::InitArgs),
    /// Add file contents to the index
    Add(add::AddArgs),
    /// Remove files from the working tree and from the index
    Rm(rm::RmArgs),
    /// Show the working tree status
    Status(status::StatusArgs),
    /// Record changes to the repository
    Commit(commit::CommitArgs),
    /// Show commit history
    Log(log::LogArgs),
    /// List, create, delete, or rename branches
    Branch(branch::BranchArgs),
    /// Switch branches or detach HEAD at a commit
    Checkout(checkout::CheckoutArgs),
    /// Restore working tree or index content
    Restore(restore::RestoreArgs),
    /// Show changes between trees, the index, and the working tree
    Diff(diff::DiffArgs),
    /// Join another line of development into the current branch
    Merge(merge::MergeArgs),
    /// Collect unreachable objects and repack
    Gc(gc::GcArgs),
    /// Show object content, type, or size
    CatFile(cat_file::CatFileArgs),
}

pub fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Init(args) => init::run(args),
        Commands::Add(args) => add::run(args),
        Commands::Rm(args) => rm::run(args),
        Commands::Status(args) => status::run(args),
        Commands::Commit(args) => commit::run(args),
        Commands::Log(args) => log::run(args),
        Commands::Branch(args) => branch::run(args),
        Commands::Checkout(args) => checkout::run(args),
        Commands::Restore(args) => restore::run(args),
        Commands::Diff(args) => diff::run(args),
        Commands::Merge(args) => merge::run(args),
        Commands::Gc(args) => gc::run(args),
        Commands::CatFile(args) => cat_file::run(args),
    }
}

/// Open the repository enclosing the current directory.
pub fn open_repo() -> Result<Repository> {
    Ok(Repository::discover(std::env::current_dir()?)?)
}

/// Turn a user-supplied path argument into a slash-separated path
/// relative to the working-tree root.
pub fn to_rel_path(work_tree: &Path, arg: &str) -> Result<Vec<u8>> {
    let arg_path = PathBuf::from(arg);
    let abs = if arg_path.is_absolute() {
        arg_path
    } else {
        std::env::current_dir()?.join(arg_path)
    };
    let abs = normalize(&abs);
    let work_tree = normalize(work_tree);

    let Ok(rel) = abs.strip_prefix(&work_tree) else {
        bail!("path '{arg}' is outside the repository");
    };
    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() {
        bail!("path '{arg}' names the repository root");
    }
    Ok(rel.into_bytes())
}

/// Lexically normalize `.` and `..` components (no symlink resolution).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve a revision argument: a branch name, `HEAD`, or a (possibly
/// partial, ≥4 hex digits) object hash.
pub fn resolve_revision(repo: &Repository, rev: &str) -> Result<vec_hash::ObjectId> {
    if rev == "HEAD" {
        return repo
            .head_oid()?
            .ok_or_else(|| anyhow::anyhow!("HEAD does not point at any commit yet"));
    }
    if let Ok(name) = vec_ref::RefName::branch(rev) {
        if let Some(oid) = repo.refs().resolve(&name)? {
            return Ok(oid);
        }
    }
    if let Ok(name) = vec_ref::RefName::full(rev) {
        if let Some(oid) = repo.refs().resolve(&name)? {
            return Ok(oid);
        }
    }
    Ok(repo.odb().resolve_prefix(rev)?)
}
