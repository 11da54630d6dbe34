use anyhow::{bail, Result};
use clap::Args;
use vec_hash::ObjectId;
use vec_ref::RefName;

use super::open_repo;
use crate::exit;

#[derive(Args)]
pub struct BranchArgs {
    /// Branch to create (lists branches when omitted)
    pub name: Option<String>,

    /// Delete a branch
    #[arg(short = 'd', long = "delete", value_name = "name", conflicts_with = "name")]
    pub delete: Option<String>,

    /// Rename a branch: old name, new name
    #[arg(
        short = 'm',
        long = "rename",
        num_args = 2,
        value_names = ["old", "new"],
        conflicts_with_all = ["name", "delete"]
    )]
    pub rename: Option<Vec<String>>,

    /// Allow overwriting an existing branch
    #[arg(short = 'f', long)]
    pub force: bool,
}

pub fn run(args: &BranchArgs) -> Result<i32> {
    let repo = open_repo()?;
    let _lock = repo.lock()?;

    if let Some(name) = &args.delete {
        let ref_name = RefName::branch(name)?;
        repo.refs().delete_ref(&ref_name)?;
        println!("Deleted branch {name}");
        return Ok(exit::SUCCESS);
    }

    if let Some(pair) = &args.rename {
        let (old, new) = (&pair[0], &pair[1]);
        rename_branch(&repo, old, new, args.force)?;
        println!("Renamed branch {old} to {new}");
        return Ok(exit::SUCCESS);
    }

    match &args.name {
        Some(name) => create_branch(&repo, name, args.force),
        None => list_branches(&repo),
    }
}

fn create_branch(repo: &vec_repository::Repository, name: &str, force: bool) -> Result<i32> {
    let ref_name = RefName::branch(name)?;
    if repo.refs().exists(&ref_name) && !force {
        bail!("a branch named '{name}' already exists");
    }

    let Some(head) = repo.head_oid()? else {
        bail!("cannot create a branch before the first commit");
    };

    repo.refs().write_ref(&ref_name, &head)?;
    repo.log_ref(
        &ref_name,
        ObjectId::NULL,
        head,
        "branch",
        Some("created from HEAD"),
    )?;
    Ok(exit::SUCCESS)
}

fn rename_branch(
    repo: &vec_repository::Repository,
    old: &str,
    new: &str,
    force: bool,
) -> Result<()> {
    let old_ref = RefName::branch(old)?;
    let new_ref = RefName::branch(new)?;

    let Some(oid) = repo.refs().resolve(&old_ref)? else {
        bail!("branch '{old}' not found");
    };
    if repo.refs().exists(&new_ref) && !force {
        bail!("a branch named '{new}' already exists");
    }

    repo.refs().write_ref(&new_ref, &oid)?;

    // Carry the reflog over before the old ref disappears.
    let old_log = repo.refs().vec_dir().join("logs").join(old_ref.as_str());
    let new_log = repo.refs().vec_dir().join("logs").join(new_ref.as_str());
    if old_log.exists() {
        if let Some(parent) = new_log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&old_log, &new_log)?;
    }

    // If HEAD was on the old branch, follow it.
    if let vec_ref::Head::Attached(current) = repo.refs().read_head()? {
        if current == old_ref {
            repo.refs().write_symbolic(&RefName::head(), &new_ref)?;
        }
    }

    repo.refs().delete_ref(&old_ref)?;
    repo.log_ref(
        &new_ref,
        oid,
        oid,
        "branch",
        Some(&format!("renamed from {old}")),
    )?;
    Ok(())
}

fn list_branches(repo: &vec_repository::Repository) -> Result<i32> {
    let current = repo.current_branch()?;
    for (name, _oid) in repo.refs().list("refs/heads/")? {
        let short = name.short();
        if current.as_deref() == Some(short) {
            println!("* {short}");
        } else {
            println!("  {short}");
        }
    }
    Ok(exit::SUCCESS)
}
