use anyhow::{bail, Result};
use bstr::ByteSlice;
use clap::Args;
use vec_ref::RefName;
use vec_repository::checkout::checkout_commit;

use super::{open_repo, resolve_revision};
use crate::exit;

#[derive(Args)]
pub struct CheckoutArgs {
    /// Branch name or commit hash to check out
    pub target: String,
}

pub fn run(args: &CheckoutArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;
    let work_tree = repo.work_tree()?.to_path_buf();

    // Refuse to clobber local modifications to tracked files.
    {
        let index = repo.index()?;
        let dirty: Vec<String> = index
            .iter_staged()
            .filter_map(|e| {
                match index.entry_differs(&work_tree, e.path.as_bstr()) {
                    Ok(true) => Some(e.path.to_str_lossy().to_string()),
                    _ => None,
                }
            })
            .collect();
        if !dirty.is_empty() {
            eprintln!("error: your local changes to the following files would be overwritten:");
            for path in dirty {
                eprintln!("\t{path}");
            }
            bail!("commit your changes or restore them before you switch");
        }
    }

    let old_head = repo.head_oid()?;
    let from_label = repo
        .current_branch()?
        .unwrap_or_else(|| "detached HEAD".to_string());

    // A valid branch name that exists switches branches; anything else is
    // a revision for a detached checkout.
    let branch_ref = RefName::branch(&args.target).ok();
    let as_branch = branch_ref
        .as_ref()
        .filter(|name| repo.refs().exists(name))
        .cloned();

    let (target_oid, detached) = match &as_branch {
        Some(name) => {
            let oid = repo
                .refs()
                .resolve(name)?
                .ok_or_else(|| anyhow::anyhow!("branch '{}' is empty", args.target))?;
            (oid, false)
        }
        None => (resolve_revision(&repo, &args.target)?, true),
    };

    checkout_commit(&mut repo, &target_oid)?;

    if let Some(name) = &as_branch {
        repo.refs().write_symbolic(&RefName::head(), name)?;
    } else {
        repo.refs().detach_head(&target_oid)?;
    }

    repo.log_ref(
        &RefName::head(),
        old_head.unwrap_or(vec_hash::ObjectId::NULL),
        target_oid,
        "checkout",
        Some(&format!("moving from {from_label} to {}", args.target)),
    )?;

    if detached {
        println!("HEAD is now at {}", &target_oid.to_hex()[..8]);
    } else {
        println!("Switched to branch '{}'", args.target);
    }
    Ok(exit::SUCCESS)
}
