use anyhow::{bail, Result};
use bstr::{BString, ByteSlice};
use clap::Args;
use vec_hash::ObjectId;
use vec_object::{Commit, Object};
use vec_ref::{Head, RefName};

use super::open_repo;
use crate::exit;

#[derive(Args)]
pub struct CommitArgs {
    /// Commit message
    #[arg(short, long, required = true)]
    pub message: String,
}

pub fn run(args: &CommitArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;

    if !repo.index()?.conflicts().is_empty() {
        eprintln!("error: committing is not possible because you have unmerged files");
        return Ok(exit::USER_ERROR);
    }

    let (index, odb) = repo.index_and_odb()?;
    let tree = index.write_tree(odb)?;
    let head = repo.head_oid()?;

    // A pending conflicted merge supplies the second parent.
    let merge_head_path = repo.vec_dir().join("MERGE_HEAD");
    let merge_head = match std::fs::read_to_string(&merge_head_path) {
        Ok(content) => Some(ObjectId::from_hex(content.trim())?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mut parents = Vec::new();
    if let Some(head_oid) = head {
        parents.push(head_oid);
    }
    if let Some(other) = merge_head {
        parents.push(other);
    }

    // Refuse an empty commit (same tree, nothing being merged).
    if let (Some(head_oid), None) = (head, merge_head) {
        let head_commit = match repo.odb().read_required(&head_oid)? {
            Object::Commit(c) => c,
            _ => bail!("HEAD does not point at a commit"),
        };
        if head_commit.tree == tree {
            println!("nothing to commit, working tree clean");
            return Ok(exit::USER_ERROR);
        }
    }

    let mut message = BString::from(args.message.as_bytes());
    if !message.ends_with(b"\n") {
        message.push(b'\n');
    }

    let commit = Commit {
        tree,
        parents,
        author: repo.identity()?,
        message,
    };
    let summary = commit.summary().to_str_lossy().to_string();
    let commit_oid = repo.odb().write(&Object::Commit(commit))?;

    // Advance the branch (or detached HEAD), then log the move.
    match repo.refs().read_head()? {
        Head::Attached(branch) => repo.refs().write_ref(&branch, &commit_oid)?,
        Head::Detached(_) => repo.refs().write_ref(&RefName::head(), &commit_oid)?,
    }
    let action = if head.is_none() {
        "commit (initial)"
    } else if merge_head.is_some() {
        "commit (merge)"
    } else {
        "commit"
    };
    repo.log_head_update(
        head.unwrap_or(ObjectId::NULL),
        commit_oid,
        action,
        Some(&summary),
    )?;

    if merge_head.is_some() {
        std::fs::remove_file(&merge_head_path)?;
    }

    let branch_label = repo
        .current_branch()?
        .unwrap_or_else(|| "detached HEAD".to_string());
    println!("[{branch_label} {}] {summary}", &commit_oid.to_hex()[..8]);
    Ok(exit::SUCCESS)
}
