use anyhow::Result;
use bstr::ByteSlice;
use clap::Args;
use vec_status::{compute_status, StatusCode};
use vec_utils::CancelToken;

use super::open_repo;
use crate::exit;

#[derive(Args)]
pub struct StatusArgs {
    /// Give the output in the short format
    #[arg(short, long)]
    pub short: bool,

    /// Show branch information (short format)
    #[arg(short, long)]
    pub branch: bool,
}

pub fn run(args: &StatusArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let report = compute_status(&mut repo, &CancelToken::new())?;

    if args.short {
        if args.branch {
            match &report.branch {
                Some(name) => println!("## {name}"),
                None => println!("## HEAD (detached)"),
            }
        }
        for entry in report.changes() {
            println!("{} {}", entry.code.short(), entry.path.to_str_lossy());
        }
        return Ok(exit::SUCCESS);
    }

    match &report.branch {
        Some(name) => println!("On branch {name}"),
        None => println!("HEAD detached"),
    }

    let staged: Vec<_> = report
        .changes()
        .filter(|e| {
            matches!(
                e.code,
                StatusCode::ModifiedStaged
                    | StatusCode::ModifiedStagedAndUnstaged
                    | StatusCode::NewStaged
                    | StatusCode::NewModified
                    | StatusCode::DeletedStaged
                    | StatusCode::DeletedStagedReappeared
            )
        })
        .collect();
    let unstaged: Vec<_> = report
        .changes()
        .filter(|e| {
            matches!(
                e.code,
                StatusCode::ModifiedNotStaged
                    | StatusCode::ModifiedStagedAndUnstaged
                    | StatusCode::NewModified
                    | StatusCode::DeletedNotStaged
            )
        })
        .collect();
    let conflicted: Vec<_> = report.conflicts().collect();
    let untracked: Vec<_> = report
        .changes()
        .filter(|e| {
            matches!(
                e.code,
                StatusCode::Untracked | StatusCode::DeletedStagedReappeared
            )
        })
        .collect();

    if !conflicted.is_empty() {
        println!("\nUnmerged paths:");
        println!("  (fix conflicts and run \"vec add <file>...\")");
        for entry in &conflicted {
            println!("\tboth modified:   {}", entry.path.to_str_lossy());
        }
    }

    if !staged.is_empty() {
        println!("\nChanges to be committed:");
        for entry in &staged {
            println!("\t{}:\t{}", entry.code.label(), entry.path.to_str_lossy());
        }
    }

    if !unstaged.is_empty() {
        println!("\nChanges not staged for commit:");
        for entry in &unstaged {
            println!("\t{}:\t{}", entry.code.label(), entry.path.to_str_lossy());
        }
    }

    if !untracked.is_empty() {
        println!("\nUntracked files:");
        for entry in &untracked {
            println!("\t{}", entry.path.to_str_lossy());
        }
    }

    if report.is_clean() {
        println!("nothing to commit, working tree clean");
    }

    Ok(exit::SUCCESS)
}
