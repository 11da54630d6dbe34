use anyhow::Result;
use bstr::ByteSlice;
use clap::Args;
use vec_merge::{merge, MergeOutcome, MergeStrategy};

use super::{open_repo, resolve_revision};
use crate::exit;

#[derive(Args)]
pub struct MergeArgs {
    /// Branch or commit to merge into HEAD
    pub target: String,

    /// Conflict resolution strategy: recursive, ours, or theirs
    #[arg(long, default_value = "recursive")]
    pub strategy: String,
}

pub fn run(args: &MergeArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;

    let strategy = MergeStrategy::from_name(&args.strategy)?;
    let theirs = resolve_revision(&repo, &args.target)?;

    match merge(&mut repo, theirs, &args.target, strategy)? {
        MergeOutcome::AlreadyUpToDate => {
            println!("Already up to date.");
            Ok(exit::SUCCESS)
        }
        MergeOutcome::FastForward { new_head } => {
            println!("Fast-forward to {}", &new_head.to_hex()[..8]);
            Ok(exit::SUCCESS)
        }
        MergeOutcome::Merged { commit } => {
            println!(
                "Merge made by the '{}' strategy: {}",
                strategy.name(),
                &commit.to_hex()[..8]
            );
            Ok(exit::SUCCESS)
        }
        MergeOutcome::Conflicted { paths } => {
            for conflict in &paths {
                println!(
                    "CONFLICT: merge conflict in {}",
                    conflict.path.to_str_lossy()
                );
            }
            println!("Automatic merge failed; fix conflicts and then commit the result.");
            Ok(exit::MERGE_CONFLICT)
        }
    }
}
