use anyhow::Result;
use bstr::ByteSlice;
use clap::Args;
use vec_revwalk::CommitWalk;
use vec_utils::date::format_timestamp;

use super::{open_repo, resolve_revision};
use crate::exit;

#[derive(Args)]
pub struct LogArgs {
    /// Revision to start from (defaults to HEAD)
    pub revision: Option<String>,

    /// Limit the number of commits shown
    #[arg(short = 'n', long = "max-count")]
    pub max_count: Option<usize>,
}

pub fn run(args: &LogArgs) -> Result<i32> {
    let repo = open_repo()?;

    let tip = match &args.revision {
        Some(rev) => resolve_revision(&repo, rev)?,
        None => match repo.head_oid()? {
            Some(oid) => oid,
            None => {
                eprintln!("fatal: your current branch does not have any commits yet");
                return Ok(exit::USER_ERROR);
            }
        },
    };

    let walk = CommitWalk::from_tip(repo.odb(), tip)?;
    let limit = args.max_count.unwrap_or(usize::MAX);

    for (shown, item) in walk.enumerate() {
        if shown >= limit {
            break;
        }
        let (oid, commit) = item?;

        if shown > 0 {
            println!();
        }
        println!("commit {}", oid.to_hex());
        if commit.is_merge() {
            let short: Vec<String> = commit
                .parents
                .iter()
                .map(|p| p.to_hex()[..8].to_string())
                .collect();
            println!("Merge: {}", short.join(" "));
        }
        println!("Author: {}", commit.author.who().to_str_lossy());
        println!("Date:   {}", format_timestamp(commit.author.when));
        println!();
        for line in commit.message.lines() {
            println!("    {}", line.to_str_lossy());
        }
    }

    Ok(exit::SUCCESS)
}
