use anyhow::Result;
use clap::Args;
use vec_gc::{run_gc, GcOptions};
use vec_utils::CancelToken;

use super::open_repo;
use crate::exit;

#[derive(Args)]
pub struct GcArgs {
    /// Delete unreachable objects instead of packing them aside
    #[arg(long)]
    pub prune: bool,

    /// With --prune, ignore the grace period
    #[arg(long)]
    pub force: bool,

    /// Pack loose objects when there are many of them
    #[arg(long = "auto-pack")]
    pub auto_pack: bool,

    /// Consolidate all reachable objects into a single pack
    #[arg(long)]
    pub repack: bool,

    /// Report what would be done without doing it
    #[arg(short = 'n')]
    pub dry_run: bool,

    /// Remove a repository lock left behind by a crashed process
    /// (only locks older than one hour qualify)
    #[arg(long = "break-stale-lock")]
    pub break_stale_lock: bool,
}

pub fn run(args: &GcArgs) -> Result<i32> {
    let repo = open_repo()?;

    if args.break_stale_lock
        && vec_repository::RepoLock::break_stale(repo.vec_dir())?
    {
        println!("removed stale repository lock");
    }

    let _lock = repo.lock()?;

    let opts = GcOptions {
        prune: args.prune,
        force: args.force,
        repack: args.repack,
        auto_pack: args.auto_pack,
        dry_run: args.dry_run,
        ..Default::default()
    };

    let stats = run_gc(&repo, &opts, &CancelToken::new())?;

    if args.dry_run {
        println!(
            "would examine {} reachable, {} unreachable objects",
            stats.reachable, stats.unreachable
        );
        return Ok(exit::SUCCESS);
    }

    println!(
        "{} reachable, {} unreachable",
        stats.reachable, stats.unreachable
    );
    if stats.pruned > 0 {
        println!("pruned {} objects", stats.pruned);
    }
    if stats.retained_young > 0 {
        println!(
            "retained {} recent unreachable objects (grace period)",
            stats.retained_young
        );
    }
    if stats.parked > 0 {
        println!("packed {} unreachable objects aside", stats.parked);
    }
    if stats.packs_written > 0 || stats.packs_removed > 0 {
        println!(
            "packs: {} written, {} removed",
            stats.packs_written, stats.packs_removed
        );
    }
    Ok(exit::SUCCESS)
}
