use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use vec_repository::{InitOptions, Repository};

use crate::exit;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize (defaults to the current directory)
    pub directory: Option<PathBuf>,

    /// Create a bare repository (no working tree)
    #[arg(long)]
    pub bare: bool,

    /// Name of the initial branch
    #[arg(long = "initial-branch", default_value = "main")]
    pub initial_branch: String,
}

pub fn run(args: &InitArgs) -> Result<i32> {
    let target = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    let opts = InitOptions {
        bare: args.bare,
        default_branch: args.initial_branch.clone(),
    };
    let repo = Repository::init(&target, &opts)?;

    println!(
        "Initialized empty vec repository in {}",
        repo.vec_dir().display()
    );
    Ok(exit::SUCCESS)
}
