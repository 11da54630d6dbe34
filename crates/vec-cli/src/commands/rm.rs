use anyhow::{bail, Result};
use bstr::{BStr, BString, ByteSlice};
use clap::Args;

use super::{open_repo, to_rel_path};
use crate::exit;

#[derive(Args)]
pub struct RmArgs {
    /// Files (or, with -r, directories) to remove
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Allow recursive removal of a directory's entries
    #[arg(short = 'r')]
    pub recursive: bool,

    /// Only remove from the index, keep the working-tree file
    #[arg(long)]
    pub cached: bool,
}

pub fn run(args: &RmArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;
    let work_tree = repo.work_tree()?.to_path_buf();

    // Resolve each argument to the index entries it covers.
    let mut to_remove: Vec<BString> = Vec::new();
    for arg in &args.paths {
        let rel = to_rel_path(&work_tree, arg)?;
        let index = repo.index()?;

        if index.get(BStr::new(&rel), vec_index::Stage::Normal).is_some()
            || index.has_conflict(BStr::new(&rel))
        {
            to_remove.push(BString::from(rel));
            continue;
        }

        // A directory argument covers every tracked entry underneath it.
        let mut prefix = rel.clone();
        prefix.push(b'/');
        let covered: Vec<BString> = index
            .iter()
            .filter(|e| e.path.starts_with(&prefix))
            .map(|e| e.path.clone())
            .collect();
        if covered.is_empty() {
            bail!("pathspec '{arg}' did not match any tracked files");
        }
        if !args.recursive {
            bail!("not removing '{arg}' recursively without -r");
        }
        to_remove.extend(covered);
    }

    to_remove.sort();
    to_remove.dedup();

    for rel in &to_remove {
        repo.index_mut()?.remove(rel.as_bstr());
        if !args.cached {
            let fs_path = work_tree.join(rel.to_str_lossy().as_ref());
            match std::fs::remove_file(&fs_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        println!("rm '{}'", rel.to_str_lossy());
    }

    repo.write_index()?;
    Ok(exit::SUCCESS)
}
