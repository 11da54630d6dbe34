use std::collections::BTreeMap;

use anyhow::{bail, Result};
use bstr::{BStr, ByteSlice};
use clap::Args;
use vec_index::{IndexEntry, Stage};
use vec_object::ObjectKind;
use vec_repository::checkout::{flatten_commit_tree, write_blob_to_worktree, TreeFile};

use super::{open_repo, resolve_revision, to_rel_path};
use crate::exit;

#[derive(Args)]
pub struct RestoreArgs {
    /// Paths to restore
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Restore the index entry instead of the working-tree file
    #[arg(long)]
    pub staged: bool,

    /// Restore from this commit instead of the default source
    #[arg(long, value_name = "ref")]
    pub source: Option<String>,
}

pub fn run(args: &RestoreArgs) -> Result<i32> {
    let mut repo = open_repo()?;
    let _lock = repo.lock()?;
    let work_tree = repo.work_tree()?.to_path_buf();

    // The default source is HEAD for --staged and the index for
    // working-tree restores; --source overrides either.
    let source_tree: Option<BTreeMap<Vec<u8>, TreeFile>> = match &args.source {
        Some(rev) => {
            let oid = resolve_revision(&repo, rev)?;
            Some(flatten_commit_tree(&repo, &oid)?)
        }
        None if args.staged => match repo.head_oid()? {
            Some(head) => Some(flatten_commit_tree(&repo, &head)?),
            None => Some(BTreeMap::new()), // unborn: unstaging removes entries
        },
        None => None, // working-tree restore from the index
    };

    for arg in &args.paths {
        let rel = to_rel_path(&work_tree, arg)?;

        if args.staged {
            let source = source_tree.as_ref().expect("source set for --staged");
            match source.get(&rel) {
                Some(file) => {
                    repo.index_mut()?
                        .add(IndexEntry::staged(rel.as_slice(), file.oid, file.mode, 0, 0));
                }
                None => {
                    repo.index_mut()?.remove(BStr::new(&rel));
                }
            }
            continue;
        }

        // Working-tree restore: from the source tree if given, else from
        // the staged entry.
        let file = match &source_tree {
            Some(tree) => match tree.get(&rel) {
                Some(file) => *file,
                None => bail!("pathspec '{arg}' did not match any file in the source"),
            },
            None => {
                let index = repo.index()?;
                let Some(entry) = index.get(BStr::new(&rel), Stage::Normal) else {
                    bail!("pathspec '{arg}' did not match any staged file");
                };
                TreeFile {
                    oid: entry.oid,
                    mode: entry.mode,
                }
            }
        };

        if repo.odb().read_required(&file.oid)?.kind() != ObjectKind::Blob {
            bail!("'{arg}' does not name a file");
        }
        write_blob_to_worktree(&repo, &rel, &file)?;
    }

    if args.staged {
        repo.write_index()?;
    }
    Ok(exit::SUCCESS)
}
