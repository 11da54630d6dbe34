use std::io::Write;

use anyhow::{bail, Result};
use bstr::ByteSlice;
use clap::Args;
use vec_object::Object;

use super::open_repo;
use crate::exit;

#[derive(Args)]
pub struct CatFileArgs {
    /// Pretty-print the object's content
    #[arg(short = 'p', conflicts_with_all = ["kind", "size"])]
    pub pretty: bool,

    /// Show the object's kind
    #[arg(short = 't', conflicts_with = "size")]
    pub kind: bool,

    /// Show the object's body size
    #[arg(short = 's')]
    pub size: bool,

    /// Object hash (full, or a unique prefix of at least 4 hex digits)
    pub hash: String,
}

pub fn run(args: &CatFileArgs) -> Result<i32> {
    if !args.pretty && !args.kind && !args.size {
        bail!("one of -p, -t, or -s is required");
    }

    let repo = open_repo()?;
    let oid = repo.odb().resolve_prefix(&args.hash)?;

    // Kind and size come from the header alone; no need to parse the body.
    if args.kind || args.size {
        let info = repo
            .odb()
            .read_header(&oid)?
            .ok_or(vec_odb::OdbError::NotFound(oid))?;
        if args.kind {
            println!("{}", info.kind);
        } else {
            println!("{}", info.size);
        }
        return Ok(exit::SUCCESS);
    }

    let obj = repo.odb().read_required(&oid)?;
    match &obj {
        Object::Blob(blob) => {
            // Raw bytes, no trailing newline added.
            std::io::stdout().write_all(&blob.data)?;
        }
        Object::Tree(tree) => {
            for entry in tree.iter() {
                println!(
                    "{} {} {}\t{}",
                    entry.mode.as_bytes().to_str_lossy(),
                    entry.kind,
                    entry.oid.to_hex(),
                    entry.name.to_str_lossy()
                );
            }
        }
        Object::Commit(_) => {
            std::io::stdout().write_all(&obj.serialize_body())?;
        }
    }

    Ok(exit::SUCCESS)
}
