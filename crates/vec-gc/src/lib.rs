//! Garbage collection.
//!
//! Mark: every ref (HEAD, branches, remotes) plus reflog entries inside
//! the grace window roots a reachability walk over commits, trees, and
//! blobs. Sweep: unreachable objects are deleted (`prune`) or parked in an
//! `unref-*.pack`; `repack` consolidates everything reachable into a
//! single pack. Objects younger than the grace period are never deleted
//! without `force`.

mod roots;

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};

use vec_hash::ObjectId;
use vec_object::ObjectKind;
use vec_pack::write::write_pack;
use vec_repository::Repository;
use vec_revwalk::reachable_objects;
use vec_utils::CancelToken;

pub use roots::collect_roots;

/// Default grace period before unreachable objects may be deleted.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Loose-object count that triggers packing under `auto_pack`.
pub const AUTO_PACK_THRESHOLD: usize = 256;

/// Errors from garbage collection.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Repo(#[from] vec_repository::RepoError),

    #[error(transparent)]
    Odb(#[from] vec_odb::OdbError),

    #[error(transparent)]
    Pack(#[from] vec_pack::PackError),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<vec_revwalk::RevWalkError> for GcError {
    fn from(e: vec_revwalk::RevWalkError) -> Self {
        match e {
            vec_revwalk::RevWalkError::Cancelled => GcError::Cancelled,
            vec_revwalk::RevWalkError::Odb(o) => GcError::Odb(o),
            other => GcError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Knobs for one collection run.
#[derive(Debug, Clone)]
pub struct GcOptions {
    /// Delete unreachable objects instead of parking them in a pack.
    pub prune: bool,
    /// Ignore the grace period when pruning.
    pub force: bool,
    /// Consolidate all reachable objects into a single pack.
    pub repack: bool,
    /// Pack loose objects when there are many of them.
    pub auto_pack: bool,
    /// Report what would happen without touching anything.
    pub dry_run: bool,
    /// Grace period for deletions.
    pub grace: Duration,
    /// Reflog cutoff: entries older than this many seconds ago stop
    /// acting as roots. `None` keeps every reflog entry as a root.
    pub reflog_window_secs: Option<u64>,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            prune: false,
            force: false,
            repack: false,
            auto_pack: false,
            dry_run: false,
            grace: DEFAULT_GRACE,
            reflog_window_secs: None,
        }
    }
}

/// Counters reported after a run.
#[derive(Debug, Default)]
pub struct GcStats {
    pub reachable: usize,
    pub unreachable: usize,
    pub pruned: usize,
    /// Unreachable objects kept back by the grace period.
    pub retained_young: usize,
    /// Unreachable loose objects parked into an unref pack.
    pub parked: usize,
    pub packs_written: usize,
    pub packs_removed: usize,
    /// Loose objects removed because a pack now carries them.
    pub loose_absorbed: usize,
}

/// Run a collection.
pub fn run_gc(
    repo: &Repository,
    opts: &GcOptions,
    cancel: &CancelToken,
) -> Result<GcStats, GcError> {
    let odb = repo.odb();
    let mut stats = GcStats::default();

    // Mark.
    let roots = collect_roots(repo, opts.reflog_window_secs)?;
    let reachable = reachable_objects(odb, &roots, cancel)?;
    stats.reachable = reachable.len();

    let all = odb.all_oids()?;
    let unreachable: Vec<ObjectId> = all
        .iter()
        .filter(|oid| !reachable.contains(oid))
        .copied()
        .collect();
    stats.unreachable = unreachable.len();

    if opts.dry_run {
        return Ok(stats);
    }

    // Sweep loose unreachable objects.
    let loose_unreachable: Vec<ObjectId> = unreachable
        .iter()
        .filter(|oid| odb.loose().contains(oid))
        .copied()
        .collect();

    if opts.prune {
        for oid in &loose_unreachable {
            cancel.check().map_err(|_| GcError::Cancelled)?;
            if opts.force || object_age(odb.loose().object_path(oid).as_path()) >= opts.grace {
                odb.loose().remove(oid).map_err(vec_odb::OdbError::from)?;
                stats.pruned += 1;
            } else {
                stats.retained_young += 1;
            }
        }
        prune_packed(repo, &reachable, opts, cancel, &mut stats)?;
    } else if !loose_unreachable.is_empty() {
        park_unreachable(repo, &loose_unreachable, cancel, &mut stats)?;
    }

    if opts.repack {
        full_repack(repo, &reachable, cancel, &mut stats)?;
    } else if opts.auto_pack {
        auto_pack(repo, &reachable, cancel, &mut stats)?;
    }

    odb.refresh()?;
    Ok(stats)
}

/// Age of an on-disk object file.
fn object_age(path: &Path) -> Duration {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .unwrap_or(Duration::MAX)
}

/// Load `(oid, kind, body)` tuples for packing.
fn load_objects(
    repo: &Repository,
    oids: &[ObjectId],
    cancel: &CancelToken,
) -> Result<Vec<(ObjectId, ObjectKind, Vec<u8>)>, GcError> {
    let mut objects = Vec::with_capacity(oids.len());
    for oid in oids {
        cancel.check().map_err(|_| GcError::Cancelled)?;
        let obj = repo.odb().read_required(oid)?;
        objects.push((*oid, obj.kind(), obj.serialize_body()));
    }
    Ok(objects)
}

/// Park unreachable loose objects in an `unref-*.pack` that a later prune
/// may delete, then drop the loose copies.
fn park_unreachable(
    repo: &Repository,
    oids: &[ObjectId],
    cancel: &CancelToken,
    stats: &mut GcStats,
) -> Result<(), GcError> {
    let objects = load_objects(repo, oids, cancel)?;
    let pack_dir = repo.odb().pack_dir();
    let result = write_pack(&pack_dir, &objects, cancel)?;

    // The unref- prefix marks the pack as holding only unreachable
    // objects. The .pack is renamed before the .idx, preserving the
    // "no index without its pack" ordering for readers.
    let checksum = result.checksum.to_hex();
    let unref_pack = pack_dir.join(format!("unref-{checksum}.pack"));
    let unref_idx = pack_dir.join(format!("unref-{checksum}.idx"));
    std::fs::rename(&result.pack_path, &unref_pack)?;
    std::fs::rename(&result.idx_path, &unref_idx)?;

    for oid in oids {
        repo.odb()
            .loose()
            .remove(oid)
            .map_err(vec_odb::OdbError::from)?;
    }

    stats.parked += oids.len();
    stats.packs_written += 1;
    Ok(())
}

/// Rewrite packs that contain unreachable entries, keeping only the
/// reachable ones. Packs full of reachable objects are preserved as-is.
fn prune_packed(
    repo: &Repository,
    reachable: &HashSet<ObjectId>,
    opts: &GcOptions,
    cancel: &CancelToken,
    stats: &mut GcStats,
) -> Result<(), GcError> {
    for pack_path in repo.odb().pack_paths() {
        cancel.check().map_err(|_| GcError::Cancelled)?;
        let contents = repo.odb().pack_contents(&pack_path);
        let keep: Vec<ObjectId> = contents
            .iter()
            .filter(|oid| reachable.contains(oid))
            .copied()
            .collect();

        if keep.len() == contents.len() {
            continue; // fully reachable; leave it alone
        }
        if !opts.force && object_age(&pack_path) < opts.grace {
            stats.retained_young += contents.len() - keep.len();
            continue;
        }

        if !keep.is_empty() {
            let objects = load_objects(repo, &keep, cancel)?;
            write_pack(&repo.odb().pack_dir(), &objects, cancel)?;
            stats.packs_written += 1;
        }
        stats.pruned += contents.len() - keep.len();

        std::fs::remove_file(&pack_path)?;
        let idx = pack_path.with_extension("idx");
        if idx.exists() {
            std::fs::remove_file(&idx)?;
        }
        stats.packs_removed += 1;

        // The replacement pack carries the kept objects now.
        repo.odb().refresh()?;
    }
    Ok(())
}

/// Consolidate every reachable object into one pack and drop the packs
/// and loose copies it replaces.
fn full_repack(
    repo: &Repository,
    reachable: &HashSet<ObjectId>,
    cancel: &CancelToken,
    stats: &mut GcStats,
) -> Result<(), GcError> {
    if reachable.is_empty() {
        return Ok(());
    }

    let mut oids: Vec<ObjectId> = reachable.iter().copied().collect();
    oids.sort();
    let objects = load_objects(repo, &oids, cancel)?;

    let old_packs = repo.odb().pack_paths();
    let result = write_pack(&repo.odb().pack_dir(), &objects, cancel)?;
    stats.packs_written += 1;

    for pack_path in old_packs {
        if pack_path == result.pack_path {
            continue;
        }
        std::fs::remove_file(&pack_path)?;
        let idx = pack_path.with_extension("idx");
        if idx.exists() {
            std::fs::remove_file(&idx)?;
        }
        stats.packs_removed += 1;
    }

    // Loose copies of now-packed objects are redundant.
    for oid in &oids {
        if repo.odb().loose().contains(oid) {
            repo.odb()
                .loose()
                .remove(oid)
                .map_err(vec_odb::OdbError::from)?;
            stats.loose_absorbed += 1;
        }
    }

    Ok(())
}

/// Pack loose reachable objects once there are enough of them to matter.
fn auto_pack(
    repo: &Repository,
    reachable: &HashSet<ObjectId>,
    cancel: &CancelToken,
    stats: &mut GcStats,
) -> Result<(), GcError> {
    let loose: Vec<ObjectId> = repo
        .odb()
        .loose_oids()?
        .into_iter()
        .filter(|oid| reachable.contains(oid))
        .collect();

    if loose.len() < AUTO_PACK_THRESHOLD {
        return Ok(());
    }

    let objects = load_objects(repo, &loose, cancel)?;
    write_pack(&repo.odb().pack_dir(), &objects, cancel)?;
    stats.packs_written += 1;

    for oid in &loose {
        repo.odb()
            .loose()
            .remove(oid)
            .map_err(vec_odb::OdbError::from)?;
        stats.loose_absorbed += 1;
    }

    Ok(())
}
