//! Repository discovery, initialization, and central access for all
//! subsystems.
//!
//! The `Repository` value is passed explicitly to every operation; its only
//! invariant is that its `.vec` directory exists. There is no module-level
//! mutable state.

pub mod checkout;
mod discover;
mod error;
mod init;
mod lock;

pub use error::RepoError;
pub use init::InitOptions;
pub use lock::RepoLock;

use std::path::{Path, PathBuf};

use vec_config::ConfigSet;
use vec_hash::ObjectId;
use vec_index::{IgnoreStack, Index};
use vec_odb::ObjectDatabase;
use vec_ref::{Head, RefName, RefStore, ReflogEntry};
use vec_utils::date::Signature;

/// Name of the repository metadata directory.
pub const VEC_DIR: &str = ".vec";

/// The central repository value tying all subsystems together.
pub struct Repository {
    /// Path to the `.vec` directory.
    vec_dir: PathBuf,
    /// Path to the working tree (None for bare repositories).
    work_tree: Option<PathBuf>,
    /// Object database.
    odb: ObjectDatabase,
    /// Reference store.
    refs: RefStore,
    /// Merged configuration (local over global).
    config: ConfigSet,
    /// Index, lazy-loaded on first access.
    index: Option<Index>,
    /// Path to the index file.
    index_path: PathBuf,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("vec_dir", &self.vec_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open an existing repository whose `.vec` directory is at or directly
    /// under `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let (vec_dir, work_tree) = if path.file_name().is_some_and(|n| n == VEC_DIR) {
            (path.to_path_buf(), path.parent().map(|p| p.to_path_buf()))
        } else if path.join(VEC_DIR).is_dir() {
            (path.join(VEC_DIR), Some(path.to_path_buf()))
        } else if path.join("HEAD").is_file() && path.join("objects").is_dir() {
            // A bare repository: the metadata directory is the repository.
            (path.to_path_buf(), None)
        } else {
            return Err(RepoError::NotFound(path.to_path_buf()));
        };
        Self::from_dirs(vec_dir, work_tree)
    }

    /// Discover a repository starting from `start`, walking up toward the
    /// filesystem root.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        let (vec_dir, work_tree) = discover::discover_vec_dir(start.as_ref())?;
        Self::from_dirs(vec_dir, work_tree)
    }

    /// Initialize a new repository at `path` and open it.
    pub fn init(path: impl AsRef<Path>, opts: &InitOptions) -> Result<Self, RepoError> {
        let (vec_dir, work_tree) = init::init_repository(path.as_ref(), opts)?;
        Self::from_dirs(vec_dir, work_tree)
    }

    fn from_dirs(vec_dir: PathBuf, work_tree: Option<PathBuf>) -> Result<Self, RepoError> {
        let odb = ObjectDatabase::open(vec_dir.join("objects"))?;
        let refs = RefStore::new(&vec_dir);
        let config = ConfigSet::load(Some(&vec_dir))?;
        let index_path = vec_dir.join("index");

        Ok(Self {
            vec_dir,
            work_tree,
            odb,
            refs,
            config,
            index: None,
            index_path,
        })
    }

    // --- Path accessors ---

    /// Path to the `.vec` directory.
    pub fn vec_dir(&self) -> &Path {
        &self.vec_dir
    }

    /// Path to the working tree, or an error for bare repositories.
    pub fn work_tree(&self) -> Result<&Path, RepoError> {
        self.work_tree.as_deref().ok_or(RepoError::BareNoWorkTree)
    }

    /// Is this a bare repository?
    pub fn is_bare(&self) -> bool {
        self.work_tree.is_none()
    }

    // --- Subsystem accessors ---

    /// The object database.
    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    /// The reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// The merged configuration.
    pub fn config(&self) -> &ConfigSet {
        &self.config
    }

    /// The merged configuration, mutably.
    pub fn config_mut(&mut self) -> &mut ConfigSet {
        &mut self.config
    }

    /// The index (lazy-loaded).
    pub fn index(&mut self) -> Result<&Index, RepoError> {
        if self.index.is_none() {
            self.index = Some(Index::read_from(&self.index_path)?);
        }
        Ok(self.index.as_ref().expect("just loaded"))
    }

    /// The index and object database together (lazy-loaded index).
    pub fn index_and_odb(&mut self) -> Result<(&Index, &ObjectDatabase), RepoError> {
        if self.index.is_none() {
            self.index = Some(Index::read_from(&self.index_path)?);
        }
        Ok((self.index.as_ref().expect("just loaded"), &self.odb))
    }

    /// The index, mutably (lazy-loaded).
    pub fn index_mut(&mut self) -> Result<&mut Index, RepoError> {
        if self.index.is_none() {
            self.index = Some(Index::read_from(&self.index_path)?);
        }
        Ok(self.index.as_mut().expect("just loaded"))
    }

    /// Write the in-memory index back to disk.
    pub fn write_index(&self) -> Result<(), RepoError> {
        if let Some(ref idx) = self.index {
            idx.write_to(&self.index_path)?;
        }
        Ok(())
    }

    /// Drop the cached index and reload from disk.
    pub fn reload_index(&mut self) -> Result<&Index, RepoError> {
        self.index = None;
        self.index()
    }

    /// The ignore stack for this working tree.
    pub fn ignore_stack(&self) -> Result<IgnoreStack, RepoError> {
        match self.work_tree.as_deref() {
            Some(wt) => Ok(IgnoreStack::load(wt)?),
            None => Ok(IgnoreStack::new()),
        }
    }

    // --- HEAD and identity ---

    /// Resolve HEAD to a commit OID. `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        Ok(self.refs.resolve(&RefName::head())?)
    }

    /// The current branch name, or `None` when HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<String>, RepoError> {
        match self.refs.read_head()? {
            Head::Attached(target) => Ok(Some(target.short().to_string())),
            Head::Detached(_) => Ok(None),
        }
    }

    /// Is HEAD attached to a branch that has no commits yet?
    pub fn is_unborn(&self) -> Result<bool, RepoError> {
        match self.refs.read_head()? {
            Head::Attached(target) => Ok(self.refs.resolve(&target)?.is_none()),
            Head::Detached(_) => Ok(false),
        }
    }

    /// The configured identity, stamped with the current time.
    ///
    /// Commits and reflog appends require this; there is no fallback
    /// identity.
    pub fn identity(&self) -> Result<Signature, RepoError> {
        let (name, email) = self.config.identity().ok_or(RepoError::MissingIdentity)?;
        Ok(Signature::now(name, email))
    }

    /// Append a reflog entry for a ref (and not HEAD).
    pub fn log_ref(
        &self,
        name: &RefName,
        old: ObjectId,
        new: ObjectId,
        action: &str,
        detail: Option<&str>,
    ) -> Result<(), RepoError> {
        let entry = ReflogEntry::new(old, new, self.identity()?, action, detail);
        vec_ref::reflog::append_reflog(&self.vec_dir, name, &entry)?;
        Ok(())
    }

    /// Append matching reflog entries for HEAD and, when attached, the
    /// current branch. Called after the ref itself is visible.
    pub fn log_head_update(
        &self,
        old: ObjectId,
        new: ObjectId,
        action: &str,
        detail: Option<&str>,
    ) -> Result<(), RepoError> {
        let identity = self.identity()?;
        let entry = ReflogEntry::new(old, new, identity, action, detail);
        vec_ref::reflog::append_reflog(&self.vec_dir, &RefName::head(), &entry)?;
        if let Head::Attached(branch) = self.refs.read_head()? {
            vec_ref::reflog::append_reflog(&self.vec_dir, &branch, &entry)?;
        }
        Ok(())
    }

    /// Take the repository-wide advisory lock for a mutating operation.
    pub fn lock(&self) -> Result<RepoLock, RepoError> {
        RepoLock::acquire(&self.vec_dir)
    }
}
