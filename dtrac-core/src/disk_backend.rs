//! Disk-backed backend
//!
//! Layout under the repository root:
//!
//! ```text
//! uuid                 repository UUID
//! refs/head            youngest revision number
//! objects/ab/cdef...   bincode blobs, content-addressed
//! commits/<rev>.bin    bincode Commit
//! trees/<rev>.bin      bincode Tree snapshot
//! revprops/<rev>.json  explicit revision properties
//! ```
//!
//! `refs/head` is written last, so a crash mid-commit leaves the previous
//! youngest revision intact.

use crate::backend::{Backend, Staging, WritableBackend};
use crate::error::{Result, VcError};
use crate::object::{Blob, Commit, ObjectId, Tree};
use crate::properties::PropertySet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub struct DiskBackend {
    root: PathBuf,
    uuid: String,
    staging: Mutex<Staging>,
}

impl DiskBackend {
    /// Open the repository at `path`, creating it (with an empty revision 0)
    /// if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let root = path.to_path_buf();
        for dir in ["objects", "commits", "trees", "revprops", "refs"] {
            fs::create_dir_all(root.join(dir))?;
        }

        let uuid_path = root.join("uuid");
        let uuid = if uuid_path.exists() {
            fs::read_to_string(&uuid_path)?.trim().to_string()
        } else {
            let u = uuid::Uuid::new_v4().to_string();
            fs::write(&uuid_path, &u)?;
            u
        };

        let mut backend = Self {
            root,
            uuid,
            staging: Mutex::new(Staging::new(0, Tree::new())),
        };
        backend.initialize()?;
        let head = backend.youngest_rev()?;
        let tree = backend.tree(head)?;
        backend.staging = Mutex::new(Staging::new(head, tree));
        debug!("Opened disk repository {:?} at r{}", backend.root, head);
        Ok(backend)
    }

    /// Open an existing repository; fails with BackendUnavailable when the
    /// directory holds no repository.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.join("refs").join("head").exists() {
            return Err(VcError::backend(format!(
                "No repository at {}",
                path.display()
            )));
        }
        Self::open(path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn initialize(&self) -> Result<()> {
        if self.head_path().exists() {
            return Ok(());
        }
        let tree = Tree::new();
        let commit = Commit::new(
            tree.id(),
            vec![],
            String::new(),
            String::new(),
            chrono::Utc::now().timestamp(),
            vec![],
        );
        self.write_revision(0, &commit, &tree)?;
        info!("Initialized repository {} at {:?}", self.uuid, self.root);
        Ok(())
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("refs").join("head")
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    fn commit_path(&self, rev: u64) -> PathBuf {
        self.root.join("commits").join(format!("{}.bin", rev))
    }

    fn tree_path(&self, rev: u64) -> PathBuf {
        self.root.join("trees").join(format!("{}.bin", rev))
    }

    fn revprops_path(&self, rev: u64) -> PathBuf {
        self.root.join("revprops").join(format!("{}.json", rev))
    }

    /// Write to a temp file and rename into place
    fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_revision(&self, rev: u64, commit: &Commit, tree: &Tree) -> Result<()> {
        Self::write_atomic(&self.tree_path(rev), &tree.to_bytes()?)?;
        Self::write_atomic(&self.commit_path(rev), &commit.to_bytes()?)?;
        Self::write_atomic(&self.head_path(), rev.to_string().as_bytes())
    }

    fn read_revision_file(&self, path: &Path, rev: u64) -> Result<Vec<u8>> {
        if rev > self.youngest_rev()? {
            return Err(VcError::no_such_revision(rev));
        }
        fs::read(path).map_err(|e| {
            VcError::backend(format!("Failed to read {}: {}", path.display(), e))
        })
    }
}

impl Backend for DiskBackend {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn youngest_rev(&self) -> Result<u64> {
        let head = fs::read_to_string(self.head_path())?;
        head.trim()
            .parse::<u64>()
            .map_err(|e| VcError::backend(format!("Corrupt head ref {:?}: {}", head, e)))
    }

    fn get_commit(&self, rev: u64) -> Result<Commit> {
        let data = self.read_revision_file(&self.commit_path(rev), rev)?;
        Ok(Commit::from_bytes(&data)?)
    }

    fn tree(&self, rev: u64) -> Result<Tree> {
        let data = self.read_revision_file(&self.tree_path(rev), rev)?;
        Ok(Tree::from_bytes(&data)?)
    }

    fn read_blob(&self, id: &ObjectId) -> Result<Blob> {
        let path = self.object_path(id);
        if !path.exists() {
            return Err(VcError::NotFound(format!("Blob {} not found", id)));
        }
        Ok(Blob::deserialize(&fs::read(&path)?)?)
    }

    fn custom_revision_properties(&self, rev: u64) -> Result<PropertySet> {
        if rev > self.youngest_rev()? {
            return Err(VcError::no_such_revision(rev));
        }
        let path = self.revprops_path(rev);
        if !path.exists() {
            return Ok(PropertySet::new());
        }
        Ok(serde_json::from_str(&fs::read_to_string(&path)?)?)
    }
}

impl WritableBackend for DiskBackend {
    fn staging(&self) -> &Mutex<Staging> {
        &self.staging
    }

    fn store_blob(&self, blob: &Blob) -> Result<ObjectId> {
        let id = blob.id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::write_atomic(&path, &blob.to_bytes()?)?;
        Ok(id)
    }

    fn store_revision(&self, rev: u64, commit: &Commit, tree: &Tree) -> Result<()> {
        let youngest = self.youngest_rev()?;
        if rev != youngest + 1 {
            return Err(VcError::Conflict(format!(
                "Revision {} is out of sequence (youngest is {})",
                rev, youngest
            )));
        }
        self.write_revision(rev, commit, tree)
    }

    fn set_revision_property(&self, rev: u64, name: &str, value: &str) -> Result<()> {
        let mut props = self.custom_revision_properties(rev)?;
        props.set(name.to_string(), value.to_string());
        let data = serde_json::to_string_pretty(&props)?;
        Self::write_atomic(&self.revprops_path(rev), data.as_bytes())
    }
}
