//! In-memory backend
//!
//! Keeps every revision, blob and revision property in process memory.
//! Used for tests and for throwaway environments.

use crate::backend::{Backend, Staging, WritableBackend};
use crate::error::{Result, VcError};
use crate::object::{Blob, Commit, ObjectId, Tree};
use crate::properties::PropertySet;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

/// In-memory repository storage
pub struct MemoryBackend {
    uuid: String,

    /// Content-addressed blobs
    blobs: RwLock<HashMap<ObjectId, Blob>>,

    /// Index is the revision number
    revisions: RwLock<Vec<(Commit, Tree)>>,

    /// Explicit revision properties
    revprops: RwLock<HashMap<u64, PropertySet>>,

    staging: Mutex<Staging>,
}

impl MemoryBackend {
    /// Create a repository holding only the empty revision 0
    pub fn new() -> Self {
        Self::with_uuid(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_uuid(uuid: String) -> Self {
        let tree = Tree::new();
        let initial = Commit::new(
            tree.id(),
            vec![],
            String::new(),
            String::new(),
            chrono::Utc::now().timestamp(),
            vec![],
        );
        Self {
            uuid,
            blobs: RwLock::new(HashMap::new()),
            revisions: RwLock::new(vec![(initial, tree.clone())]),
            revprops: RwLock::new(HashMap::new()),
            staging: Mutex::new(Staging::new(0, tree)),
        }
    }

    fn revision<T>(&self, rev: u64, f: impl FnOnce(&(Commit, Tree)) -> T) -> Result<T> {
        let revisions = self.revisions.read()?;
        revisions
            .get(rev as usize)
            .map(f)
            .ok_or_else(|| VcError::no_such_revision(rev))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn youngest_rev(&self) -> Result<u64> {
        Ok(self.revisions.read()?.len() as u64 - 1)
    }

    fn get_commit(&self, rev: u64) -> Result<Commit> {
        self.revision(rev, |(commit, _)| commit.clone())
    }

    fn tree(&self, rev: u64) -> Result<Tree> {
        self.revision(rev, |(_, tree)| tree.clone())
    }

    fn read_blob(&self, id: &ObjectId) -> Result<Blob> {
        self.blobs
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| VcError::NotFound(format!("Blob {} not found", id)))
    }

    fn custom_revision_properties(&self, rev: u64) -> Result<PropertySet> {
        if rev > self.youngest_rev()? {
            return Err(VcError::no_such_revision(rev));
        }
        Ok(self.revprops.read()?.get(&rev).cloned().unwrap_or_default())
    }
}

impl WritableBackend for MemoryBackend {
    fn staging(&self) -> &Mutex<Staging> {
        &self.staging
    }

    fn store_blob(&self, blob: &Blob) -> Result<ObjectId> {
        let id = blob.id();
        self.blobs.write()?.entry(id).or_insert_with(|| blob.clone());
        Ok(id)
    }

    fn store_revision(&self, rev: u64, commit: &Commit, tree: &Tree) -> Result<()> {
        let mut revisions = self.revisions.write()?;
        if rev as usize != revisions.len() {
            return Err(VcError::Conflict(format!(
                "Revision {} is out of sequence (next is {})",
                rev,
                revisions.len()
            )));
        }
        revisions.push((commit.clone(), tree.clone()));
        Ok(())
    }

    fn set_revision_property(&self, rev: u64, name: &str, value: &str) -> Result<()> {
        if rev > self.youngest_rev()? {
            return Err(VcError::no_such_revision(rev));
        }
        self.revprops
            .write()?
            .entry(rev)
            .or_default()
            .set(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ChangeAction;
    use crate::properties::svn_props;

    #[test]
    fn test_new_backend_is_at_revision_zero() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.youngest_rev().unwrap(), 0);
        assert_eq!(backend.oldest_rev().unwrap(), 0);
        assert!(backend.tree(0).unwrap().is_empty());
        assert_eq!(backend.uuid().len(), 36);
    }

    #[test]
    fn test_add_file_and_commit() {
        let backend = MemoryBackend::new();
        let id = backend.add_file("/a.txt", b"hello".to_vec(), false).unwrap();
        let rev = backend.commit("alice", "add a.txt", 1000).unwrap();
        assert_eq!(rev, 1);

        let tree = backend.tree(1).unwrap();
        assert_eq!(tree.get("/a.txt").unwrap().id, id);
        assert_eq!(backend.read_blob(&id).unwrap().data, b"hello".to_vec());

        let commit = backend.get_commit(1).unwrap();
        assert_eq!(commit.author, "alice");
        assert_eq!(commit.changes[0].action, ChangeAction::Add);
        assert_eq!(commit.parents, vec![backend.get_commit(0).unwrap().id()]);
    }

    #[test]
    fn test_unknown_revision() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.get_commit(7), Err(VcError::NotFound(_))));
        assert!(matches!(backend.tree(7), Err(VcError::NotFound(_))));
    }

    #[test]
    fn test_revision_properties() {
        let backend = MemoryBackend::new();
        backend.add_file("/a", b"a".to_vec(), false).unwrap();
        backend.commit("bob", "first", 0).unwrap();

        assert_eq!(
            backend.revision_property(1, svn_props::REV_AUTHOR).unwrap(),
            Some("bob".to_string())
        );
        assert_eq!(
            backend.revision_property(1, svn_props::REV_DATE).unwrap(),
            Some("1970-01-01T00:00:00.000000Z".to_string())
        );
        assert_eq!(backend.revision_property(1, "custom").unwrap(), None);

        backend
            .set_revision_property(1, svn_props::REV_LOG, "reworded")
            .unwrap();
        assert_eq!(
            backend.revision_property(1, svn_props::REV_LOG).unwrap(),
            Some("reworded".to_string())
        );
        assert!(backend.set_revision_property(9, "x", "y").is_err());
    }

    #[test]
    fn test_get_logs_follows_moves() {
        let backend = MemoryBackend::new();
        backend.add_file("/old.txt", b"1".to_vec(), false).unwrap();
        backend.commit("u", "add", 1).unwrap();
        backend.add_file("/other", b"o".to_vec(), false).unwrap();
        backend.commit("u", "unrelated", 2).unwrap();
        backend.rename("/old.txt", "/new.txt").unwrap();
        backend.commit("u", "rename", 3).unwrap();
        backend.add_file("/new.txt", b"2".to_vec(), false).unwrap();
        backend.commit("u", "edit", 4).unwrap();

        let mut seen = Vec::new();
        backend
            .get_logs(&["/new.txt"], 4, 0, 0, false, &mut |e| {
                seen.push((e.rev, e.paths.clone()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                (4, vec!["/new.txt".to_string()]),
                (3, vec!["/new.txt".to_string()]),
                (1, vec!["/old.txt".to_string()]),
            ]
        );

        let mut strict = Vec::new();
        backend
            .get_logs(&["/new.txt"], 0, 4, 0, true, &mut |e| {
                strict.push(e.rev);
                Ok(())
            })
            .unwrap();
        assert_eq!(strict, vec![4, 3]);
    }

    #[test]
    fn test_get_logs_limit_and_all_paths() {
        let backend = MemoryBackend::new();
        for i in 0..5 {
            backend
                .add_file(&format!("/f{}", i), vec![i as u8], false)
                .unwrap();
            backend.commit("u", &format!("c{}", i), i).unwrap();
        }
        let mut revs = Vec::new();
        backend
            .get_logs(&[], 5, 0, 3, false, &mut |e| {
                revs.push(e.rev);
                Ok(())
            })
            .unwrap();
        assert_eq!(revs, vec![5, 4, 3]);
        assert!(backend
            .get_logs(&[], 9, 0, 0, false, &mut |_| Ok(()))
            .is_err());
    }
}
