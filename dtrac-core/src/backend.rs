//! Backend collaborator contract
//!
//! A [`Backend`] is the storage a [`crate::versioncontrol::Repository`] and the
//! revision cache read from. Two backends ship with the crate:
//! [`crate::memory_backend::MemoryBackend`] and
//! [`crate::disk_backend::DiskBackend`]. Both accept edits through
//! [`WritableBackend`], which stages changes against the youngest revision
//! and turns them into a new revision on commit.

use crate::error::{Result, VcError};
use crate::object::{
    ChangeAction, Commit, DeltaTree, NodeKind, ObjectId, PathChange, Tree, TreeEntry, Blob,
    ancestors, is_descendant, normalize_path,
};
use crate::properties::{PropertySet, svn_props};
use std::sync::Mutex;
use tracing::{debug, info};

/// One revision reported by [`Backend::get_logs`]
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub rev: u64,
    pub author: String,
    pub message: String,
    pub timestamp: i64,
    pub changes: Vec<PathChange>,
    /// Followed paths (as named in this revision) that the revision touched
    pub paths: Vec<String>,
}

/// Read side of a version-control backend
pub trait Backend: Send + Sync {
    /// Repository UUID
    fn uuid(&self) -> &str;

    fn oldest_rev(&self) -> Result<u64> {
        Ok(0)
    }

    fn youngest_rev(&self) -> Result<u64>;

    fn get_commit(&self, rev: u64) -> Result<Commit>;

    /// Flat tree snapshot of `rev`
    fn tree(&self, rev: u64) -> Result<Tree>;

    fn read_blob(&self, id: &ObjectId) -> Result<Blob>;

    /// Revision properties set explicitly after commit
    fn custom_revision_properties(&self, rev: u64) -> Result<PropertySet>;

    /// Revision property lookup; `svn:author`, `svn:log` and `svn:date`
    /// fall back to the commit itself.
    fn revision_property(&self, rev: u64, name: &str) -> Result<Option<String>> {
        if let Some(value) = self.custom_revision_properties(rev)?.get(name) {
            return Ok(Some(value.clone()));
        }
        let commit = self.get_commit(rev)?;
        Ok(match name {
            svn_props::REV_AUTHOR => Some(commit.author),
            svn_props::REV_LOG => Some(commit.message),
            svn_props::REV_DATE => chrono::DateTime::from_timestamp(commit.timestamp, 0)
                .map(|d| d.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)),
            _ => None,
        })
    }

    /// Structural diff between two roots
    fn get_tree_delta(&self, old_root: &Tree, new_root: &Tree) -> Result<DeltaTree> {
        Ok(DeltaTree::compute(old_root, new_root))
    }

    /// Walk history from `from_rev` down to `to_rev` (either order is
    /// accepted), calling `callback` for every revision that touched one of
    /// `paths`, or for every revision when `paths` is empty.
    ///
    /// Copies and moves are followed to their base path unless
    /// `strict_copy_history` is set, in which case a path's history ends at
    /// the revision that created it. A `limit` of 0 means unlimited.
    fn get_logs(
        &self,
        paths: &[&str],
        from_rev: u64,
        to_rev: u64,
        limit: usize,
        strict_copy_history: bool,
        callback: &mut dyn FnMut(&LogEntry) -> Result<()>,
    ) -> Result<()> {
        let (hi, lo) = if from_rev >= to_rev {
            (from_rev, to_rev)
        } else {
            (to_rev, from_rev)
        };
        if hi > self.youngest_rev()? {
            return Err(VcError::no_such_revision(hi));
        }

        let follow_all = paths.is_empty();
        // (path, youngest revision in which the path is known under that name)
        let mut tracked: Vec<(String, u64)> =
            paths.iter().map(|p| (normalize_path(p), hi)).collect();
        let mut emitted = 0usize;

        for rev in (lo..=hi).rev() {
            if !follow_all && tracked.is_empty() {
                break;
            }
            let commit = self.get_commit(rev)?;

            let mut matched = Vec::new();
            let mut next: Vec<(String, u64)> = Vec::with_capacity(tracked.len());
            for (path, upto) in &tracked {
                if rev > *upto {
                    next.push((path.clone(), *upto));
                    continue;
                }
                if commit.changes.iter().any(|c| touches(c, path)) {
                    matched.push(path.clone());
                }
                match origin_of(&commit, path) {
                    None => next.push((path.clone(), *upto)),
                    Some(change) => {
                        if let (Some(base), false) = (&change.base_path, strict_copy_history) {
                            let suffix = &path[change.path.len()..];
                            let base_rev = change.base_rev.unwrap_or(rev.saturating_sub(1));
                            next.push((normalize_path(&format!("{}{}", base, suffix)), base_rev));
                        }
                    }
                }
            }
            next.dedup();
            tracked = next;

            if follow_all || !matched.is_empty() {
                let entry = LogEntry {
                    rev,
                    author: commit.author,
                    message: commit.message,
                    timestamp: commit.timestamp,
                    changes: commit.changes,
                    paths: matched,
                };
                callback(&entry)?;
                emitted += 1;
                if limit > 0 && emitted >= limit {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Whether `change` affects the history of `path`
fn touches(change: &PathChange, path: &str) -> bool {
    // an ancestor only counts when it brought `path` into existence
    let creates = matches!(
        change.action,
        ChangeAction::Add | ChangeAction::Copy | ChangeAction::Move
    );
    let on_path =
        |p: &str| p == path || is_descendant(p, path) || (creates && is_descendant(path, p));
    on_path(&change.path)
        || (change.action == ChangeAction::Move
            && change.base_path.as_deref().map(on_path).unwrap_or(false))
}

/// The change that brought `path` into existence in this commit, if any
fn origin_of<'a>(commit: &'a Commit, path: &str) -> Option<&'a PathChange> {
    commit
        .changes
        .iter()
        .filter(|c| c.path == path || is_descendant(path, &c.path))
        .filter(|c| {
            matches!(
                c.action,
                ChangeAction::Add | ChangeAction::Copy | ChangeAction::Move
            )
        })
        // nearest ancestor wins
        .max_by_key(|c| c.path.len())
}

/// Uncommitted edits against a base revision
#[derive(Debug, Clone)]
pub struct Staging {
    base_rev: u64,
    tree: Tree,
    changes: Vec<PathChange>,
}

impl Staging {
    pub fn new(base_rev: u64, tree: Tree) -> Self {
        Self {
            base_rev,
            tree,
            changes: Vec::new(),
        }
    }

    pub fn base_rev(&self) -> u64 {
        self.base_rev
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn changes(&self) -> &[PathChange] {
        &self.changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    fn record(&mut self, change: PathChange) {
        if let Some(pos) = self.changes.iter().position(|c| c.path == change.path) {
            let prev = self.changes[pos].action;
            match (prev, change.action) {
                (ChangeAction::Add | ChangeAction::Copy | ChangeAction::Move, ChangeAction::Edit) => {}
                (ChangeAction::Add | ChangeAction::Copy, ChangeAction::Delete) => {
                    self.changes.remove(pos);
                }
                (ChangeAction::Move, ChangeAction::Delete) => {
                    let moved = self.changes.remove(pos);
                    self.delete_move_source(moved);
                }
                _ => self.changes[pos] = change,
            }
            return;
        }
        self.changes.push(change);
    }

    /// A moved path was deleted again: what disappears is the move source
    fn delete_move_source(&mut self, moved: PathChange) {
        let Some(base) = moved.base_path else {
            return;
        };
        match self.changes.iter_mut().find(|c| c.path == base) {
            // something new was staged at the old name
            Some(c) if c.action == ChangeAction::Add => c.action = ChangeAction::Edit,
            Some(_) => {}
            None => self.changes.push(PathChange {
                path: base,
                kind: moved.kind,
                action: ChangeAction::Delete,
                base_path: None,
                base_rev: None,
            }),
        }
    }

    /// Drop changes below a deleted path, keeping the removal of move
    /// sources that lie outside it
    fn forget_below(&mut self, path: &str) {
        let (below, kept): (Vec<PathChange>, Vec<PathChange>) = std::mem::take(&mut self.changes)
            .into_iter()
            .partition(|c| is_descendant(&c.path, path));
        self.changes = kept;
        for change in below {
            let outside = change
                .base_path
                .as_deref()
                .map(|b| b != path && !is_descendant(b, path))
                .unwrap_or(false);
            if change.action == ChangeAction::Move && outside {
                self.delete_move_source(change);
            }
        }
    }

    fn check_target(&self, path: &str) -> Result<String> {
        let path = normalize_path(path);
        if path == "/" {
            return Err(VcError::Conflict("Cannot replace the repository root".to_string()));
        }
        Ok(path)
    }

    /// Create missing parent directories of `path`
    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        for dir in ancestors(path) {
            match self.tree.get(dir) {
                Some(e) if e.kind == NodeKind::Directory => break,
                Some(_) => return Err(VcError::Conflict(format!("{} is not a directory", dir))),
                None => missing.push(dir.to_string()),
            }
        }
        for dir in missing.into_iter().rev() {
            self.tree.insert(TreeEntry::directory(dir.clone()));
            self.record(PathChange {
                path: dir,
                kind: NodeKind::Directory,
                action: ChangeAction::Add,
                base_path: None,
                base_rev: None,
            });
        }
        Ok(())
    }

    pub fn put_file(&mut self, path: &str, id: ObjectId, size: u64, executable: bool) -> Result<()> {
        let path = self.check_target(path)?;
        self.ensure_parents(&path)?;
        let (action, properties) = match self.tree.get(&path) {
            Some(e) if e.kind == NodeKind::Directory => {
                return Err(VcError::Conflict(format!("{} is a directory", path)));
            }
            Some(e) => (ChangeAction::Edit, e.properties.clone()),
            None => (ChangeAction::Add, PropertySet::new()),
        };
        let mut entry = TreeEntry::file(path.clone(), id, size, executable);
        entry.properties = properties;
        if executable {
            entry
                .properties
                .set(svn_props::EXECUTABLE.to_string(), "*".to_string());
        }
        self.tree.insert(entry);
        self.record(PathChange {
            path,
            kind: NodeKind::File,
            action,
            base_path: None,
            base_rev: None,
        });
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let path = self.check_target(path)?;
        if self.tree.contains(&path) {
            return Err(VcError::Conflict(format!("{} already exists", path)));
        }
        self.ensure_parents(&path)?;
        self.tree.insert(TreeEntry::directory(path.clone()));
        self.record(PathChange {
            path,
            kind: NodeKind::Directory,
            action: ChangeAction::Add,
            base_path: None,
            base_rev: None,
        });
        Ok(())
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        let path = self.check_target(path)?;
        let kind = self
            .tree
            .get(&path)
            .map(|e| e.kind)
            .ok_or_else(|| VcError::no_such_node(&path, self.base_rev))?;
        self.tree.remove_subtree(&path);
        self.forget_below(&path);
        self.record(PathChange {
            path,
            kind,
            action: ChangeAction::Delete,
            base_path: None,
            base_rev: None,
        });
        Ok(())
    }

    /// Copy `from`@`from_rev` (looked up in `source`) to `to`
    pub fn copy(&mut self, source: &Tree, from: &str, from_rev: u64, to: &str) -> Result<()> {
        let from = normalize_path(from);
        let to = self.check_target(to)?;
        if self.tree.contains(&to) {
            return Err(VcError::Conflict(format!("{} already exists", to)));
        }
        let entries: Vec<TreeEntry> = if from == "/" {
            source.iter().cloned().collect()
        } else {
            source.subtree(&from).cloned().collect()
        };
        let kind = if from == "/" {
            NodeKind::Directory
        } else {
            entries
                .first()
                .map(|e| e.kind)
                .ok_or_else(|| VcError::no_such_node(&from, from_rev))?
        };
        self.ensure_parents(&to)?;
        if from == "/" {
            self.tree.insert(TreeEntry::directory(to.clone()));
        }
        for mut entry in entries {
            entry.path = rebase(&entry.path, &from, &to);
            self.tree.insert(entry);
        }
        self.record(PathChange {
            path: to,
            kind,
            action: ChangeAction::Copy,
            base_path: Some(from),
            base_rev: Some(from_rev),
        });
        Ok(())
    }

    /// Move `from` to `to` within the staged tree
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let from = self.check_target(from)?;
        let to = self.check_target(to)?;
        if self.tree.contains(&to) {
            return Err(VcError::Conflict(format!("{} already exists", to)));
        }
        if is_descendant(&to, &from) {
            return Err(VcError::Conflict(format!("Cannot move {} into itself", from)));
        }
        let kind = self
            .tree
            .get(&from)
            .map(|e| e.kind)
            .ok_or_else(|| VcError::no_such_node(&from, self.base_rev))?;
        // fails before anything is touched
        self.ensure_parents(&to)?;

        for mut entry in self.tree.remove_subtree(&from) {
            entry.path = rebase(&entry.path, &from, &to);
            self.tree.insert(entry);
        }

        let staged = self
            .changes
            .iter()
            .position(|c| c.path == from)
            .map(|pos| self.changes.remove(pos));
        let (below, kept): (Vec<PathChange>, Vec<PathChange>) = std::mem::take(&mut self.changes)
            .into_iter()
            .partition(|c| is_descendant(&c.path, &from));
        self.changes = kept;

        let moved = match staged {
            // path is new in this staging, so it has no committed origin
            Some(c) if c.action == ChangeAction::Add => Some(PathChange {
                path: to.clone(),
                kind,
                action: ChangeAction::Add,
                base_path: None,
                base_rev: None,
            }),
            // moved back to where it came from
            Some(c)
                if c.action == ChangeAction::Move
                    && c.base_path.as_deref() == Some(to.as_str())
                    && c.base_rev == Some(self.base_rev) =>
            {
                None
            }
            Some(c) if matches!(c.action, ChangeAction::Copy | ChangeAction::Move) => {
                Some(PathChange {
                    path: to.clone(),
                    kind,
                    action: c.action,
                    base_path: c.base_path,
                    base_rev: c.base_rev,
                })
            }
            _ => Some(PathChange {
                path: to.clone(),
                kind,
                action: ChangeAction::Move,
                base_path: Some(from.clone()),
                base_rev: Some(self.base_rev),
            }),
        };
        if let Some(moved) = moved {
            self.record(moved);
        }
        for mut change in below {
            if change.action == ChangeAction::Delete {
                continue;
            }
            change.path = rebase(&change.path, &from, &to);
            self.record(change);
        }
        Ok(())
    }

    pub fn set_property(&mut self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        let path = normalize_path(path);
        let entry = self
            .tree
            .get_mut(&path)
            .ok_or_else(|| VcError::no_such_node(&path, self.base_rev))?;
        match value {
            Some(v) => entry.properties.set(name.to_string(), v.to_string()),
            None => {
                entry.properties.remove(name);
            }
        }
        let kind = entry.kind;
        self.record(PathChange {
            path,
            kind,
            action: ChangeAction::Edit,
            base_path: None,
            base_rev: None,
        });
        Ok(())
    }

    /// Tree and recorded changes for the next revision
    pub fn snapshot(&self) -> (Tree, Vec<PathChange>) {
        (self.tree.clone(), self.changes.clone())
    }

    /// Start over on top of `rev`
    pub fn reset(&mut self, rev: u64, tree: Tree) {
        self.base_rev = rev;
        self.tree = tree;
        self.changes.clear();
    }
}

fn rebase(path: &str, from: &str, to: &str) -> String {
    if from == "/" {
        normalize_path(&format!("{}{}", to, path))
    } else {
        normalize_path(&format!("{}{}", to, &path[from.len()..]))
    }
}

/// Write side shared by the bundled backends
pub trait WritableBackend: Backend {
    fn staging(&self) -> &Mutex<Staging>;

    /// Store a blob, returning its id
    fn store_blob(&self, blob: &Blob) -> Result<ObjectId>;

    /// Persist revision `rev`; must be youngest + 1
    fn store_revision(&self, rev: u64, commit: &Commit, tree: &Tree) -> Result<()>;

    fn set_revision_property(&self, rev: u64, name: &str, value: &str) -> Result<()>;

    fn add_file(&self, path: &str, content: Vec<u8>, executable: bool) -> Result<ObjectId> {
        let blob = Blob::new(content, executable);
        let id = self.store_blob(&blob)?;
        self.staging()
            .lock()?
            .put_file(path, id, blob.size(), executable)?;
        Ok(id)
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        self.staging().lock()?.mkdir(path)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.staging().lock()?.delete(path)
    }

    fn copy(&self, from: &str, from_rev: u64, to: &str) -> Result<()> {
        let source = self.tree(from_rev)?;
        self.staging().lock()?.copy(&source, from, from_rev, to)
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.staging().lock()?.rename(from, to)
    }

    fn set_property(&self, path: &str, name: &str, value: Option<&str>) -> Result<()> {
        self.staging().lock()?.set_property(path, name, value)
    }

    /// Turn the staged edits into a new revision
    fn commit(&self, author: &str, message: &str, timestamp: i64) -> Result<u64> {
        let mut staging = self.staging().lock()?;
        let youngest = self.youngest_rev()?;
        if staging.base_rev() != youngest {
            return Err(VcError::Conflict(format!(
                "Staged edits are based on r{} but youngest is r{}",
                staging.base_rev(),
                youngest
            )));
        }
        let parent = self.get_commit(youngest)?;
        let (tree, changes) = staging.snapshot();
        let commit = Commit::new(
            tree.id(),
            vec![parent.id()],
            author.to_string(),
            message.to_string(),
            timestamp,
            changes,
        );
        let rev = youngest + 1;
        self.store_revision(rev, &commit, &tree)?;
        debug!("Stored r{} with {} changes", rev, commit.changes.len());
        staging.reset(rev, tree);
        info!("Committed revision {} by {}", rev, author);
        Ok(rev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging() -> Staging {
        Staging::new(0, Tree::new())
    }

    fn oid(data: &[u8]) -> ObjectId {
        ObjectId::from_data(data)
    }

    #[test]
    fn test_put_file_creates_parents() {
        let mut s = staging();
        s.put_file("trunk/src/main.c", oid(b"x"), 1, false).unwrap();
        let actions: Vec<(&str, ChangeAction)> =
            s.changes().iter().map(|c| (c.path.as_str(), c.action)).collect();
        assert_eq!(
            actions,
            vec![
                ("/trunk", ChangeAction::Add),
                ("/trunk/src", ChangeAction::Add),
                ("/trunk/src/main.c", ChangeAction::Add),
            ]
        );
        assert!(s.tree().is_dir("/trunk/src"));
    }

    #[test]
    fn test_add_then_edit_stays_add() {
        let mut s = staging();
        s.put_file("/a.txt", oid(b"1"), 1, false).unwrap();
        s.put_file("/a.txt", oid(b"2"), 1, false).unwrap();
        assert_eq!(s.changes().len(), 1);
        assert_eq!(s.changes()[0].action, ChangeAction::Add);
    }

    #[test]
    fn test_add_then_delete_cancels() {
        let mut s = staging();
        s.put_file("/a.txt", oid(b"1"), 1, false).unwrap();
        s.delete("/a.txt").unwrap();
        assert!(!s.is_dirty());
        assert!(s.tree().is_empty());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut s = staging();
        assert!(matches!(s.delete("/nope"), Err(VcError::NotFound(_))));
    }

    #[test]
    fn test_file_as_parent_conflicts() {
        let mut s = staging();
        s.put_file("/a", oid(b"1"), 1, false).unwrap();
        assert!(matches!(
            s.put_file("/a/b", oid(b"2"), 1, false),
            Err(VcError::Conflict(_))
        ));
    }

    #[test]
    fn test_rename_records_move_with_base() {
        let mut base = Tree::new();
        base.insert(TreeEntry::directory("/old".into()));
        base.insert(TreeEntry::file("/old/f".into(), oid(b"f"), 1, false));
        let mut s = Staging::new(3, base);
        s.rename("/old", "/new").unwrap();
        assert!(s.tree().contains("/new/f"));
        assert!(!s.tree().contains("/old"));
        let change = &s.changes()[0];
        assert_eq!(change.action, ChangeAction::Move);
        assert_eq!(change.base_path.as_deref(), Some("/old"));
        assert_eq!(change.base_rev, Some(3));
    }

    #[test]
    fn test_failed_rename_keeps_source() {
        let mut base = Tree::new();
        base.insert(TreeEntry::file("/a".into(), oid(b"a"), 1, false));
        base.insert(TreeEntry::file("/f".into(), oid(b"f"), 1, false));
        let mut s = Staging::new(1, base);
        assert!(matches!(s.rename("/a", "/f/b"), Err(VcError::Conflict(_))));
        assert!(s.tree().contains("/a"));
        assert!(!s.tree().contains("/f/b"));
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_rename_of_staged_add_stays_add() {
        let mut s = staging();
        s.put_file("/a", oid(b"a"), 1, false).unwrap();
        s.rename("/a", "/b").unwrap();
        assert_eq!(
            s.changes(),
            &[PathChange {
                path: "/b".into(),
                kind: NodeKind::File,
                action: ChangeAction::Add,
                base_path: None,
                base_rev: None,
            }]
        );
    }

    #[test]
    fn test_rename_of_staged_copy_keeps_origin() {
        let mut source = Tree::new();
        source.insert(TreeEntry::directory("/trunk".into()));
        source.insert(TreeEntry::file("/trunk/a".into(), oid(b"a"), 1, false));
        let mut s = Staging::new(4, source.clone());
        s.copy(&source, "/trunk", 2, "/tmp-branch").unwrap();
        s.rename("/tmp-branch", "/branches/b1").unwrap();

        let change = s.changes().iter().find(|c| c.path == "/branches/b1").unwrap();
        assert_eq!(change.action, ChangeAction::Copy);
        assert_eq!(change.base_path.as_deref(), Some("/trunk"));
        assert_eq!(change.base_rev, Some(2));
        assert!(s.changes().iter().all(|c| c.path != "/tmp-branch"));
    }

    #[test]
    fn test_rename_back_cancels_move() {
        let mut base = Tree::new();
        base.insert(TreeEntry::file("/a".into(), oid(b"a"), 1, false));
        let mut s = Staging::new(1, base.clone());
        s.rename("/a", "/b").unwrap();
        s.rename("/b", "/a").unwrap();
        assert!(!s.is_dirty());
        assert_eq!(s.tree(), &base);
    }

    #[test]
    fn test_delete_after_rename_deletes_source() {
        let mut base = Tree::new();
        base.insert(TreeEntry::file("/old".into(), oid(b"o"), 1, false));
        let mut s = Staging::new(1, base);
        s.rename("/old", "/new").unwrap();
        s.delete("/new").unwrap();
        assert_eq!(
            s.changes(),
            &[PathChange {
                path: "/old".into(),
                kind: NodeKind::File,
                action: ChangeAction::Delete,
                base_path: None,
                base_rev: None,
            }]
        );
        assert!(s.tree().is_empty());
    }

    #[test]
    fn test_delete_parent_of_move_target_deletes_source() {
        let mut base = Tree::new();
        base.insert(TreeEntry::file("/old".into(), oid(b"o"), 1, false));
        base.insert(TreeEntry::directory("/dir".into()));
        let mut s = Staging::new(1, base);
        s.rename("/old", "/dir/new").unwrap();
        s.delete("/dir").unwrap();
        let actions: Vec<(&str, ChangeAction)> =
            s.changes().iter().map(|c| (c.path.as_str(), c.action)).collect();
        assert_eq!(
            actions,
            vec![("/old", ChangeAction::Delete), ("/dir", ChangeAction::Delete)]
        );
    }

    #[test]
    fn test_copy_from_older_tree() {
        let mut source = Tree::new();
        source.insert(TreeEntry::directory("/trunk".into()));
        source.insert(TreeEntry::file("/trunk/a".into(), oid(b"a"), 1, false));
        let mut s = Staging::new(5, source.clone());
        s.copy(&source, "/trunk", 2, "/branches/b1").unwrap();
        assert!(s.tree().contains("/branches/b1/a"));
        let copy = s.changes().iter().find(|c| c.path == "/branches/b1").unwrap();
        assert_eq!(copy.action, ChangeAction::Copy);
        assert_eq!(copy.base_rev, Some(2));
        assert!(matches!(
            s.copy(&source, "/missing", 2, "/x"),
            Err(VcError::NotFound(_))
        ));
    }

    #[test]
    fn test_set_property_records_edit() {
        let mut base = Tree::new();
        base.insert(TreeEntry::file("/a.png".into(), oid(b"png"), 3, false));
        let mut s = Staging::new(1, base);
        s.set_property("/a.png", svn_props::MIME_TYPE, Some("image/png"))
            .unwrap();
        assert_eq!(s.changes()[0].action, ChangeAction::Edit);
        assert_eq!(
            s.tree().get("/a.png").unwrap().properties.get(svn_props::MIME_TYPE),
            Some(&"image/png".to_string())
        );
    }
}
