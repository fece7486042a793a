//! Core object model for the native backends
//!
//! Content-addressed Blob objects plus one flat Tree snapshot and one Commit
//! per revision. Tree entries are keyed by normalized absolute path
//! (`/trunk/src/main.c`); the root directory itself is implicit.

use crate::properties::PropertySet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// File content object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub data: Vec<u8>,
    pub executable: bool,
}

impl Blob {
    pub fn new(data: Vec<u8>, executable: bool) -> Self {
        Self { data, executable }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Content address; the executable bit is tracked on the tree entry
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&self.data)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Kind of a versioned node. Fixed for the lifetime of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    /// Single-character code stored in the cache
    pub fn code(&self) -> &'static str {
        match self {
            NodeKind::File => "F",
            NodeKind::Directory => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(NodeKind::File),
            "D" => Some(NodeKind::Directory),
            _ => None,
        }
    }
}

/// Tree entry: one versioned path in a revision snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Normalized absolute path
    pub path: String,
    /// Blob id for files; the id of empty content for directories
    pub id: ObjectId,
    pub kind: NodeKind,
    /// Unix mode
    pub mode: u32,
    /// Content size in bytes (0 for directories)
    pub size: u64,
    #[serde(default)]
    pub properties: PropertySet,
}

impl TreeEntry {
    pub fn file(path: String, id: ObjectId, size: u64, executable: bool) -> Self {
        Self {
            path,
            id,
            kind: NodeKind::File,
            mode: if executable { 0o755 } else { 0o644 },
            size,
            properties: PropertySet::new(),
        }
    }

    pub fn directory(path: String) -> Self {
        Self {
            path,
            id: ObjectId::from_data(&[]),
            kind: NodeKind::Directory,
            mode: 0o755,
            size: 0,
            properties: PropertySet::new(),
        }
    }

    /// Whether content or properties differ from `other`
    pub fn differs_from(&self, other: &TreeEntry) -> bool {
        self.id != other.id || self.mode != other.mode || self.properties != other.properties
    }
}

/// Flat snapshot of every path in a revision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or update an entry
    pub fn insert(&mut self, entry: TreeEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<TreeEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut TreeEntry> {
        self.entries.get_mut(path)
    }

    /// Whether `path` exists; the root always does
    pub fn contains(&self, path: &str) -> bool {
        path == "/" || self.entries.contains_key(path)
    }

    pub fn is_dir(&self, path: &str) -> bool {
        path == "/"
            || self
                .get(path)
                .map(|e| e.kind == NodeKind::Directory)
                .unwrap_or(false)
    }

    /// Direct children of a directory path
    pub fn children<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a TreeEntry> + 'a {
        self.subtree(dir)
            .filter(move |e| e.path != dir && parent_path(&e.path) == dir)
    }

    /// `path` itself plus every descendant
    pub fn subtree<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a TreeEntry> + 'a {
        self.entries
            .range(path.to_string()..)
            .map(|(_, e)| e)
            .take_while(move |e| e.path.starts_with(path))
            .filter(move |e| path == "/" || e.path == path || is_descendant(&e.path, path))
    }

    /// Remove `path` and everything under it
    pub fn remove_subtree(&mut self, path: &str) -> Vec<TreeEntry> {
        let doomed: Vec<String> = self.subtree(path).map(|e| e.path.clone()).collect();
        doomed
            .iter()
            .filter_map(|p| self.entries.remove(p))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&bincode::serialize(self).unwrap_or_default())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// How a path was touched by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    Add,
    Copy,
    Delete,
    Edit,
    Move,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Add => "add",
            ChangeAction::Copy => "copy",
            ChangeAction::Delete => "delete",
            ChangeAction::Edit => "edit",
            ChangeAction::Move => "move",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path change recorded when the revision was committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathChange {
    pub path: String,
    pub kind: NodeKind,
    pub action: ChangeAction,
    pub base_path: Option<String>,
    pub base_rev: Option<u64>,
}

/// Commit/Revision object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Tree snapshot for this revision
    pub tree_id: ObjectId,
    /// Parent commit IDs (empty for revision 0)
    pub parents: Vec<ObjectId>,
    pub author: String,
    pub message: String,
    /// Unix seconds
    pub timestamp: i64,
    /// Path changes in commit order
    pub changes: Vec<PathChange>,
}

impl Commit {
    pub fn new(
        tree_id: ObjectId,
        parents: Vec<ObjectId>,
        author: String,
        message: String,
        timestamp: i64,
        changes: Vec<PathChange>,
    ) -> Self {
        Self {
            tree_id,
            parents,
            author,
            message,
            timestamp,
            changes,
        }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&bincode::serialize(self).unwrap_or_default())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// The recorded change for `path`, if any
    pub fn change_for(&self, path: &str) -> Option<&PathChange> {
        self.changes.iter().find(|c| c.path == path)
    }
}

/// One entry of a structural tree diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeChange {
    Add { path: String, entry: TreeEntry },
    Delete { path: String, entry: TreeEntry },
    Modify { path: String, old: TreeEntry, new: TreeEntry },
}

impl TreeChange {
    pub fn path(&self) -> &str {
        match self {
            TreeChange::Add { path, .. }
            | TreeChange::Delete { path, .. }
            | TreeChange::Modify { path, .. } => path,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TreeChange::Add { entry, .. } | TreeChange::Delete { entry, .. } => entry.kind,
            TreeChange::Modify { new, .. } => new.kind,
        }
    }

    /// A, D or M
    pub fn code(&self) -> &'static str {
        match self {
            TreeChange::Add { .. } => "A",
            TreeChange::Delete { .. } => "D",
            TreeChange::Modify { .. } => "M",
        }
    }
}

/// Structural difference between two tree snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaTree {
    pub changes: Vec<TreeChange>,
}

impl DeltaTree {
    /// Diff `old` against `new`, in path order.
    ///
    /// A deleted directory is reported once; its descendants are implied.
    /// Added directories report their contents individually. A path whose
    /// kind changed is reported as a delete followed by an add.
    pub fn compute(old: &Tree, new: &Tree) -> Self {
        let mut changes = Vec::new();
        let mut deleted_dirs: BTreeSet<&str> = BTreeSet::new();

        let mut paths: BTreeSet<&str> = old.entries.keys().map(String::as_str).collect();
        paths.extend(new.entries.keys().map(String::as_str));

        for path in paths {
            match (old.get(path), new.get(path)) {
                (Some(o), None) => {
                    if ancestors(path).any(|a| deleted_dirs.contains(a)) {
                        continue;
                    }
                    if o.kind == NodeKind::Directory {
                        deleted_dirs.insert(path);
                    }
                    changes.push(TreeChange::Delete {
                        path: path.to_string(),
                        entry: o.clone(),
                    });
                }
                (None, Some(n)) => changes.push(TreeChange::Add {
                    path: path.to_string(),
                    entry: n.clone(),
                }),
                (Some(o), Some(n)) if o.kind != n.kind => {
                    if o.kind == NodeKind::Directory {
                        deleted_dirs.insert(path);
                    }
                    changes.push(TreeChange::Delete {
                        path: path.to_string(),
                        entry: o.clone(),
                    });
                    changes.push(TreeChange::Add {
                        path: path.to_string(),
                        entry: n.clone(),
                    });
                }
                (Some(o), Some(n)) if o.differs_from(n) => changes.push(TreeChange::Modify {
                    path: path.to_string(),
                    old: o.clone(),
                    new: n.clone(),
                }),
                _ => {}
            }
        }

        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Normalize a repository path: leading `/`, no trailing `/`, no empty
/// segments. The root is `/`.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    format!("/{}", parts.join("/"))
}

/// Parent directory of a normalized path; the root is its own parent
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

/// Whether `path` lies strictly below `ancestor`
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Proper ancestors of a normalized path, nearest first, excluding the root
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut current = path;
    std::iter::from_fn(move || {
        let parent = parent_path(current);
        if parent == "/" || parent == current {
            None
        } else {
            current = parent;
            Some(parent)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &[u8]) -> TreeEntry {
        TreeEntry::file(path.to_string(), ObjectId::from_data(content), content.len() as u64, false)
    }

    #[test]
    fn test_object_id_roundtrip() {
        let id = ObjectId::new([42u8; 32]);
        assert_eq!(id.to_hex(), "2a".repeat(32));
        assert_eq!(id.to_string(), id.to_hex());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("trunk//src/"), "/trunk/src");
        assert_eq!(normalize_path("/./a.txt"), "/a.txt");
    }

    #[test]
    fn test_parent_and_descendants() {
        assert_eq!(parent_path("/a.txt"), "/");
        assert_eq!(parent_path("/trunk/src"), "/trunk");
        assert!(is_descendant("/trunk/src", "/trunk"));
        assert!(!is_descendant("/trunk-old", "/trunk"));
        assert!(is_descendant("/a", "/"));
        let anc: Vec<&str> = ancestors("/a/b/c").collect();
        assert_eq!(anc, vec!["/a/b", "/a"]);
    }

    #[test]
    fn test_tree_children_and_subtree() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry::directory("/trunk".into()));
        tree.insert(file("/trunk/a.txt", b"a"));
        tree.insert(TreeEntry::directory("/trunk/src".into()));
        tree.insert(file("/trunk/src/main.c", b"main"));
        tree.insert(file("/trunk-old", b"x"));

        let kids: Vec<&str> = tree.children("/trunk").map(|e| e.path.as_str()).collect();
        assert_eq!(kids, vec!["/trunk/a.txt", "/trunk/src"]);
        let roots: Vec<&str> = tree.children("/").map(|e| e.path.as_str()).collect();
        assert_eq!(roots, vec!["/trunk", "/trunk-old"]);

        let removed = tree.remove_subtree("/trunk");
        assert_eq!(removed.len(), 4);
        assert!(tree.contains("/trunk-old"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_delta_add_modify_delete() {
        let mut old = Tree::new();
        old.insert(file("/a.txt", b"one"));
        old.insert(file("/b.txt", b"same"));
        let mut new = Tree::new();
        new.insert(file("/a.txt", b"two"));
        new.insert(file("/b.txt", b"same"));
        new.insert(file("/c.txt", b"new"));

        let delta = DeltaTree::compute(&old, &new);
        let codes: Vec<(&str, &str)> = delta.changes.iter().map(|c| (c.path(), c.code())).collect();
        assert_eq!(codes, vec![("/a.txt", "M"), ("/c.txt", "A")]);

        let back = DeltaTree::compute(&new, &old);
        let codes: Vec<(&str, &str)> = back.changes.iter().map(|c| (c.path(), c.code())).collect();
        assert_eq!(codes, vec![("/a.txt", "M"), ("/c.txt", "D")]);
    }

    #[test]
    fn test_delta_collapses_deleted_directory() {
        let mut old = Tree::new();
        old.insert(TreeEntry::directory("/dir".into()));
        old.insert(file("/dir/x", b"x"));
        old.insert(file("/dir-sibling", b"s"));
        let mut new = Tree::new();
        new.insert(file("/dir-sibling", b"s"));

        let delta = DeltaTree::compute(&old, &new);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.changes[0].path(), "/dir");
        assert_eq!(delta.changes[0].kind(), NodeKind::Directory);
    }

    #[test]
    fn test_delta_property_change_is_modify() {
        let mut old = Tree::new();
        old.insert(TreeEntry::directory("/d".into()));
        let mut new = old.clone();
        new.get_mut("/d")
            .unwrap()
            .properties
            .set("svn:ignore".into(), "*.o".into());
        let delta = DeltaTree::compute(&old, &new);
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].code(), "M");
    }

    #[test]
    fn test_commit_serialization() {
        let commit = Commit::new(
            ObjectId::new([1u8; 32]),
            vec![ObjectId::new([2u8; 32])],
            "Test Author".to_string(),
            "Test message".to_string(),
            1234567890,
            vec![],
        );
        let commit2 = Commit::from_bytes(&commit.to_bytes().unwrap()).unwrap();
        assert_eq!(commit.id(), commit2.id());
        assert_eq!(commit2.parents, vec![ObjectId::new([2u8; 32])]);
    }
}
