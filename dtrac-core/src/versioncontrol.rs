//! Version-control abstraction
//!
//! [`Repository`] is the read-only contract consumers (browsers, timeline,
//! href builders) program against. [`Node`] and [`Changeset`] are projections
//! built on demand from a [`Backend`]; nothing here is persisted.

use crate::authz::Authorizer;
use crate::backend::Backend;
use crate::cache;
use crate::error::{Result, VcError};
use crate::object::{TreeEntry, normalize_path};
use crate::properties::{PropertySet, svn_props};
use bytes::Bytes;
use rusqlite::Connection;
use std::sync::Arc;

pub use crate::object::{ChangeAction, NodeKind};

/// Read-only repository contract
pub trait Repository {
    fn get_changeset(&self, rev: u64) -> Result<Changeset>;

    /// Node at `path` in `rev`, or in the youngest revision when `rev` is `None`
    fn get_node(&self, path: &str, rev: Option<u64>) -> Result<Node>;

    fn oldest_rev(&self) -> Result<u64>;

    fn youngest_rev(&self) -> Result<u64>;

    /// Revision before `rev`; `None` for the oldest
    fn previous_rev(&self, rev: u64) -> Result<Option<u64>>;

    /// Revision after `rev`; `None` for the youngest
    fn next_rev(&self, rev: u64) -> Result<Option<u64>>;

    /// Most recent revision in the cache's `revision` table, by time
    fn youngest_rev_in_cache(&self, store: &Connection) -> Result<Option<u64>> {
        cache::youngest_cached_rev(store)
    }
}

/// One path-level change in a changeset
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: String,
    pub kind: NodeKind,
    pub action: ChangeAction,
    pub base_path: Option<String>,
    pub base_rev: Option<u64>,
}

/// The set of path changes made by one revision
#[derive(Debug, Clone)]
pub struct Changeset {
    pub rev: u64,
    pub message: String,
    pub author: String,
    /// Unix seconds
    pub date: i64,
    pub changes: Vec<Change>,
}

impl Changeset {
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn date_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.date, 0)
    }
}

/// A versioned file or directory at a specific revision
pub struct Node {
    pub path: String,
    pub rev: u64,
    kind: NodeKind,
    /// `None` for the root directory
    entry: Option<TreeEntry>,
    backend: Arc<dyn Backend>,
    authz: Arc<dyn Authorizer>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("path", &self.path)
            .field("rev", &self.rev)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Last path component; empty for the root
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// File content, read from the backend on each call
    pub fn content(&self) -> Result<Bytes> {
        match &self.entry {
            Some(entry) if entry.kind == NodeKind::File => {
                Ok(Bytes::from(self.backend.read_blob(&entry.id)?.data))
            }
            _ => Err(VcError::NotFound(format!(
                "{} is a directory and has no content",
                self.path
            ))),
        }
    }

    /// Children visible to the authorizer; empty for files
    pub fn entries(&self) -> Result<Vec<Node>> {
        if self.is_file() {
            return Ok(Vec::new());
        }
        let tree = self.backend.tree(self.rev)?;
        Ok(tree
            .children(&self.path)
            .filter(|e| self.authz.has_permission(&e.path))
            .map(|e| Node {
                path: e.path.clone(),
                rev: self.rev,
                kind: e.kind,
                entry: Some(e.clone()),
                backend: Arc::clone(&self.backend),
                authz: Arc::clone(&self.authz),
            })
            .collect())
    }

    pub fn properties(&self) -> PropertySet {
        self.entry
            .as_ref()
            .map(|e| e.properties.clone())
            .unwrap_or_default()
    }

    /// Size in bytes; `None` for directories
    pub fn content_length(&self) -> Option<u64> {
        match &self.entry {
            Some(e) if e.kind == NodeKind::File => Some(e.size),
            _ => None,
        }
    }

    /// `svn:mime-type`, else a guess from the file extension
    pub fn content_type(&self) -> Option<String> {
        if self.is_directory() {
            return None;
        }
        if let Some(mime) = self.entry.as_ref().and_then(|e| e.properties.get(svn_props::MIME_TYPE)) {
            return Some(mime.clone());
        }
        guess_mime_type(self.name()).map(str::to_string)
    }

    /// Revision in which this node last changed, at or before `rev`
    pub fn created_rev(&self) -> Result<u64> {
        let mut created = None;
        self.backend
            .get_logs(&[self.path.as_str()], self.rev, 0, 1, false, &mut |entry| {
                created = Some(entry.rev);
                Ok(())
            })?;
        Ok(created.unwrap_or(0))
    }

    /// Timestamp (Unix seconds) of the created revision
    pub fn last_modified(&self) -> Result<i64> {
        Ok(self.backend.get_commit(self.created_rev()?)?.timestamp)
    }

    /// (path, rev) pairs, newest first, following copies and moves back
    pub fn history(&self) -> Result<Vec<(String, u64)>> {
        let mut history = Vec::new();
        self.backend
            .get_logs(&[self.path.as_str()], self.rev, 0, 0, false, &mut |entry| {
                for path in &entry.paths {
                    history.push((path.clone(), entry.rev));
                }
                Ok(())
            })?;
        Ok(history)
    }
}

/// Extension-based content type for files without `svn:mime-type`
fn guess_mime_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" | "text" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "md" => "text/x-markdown",
        "c" | "h" => "text/x-csrc",
        "cpp" | "cc" | "hpp" => "text/x-c++src",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/x-gzip",
        _ => return None,
    };
    Some(mime)
}

/// [`Repository`] over any backend, filtered through an authorizer
pub struct VersionedRepository {
    backend: Arc<dyn Backend>,
    authz: Arc<dyn Authorizer>,
}

impl VersionedRepository {
    pub fn new(backend: Arc<dyn Backend>, authz: Arc<dyn Authorizer>) -> Self {
        Self { backend, authz }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authz
    }

    fn check_rev(&self, rev: u64) -> Result<u64> {
        let oldest = self.backend.oldest_rev()?;
        let youngest = self.backend.youngest_rev()?;
        if rev < oldest || rev > youngest {
            return Err(VcError::no_such_revision(rev));
        }
        Ok(youngest)
    }
}

impl Repository for VersionedRepository {
    fn get_changeset(&self, rev: u64) -> Result<Changeset> {
        self.check_rev(rev)?;
        if !self.authz.has_permission_for_changeset(rev) {
            return Err(VcError::PermissionDenied(format!("changeset {}", rev)));
        }
        let commit = self.backend.get_commit(rev)?;
        let total = commit.changes.len();
        let changes: Vec<Change> = commit
            .changes
            .into_iter()
            .filter(|c| self.authz.has_permission(&c.path))
            .map(|c| Change {
                path: c.path,
                kind: c.kind,
                action: c.action,
                base_path: c.base_path,
                base_rev: c.base_rev,
            })
            .collect();
        if total > 0 && changes.is_empty() {
            return Err(VcError::PermissionDenied(format!("changeset {}", rev)));
        }
        Ok(Changeset {
            rev,
            message: commit.message,
            author: commit.author,
            date: commit.timestamp,
            changes,
        })
    }

    fn get_node(&self, path: &str, rev: Option<u64>) -> Result<Node> {
        let rev = match rev {
            Some(r) => {
                self.check_rev(r)?;
                r
            }
            None => self.backend.youngest_rev()?,
        };
        let path = normalize_path(path);
        self.authz.assert_permission(&path)?;

        let (kind, entry) = if path == "/" {
            (NodeKind::Directory, None)
        } else {
            let tree = self.backend.tree(rev)?;
            let entry = tree
                .get(&path)
                .cloned()
                .ok_or_else(|| VcError::no_such_node(&path, rev))?;
            (entry.kind, Some(entry))
        };

        Ok(Node {
            path,
            rev,
            kind,
            entry,
            backend: Arc::clone(&self.backend),
            authz: Arc::clone(&self.authz),
        })
    }

    fn oldest_rev(&self) -> Result<u64> {
        self.backend.oldest_rev()
    }

    fn youngest_rev(&self) -> Result<u64> {
        self.backend.youngest_rev()
    }

    fn previous_rev(&self, rev: u64) -> Result<Option<u64>> {
        self.check_rev(rev)?;
        let oldest = self.backend.oldest_rev()?;
        Ok(if rev > oldest { Some(rev - 1) } else { None })
    }

    fn next_rev(&self, rev: u64) -> Result<Option<u64>> {
        let youngest = self.check_rev(rev)?;
        Ok(if rev < youngest { Some(rev + 1) } else { None })
    }
}
