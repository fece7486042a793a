//! DTrac Core Library
//!
//! Version-control integration layer for an issue tracker:
//! - Object model (Blob, Tree, Commit) with recorded path changes
//! - Backend abstraction with in-memory and disk implementations
//! - Authorizing repository view (changesets and nodes)
//! - SQLite revision cache kept in sync with the repository
//! - JSON configuration and a per-request environment

pub mod authz;
pub mod backend;
pub mod cache;
pub mod config;
pub mod disk_backend;
pub mod env;
pub mod error;
pub mod memory_backend;
pub mod object;
pub mod properties;
pub mod versioncontrol;

pub use authz::{AccessLevel, Authorizer, AuthzFileAuthorizer, DefaultAuthorizer, DenyAllAuthorizer};
pub use backend::{Backend, LogEntry, Staging, WritableBackend};
pub use cache::{CachedNodeChange, CachedRevision, RevisionCache, SyncReport};
pub use config::{BackendConfig, Config};
pub use disk_backend::DiskBackend;
pub use env::Environment;
pub use error::{Result, VcError};
pub use memory_backend::MemoryBackend;
pub use object::{
    Blob, ChangeAction, Commit, DeltaTree, NodeKind, ObjectId, PathChange, Tree, TreeChange,
    TreeEntry,
};
pub use properties::PropertySet;
pub use versioncontrol::{Change, Changeset, Node, Repository, VersionedRepository};
