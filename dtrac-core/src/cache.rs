//! Revision cache
//!
//! Mirrors backend history into two SQLite tables so that timeline and log
//! queries never touch the backend:
//!
//! ```text
//! revision(rev PK, time, author, message)
//! node_change(rev, path, kind, change, base_path, base_rev,
//!             UNIQUE(rev, path, change))
//! system(name PK, value)
//! ```
//!
//! The mirror is append-only. [`RevisionCache::sync`] copies every revision
//! newer than the youngest cached one inside a single transaction, so a
//! failure leaves the cache exactly as it was.

use crate::backend::Backend;
use crate::error::{Result, VcError};
use crate::object::{NodeKind, Tree};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS revision (
        rev INTEGER PRIMARY KEY,
        time INTEGER NOT NULL,
        author TEXT NOT NULL,
        message TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS node_change (
        rev INTEGER NOT NULL,
        path TEXT NOT NULL,
        kind TEXT NOT NULL,
        change TEXT NOT NULL,
        base_path TEXT,
        base_rev INTEGER,
        UNIQUE (rev, path, change)
    );
    CREATE INDEX IF NOT EXISTS node_change_rev_idx ON node_change (rev);
    CREATE TABLE IF NOT EXISTS system (
        name TEXT PRIMARY KEY,
        value TEXT
    );
";

const REPOSITORY_UUID: &str = "repository_uuid";

/// Most recent cached revision ordered by commit time, `None` when empty
pub fn youngest_cached_rev(conn: &Connection) -> Result<Option<u64>> {
    let rev: Option<i64> = conn
        .query_row(
            "SELECT rev FROM revision ORDER BY time DESC, rev DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(rev.map(|r| r as u64))
}

/// A cached `revision` row
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRevision {
    pub rev: u64,
    pub time: i64,
    pub author: String,
    pub message: String,
}

/// A cached `node_change` row
#[derive(Debug, Clone, PartialEq)]
pub struct CachedNodeChange {
    pub rev: u64,
    pub path: String,
    pub kind: NodeKind,
    /// A, D or M
    pub change: String,
    pub base_path: Option<String>,
    pub base_rev: Option<u64>,
}

/// Outcome of one sync
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Youngest revision cached before the sync
    pub from_rev: u64,
    /// Youngest revision cached after the sync
    pub to_rev: u64,
    /// `revision` rows inserted
    pub revisions: u64,
    /// `node_change` rows inserted
    pub changes: u64,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.revisions == 0
    }
}

/// SQLite mirror of repository history
pub struct RevisionCache {
    conn: Connection,
}

impl RevisionCache {
    /// Open (and create if needed) a file-backed cache
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            VcError::backend(format!(
                "Failed to open cache database at {}: {}",
                path.display(),
                e
            ))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Release the connection, reporting close errors
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| VcError::Database(e))
    }

    /// Highest cached revision number, `None` when empty
    pub fn youngest_stored(&self) -> Result<Option<u64>> {
        let rev: Option<i64> = self
            .conn
            .query_row("SELECT MAX(rev) FROM revision", [], |r| r.get(0))?;
        Ok(rev.map(|r| r as u64))
    }

    /// Bring the cache up to the backend's youngest revision
    pub fn sync(&mut self, backend: &dyn Backend) -> Result<SyncReport> {
        let tx = self.conn.transaction().map_err(sync_err)?;
        let report = sync_range(&tx, backend)?;
        tx.commit().map_err(sync_err)?;
        if report.is_noop() {
            debug!("Revision cache already at r{}", report.to_rev);
        } else {
            info!(
                "Synced revisions {}..={} ({} node changes)",
                report.from_rev + 1,
                report.to_rev,
                report.changes
            );
        }
        Ok(report)
    }

    /// Drop every cached row and rebuild from revision 1
    pub fn resync(&mut self, backend: &dyn Backend) -> Result<SyncReport> {
        let tx = self.conn.transaction().map_err(sync_err)?;
        tx.execute_batch("DELETE FROM node_change; DELETE FROM revision; DELETE FROM system;")
            .map_err(sync_err)?;
        let report = sync_range(&tx, backend)?;
        tx.commit().map_err(sync_err)?;
        info!("Rebuilt revision cache: {} revisions", report.revisions);
        Ok(report)
    }

    pub fn cached_revision(&self, rev: u64) -> Result<Option<CachedRevision>> {
        Ok(self
            .conn
            .query_row(
                "SELECT rev, time, author, message FROM revision WHERE rev = ?1",
                params![rev as i64],
                map_revision,
            )
            .optional()?)
    }

    /// Cached revisions in `[from, to]`, newest first
    pub fn cached_revisions(&self, from: u64, to: u64) -> Result<Vec<CachedRevision>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT rev, time, author, message FROM revision \
             WHERE rev >= ?1 AND rev <= ?2 ORDER BY rev DESC",
        )?;
        let rows = stmt.query_map(params![from as i64, to as i64], map_revision)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn node_changes(&self, rev: u64) -> Result<Vec<CachedNodeChange>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT rev, path, kind, change, base_path, base_rev FROM node_change \
             WHERE rev = ?1 ORDER BY path, change",
        )?;
        let rows = stmt.query_map(params![rev as i64], |r| {
            let code: String = r.get(2)?;
            let kind = NodeKind::from_code(&code).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("invalid node kind {:?}", code).into(),
                )
            })?;
            let base_rev: Option<i64> = r.get(5)?;
            Ok(CachedNodeChange {
                rev: r.get::<_, i64>(0)? as u64,
                path: r.get(1)?,
                kind,
                change: r.get(3)?,
                base_path: r.get(4)?,
                base_rev: base_rev.map(|b| b as u64),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn revision_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM revision", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    pub fn node_change_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM node_change", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// UUID of the repository this cache mirrors, once synced
    pub fn repository_uuid(&self) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM system WHERE name = ?1",
                params![REPOSITORY_UUID],
                |r| r.get(0),
            )
            .optional()?)
    }
}

fn map_revision(r: &rusqlite::Row<'_>) -> rusqlite::Result<CachedRevision> {
    Ok(CachedRevision {
        rev: r.get::<_, i64>(0)? as u64,
        time: r.get(1)?,
        author: r.get(2)?,
        message: r.get(3)?,
    })
}

fn sync_err(e: rusqlite::Error) -> VcError {
    VcError::sync_failure(e.to_string())
}

/// Refuse to mix histories of two repositories in one cache
fn check_repository(tx: &Transaction<'_>, uuid: &str) -> Result<()> {
    let stored: Option<String> = tx
        .query_row(
            "SELECT value FROM system WHERE name = ?1",
            params![REPOSITORY_UUID],
            |r| r.get(0),
        )
        .optional()
        .map_err(sync_err)?;
    match stored {
        Some(stored) if stored != uuid => Err(VcError::sync_failure(format!(
            "Cache belongs to repository {} but backend is {}; resync required",
            stored, uuid
        ))),
        Some(_) => Ok(()),
        None => {
            tx.execute(
                "INSERT INTO system (name, value) VALUES (?1, ?2)",
                params![REPOSITORY_UUID, uuid],
            )
            .map_err(sync_err)?;
            Ok(())
        }
    }
}

/// Copy revisions (youngest_stored, youngest] into the open transaction
fn sync_range(tx: &Transaction<'_>, backend: &dyn Backend) -> Result<SyncReport> {
    let started = Instant::now();
    check_repository(tx, backend.uuid())?;

    let youngest_stored: u64 = tx
        .query_row("SELECT MAX(rev) FROM revision", [], |r| r.get::<_, Option<i64>>(0))
        .map_err(sync_err)?
        .map(|r| r as u64)
        .unwrap_or(0);
    let max_rev = backend.youngest_rev()?;

    let mut report = SyncReport {
        from_rev: youngest_stored,
        to_rev: youngest_stored,
        revisions: 0,
        changes: 0,
    };
    if youngest_stored >= max_rev {
        return Ok(report);
    }

    let mut insert_change = tx
        .prepare_cached(
            "INSERT INTO node_change (rev, path, kind, change, base_path, base_rev) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(sync_err)?;
    let mut insert_rev = tx
        .prepare_cached("INSERT INTO revision (rev, time, author, message) VALUES (?1, ?2, ?3, ?4)")
        .map_err(sync_err)?;

    let mut previous: Tree = backend.tree(youngest_stored)?;
    for rev in youngest_stored + 1..=max_rev {
        let commit = backend.get_commit(rev)?;
        let current = backend.tree(rev)?;
        let delta = backend
            .get_tree_delta(&previous, &current)
            .map_err(|e| match e {
                VcError::BackendUnavailable(_) => e,
                other => VcError::sync_failure(format!("Tree delta for r{} failed: {}", rev, other)),
            })?;

        for change in &delta.changes {
            // copy/move origin as recorded by the commit
            let (base_path, base_rev) = match commit.change_for(change.path()) {
                Some(c) if change.code() == "A" => (c.base_path.clone(), c.base_rev),
                _ => (None, None),
            };
            insert_change
                .execute(params![
                    rev as i64,
                    change.path(),
                    change.kind().code(),
                    change.code(),
                    base_path,
                    base_rev.map(|b| b as i64),
                ])
                .map_err(sync_err)?;
            report.changes += 1;
        }

        insert_rev
            .execute(params![rev as i64, commit.timestamp, commit.author, commit.message])
            .map_err(sync_err)?;
        report.revisions += 1;
        report.to_rev = rev;
        debug!("Cached r{}: {} node changes", rev, delta.len());
        previous = current;
    }

    debug!(
        "Sync of {} revisions took {:?}",
        report.revisions,
        started.elapsed()
    );
    Ok(report)
}
