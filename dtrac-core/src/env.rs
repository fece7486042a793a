//! Per-request environment
//!
//! Owns the backend handle, the authorizing repository view and the cache
//! connection for the duration of one request. Opening acquires all three;
//! dropping (or [`Environment::close`]) releases them.

use crate::backend::Backend;
use crate::cache::{RevisionCache, SyncReport};
use crate::config::Config;
use crate::error::Result;
use crate::versioncontrol::{Repository, VersionedRepository};
use std::sync::Arc;
use tracing::debug;

pub struct Environment {
    config: Config,
    backend: Arc<dyn Backend>,
    repository: VersionedRepository,
    cache: RevisionCache,
}

impl Environment {
    /// Open the configured backend and cache; runs a sync when
    /// `sync_on_open` is set.
    pub fn open(config: Config) -> Result<Self> {
        let backend = config.backend.open()?;
        Self::with_backend(config, backend)
    }

    /// Open around an already constructed backend
    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Result<Self> {
        let authz = config.authorizer()?;
        let cache = match &config.cache_path {
            Some(path) => RevisionCache::open(path)?,
            None => RevisionCache::open_in_memory()?,
        };
        let repository = VersionedRepository::new(Arc::clone(&backend), authz);
        let mut env = Self {
            config,
            backend,
            repository,
            cache,
        };
        debug!("Opened environment for repository {}", env.backend.uuid());
        if env.config.sync_on_open {
            env.sync()?;
        }
        Ok(env)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn repository(&self) -> &VersionedRepository {
        &self.repository
    }

    pub fn cache(&self) -> &RevisionCache {
        &self.cache
    }

    pub fn sync(&mut self) -> Result<SyncReport> {
        self.cache.sync(self.backend.as_ref())
    }

    pub fn resync(&mut self) -> Result<SyncReport> {
        self.cache.resync(self.backend.as_ref())
    }

    /// Whether the cache lags behind the backend
    pub fn is_cache_stale(&self) -> Result<bool> {
        let cached = self.cache.youngest_stored()?.unwrap_or(0);
        Ok(cached < self.repository.youngest_rev()?)
    }

    /// Release the cache connection, surfacing close errors
    pub fn close(self) -> Result<()> {
        debug!("Closing environment for repository {}", self.backend.uuid());
        self.cache.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WritableBackend;
    use crate::memory_backend::MemoryBackend;

    #[test]
    fn test_open_syncs_when_configured() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/a.txt", b"a".to_vec(), false).unwrap();
        backend.commit("u", "add", 1).unwrap();

        let env = Environment::with_backend(Config::default(), backend.clone()).unwrap();
        assert_eq!(env.cache().revision_count().unwrap(), 1);
        assert!(!env.is_cache_stale().unwrap());

        backend.delete("/a.txt").unwrap();
        backend.commit("u", "rm", 2).unwrap();
        assert!(env.is_cache_stale().unwrap());
        env.close().unwrap();
    }

    #[test]
    fn test_open_without_sync() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_file("/a.txt", b"a".to_vec(), false).unwrap();
        backend.commit("u", "add", 1).unwrap();

        let config = Config {
            sync_on_open: false,
            ..Config::default()
        };
        let mut env = Environment::with_backend(config, backend).unwrap();
        assert_eq!(env.cache().revision_count().unwrap(), 0);
        let report = env.sync().unwrap();
        assert_eq!(report.revisions, 1);
        assert_eq!(
            env.repository()
                .youngest_rev_in_cache(env.cache().connection())
                .unwrap(),
            Some(1)
        );
    }
}
