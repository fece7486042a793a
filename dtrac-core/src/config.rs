//! Environment configuration
//!
//! Stored as JSON (`dtrac.json`). Backend selection is an explicit enum:
//!
//! ```json
//! {
//!   "backend": { "kind": "disk", "path": "/srv/repos/project" },
//!   "cache_path": "/srv/trac/project/cache.sqlite",
//!   "authz_file": "/srv/trac/project/authz",
//!   "user": "alice",
//!   "sync_on_open": true
//! }
//! ```

use crate::authz::{Authorizer, AuthzFileAuthorizer, DefaultAuthorizer};
use crate::backend::Backend;
use crate::disk_backend::DiskBackend;
use crate::error::{Result, VcError};
use crate::memory_backend::MemoryBackend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default configuration file name
pub const CONFIG_FILE: &str = "dtrac.json";

/// Which backend an environment reads from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Empty in-memory repository
    Memory,
    /// Repository directory created by [`DiskBackend`]
    Disk { path: PathBuf },
}

impl BackendConfig {
    pub fn open(&self) -> Result<Arc<dyn Backend>> {
        match self {
            BackendConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
            BackendConfig::Disk { path } => Ok(Arc::new(DiskBackend::open_existing(path)?)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    /// SQLite cache file; in-memory when absent
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Subversion-style authz file; everything is allowed when absent
    #[serde(default)]
    pub authz_file: Option<PathBuf>,
    /// User the authorizer answers for; anonymous when absent
    #[serde(default)]
    pub user: Option<String>,
    /// Catch the cache up every time an environment is opened
    #[serde(default = "default_sync_on_open")]
    pub sync_on_open: bool,
}

fn default_sync_on_open() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            cache_path: None,
            authz_file: None,
            user: None,
            sync_on_open: default_sync_on_open(),
        }
    }
}

impl Config {
    /// Configuration for a disk repository with its cache stored alongside
    pub fn for_disk_repository(repo: &Path) -> Self {
        Self {
            backend: BackendConfig::Disk {
                path: repo.to_path_buf(),
            },
            cache_path: Some(repo.join("cache.sqlite")),
            ..Self::default()
        }
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|e| {
            VcError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data)
            .map_err(|e| VcError::Config(format!("Failed to parse config {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn authorizer(&self) -> Result<Arc<dyn Authorizer>> {
        match &self.authz_file {
            Some(file) => Ok(Arc::new(AuthzFileAuthorizer::from_file(
                file,
                self.user.as_deref(),
            )?)),
            None => Ok(Arc::new(DefaultAuthorizer)),
        }
    }
}
