//! Error taxonomy for the version-control layer and the revision cache

/// Result type for version-control and cache operations
pub type Result<T> = std::result::Result<T, VcError>;

/// Errors raised by repositories, authorizers, backends and the sync engine
#[derive(Debug, thiserror::Error)]
pub enum VcError {
    /// Unknown revision or path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authorizer veto
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend could not be reached or its storage is unreadable
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Diff or write failure while mirroring history into the cache
    #[error("Sync failed: {0}")]
    SyncFailure(String),

    /// A staged edit collides with the existing tree
    #[error("Path conflict: {0}")]
    Conflict(String),

    /// Invalid configuration or authz file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cache store error outside of a sync
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl VcError {
    pub fn no_such_revision(rev: u64) -> Self {
        Self::NotFound(format!("No such revision {}", rev))
    }

    pub fn no_such_node(path: &str, rev: u64) -> Self {
        Self::NotFound(format!("No node {} in revision {}", path, rev))
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn sync_failure(msg: impl Into<String>) -> Self {
        Self::SyncFailure(msg.into())
    }
}

impl From<std::io::Error> for VcError {
    fn from(e: std::io::Error) -> Self {
        Self::BackendUnavailable(format!("I/O error: {}", e))
    }
}

impl From<bincode::Error> for VcError {
    fn from(e: bincode::Error) -> Self {
        Self::BackendUnavailable(format!("Corrupt object: {}", e))
    }
}

impl From<serde_json::Error> for VcError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(format!("Invalid JSON: {}", e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for VcError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::BackendUnavailable("Backend lock poisoned".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            VcError::no_such_node("/a.txt", 2).to_string(),
            "Not found: No node /a.txt in revision 2"
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert!(matches!(VcError::from(io), VcError::BackendUnavailable(_)));
    }
}
