//! Error types for glucose-store

use thiserror::Error;

/// Local cache failures
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Remote store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Store temporarily inaccessible (e.g. protected data while locked)
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Rejected by remote store: {0}")]
    Rejected(String),

    #[error("Internal remote error: {0}")]
    Internal(String),
}

impl RemoteError {
    /// Expected conditions that callers may skip over
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_) | RemoteError::Unauthorized(_))
    }
}

/// Errors surfaced by the store facade
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reconciler is no longer running")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RemoteError::Unavailable("locked".into()).is_transient());
        assert!(RemoteError::Unauthorized("denied".into()).is_transient());
        assert!(!RemoteError::Rejected("bad unit".into()).is_transient());
        assert!(!RemoteError::Internal("boom".into()).is_transient());
    }
}
