//! Error types for devgraph-hub.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repository not found: {0}")]
    RepoNotFound(String),

    /// Raised by any operation after `close()` has released the file handle.
    #[error("hub is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, HubError>;
