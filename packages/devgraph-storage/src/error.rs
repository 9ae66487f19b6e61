//! Error types for devgraph-storage.

use thiserror::Error;

/// Main error type for seed store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("meta.json error: {0}")]
    Meta(#[from] serde_json::Error),

    /// Another writer holds the exclusive lock on this package/branch's seed
    /// directory. The caller either waits or treats this as a `locked`
    /// readiness state (C8).
    #[error("seed directory is locked: {0}")]
    Locked(String),

    /// A post-condition the writer itself is responsible for (e.g. the
    /// descriptor is missing after a write it thinks succeeded). Fatal: the
    /// previous generation remains the visible one.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("no seed artifacts for package `{0}` on branch `{1}`")]
    NotFound(String, String),
}

/// Result type alias for devgraph-storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
