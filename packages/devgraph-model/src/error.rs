//! Error types for devgraph-model.

use thiserror::Error;

/// Errors raised while constructing or parsing identity/addressing values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An entity id string did not split into exactly four `:`-separated parts.
    #[error("malformed entity id `{0}`: expected repo:package:kind:hash")]
    MalformedEntityId(String),

    /// An unrecognized node/edge kind string.
    #[error("unknown kind `{0}`")]
    UnknownKind(String),

    /// A canonical URI failed to parse.
    #[error("malformed URI `{0}`: {1}")]
    MalformedUri(String, String),
}

/// Result type alias for devgraph-model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
