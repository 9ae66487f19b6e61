//! Error types for devgraph-ir.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error in {0}: {1}")]
    Parse(String, String),

    #[error("storage error: {0}")]
    Storage(#[from] devgraph_storage::StorageError),

    #[error("hub error: {0}")]
    Hub(#[from] devgraph_hub::HubError),

    #[error("model error: {0}")]
    Model(#[from] devgraph_model::ModelError),

    #[error("query error: {0}")]
    Query(String),

    #[error("watch error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, IrError>;
