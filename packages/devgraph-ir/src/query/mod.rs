//! Federated Query (C8): runs user SQL against the union of per-package
//! columnar artifacts via the embedded DataFusion engine.

pub mod bundles;
pub mod federated;

pub use bundles::{OutputLevel, QueryBundle};
pub use federated::{FederatedQueryEngine, QueryRequest, QueryResponse, Readiness};
