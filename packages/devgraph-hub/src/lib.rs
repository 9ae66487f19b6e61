//! Central Hub (C10): a workspace-level SQLite store listing registered
//! repositories and holding unified diagnostics pushed by external syncers
//! and the analyzer. Never parses source itself.

pub mod error;
pub mod hub;
pub mod models;

pub use error::{HubError, Result};
pub use hub::Hub;
pub use models::{Category, DiagnosticFilter, DiagnosticSource, RepoEntry, Severity, UnifiedDiagnostic};
