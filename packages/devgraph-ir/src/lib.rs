//! Language router, structural parsers, semantic resolver, rule engine,
//! analyzer, federated query, and watch loop.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod language_router;
pub mod parsing;
pub mod query;
pub mod resolver;
pub mod rules;
pub mod watch;

pub use analyzer::{AnalyzeOptions, AnalyzeReport, Analyzer};
pub use config::DevgraphConfig;
pub use error::{IrError, Result};
pub use language_router::LanguageRegistry;
pub use parsing::{LanguageId, LanguagePlugin, PackageContext};
pub use query::{FederatedQueryEngine, QueryRequest, QueryResponse};
pub use resolver::Resolver;
pub use watch::{CrossRepoNeedEvent, WatchEvent, WatchHandle, WatchObserver, WatchState};
