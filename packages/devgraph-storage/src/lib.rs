//! Columnar seed store (C2): per-package, per-branch `nodes`/`edges`/
//! `external_refs`/`effects` artifacts written atomically to a `.seed`
//! directory, readable independently of any in-flight write.

pub mod error;
pub mod lock;
pub mod maintenance;
pub mod ports;
pub mod reader;
pub mod schema;
pub mod seed_path;
pub mod symbol_index;
pub mod writer;

pub use error::{Result, StorageError};
pub use ports::{FsSeedStore, SeedStore};
pub use reader::SeedReader;
pub use seed_path::SeedLayout;
pub use symbol_index::SeedSymbolIndex;
pub use writer::GenerationPayload;
