//! Port trait for the seed store, so C7/C8/C9 in `devgraph-ir` depend on a
//! capability rather than this crate's file-layout details.

use async_trait::async_trait;
use devgraph_model::SeedMeta;

use crate::error::Result;
use crate::reader::SeedReader;
use crate::seed_path::SeedLayout;
use crate::writer::GenerationPayload;

/// Per-package seed access: write a new generation, open the currently
/// visible one, and run maintenance. Implementations must honor the same
/// atomicity/locking contract regardless of backing storage.
#[async_trait]
pub trait SeedStore: Send + Sync {
    async fn write_generation(&self, branch: &str, payload: &GenerationPayload, meta: &SeedMeta) -> Result<()>;
    async fn open(&self, branch: &str) -> Result<SeedReader>;
    async fn clean(&self) -> Result<()>;
}

/// Default [`SeedStore`] backed directly by the local filesystem layout this
/// crate implements. Cheap to clone: the layout is just a couple of paths.
#[derive(Clone)]
pub struct FsSeedStore {
    layout: SeedLayout,
}

impl FsSeedStore {
    pub fn new(layout: SeedLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl SeedStore for FsSeedStore {
    async fn write_generation(&self, branch: &str, payload: &GenerationPayload, meta: &SeedMeta) -> Result<()> {
        let layout = self.layout.clone();
        let branch = branch.to_string();
        let payload = payload.clone();
        let meta = meta.clone();
        tokio::task::spawn_blocking(move || crate::writer::write_generation(&layout, &branch, &payload, &meta))
            .await
            .expect("seed writer task panicked")
    }

    async fn open(&self, branch: &str) -> Result<SeedReader> {
        let layout = self.layout.clone();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || SeedReader::open(layout, &branch))
            .await
            .expect("seed reader task panicked")
    }

    async fn clean(&self) -> Result<()> {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || crate::maintenance::clean(&layout))
            .await
            .expect("seed cleanup task panicked")
    }
}
