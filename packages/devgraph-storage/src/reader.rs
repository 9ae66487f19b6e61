//! Reads a package's seed generation. Opens `meta.json` first to learn which
//! generation is visible, then reads whichever table files exist — a table
//! with no file is simply empty for that package, not an error.

use std::fs::File;
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use devgraph_model::{DomainEffect, Edge, ExternalRef, Node, SeedMeta};

use crate::error::{Result, StorageError};
use crate::schema::{batch_to_edges, batch_to_effects, batch_to_external_refs, batch_to_nodes};
use crate::seed_path::{SeedLayout, TABLES};

/// A handle bound to one generation, pinned at `open()` time by the
/// generation number read from `meta.json`. Readers of an older generation
/// keep functioning even if a writer publishes a newer one, because every
/// accessor resolves table paths through that pinned generation number —
/// `gen-<N>` directories are never mutated or reused once a writer renames
/// one into place.
pub struct SeedReader {
    layout: SeedLayout,
    branch: String,
    pub meta: SeedMeta,
}

impl SeedReader {
    pub fn open(layout: SeedLayout, branch: &str) -> Result<Self> {
        let meta_path = layout.meta_path(branch);
        if !meta_path.exists() {
            return Err(StorageError::NotFound(
                layout.package_root.display().to_string(),
                branch.to_string(),
            ));
        }
        let bytes = std::fs::read(&meta_path)?;
        let meta: SeedMeta = serde_json::from_slice(&bytes)?;
        Ok(SeedReader {
            layout,
            branch: branch.to_string(),
            meta,
        })
    }

    pub fn table_path_if_exists(&self, table: &str) -> Option<std::path::PathBuf> {
        let path = self.layout.table_path(&self.branch, self.meta.generation, table);
        path.exists().then_some(path)
    }

    pub fn nodes(&self) -> Result<Vec<Node>> {
        match self.read_table("nodes")? {
            Some(batch) => batch_to_nodes(&batch),
            None => Ok(Vec::new()),
        }
    }

    pub fn edges(&self) -> Result<Vec<Edge>> {
        match self.read_table("edges")? {
            Some(batch) => batch_to_edges(&batch),
            None => Ok(Vec::new()),
        }
    }

    pub fn external_refs(&self) -> Result<Vec<ExternalRef>> {
        match self.read_table("external_refs")? {
            Some(batch) => batch_to_external_refs(&batch),
            None => Ok(Vec::new()),
        }
    }

    pub fn effects(&self) -> Result<Vec<DomainEffect>> {
        match self.read_table("effects")? {
            Some(batch) => batch_to_effects(&batch),
            None => Ok(Vec::new()),
        }
    }

    fn read_table(&self, table: &str) -> Result<Option<RecordBatch>> {
        debug_assert!(TABLES.contains(&table));
        let path = self.layout.table_path(&self.branch, self.meta.generation, table);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(read_parquet_file(&path)?))
    }
}

pub fn read_parquet_file(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;
    let batches: std::result::Result<Vec<RecordBatch>, _> = reader.collect();
    let batches = batches?;
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_generation, GenerationPayload};
    use chrono::Utc;
    use devgraph_model::SCHEMA_VERSION;
    use std::collections::BTreeMap;

    #[test]
    fn reader_reports_not_found_before_any_generation_exists() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        assert!(matches!(SeedReader::open(layout, "main"), Err(StorageError::NotFound(_, _))));
    }

    #[test]
    fn reader_sees_the_written_generation() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let meta = SeedMeta {
            schema_version: SCHEMA_VERSION,
            generation: 1,
            source_fingerprint: SeedMeta::fingerprint(["h1"]),
            analyzed_at: Utc::now(),
            parser_versions: BTreeMap::new(),
            package_path: "pkg".into(),
            repo_name: "acme".into(),
            branch: "main".into(),
        };
        write_generation(&layout, "main", &GenerationPayload::default(), &meta).unwrap();

        let reader = SeedReader::open(layout, "main").unwrap();
        assert_eq!(reader.meta.generation, 1);
        assert!(reader.nodes().unwrap().is_empty());
    }

    #[test]
    fn a_reader_opened_against_an_old_generation_never_sees_a_newer_one() {
        use devgraph_model::{EntityId, NodeKind};

        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());

        let meta_of = |generation| SeedMeta {
            schema_version: SCHEMA_VERSION,
            generation,
            source_fingerprint: SeedMeta::fingerprint(["h1"]),
            analyzed_at: Utc::now(),
            parser_versions: BTreeMap::new(),
            package_path: "pkg".into(),
            repo_name: "acme".into(),
            branch: "main".into(),
        };
        let node = |name: &'static str| devgraph_model::Node {
            entity_id: EntityId::compute("acme", "pkg", NodeKind::Function, name).to_string(),
            name: name.into(),
            qualified_name: name.into(),
            kind: NodeKind::Function,
            visibility: devgraph_model::Visibility::Public,
            source_file: "a.ts".into(),
            line: 1,
            column: 0,
            repo: "acme".into(),
            package: "pkg".into(),
            branch: "main".into(),
            is_deleted: false,
            updated_at: Utc::now(),
            file_hash: "h1".into(),
        };

        write_generation(
            &layout,
            "main",
            &GenerationPayload {
                nodes: vec![node("first")],
                ..Default::default()
            },
            &meta_of(1),
        )
        .unwrap();

        let old_reader = SeedReader::open(layout.clone(), "main").unwrap();

        write_generation(
            &layout,
            "main",
            &GenerationPayload {
                nodes: vec![node("second")],
                ..Default::default()
            },
            &meta_of(2),
        )
        .unwrap();

        // The handle opened before the second write still resolves its own
        // pinned generation's files, not the one a concurrent writer swapped in.
        assert_eq!(old_reader.meta.generation, 1);
        let names: Vec<String> = old_reader.nodes().unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["first".to_string()]);

        let new_reader = SeedReader::open(layout, "main").unwrap();
        let names: Vec<String> = new_reader.nodes().unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["second".to_string()]);
    }
}
