//! Atomic generation writer. A generation's four table files are built in a
//! private staging directory, which is then renamed whole onto its
//! generation-stamped directory name in one filesystem rename — no table
//! file is ever created or replaced under a name a reader could already be
//! holding open. `meta.json`, which names the now-current generation, is
//! written and renamed last; that is the single visibility point a reader
//! can observe.

use std::fs;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use devgraph_model::{DomainEffect, Edge, ExternalRef, Node, SeedMeta};

use crate::error::Result;
use crate::lock::SeedLock;
use crate::schema::{edges_to_batch, effects_to_batch, external_refs_to_batch, nodes_to_batch};
use crate::seed_path::SeedLayout;

/// Everything one generation of a package's analysis produces, ready to be
/// made visible as a single atomic swap.
#[derive(Debug, Clone, Default)]
pub struct GenerationPayload {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub external_refs: Vec<ExternalRef>,
    pub effects: Vec<DomainEffect>,
}

/// Writes one generation of a package's seed artifacts for a branch.
///
/// Takes the write lock for the duration of the call; on any failure before
/// `meta.json` is renamed into place, the previously visible generation
/// (if any) is left untouched. The new generation's directory is built under
/// a staging name first and only becomes `gen-<N>` via a single directory
/// rename, so it is either entirely absent or entirely complete — never
/// partially written under its final name.
pub fn write_generation(layout: &SeedLayout, branch: &str, payload: &GenerationPayload, meta: &SeedMeta) -> Result<()> {
    let _lock = SeedLock::acquire(layout, branch)?;
    let branch_dir = layout.branch_dir(branch);
    fs::create_dir_all(&branch_dir)?;

    tracing::debug!(branch, generation = meta.generation, "writing seed generation");

    let staging = layout.staging_dir(branch, meta.generation);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    write_table(&staging, "nodes", nodes_to_batch(&payload.nodes)?)?;
    write_table(&staging, "edges", edges_to_batch(&payload.edges)?)?;
    write_table(&staging, "external_refs", external_refs_to_batch(&payload.external_refs)?)?;
    write_table(&staging, "effects", effects_to_batch(&payload.effects)?)?;

    let gen_dir = layout.gen_dir(branch, meta.generation);
    if gen_dir.exists() {
        fs::remove_dir_all(&gen_dir)?;
    }
    fs::rename(&staging, &gen_dir)?;

    write_meta(layout, branch, meta)?;
    tracing::debug!(branch, generation = meta.generation, "seed generation visible");
    Ok(())
}

fn write_table(staging: &std::path::Path, table: &str, batch: RecordBatch) -> Result<()> {
    let path = staging.join(format!("{table}.parquet"));

    let file = fs::File::create(&path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(batch.schema().as_ref().clone()), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_meta(layout: &SeedLayout, branch: &str, meta: &SeedMeta) -> Result<()> {
    let final_path = layout.meta_path(branch);
    let tmp_path = final_path.with_extension("json.tmp");

    let bytes = serde_json::to_vec_pretty(meta)?;
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, &final_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use devgraph_model::{EntityId, NodeKind, SCHEMA_VERSION};
    use std::collections::BTreeMap;

    fn sample_meta(generation: u64) -> SeedMeta {
        SeedMeta {
            schema_version: SCHEMA_VERSION,
            generation,
            source_fingerprint: SeedMeta::fingerprint(["h1"]),
            analyzed_at: Utc::now(),
            parser_versions: BTreeMap::new(),
            package_path: "pkg".into(),
            repo_name: "acme".into(),
            branch: "main".into(),
        }
    }

    fn sample_node() -> Node {
        let id = EntityId::compute("acme", "pkg", NodeKind::Function, "a.ts:f");
        Node {
            entity_id: id.to_string(),
            name: "f".into(),
            qualified_name: "a.ts:f".into(),
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
        }
    }

    #[test]
    fn write_generation_produces_meta_last_and_readable_tables() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let payload = GenerationPayload {
            nodes: vec![sample_node()],
            ..Default::default()
        };
        write_generation(&layout, "main", &payload, &sample_meta(1)).unwrap();

        assert!(layout.meta_path("main").exists());
        assert!(layout.table_path("main", 1, "nodes").exists());
        assert!(!layout.staging_dir("main", 1).exists());
    }

    #[test]
    fn a_second_generation_does_not_disturb_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let payload = GenerationPayload {
            nodes: vec![sample_node()],
            ..Default::default()
        };
        write_generation(&layout, "main", &payload, &sample_meta(1)).unwrap();
        write_generation(&layout, "main", &GenerationPayload::default(), &sample_meta(2)).unwrap();

        assert!(layout.table_path("main", 1, "nodes").exists());
        assert!(layout.table_path("main", 2, "nodes").exists());
    }

    #[test]
    fn a_second_writer_cannot_write_while_the_first_holds_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let _lock = SeedLock::acquire(&layout, "main").unwrap();

        let payload = GenerationPayload::default();
        let result = write_generation(&layout, "main", &payload, &sample_meta(1));
        assert!(matches!(result, Err(crate::error::StorageError::Locked(_))));
    }
}
