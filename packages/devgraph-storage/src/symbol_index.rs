//! Columnar-backed [`SymbolIndex`] (C1): builds the lookup structure from a
//! package's seed generation, so a wildcard-pattern symbol search reads
//! straight off `nodes()` instead of round-tripping through the federated
//! query engine's SQL surface.

use devgraph_model::{CanonicalUri, EntityId, InMemorySymbolIndex, SymbolIndex};

use crate::error::Result;
use crate::reader::SeedReader;

/// Populated once from a [`SeedReader`]'s live nodes, then queried in
/// memory. Rebuild after a reader is reopened against a newer generation.
pub struct SeedSymbolIndex {
    inner: InMemorySymbolIndex,
}

impl SeedSymbolIndex {
    pub fn build(reader: &SeedReader) -> Result<Self> {
        let mut inner = InMemorySymbolIndex::new();
        for node in reader.nodes()?.into_iter().filter(|n| !n.is_deleted) {
            let Ok(entity_id) = node.entity_id.parse::<EntityId>() else {
                continue;
            };
            let uri = CanonicalUri {
                repo: node.repo,
                package: node.package,
                file: node.source_file,
                symbol_path: Some(node.qualified_name),
                version: Some(node.branch),
                line: Some(node.line),
            };
            inner.insert(entity_id, uri);
        }
        Ok(Self { inner })
    }
}

impl SymbolIndex for SeedSymbolIndex {
    fn uri_to_entity(&self, uri: &CanonicalUri) -> Option<EntityId> {
        self.inner.uri_to_entity(uri)
    }

    fn entity_to_uri(&self, entity_id: &EntityId) -> Option<CanonicalUri> {
        self.inner.entity_to_uri(entity_id)
    }

    fn entities_in_file(&self, repo: &str, package: &str, file: &str) -> Vec<EntityId> {
        self.inner.entities_in_file(repo, package, file)
    }

    fn find_by_pattern(&self, pattern: &str) -> Vec<EntityId> {
        self.inner.find_by_pattern(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed_path::SeedLayout;
    use crate::writer::{write_generation, GenerationPayload};
    use chrono::Utc;
    use devgraph_model::{NodeKind, SeedMeta, Visibility, SCHEMA_VERSION};
    use std::collections::BTreeMap;

    fn node(name: &str, qualified_name: &str) -> devgraph_model::Node {
        devgraph_model::Node {
            entity_id: EntityId::compute("acme", "core", NodeKind::Function, qualified_name).to_string(),
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind: NodeKind::Function,
            visibility: Visibility::Public,
            source_file: "a.ts".into(),
            line: 1,
            column: 0,
            repo: "acme".into(),
            package: "core".into(),
            branch: "main".into(),
            is_deleted: false,
            updated_at: Utc::now(),
            file_hash: "h1".into(),
        }
    }

    #[test]
    fn built_index_finds_entities_by_wildcard_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let meta = SeedMeta {
            schema_version: SCHEMA_VERSION,
            generation: 1,
            source_fingerprint: SeedMeta::fingerprint(["h1"]),
            analyzed_at: Utc::now(),
            parser_versions: BTreeMap::new(),
            package_path: "core".into(),
            repo_name: "acme".into(),
            branch: "main".into(),
        };
        let nodes = vec![node("render", "Widget.render"), node("parseFoo", "parseFoo")];
        write_generation(
            &layout,
            "main",
            &GenerationPayload {
                nodes: nodes.clone(),
                ..Default::default()
            },
            &meta,
        )
        .unwrap();

        let reader = SeedReader::open(layout, "main").unwrap();
        let index = SeedSymbolIndex::build(&reader).unwrap();

        let found = index.find_by_pattern("Widget*");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_string(), nodes[0].entity_id);

        assert!(index.find_by_pattern("*Foo").len() == 1);
        assert!(index.find_by_pattern("NoSuchThing*").is_empty());
    }

    #[test]
    fn tombstoned_nodes_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SeedLayout::new(dir.path());
        let meta = SeedMeta {
            schema_version: SCHEMA_VERSION,
            generation: 1,
            source_fingerprint: SeedMeta::fingerprint(["h1"]),
            analyzed_at: Utc::now(),
            parser_versions: BTreeMap::new(),
            package_path: "core".into(),
            repo_name: "acme".into(),
            branch: "main".into(),
        };
        let mut gone = node("gone", "gone");
        gone.is_deleted = true;
        write_generation(
            &layout,
            "main",
            &GenerationPayload {
                nodes: vec![gone],
                ..Default::default()
            },
            &meta,
        )
        .unwrap();

        let reader = SeedReader::open(layout, "main").unwrap();
        let index = SeedSymbolIndex::build(&reader).unwrap();
        assert!(index.find_by_pattern("*").is_empty());
    }
}
