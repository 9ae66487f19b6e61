//! Semantic Resolver (C5): replaces `unresolved` edge targets and
//! [`ExternalRef`] tokens with real entity ids by identity alone — no type
//! inference, no overload resolution beyond name disambiguation.

use std::collections::HashMap;

use devgraph_model::{is_unresolved, Edge, ExternalRef, Node};
use tracing::warn;

use crate::config::LanguageResolverConfig;

/// `module_specifier` × `exported_name` → candidate entity ids. More than
/// one candidate for the same key means an ambiguous export, reported as a
/// warning and left unresolved rather than guessed at.
#[derive(Debug, Default)]
pub struct ExportIndex {
    by_key: HashMap<(String, String), Vec<String>>,
}

impl ExportIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every public node in `nodes` under `module_specifier` (the
    /// package's own name, so in-package imports resolve too) and under the
    /// file's own path, so relative imports match as well.
    pub fn index_package(&mut self, module_specifier: &str, nodes: &[Node]) {
        for node in nodes {
            if node.is_deleted {
                continue;
            }
            if !matches!(node.visibility, devgraph_model::Visibility::Public) {
                continue;
            }
            self.by_key
                .entry((module_specifier.to_string(), node.name.clone()))
                .or_default()
                .push(node.entity_id.clone());
            self.by_key
                .entry((node.source_file.clone(), node.name.clone()))
                .or_default()
                .push(node.entity_id.clone());
        }
    }

    pub fn lookup(&self, module_specifier: &str, name: &str) -> Lookup {
        match self.by_key.get(&(module_specifier.to_string(), name.to_string())) {
            None => Lookup::Missing,
            Some(candidates) if candidates.len() == 1 => Lookup::Resolved(candidates[0].clone()),
            Some(candidates) => Lookup::Ambiguous(candidates.clone()),
        }
    }
}

pub enum Lookup {
    Resolved(String),
    Ambiguous(Vec<String>),
    Missing,
}

/// Outcome of one resolution pass, kept separate from the mutated
/// nodes/edges/refs so callers can report counts without re-walking them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    pub edges_resolved: u32,
    pub refs_resolved: u32,
    pub ambiguous: u32,
    pub skipped_disabled: bool,
}

/// A batch resolver for one language within one package.
pub struct Resolver {
    config: LanguageResolverConfig,
}

impl Resolver {
    pub fn new(config: LanguageResolverConfig) -> Self {
        Self { config }
    }

    /// Resolves `edges`/`external_refs` in place against `index`. Fails
    /// soft: a disabled resolver (or one whose language tooling is
    /// unavailable) leaves everything unresolved and reports
    /// `skipped_disabled`, never an error — queries can still locate
    /// unresolved rows via `external_refs`.
    pub fn resolve(&self, index: &ExportIndex, edges: &mut [Edge], external_refs: &mut [ExternalRef]) -> ResolveReport {
        let mut report = ResolveReport::default();
        if !self.config.enabled {
            report.skipped_disabled = true;
            return report;
        }

        for external_ref in external_refs.iter_mut() {
            if external_ref.is_resolved() {
                continue;
            }
            match index.lookup(&external_ref.module_specifier, &external_ref.referenced_name) {
                Lookup::Resolved(entity_id) => {
                    external_ref.resolved_entity_id = Some(entity_id);
                    report.refs_resolved += 1;
                }
                Lookup::Ambiguous(candidates) => {
                    warn!(
                        module = %external_ref.module_specifier,
                        name = %external_ref.referenced_name,
                        candidates = candidates.len(),
                        "ambiguous export, leaving unresolved"
                    );
                    report.ambiguous += 1;
                }
                Lookup::Missing => {}
            }
        }

        for edge in edges.iter_mut() {
            if !is_unresolved(&edge.target_entity_id) {
                continue;
            }
            let Some(callee) = edge.properties.get("callee").cloned() else {
                continue;
            };
            // Strip a member-access/path prefix: `obj.method` or `mod::item`
            // resolve by their bare trailing identifier within the package,
            // since C4 only tags the call site, not the receiver's type.
            let bare_name = callee.rsplit(['.', ':']).next().unwrap_or(&callee);

            match index.lookup(&edge.source_file_path, bare_name) {
                Lookup::Resolved(entity_id) => {
                    edge.target_entity_id = entity_id;
                    report.edges_resolved += 1;
                }
                Lookup::Ambiguous(_) => report.ambiguous += 1,
                Lookup::Missing => {}
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use devgraph_model::{ImportStyle, NodeKind, Visibility};

    fn node(name: &str, file: &str) -> Node {
        Node {
            entity_id: format!("r:p:function:{name}"),
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: NodeKind::Function,
            visibility: Visibility::Public,
            source_file: file.to_string(),
            line: 1,
            column: 0,
            repo: "r".into(),
            package: "p".into(),
            branch: "main".into(),
            is_deleted: false,
            updated_at: Utc::now(),
            file_hash: "abc".into(),
        }
    }

    fn external_ref(module: &str, name: &str) -> ExternalRef {
        ExternalRef {
            source_entity_id: "r:p:file:a.ts".into(),
            source_file_path: "a.ts".into(),
            source_line: 1,
            source_column: 0,
            referenced_name: name.to_string(),
            import_style: ImportStyle::Named,
            module_specifier: module.to_string(),
            alias: None,
            branch: "main".into(),
            resolved_entity_id: None,
            is_deleted: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn resolves_unambiguous_export() {
        let mut index = ExportIndex::new();
        index.index_package("core", &[node("parseFoo", "lib/a.ts")]);

        let mut refs = vec![external_ref("core", "parseFoo")];
        let mut edges = vec![];
        let resolver = Resolver::new(LanguageResolverConfig::default());
        let report = resolver.resolve(&index, &mut edges, &mut refs);

        assert_eq!(report.refs_resolved, 1);
        assert_eq!(refs[0].resolved_entity_id.as_deref(), Some("r:p:function:parseFoo"));
    }

    #[test]
    fn ambiguous_export_is_left_unresolved() {
        let mut index = ExportIndex::new();
        index.index_package("core", &[node("parseFoo", "lib/a.ts"), node("parseFoo", "lib/b.ts")]);

        let mut refs = vec![external_ref("core", "parseFoo")];
        let mut edges = vec![];
        let resolver = Resolver::new(LanguageResolverConfig::default());
        let report = resolver.resolve(&index, &mut edges, &mut refs);

        assert_eq!(report.ambiguous, 1);
        assert!(refs[0].resolved_entity_id.is_none());
    }

    #[test]
    fn disabled_resolver_skips_without_erroring() {
        let index = ExportIndex::new();
        let mut refs = vec![external_ref("core", "parseFoo")];
        let mut edges = vec![];
        let mut config = LanguageResolverConfig::default();
        config.enabled = false;
        let resolver = Resolver::new(config);
        let report = resolver.resolve(&index, &mut edges, &mut refs);

        assert!(report.skipped_disabled);
        assert!(refs[0].resolved_entity_id.is_none());
    }

    #[test]
    fn resolves_call_edge_by_bare_callee_name() {
        let mut index = ExportIndex::new();
        index.index_package("core", &[node("helper", "a.ts")]);

        let mut properties = std::collections::BTreeMap::new();
        properties.insert("callee".to_string(), "helper".to_string());
        let mut edges = vec![Edge {
            source_entity_id: "r:p:function:caller".into(),
            target_entity_id: devgraph_model::UNRESOLVED.to_string(),
            edge_type: devgraph_model::EdgeType::Calls,
            source_file_path: "a.ts".into(),
            source_file_hash: "abc".into(),
            source_line: 1,
            source_column: 0,
            properties,
            branch: "main".into(),
            is_deleted: false,
            updated_at: Utc::now(),
        }];
        let mut refs = vec![];
        let resolver = Resolver::new(LanguageResolverConfig::default());
        let report = resolver.resolve(&index, &mut edges, &mut refs);

        assert_eq!(report.edges_resolved, 1);
        assert_eq!(edges[0].target_entity_id, "r:p:function:helper");
    }

    #[test]
    fn missing_export_leaves_ref_unresolved_without_warning_noise() {
        let index = ExportIndex::new();
        let mut refs = vec![external_ref("core", "doesNotExist")];
        let mut edges = vec![];
        let resolver = Resolver::new(LanguageResolverConfig::default());
        let report = resolver.resolve(&index, &mut edges, &mut refs);

        assert_eq!(report.refs_resolved, 0);
        assert_eq!(report.ambiguous, 0);
    }
}
