//! Predefined query bundles: named SQL templates over the `{nodes}`/
//! `{edges}`/`{external_refs}`/`{effects}` views, shared verbatim between
//! the CLI's `query <bundle>` subcommands and any RPC surface built on top
//! of [`super::federated::FederatedQueryEngine`] — neither layer hand-rolls
//! its own SQL.

/// How a bundle's result set is meant to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLevel {
    /// One row per matched entity — a plain table.
    Table,
    /// A single scalar or small summary record.
    Scalar,
    /// A nested/grouped shape (e.g. call graph adjacency).
    Graph,
}

/// One named query a param map fills into a SQL template.
#[derive(Debug, Clone)]
pub struct QueryBundle {
    pub name: &'static str,
    pub description: &'static str,
    pub sql_template: &'static str,
    pub params: &'static [&'static str],
    pub output_level: OutputLevel,
}

/// Substitutes `:param` markers in a bundle's template with
/// already-escaped values. Callers must escape/validate each value
/// themselves via [`super::federated::escape_string_literal`] or
/// [`super::federated::validate_integer`] before calling this — the bundle
/// doesn't know which params are strings vs. integers.
pub fn render(bundle: &QueryBundle, values: &std::collections::BTreeMap<&str, String>) -> String {
    let mut sql = bundle.sql_template.to_string();
    for param in bundle.params {
        if let Some(value) = values.get(param) {
            sql = sql.replace(&format!(":{param}"), value);
        }
    }
    sql
}

pub fn symbol_search() -> QueryBundle {
    QueryBundle {
        name: "symbol-search",
        description: "Find nodes by name substring, optionally filtered by kind.",
        sql_template: "SELECT entity_id, name, qualified_name, kind, source_file, line \
                        FROM {nodes} \
                        WHERE is_deleted = false AND name LIKE '%:name%' \
                        ORDER BY qualified_name",
        params: &["name"],
        output_level: OutputLevel::Table,
    }
}

pub fn dependencies() -> QueryBundle {
    QueryBundle {
        name: "dependencies",
        description: "Entities a given entity depends on (outgoing edges).",
        sql_template: "SELECT e.edge_type, n.entity_id, n.name, n.qualified_name, n.source_file \
                        FROM {edges} e JOIN {nodes} n ON n.entity_id = e.target_entity_id \
                        WHERE e.is_deleted = false AND n.is_deleted = false \
                        AND e.source_entity_id = ':entity_id'",
        params: &["entity_id"],
        output_level: OutputLevel::Table,
    }
}

pub fn dependents() -> QueryBundle {
    QueryBundle {
        name: "dependents",
        description: "Entities that depend on a given entity (incoming edges).",
        sql_template: "SELECT e.edge_type, n.entity_id, n.name, n.qualified_name, n.source_file \
                        FROM {edges} e JOIN {nodes} n ON n.entity_id = e.source_entity_id \
                        WHERE e.is_deleted = false AND n.is_deleted = false \
                        AND e.target_entity_id = ':entity_id'",
        params: &["entity_id"],
        output_level: OutputLevel::Table,
    }
}

pub fn call_graph() -> QueryBundle {
    QueryBundle {
        name: "call-graph",
        description: "CALLS edges fanning out from a given entity.",
        sql_template: "SELECT source_entity_id, target_entity_id, source_file_path, source_line \
                        FROM {edges} \
                        WHERE is_deleted = false AND edge_type = 'CALLS' \
                        AND source_entity_id = ':entity_id'",
        params: &["entity_id"],
        output_level: OutputLevel::Graph,
    }
}

pub fn affected() -> QueryBundle {
    QueryBundle {
        name: "affected",
        description: "Entities transitively impacted by a change to a given file, via dependent edges.",
        sql_template: "WITH RECURSIVE affected(entity_id) AS ( \
                            SELECT entity_id FROM {nodes} WHERE is_deleted = false AND source_file = ':source_file' \
                            UNION \
                            SELECT e.source_entity_id FROM {edges} e \
                            JOIN affected a ON e.target_entity_id = a.entity_id \
                            WHERE e.is_deleted = false \
                        ) \
                        SELECT DISTINCT n.entity_id, n.name, n.qualified_name, n.source_file \
                        FROM affected a JOIN {nodes} n ON n.entity_id = a.entity_id \
                        WHERE n.is_deleted = false AND n.source_file <> ':source_file'",
        params: &["source_file"],
        output_level: OutputLevel::Table,
    }
}

pub fn import_graph() -> QueryBundle {
    QueryBundle {
        name: "import-graph",
        description: "External references made by a given source file.",
        sql_template: "SELECT referenced_name, module_specifier, import_style, alias, resolved_entity_id \
                        FROM {external_refs} \
                        WHERE source_file_path = ':source_file'",
        params: &["source_file"],
        output_level: OutputLevel::Table,
    }
}

pub fn file_symbols() -> QueryBundle {
    QueryBundle {
        name: "file-symbols",
        description: "All non-deleted entities declared in a given file.",
        sql_template: "SELECT entity_id, name, qualified_name, kind, line, column \
                        FROM {nodes} \
                        WHERE is_deleted = false AND source_file = ':source_file' \
                        ORDER BY line",
        params: &["source_file"],
        output_level: OutputLevel::Table,
    }
}

pub fn schema_introspection() -> QueryBundle {
    QueryBundle {
        name: "schema",
        description: "Row counts per table, a cheap health check for a package's seed.",
        sql_template: "SELECT 'nodes' AS table_name, COUNT(*) AS row_count FROM {nodes} \
                        UNION ALL SELECT 'edges', COUNT(*) FROM {edges} \
                        UNION ALL SELECT 'external_refs', COUNT(*) FROM {external_refs} \
                        UNION ALL SELECT 'effects', COUNT(*) FROM {effects}",
        params: &[],
        output_level: OutputLevel::Scalar,
    }
}

/// Every bundle, in the order the CLI lists them.
pub fn all() -> Vec<QueryBundle> {
    vec![
        symbol_search(),
        dependencies(),
        dependents(),
        call_graph(),
        affected(),
        import_graph(),
        file_symbols(),
        schema_introspection(),
    ]
}

pub fn by_name(name: &str) -> Option<QueryBundle> {
    all().into_iter().find(|b| b.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_escaped_params() {
        let bundle = symbol_search();
        let mut values = std::collections::BTreeMap::new();
        values.insert("name", "parse".to_string());
        let sql = render(&bundle, &values);
        assert!(sql.contains("name LIKE '%parse%'"));
    }

    #[test]
    fn by_name_finds_known_bundles() {
        assert!(by_name("call-graph").is_some());
        assert!(by_name("nonexistent").is_none());
    }

    #[test]
    fn every_bundle_name_is_unique() {
        let names: std::collections::HashSet<_> = all().iter().map(|b| b.name).collect();
        assert_eq!(names.len(), all().len());
    }
}
