//! Helpers shared by every language plugin: file hashing, source-text
//! slicing, and entity/edge construction boilerplate.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tree_sitter::Node as TsNode;

use devgraph_model::{Edge, EdgeType, EntityId, Node, NodeKind, Visibility, UNRESOLVED};

use crate::parsing::plugin::PackageContext;

pub fn file_hash(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    format!("{:x}", hasher.finalize())
}

pub fn node_text<'a>(node: &TsNode, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or("")
}

/// 1-indexed line, 0-indexed column, matching tree-sitter's row/column pair
/// with the row shifted to a 1-based line number.
pub fn position(node: &TsNode) -> (u32, u32) {
    let start = node.start_position();
    (start.row as u32 + 1, start.column as u32)
}

pub fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

pub struct DeclaredSymbol<'a> {
    pub name: &'a str,
    pub kind: NodeKind,
    pub qualified_name: String,
    pub line: u32,
    pub column: u32,
}

/// Builds a [`Node`] record for a declared symbol, computing its entity id
/// from `ctx` and `canonical_path` (spec.md §4.1: repo/package/kind/hash).
pub fn make_node(ctx: &PackageContext, file_path: &str, file_hash: &str, declared: DeclaredSymbol<'_>) -> Node {
    let canonical_path = format!("{file_path}:{}", declared.qualified_name);
    let entity_id = EntityId::compute(&ctx.repo, &ctx.package, declared.kind, &canonical_path);
    Node {
        entity_id: entity_id.to_string(),
        name: declared.name.to_string(),
        qualified_name: declared.qualified_name,
        kind: declared.kind,
        visibility: if is_public(declared.name) {
            Visibility::Public
        } else {
            Visibility::Private
        },
        source_file: file_path.to_string(),
        line: declared.line,
        column: declared.column,
        repo: ctx.repo.clone(),
        package: ctx.package.clone(),
        branch: ctx.branch.clone(),
        is_deleted: false,
        updated_at: Utc::now(),
        file_hash: file_hash.to_string(),
    }
}

/// Builds an unresolved edge whose target C5 will fill in later (or leave
/// dangling if resolution fails). The callee's textual name is carried in
/// `properties["callee"]` since identity resolution needs it and `Edge` has
/// no dedicated field for a not-yet-resolved reference's spelling.
pub fn make_unresolved_edge(
    source_entity_id: &str,
    edge_type: EdgeType,
    callee: &str,
    file_path: &str,
    file_hash: &str,
    line: u32,
    column: u32,
    branch: &str,
) -> Edge {
    let mut properties = std::collections::BTreeMap::new();
    properties.insert("callee".to_string(), callee.to_string());

    Edge {
        source_entity_id: source_entity_id.to_string(),
        target_entity_id: UNRESOLVED.to_string(),
        edge_type,
        source_file_path: file_path.to_string(),
        source_file_hash: file_hash.to_string(),
        source_line: line,
        source_column: column,
        properties,
        branch: branch.to_string(),
        is_deleted: false,
        updated_at: Utc::now(),
    }
}
