//! Rust structural parser.

use tree_sitter::{Node as TsNode, Parser};

use devgraph_model::{EdgeType, ExternalRef, ImportStyle, NodeKind};

use crate::error::{IrError, Result};
use crate::parsing::common::{file_hash, make_node, make_unresolved_edge, node_text, position, DeclaredSymbol};
use crate::parsing::plugin::{LanguageId, LanguagePlugin, PackageContext, ParseOutcome, RawEffect};

const IO_LIKE_CALLS: &[&str] = &[
    "println!", "eprintln!", "fs::read", "fs::write", "fs::read_to_string", "TcpStream::connect", "File::open",
];

pub struct RustPlugin;

impl RustPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for RustPlugin {
    fn language_id(&self) -> LanguageId {
        LanguageId::Rust
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn parse(&self, file_path: &str, source: &[u8], ctx: &PackageContext) -> Result<ParseOutcome> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::language())
            .map_err(|e| IrError::Parse(file_path.to_string(), e.to_string()))?;

        let source_text = String::from_utf8_lossy(source);
        let mut outcome = ParseOutcome::default();
        let Some(tree) = parser.parse(source, None) else {
            outcome.parse_errors.push(format!("{file_path}: tree-sitter failed to produce a tree"));
            return Ok(outcome);
        };
        let hash = file_hash(source);

        if tree.root_node().has_error() {
            outcome.parse_errors.push(format!("{file_path}: syntax error recovered by tree-sitter"));
        }

        walk(&tree.root_node(), &source_text, file_path, &hash, ctx, None, &mut outcome);
        Ok(outcome)
    }
}

fn walk(
    node: &TsNode,
    source: &str,
    file_path: &str,
    hash: &str,
    ctx: &PackageContext,
    enclosing: Option<&str>,
    outcome: &mut ParseOutcome,
) {
    let mut current_enclosing = enclosing.map(str::to_string);

    match node.kind() {
        "function_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let kind = if enclosing.is_some() { NodeKind::Method } else { NodeKind::Function };
                let (line, column) = position(node);
                let n = make_node(
                    ctx,
                    file_path,
                    hash,
                    DeclaredSymbol {
                        name,
                        kind,
                        qualified_name: qualify(enclosing, name),
                        line,
                        column,
                    },
                );
                current_enclosing = Some(n.entity_id.clone());
                outcome.nodes.push(n);
            }
        }
        "struct_item" | "enum_item" | "trait_item" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let kind = match node.kind() {
                    "struct_item" => NodeKind::Struct,
                    "enum_item" => NodeKind::Enum,
                    _ => NodeKind::Interface,
                };
                let (line, column) = position(node);
                let n = make_node(
                    ctx,
                    file_path,
                    hash,
                    DeclaredSymbol {
                        name,
                        kind,
                        qualified_name: qualify(enclosing, name),
                        line,
                        column,
                    },
                );
                current_enclosing = Some(n.entity_id.clone());
                outcome.nodes.push(n);
            }
        }
        "impl_item" => {
            if let Some(type_node) = node.child_by_field_name("type") {
                current_enclosing = Some(node_text(&type_node, source).to_string());
            }
        }
        "use_declaration" => {
            extract_use(node, source, file_path, ctx, outcome);
        }
        "call_expression" | "macro_invocation" => {
            if let Some(enc) = current_enclosing.as_deref() {
                extract_call(node, source, file_path, hash, enc, ctx, outcome);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(&child, source, file_path, hash, ctx, current_enclosing.as_deref(), outcome);
    }
}

fn qualify(enclosing: Option<&str>, name: &str) -> String {
    match enclosing {
        Some(parent) => format!("{parent}::{name}"),
        None => name.to_string(),
    }
}

fn extract_use(node: &TsNode, source: &str, file_path: &str, ctx: &PackageContext, outcome: &mut ParseOutcome) {
    let (line, column) = position(node);
    let Some(arg) = node.child_by_field_name("argument") else {
        return;
    };
    let text = node_text(&arg, source);
    let module_specifier = text.split("::").next().unwrap_or(text).to_string();
    let import_style = if text.contains('*') {
        ImportStyle::Namespace
    } else {
        ImportStyle::Named
    };

    outcome.external_refs.push(ExternalRef {
        source_entity_id: format!("{}:{}:file:{}", ctx.repo, ctx.package, file_path),
        source_file_path: file_path.to_string(),
        source_line: line,
        source_column: column,
        referenced_name: text.to_string(),
        import_style,
        module_specifier,
        alias: None,
        branch: ctx.branch.clone(),
        resolved_entity_id: None,
        is_deleted: false,
        updated_at: chrono::Utc::now(),
    });
}

fn extract_call(
    node: &TsNode,
    source: &str,
    file_path: &str,
    hash: &str,
    enclosing: &str,
    ctx: &PackageContext,
    outcome: &mut ParseOutcome,
) {
    let callee = match node.kind() {
        "macro_invocation" => node
            .child_by_field_name("macro")
            .map(|n| format!("{}!", node_text(&n, source)))
            .unwrap_or_default(),
        _ => node
            .child_by_field_name("function")
            .map(|n| node_text(&n, source).to_string())
            .unwrap_or_default(),
    };
    if callee.is_empty() {
        return;
    }
    let (line, column) = position(node);

    outcome.edges.push(make_unresolved_edge(
        enclosing,
        EdgeType::Calls,
        &callee,
        file_path,
        hash,
        line,
        column,
        &ctx.branch,
    ));

    if IO_LIKE_CALLS.contains(&callee.as_str()) || callee.contains("::") {
        outcome.raw_effects.push(RawEffect {
            source_entity_id: enclosing.to_string(),
            operation: callee.clone(),
            module: callee.split("::").next().map(str::to_string),
            provider: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PackageContext {
        PackageContext {
            repo: "acme/widgets".into(),
            package: "core".into(),
            branch: "main".into(),
        }
    }

    #[test]
    fn extracts_fn_struct_and_impl_methods() {
        let source = b"struct Widget;\n\nimpl Widget {\n    fn render(&self) {}\n}\n\nfn greet() {}\n";
        let outcome = RustPlugin::new().parse("src/lib.rs", source, &ctx()).unwrap();
        assert!(outcome.nodes.iter().any(|n| n.name == "Widget" && n.kind == NodeKind::Struct));
        assert!(outcome.nodes.iter().any(|n| n.name == "greet" && n.kind == NodeKind::Function));
        assert!(outcome.nodes.iter().any(|n| n.name == "render" && n.kind == NodeKind::Method));
    }

    #[test]
    fn extracts_use_declarations() {
        let source = b"use std::fs::File;\n";
        let outcome = RustPlugin::new().parse("src/lib.rs", source, &ctx()).unwrap();
        assert!(outcome.external_refs.iter().any(|r| r.module_specifier == "std"));
    }

    #[test]
    fn tags_io_like_macros_as_raw_effects() {
        let source = b"fn handler() {\n    println!(\"hi\");\n}\n";
        let outcome = RustPlugin::new().parse("src/lib.rs", source, &ctx()).unwrap();
        assert!(outcome.raw_effects.iter().any(|e| e.operation == "println!"));
    }
}
