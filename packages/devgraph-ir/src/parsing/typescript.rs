//! TypeScript/JavaScript structural parser.
//!
//! Walks the tree-sitter-typescript CST directly rather than compiling
//! queries: the grammar's field names are stable enough across the node
//! kinds we care about that a plain recursive descent is easier to read and
//! to extend than a query string with half a dozen capture groups.

use tree_sitter::{Node as TsNode, Parser};

use devgraph_model::{EdgeType, ExternalRef, ImportStyle, NodeKind};

use crate::error::{IrError, Result};
use crate::parsing::common::{file_hash, make_node, make_unresolved_edge, node_text, position, DeclaredSymbol};
use crate::parsing::plugin::{LanguageId, LanguagePlugin, PackageContext, ParseOutcome, RawEffect};

const IO_LIKE_CALLS: &[&str] = &[
    "fetch", "console.log", "console.error", "console.warn", "fs.readFile", "fs.writeFile",
    "fs.readFileSync", "fs.writeFileSync", "axios.get", "axios.post",
];

pub struct TypeScriptPlugin;

impl TypeScriptPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TypeScriptPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for TypeScriptPlugin {
    fn language_id(&self) -> LanguageId {
        LanguageId::TypeScript
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs"]
    }

    fn parse(&self, file_path: &str, source: &[u8], ctx: &PackageContext) -> Result<ParseOutcome> {
        let mut parser = Parser::new();
        let is_tsx = file_path.ends_with(".tsx") || file_path.ends_with(".jsx");
        let language = if is_tsx {
            tree_sitter_typescript::language_tsx()
        } else {
            tree_sitter_typescript::language_typescript()
        };
        parser
            .set_language(&language)
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

        walk(
            &tree.root_node(),
            &source_text,
            file_path,
            &hash,
            ctx,
            None,
            &mut outcome,
        );

        Ok(outcome)
    }
}

/// Recursively walks `node`, extracting declarations, imports, and calls.
/// `enclosing` is the entity id of the nearest declared symbol containing
/// `node`, used as the source of edges and raw effects.
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
        "function_declaration" | "method_definition" | "function_signature" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let kind = if node.kind() == "method_definition" {
                    NodeKind::Method
                } else {
                    NodeKind::Function
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
        "class_declaration" | "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let kind = if node.kind() == "interface_declaration" {
                    NodeKind::Interface
                } else {
                    NodeKind::Class
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
        "type_alias_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let (line, column) = position(node);
                outcome.nodes.push(make_node(
                    ctx,
                    file_path,
                    hash,
                    DeclaredSymbol {
                        name,
                        kind: NodeKind::TypeAlias,
                        qualified_name: qualify(enclosing, name),
                        line,
                        column,
                    },
                ));
            }
        }
        "import_statement" => {
            extract_import(node, source, file_path, ctx, outcome);
        }
        "call_expression" => {
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
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

fn extract_import(node: &TsNode, source: &str, file_path: &str, ctx: &PackageContext, outcome: &mut ParseOutcome) {
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let module_specifier = node_text(&source_node, source).trim_matches(|c| c == '"' || c == '\'').to_string();
    let (line, column) = position(node);

    let mut cursor = node.walk();
    let mut any_named = false;
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_clause" => {
                let mut clause_cursor = child.walk();
                for clause_child in child.children(&mut clause_cursor) {
                    match clause_child.kind() {
                        "identifier" => {
                            any_named = true;
                            outcome.external_refs.push(make_external_ref(
                                node_text(&clause_child, source),
                                ImportStyle::Default,
                                &module_specifier,
                                file_path,
                                line,
                                column,
                                ctx,
                            ));
                        }
                        "namespace_import" => {
                            any_named = true;
                            let name = node_text(&clause_child, source).trim_start_matches("* as ").trim();
                            outcome.external_refs.push(make_external_ref(
                                name,
                                ImportStyle::Namespace,
                                &module_specifier,
                                file_path,
                                line,
                                column,
                                ctx,
                            ));
                        }
                        "named_imports" => {
                            let mut named_cursor = clause_child.walk();
                            for spec in clause_child.children(&mut named_cursor) {
                                if spec.kind() == "import_specifier" {
                                    any_named = true;
                                    let name = spec
                                        .child_by_field_name("name")
                                        .map(|n| node_text(&n, source))
                                        .unwrap_or_else(|| node_text(&spec, source));
                                    outcome.external_refs.push(make_external_ref(
                                        name,
                                        ImportStyle::Named,
                                        &module_specifier,
                                        file_path,
                                        line,
                                        column,
                                        ctx,
                                    ));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if !any_named {
        outcome.external_refs.push(make_external_ref(
            &module_specifier,
            ImportStyle::SideEffect,
            &module_specifier,
            file_path,
            line,
            column,
            ctx,
        ));
    }
}

fn make_external_ref(
    referenced_name: &str,
    import_style: ImportStyle,
    module_specifier: &str,
    file_path: &str,
    line: u32,
    column: u32,
    ctx: &PackageContext,
) -> ExternalRef {
    ExternalRef {
        source_entity_id: format!("{}:{}:file:{}", ctx.repo, ctx.package, file_path),
        source_file_path: file_path.to_string(),
        source_line: line,
        source_column: column,
        referenced_name: referenced_name.to_string(),
        import_style,
        module_specifier: module_specifier.to_string(),
        alias: None,
        branch: ctx.branch.clone(),
        resolved_entity_id: None,
        is_deleted: false,
        updated_at: chrono::Utc::now(),
    }
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
    let Some(function_node) = node.child_by_field_name("function") else {
        return;
    };
    let callee = node_text(&function_node, source);
    let (line, column) = position(node);

    outcome.edges.push(make_unresolved_edge(
        enclosing,
        EdgeType::Calls,
        callee,
        file_path,
        hash,
        line,
        column,
        &ctx.branch,
    ));

    if IO_LIKE_CALLS.contains(&callee) || callee.contains('.') {
        outcome.raw_effects.push(RawEffect {
            source_entity_id: enclosing.to_string(),
            operation: callee.to_string(),
            module: callee.split('.').next().map(str::to_string),
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
    fn extracts_function_and_class_declarations() {
        let source = b"export function greet(name: string) {}\nclass Widget { render() {} }\n";
        let outcome = TypeScriptPlugin::new().parse("lib/a.ts", source, &ctx()).unwrap();
        assert!(outcome.nodes.iter().any(|n| n.name == "greet" && n.kind == NodeKind::Function));
        assert!(outcome.nodes.iter().any(|n| n.name == "Widget" && n.kind == NodeKind::Class));
        assert!(outcome.nodes.iter().any(|n| n.name == "render" && n.kind == NodeKind::Method));
    }

    #[test]
    fn extracts_named_imports() {
        let source = b"import { parseFoo } from './foo';\n";
        let outcome = TypeScriptPlugin::new().parse("lib/a.ts", source, &ctx()).unwrap();
        assert!(outcome
            .external_refs
            .iter()
            .any(|r| r.referenced_name == "parseFoo" && r.module_specifier == "./foo"));
    }

    #[test]
    fn tags_io_like_calls_as_raw_effects() {
        let source = b"function handler() { fetch('https://example.com'); }\n";
        let outcome = TypeScriptPlugin::new().parse("lib/a.ts", source, &ctx()).unwrap();
        assert!(outcome.raw_effects.iter().any(|e| e.operation == "fetch"));
    }

    #[test]
    fn jsx_extension_uses_tsx_grammar_without_erroring() {
        let source = b"export function App() { return 1; }\n";
        let outcome = TypeScriptPlugin::new().parse("src/App.jsx", source, &ctx()).unwrap();
        assert!(outcome.parse_errors.is_empty());
    }
}
