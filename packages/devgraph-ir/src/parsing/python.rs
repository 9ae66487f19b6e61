//! Python structural parser, grounded on the same recursive-descent shape
//! as the TypeScript plugin but walking tree-sitter-python's node kinds.

use tree_sitter::{Node as TsNode, Parser};

use devgraph_model::{EdgeType, ExternalRef, ImportStyle, NodeKind};

use crate::error::{IrError, Result};
use crate::parsing::common::{file_hash, make_node, make_unresolved_edge, node_text, position, DeclaredSymbol};
use crate::parsing::plugin::{LanguageId, LanguagePlugin, PackageContext, ParseOutcome, RawEffect};

const IO_LIKE_CALLS: &[&str] = &[
    "print", "open", "requests.get", "requests.post", "os.system", "subprocess.run", "cursor.execute",
];

pub struct PythonPlugin;

impl PythonPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for PythonPlugin {
    fn language_id(&self) -> LanguageId {
        LanguageId::Python
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn parse(&self, file_path: &str, source: &[u8], ctx: &PackageContext) -> Result<ParseOutcome> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
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
        "function_definition" => {
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
        "class_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = node_text(&name_node, source);
                let (line, column) = position(node);
                let n = make_node(
                    ctx,
                    file_path,
                    hash,
                    DeclaredSymbol {
                        name,
                        kind: NodeKind::Class,
                        qualified_name: qualify(enclosing, name),
                        line,
                        column,
                    },
                );
                current_enclosing = Some(n.entity_id.clone());
                outcome.nodes.push(n);
            }
        }
        "import_statement" | "import_from_statement" => {
            extract_import(node, source, file_path, ctx, outcome);
        }
        "call" => {
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
    let (line, column) = position(node);

    if node.kind() == "import_from_statement" {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module_specifier = node_text(&module_node, source).to_string();
        let mut cursor = node.walk();
        let mut any = false;
        for child in node.children(&mut cursor) {
            if child.kind() == "dotted_name" && child.id() != module_node.id() || child.kind() == "aliased_import" {
                any = true;
                let name = node_text(&child, source);
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
        if !any {
            outcome.external_refs.push(make_external_ref(
                "*",
                ImportStyle::Named,
                &module_specifier,
                file_path,
                line,
                column,
                ctx,
            ));
        }
    } else {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "dotted_name" | "aliased_import") {
                let module_specifier = node_text(&child, source).to_string();
                outcome.external_refs.push(make_external_ref(
                    &module_specifier,
                    ImportStyle::Namespace,
                    &module_specifier,
                    file_path,
                    line,
                    column,
                    ctx,
                ));
            }
        }
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
    fn extracts_function_and_class_definitions() {
        let source = b"def greet(name):\n    pass\n\nclass Widget:\n    def render(self):\n        pass\n";
        let outcome = PythonPlugin::new().parse("lib/a.py", source, &ctx()).unwrap();
        assert!(outcome.nodes.iter().any(|n| n.name == "greet" && n.kind == NodeKind::Function));
        assert!(outcome.nodes.iter().any(|n| n.name == "Widget" && n.kind == NodeKind::Class));
        assert!(outcome.nodes.iter().any(|n| n.name == "render" && n.kind == NodeKind::Method));
    }

    #[test]
    fn extracts_from_import() {
        let source = b"from foo import parse_foo\n";
        let outcome = PythonPlugin::new().parse("lib/a.py", source, &ctx()).unwrap();
        assert!(outcome
            .external_refs
            .iter()
            .any(|r| r.referenced_name == "parse_foo" && r.module_specifier == "foo"));
    }

    #[test]
    fn tags_io_like_calls_as_raw_effects() {
        let source = b"def handler():\n    print('hi')\n";
        let outcome = PythonPlugin::new().parse("lib/a.py", source, &ctx()).unwrap();
        assert!(outcome.raw_effects.iter().any(|e| e.operation == "print"));
    }
}
