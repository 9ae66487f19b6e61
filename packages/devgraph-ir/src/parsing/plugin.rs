//! Structural parser port (C4): the contract every language plugin
//! implements, plus the shared extraction types they all produce.

use devgraph_model::{Edge, ExternalRef, Node};

use crate::error::Result;

/// Supported language identifiers. TypeScript also claims plain
/// JavaScript's extensions — its tree-sitter grammar is a superset close
/// enough for structural extraction that a separate JS plugin would just
/// duplicate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    TypeScript,
    Python,
    Rust,
}

impl LanguageId {
    pub fn name(&self) -> &'static str {
        match self {
            LanguageId::TypeScript => "typescript",
            LanguageId::Python => "python",
            LanguageId::Rust => "rust",
        }
    }
}

/// Which package/repo/branch a file belongs to, passed into every parse
/// call so extracted nodes/edges carry correct identity inputs.
#[derive(Debug, Clone)]
pub struct PackageContext {
    pub repo: String,
    pub package: String,
    pub branch: String,
}

/// A raw, opaque, tagged operation a parser observed (e.g. a call to
/// `fetch`, `fs.readFile`, `cursor.execute`). C6 owns the vocabulary of
/// operation names; parsers only tag what they see, never domains or
/// significance.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEffect {
    pub source_entity_id: String,
    pub operation: String,
    pub module: Option<String>,
    pub provider: Option<String>,
}

/// Everything one file's structural parse produces.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub external_refs: Vec<ExternalRef>,
    pub raw_effects: Vec<RawEffect>,
    pub parse_errors: Vec<String>,
}

impl ParseOutcome {
    pub fn merge(&mut self, other: ParseOutcome) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.external_refs.extend(other.external_refs);
        self.raw_effects.extend(other.raw_effects);
        self.parse_errors.extend(other.parse_errors);
    }
}

/// One parser per language id. Implementations must be deterministic
/// (identical inputs yield byte-identical outputs) and reentrant (may run
/// in parallel across different files) — they construct their own
/// `tree_sitter::Parser` per call rather than holding one in shared state.
pub trait LanguagePlugin: Send + Sync {
    fn language_id(&self) -> LanguageId;
    fn extensions(&self) -> &'static [&'static str];

    fn supports(&self, extension: &str) -> bool {
        self.extensions().iter().any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Parses one file. Parse errors are returned inside
    /// [`ParseOutcome::parse_errors`], never as an `Err` — a single bad file
    /// must never abort the package-wide analysis.
    fn parse(&self, file_path: &str, source: &[u8], ctx: &PackageContext) -> Result<ParseOutcome>;
}
