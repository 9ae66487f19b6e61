//! Node kind/visibility vocabulary and the `Node` entity itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Kind of symbol a [`crate::Node`] declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Module,
    File,
    Namespace,
    Class,
    Interface,
    Struct,
    Enum,
    Function,
    Method,
    Field,
    Variable,
    TypeAlias,
    Constant,
}

impl NodeKind {
    /// All variants, in a stable order (used by tests and the rule engine's
    /// `is_side_effect`-style exhaustiveness checks).
    pub const ALL: &'static [NodeKind] = &[
        NodeKind::Module,
        NodeKind::File,
        NodeKind::Namespace,
        NodeKind::Class,
        NodeKind::Interface,
        NodeKind::Struct,
        NodeKind::Enum,
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Field,
        NodeKind::Variable,
        NodeKind::TypeAlias,
        NodeKind::Constant,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::File => "file",
            NodeKind::Namespace => "namespace",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Struct => "struct",
            NodeKind::Enum => "enum",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Field => "field",
            NodeKind::Variable => "variable",
            NodeKind::TypeAlias => "type_alias",
            NodeKind::Constant => "constant",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "module" => NodeKind::Module,
            "file" => NodeKind::File,
            "namespace" => NodeKind::Namespace,
            "class" => NodeKind::Class,
            "interface" => NodeKind::Interface,
            "struct" => NodeKind::Struct,
            "enum" => NodeKind::Enum,
            "function" => NodeKind::Function,
            "method" => NodeKind::Method,
            "field" => NodeKind::Field,
            "variable" => NodeKind::Variable,
            "type_alias" => NodeKind::TypeAlias,
            "constant" => NodeKind::Constant,
            other => return Err(ModelError::UnknownKind(other.to_string())),
        })
    }
}

/// Declared visibility of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A declared symbol, as emitted by a structural parser (C4) and carried
/// through resolution (C5), rule application (C6), and the seed store (C2).
///
/// `entity_id` is computed from `(repo, package, kind, canonical_path)` and
/// never from source position — two analyses of the same declaration always
/// agree on it even if the symbol moves within its file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub entity_id: String,
    pub name: String,
    pub qualified_name: String,
    pub kind: NodeKind,
    pub visibility: Visibility,
    pub source_file: String,
    pub line: u32,
    pub column: u32,
    pub repo: String,
    pub package: String,
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub file_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_round_trips_through_display_and_from_str() {
        for kind in NodeKind::ALL {
            let s = kind.to_string();
            assert_eq!(&s.parse::<NodeKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!("nonsense".parse::<NodeKind>().is_err());
    }
}
