//! `ExternalRef`: an unresolved cross-file/cross-package token, pending C5.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// How a module/symbol was imported at the reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportStyle {
    Named,
    Namespace,
    Default,
    SideEffect,
}

impl fmt::Display for ImportStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStyle::Named => "named",
            ImportStyle::Namespace => "namespace",
            ImportStyle::Default => "default",
            ImportStyle::SideEffect => "side-effect",
        };
        f.write_str(s)
    }
}

impl FromStr for ImportStyle {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "named" => ImportStyle::Named,
            "namespace" => ImportStyle::Namespace,
            "default" => ImportStyle::Default,
            "side-effect" => ImportStyle::SideEffect,
            other => return Err(ModelError::UnknownKind(other.to_string())),
        })
    }
}

/// A reference C4 could not resolve within the file it parsed, left for C5's
/// export-index resolution. `resolved_entity_id` starts `None` and, once C5
/// settles it, is filled in without removing the row — federated queries can
/// then explain "this import used to be unresolved, now resolved to X".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub source_entity_id: String,
    pub source_file_path: String,
    pub source_line: u32,
    pub source_column: u32,
    pub referenced_name: String,
    pub import_style: ImportStyle,
    pub module_specifier: String,
    pub alias: Option<String>,
    pub branch: String,
    #[serde(default)]
    pub resolved_entity_id: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ExternalRef {
    pub fn is_resolved(&self) -> bool {
        self.resolved_entity_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_style_round_trips() {
        for variant in [
            ImportStyle::Named,
            ImportStyle::Namespace,
            ImportStyle::Default,
            ImportStyle::SideEffect,
        ] {
            assert_eq!(variant.to_string().parse::<ImportStyle>().unwrap(), variant);
        }
    }
}
