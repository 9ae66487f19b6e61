//! `Edge`: a directed relation between two entity ids.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Kind of relation an [`Edge`] asserts between its source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Calls,
    Imports,
    Extends,
    Implements,
    References,
    Defines,
    Returns,
    ParameterOf,
    FieldOf,
}

impl EdgeType {
    fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Calls => "CALLS",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Extends => "EXTENDS",
            EdgeType::Implements => "IMPLEMENTS",
            EdgeType::References => "REFERENCES",
            EdgeType::Defines => "DEFINES",
            EdgeType::Returns => "RETURNS",
            EdgeType::ParameterOf => "PARAMETER_OF",
            EdgeType::FieldOf => "FIELD_OF",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CALLS" => EdgeType::Calls,
            "IMPORTS" => EdgeType::Imports,
            "EXTENDS" => EdgeType::Extends,
            "IMPLEMENTS" => EdgeType::Implements,
            "REFERENCES" => EdgeType::References,
            "DEFINES" => EdgeType::Defines,
            "RETURNS" => EdgeType::Returns,
            "PARAMETER_OF" => EdgeType::ParameterOf,
            "FIELD_OF" => EdgeType::FieldOf,
            other => return Err(ModelError::UnknownKind(other.to_string())),
        })
    }
}

/// A directed relation between two entity ids, as emitted by C4 and
/// completed (or left dangling) by C5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_entity_id: String,
    /// May be the `unresolved` sentinel (see [`crate::entity_id::UNRESOLVED`])
    /// until C5 resolves it.
    pub target_entity_id: String,
    pub edge_type: EdgeType,
    pub source_file_path: String,
    pub source_file_hash: String,
    pub source_line: u32,
    pub source_column: u32,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Edge {
    pub fn is_resolved(&self) -> bool {
        !crate::entity_id::is_unresolved(&self.target_entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_type_round_trips_through_display_and_from_str() {
        for variant in [
            EdgeType::Calls,
            EdgeType::Imports,
            EdgeType::Extends,
            EdgeType::Implements,
            EdgeType::References,
            EdgeType::Defines,
            EdgeType::Returns,
            EdgeType::ParameterOf,
            EdgeType::FieldOf,
        ] {
            assert_eq!(variant.to_string().parse::<EdgeType>().unwrap(), variant);
        }
    }
}
