//! `DomainEffect`: a rule-derived classification of a raw effect (C6 output).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// How consequential a domain effect is, totally ordered for filtering
/// (`critical > important > minor > hidden`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignificanceLevel {
    Hidden,
    Minor,
    Important,
    Critical,
}

impl SignificanceLevel {
    /// A numeric score consistent with the ordering, for callers that want a
    /// plain number rather than a comparison (mirrors how the teacher scores
    /// effect severity).
    pub fn score(&self) -> u8 {
        match self {
            SignificanceLevel::Hidden => 0,
            SignificanceLevel::Minor => 1,
            SignificanceLevel::Important => 2,
            SignificanceLevel::Critical => 3,
        }
    }
}

impl PartialOrd for SignificanceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignificanceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score().cmp(&other.score())
    }
}

impl fmt::Display for SignificanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignificanceLevel::Critical => "critical",
            SignificanceLevel::Important => "important",
            SignificanceLevel::Minor => "minor",
            SignificanceLevel::Hidden => "hidden",
        };
        f.write_str(s)
    }
}

impl FromStr for SignificanceLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "critical" => SignificanceLevel::Critical,
            "important" => SignificanceLevel::Important,
            "minor" => SignificanceLevel::Minor,
            "hidden" => SignificanceLevel::Hidden,
            other => return Err(ModelError::UnknownKind(other.to_string())),
        })
    }
}

/// A higher-level event C6 derives from an edge or node by pattern-matching
/// a raw effect against its rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEffect {
    pub source_entity_id: String,
    pub domain: String,
    pub provider: String,
    pub operation: String,
    pub significance_level: SignificanceLevel,
    pub group: Option<String>,
    pub container: Option<String>,
    pub branch: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significance_is_totally_ordered() {
        assert!(SignificanceLevel::Critical > SignificanceLevel::Important);
        assert!(SignificanceLevel::Important > SignificanceLevel::Minor);
        assert!(SignificanceLevel::Minor > SignificanceLevel::Hidden);
    }

    #[test]
    fn significance_round_trips() {
        for variant in [
            SignificanceLevel::Critical,
            SignificanceLevel::Important,
            SignificanceLevel::Minor,
            SignificanceLevel::Hidden,
        ] {
            assert_eq!(variant.to_string().parse::<SignificanceLevel>().unwrap(), variant);
        }
    }
}
