//! Hub record types: workspace repositories and unified diagnostics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// One repository registered with a workspace Hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub id: String,
    pub local_path: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// Where a [`UnifiedDiagnostic`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticSource {
    Tsc,
    Lint,
    Test,
    Coverage,
    CiCheck,
    ExternalIssue,
    Review,
}

impl fmt::Display for DiagnosticSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticSource::Tsc => "tsc",
            DiagnosticSource::Lint => "lint",
            DiagnosticSource::Test => "test",
            DiagnosticSource::Coverage => "coverage",
            DiagnosticSource::CiCheck => "ci-check",
            DiagnosticSource::ExternalIssue => "external-issue",
            DiagnosticSource::Review => "review",
        };
        f.write_str(s)
    }
}

impl FromStr for DiagnosticSource {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tsc" => DiagnosticSource::Tsc,
            "lint" => DiagnosticSource::Lint,
            "test" => DiagnosticSource::Test,
            "coverage" => DiagnosticSource::Coverage,
            "ci-check" => DiagnosticSource::CiCheck,
            "external-issue" => DiagnosticSource::ExternalIssue,
            "review" => DiagnosticSource::Review,
            other => return Err(HubError::RepoNotFound(format!("unknown diagnostic source `{other}`"))),
        })
    }
}

/// Severity of a [`UnifiedDiagnostic`], most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Suggestion,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
            Severity::Note => "note",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "critical" => Severity::Critical,
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "suggestion" => Severity::Suggestion,
            "note" => Severity::Note,
            other => return Err(HubError::RepoNotFound(format!("unknown severity `{other}`"))),
        })
    }
}

/// High-level bucket a [`UnifiedDiagnostic`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Validation,
    Workflow,
    Task,
    Feedback,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Validation => "validation",
            Category::Workflow => "workflow",
            Category::Task => "task",
            Category::Feedback => "feedback",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "validation" => Category::Validation,
            "workflow" => Category::Workflow,
            "task" => Category::Task,
            "feedback" => Category::Feedback,
            other => return Err(HubError::RepoNotFound(format!("unknown category `{other}`"))),
        })
    }
}

/// A secondary signal (CI status, external issue, validation result)
/// tracked by the Hub, independent of anything the analyzer itself parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDiagnostic {
    pub diagnostic_id: String,
    pub repo_id: String,
    pub source: DiagnosticSource,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub suggestion: Option<String>,
    pub resolved: bool,
    pub actionable: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub external_issue_ref: Option<String>,
    pub external_pr_ref: Option<String>,
    pub external_workflow_ref: Option<String>,
}

/// Filter accepted by [`crate::Hub::get_diagnostics`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticFilter {
    pub repo_id: Option<String>,
    pub source: Option<DiagnosticSource>,
    pub severities: Vec<Severity>,
    pub category: Option<Category>,
    pub file: Option<String>,
    pub resolved: Option<bool>,
    pub actionable: Option<bool>,
    pub limit: Option<u32>,
}
