//! The central Hub: a workspace registry plus a unified-diagnostics table,
//! persisted in a single SQLite file. Never parses source itself — only
//! stores records external syncers and the analyzer push into it.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::error::{HubError, Result};
use crate::models::{Category, DiagnosticFilter, DiagnosticSource, RepoEntry, Severity, UnifiedDiagnostic};

pub struct Hub {
    conn: Mutex<Option<Connection>>,
}

impl Hub {
    /// Opens (creating if absent) the Hub database at `path` and ensures its
    /// schema exists. Idempotent: calling this again on an already
    /// initialized file is a no-op beyond the `CREATE TABLE IF NOT EXISTS`s.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| HubError::Sqlite(rusqlite::Error::from(e)))?;
        }
        let conn = Connection::open(path)?;
        let hub = Hub {
            conn: Mutex::new(Some(conn)),
        };
        hub.init()?;
        Ok(hub)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let hub = Hub {
            conn: Mutex::new(Some(conn)),
        };
        hub.init()?;
        Ok(hub)
    }

    /// Creates schema if missing. Idempotent.
    pub fn init(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS repositories (
                    id TEXT PRIMARY KEY,
                    local_path TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    registered_at INTEGER NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS unified_diagnostics (
                    diagnostic_id TEXT PRIMARY KEY,
                    repo_id TEXT NOT NULL,
                    source TEXT NOT NULL,
                    file TEXT,
                    line INTEGER,
                    column_ INTEGER,
                    severity TEXT NOT NULL,
                    category TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    suggestion TEXT,
                    resolved INTEGER NOT NULL,
                    actionable INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    external_issue_ref TEXT,
                    external_pr_ref TEXT,
                    external_workflow_ref TEXT,
                    FOREIGN KEY (repo_id) REFERENCES repositories(id)
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_diagnostics_repo_source
                 ON unified_diagnostics(repo_id, source)",
                [],
            )?;

            Ok(())
        })
    }

    pub fn register_repo(&self, id: &str, local_path: &str, metadata: serde_json::Value) -> Result<()> {
        let entry = RepoEntry {
            id: id.to_string(),
            local_path: local_path.to_string(),
            metadata,
            registered_at: chrono::Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO repositories (id, local_path, metadata, registered_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET local_path = excluded.local_path, metadata = excluded.metadata",
                params![
                    entry.id,
                    entry.local_path,
                    serde_json::to_string(&entry.metadata)?,
                    entry.registered_at.timestamp_micros(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn unregister_repo(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(HubError::RepoNotFound(id.to_string()));
            }
            Ok(())
        })
    }

    pub fn list_repos(&self) -> Result<Vec<RepoEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, local_path, metadata, registered_at FROM repositories ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                let metadata_raw: String = row.get(2)?;
                let registered_at_us: i64 = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, metadata_raw, registered_at_us))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, local_path, metadata_raw, registered_at_us) = row?;
                out.push(RepoEntry {
                    id,
                    local_path,
                    metadata: serde_json::from_str(&metadata_raw)?,
                    registered_at: micros_to_datetime(registered_at_us),
                });
            }
            Ok(out)
        })
    }

    /// Batch upsert keyed by `diagnostic_id`.
    pub fn push_diagnostics(&self, batch: &[UnifiedDiagnostic]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for d in batch {
                tx.execute(
                    "INSERT INTO unified_diagnostics (
                        diagnostic_id, repo_id, source, file, line, column_, severity, category,
                        title, description, suggestion, resolved, actionable,
                        created_at, updated_at, external_issue_ref, external_pr_ref, external_workflow_ref
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                    ON CONFLICT(diagnostic_id) DO UPDATE SET
                        repo_id = excluded.repo_id,
                        source = excluded.source,
                        file = excluded.file,
                        line = excluded.line,
                        column_ = excluded.column_,
                        severity = excluded.severity,
                        category = excluded.category,
                        title = excluded.title,
                        description = excluded.description,
                        suggestion = excluded.suggestion,
                        resolved = excluded.resolved,
                        actionable = excluded.actionable,
                        updated_at = excluded.updated_at,
                        external_issue_ref = excluded.external_issue_ref,
                        external_pr_ref = excluded.external_pr_ref,
                        external_workflow_ref = excluded.external_workflow_ref",
                    params![
                        d.diagnostic_id,
                        d.repo_id,
                        d.source.to_string(),
                        d.file,
                        d.line,
                        d.column,
                        d.severity.to_string(),
                        d.category.to_string(),
                        d.title,
                        d.description,
                        d.suggestion,
                        d.resolved,
                        d.actionable,
                        d.created_at.timestamp_micros(),
                        d.updated_at.timestamp_micros(),
                        d.external_issue_ref,
                        d.external_pr_ref,
                        d.external_workflow_ref,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn clear_diagnostics(&self, repo_id: Option<&str>, source: Option<DiagnosticSource>) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = match (repo_id, source) {
                (Some(repo_id), Some(source)) => conn.execute(
                    "DELETE FROM unified_diagnostics WHERE repo_id = ?1 AND source = ?2",
                    params![repo_id, source.to_string()],
                )?,
                (Some(repo_id), None) => {
                    conn.execute("DELETE FROM unified_diagnostics WHERE repo_id = ?1", params![repo_id])?
                }
                (None, Some(source)) => conn.execute(
                    "DELETE FROM unified_diagnostics WHERE source = ?1",
                    params![source.to_string()],
                )?,
                (None, None) => conn.execute("DELETE FROM unified_diagnostics", [])?,
            };
            Ok(affected)
        })
    }

    pub fn get_diagnostics(&self, filter: &DiagnosticFilter) -> Result<Vec<UnifiedDiagnostic>> {
        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(repo_id) = &filter.repo_id {
                clauses.push(format!("repo_id = ?{}", values.len() + 1));
                values.push(Box::new(repo_id.clone()));
            }
            if let Some(source) = &filter.source {
                clauses.push(format!("source = ?{}", values.len() + 1));
                values.push(Box::new(source.to_string()));
            }
            if !filter.severities.is_empty() {
                let placeholders: Vec<String> = filter
                    .severities
                    .iter()
                    .map(|s| {
                        values.push(Box::new(s.to_string()));
                        format!("?{}", values.len())
                    })
                    .collect();
                clauses.push(format!("severity IN ({})", placeholders.join(", ")));
            }
            if let Some(category) = &filter.category {
                clauses.push(format!("category = ?{}", values.len() + 1));
                values.push(Box::new(category.to_string()));
            }
            if let Some(file) = &filter.file {
                clauses.push(format!("file = ?{}", values.len() + 1));
                values.push(Box::new(file.clone()));
            }
            if let Some(resolved) = filter.resolved {
                clauses.push(format!("resolved = ?{}", values.len() + 1));
                values.push(Box::new(resolved));
            }
            if let Some(actionable) = filter.actionable {
                clauses.push(format!("actionable = ?{}", values.len() + 1));
                values.push(Box::new(actionable));
            }

            let mut sql = "SELECT diagnostic_id, repo_id, source, file, line, column_, severity, category,
                                  title, description, suggestion, resolved, actionable,
                                  created_at, updated_at, external_issue_ref, external_pr_ref, external_workflow_ref
                           FROM unified_diagnostics"
                .to_string();
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY updated_at DESC");
            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }

            let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(param_refs.as_slice(), row_to_diagnostic)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Releases the file handle; every subsequent call returns
    /// [`HubError::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().expect("hub mutex poisoned");
        *guard = None;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock().expect("hub mutex poisoned");
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(HubError::Closed),
        }
    }
}

fn micros_to_datetime(micros: i64) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc.timestamp_micros(micros).single().unwrap_or_else(chrono::Utc::now)
}

type DiagRow = rusqlite::Result<UnifiedDiagnostic>;

fn row_to_diagnostic(row: &rusqlite::Row<'_>) -> DiagRow {
    let source: String = row.get(2)?;
    let severity: String = row.get(6)?;
    let category: String = row.get(7)?;
    let created_at_us: i64 = row.get(13)?;
    let updated_at_us: i64 = row.get(14)?;

    Ok(UnifiedDiagnostic {
        diagnostic_id: row.get(0)?,
        repo_id: row.get(1)?,
        source: source.parse::<DiagnosticSource>().unwrap_or(DiagnosticSource::Review),
        file: row.get(3)?,
        line: row.get(4)?,
        column: row.get(5)?,
        severity: severity.parse::<Severity>().unwrap_or(Severity::Note),
        category: category.parse::<Category>().unwrap_or(Category::Feedback),
        title: row.get(8)?,
        description: row.get(9)?,
        suggestion: row.get(10)?,
        resolved: row.get(11)?,
        actionable: row.get(12)?,
        created_at: micros_to_datetime(created_at_us),
        updated_at: micros_to_datetime(updated_at_us),
        external_issue_ref: row.get(15)?,
        external_pr_ref: row.get(16)?,
        external_workflow_ref: row.get(17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_diagnostic(id: &str, repo: &str, source: DiagnosticSource) -> UnifiedDiagnostic {
        let now = chrono::Utc::now();
        UnifiedDiagnostic {
            diagnostic_id: id.to_string(),
            repo_id: repo.to_string(),
            source,
            file: Some("src/a.ts".into()),
            line: Some(10),
            column: Some(1),
            severity: Severity::Warning,
            category: Category::Validation,
            title: "unused import".into(),
            description: "import is never used".into(),
            suggestion: Some("remove the import".into()),
            resolved: false,
            actionable: true,
            created_at: now,
            updated_at: now,
            external_issue_ref: None,
            external_pr_ref: None,
            external_workflow_ref: None,
        }
    }

    #[test]
    fn init_is_idempotent() {
        let hub = Hub::open_in_memory().unwrap();
        hub.init().unwrap();
        hub.init().unwrap();
    }

    #[test]
    fn register_list_and_unregister_round_trip() {
        let hub = Hub::open_in_memory().unwrap();
        hub.register_repo("acme/widgets", "/repos/widgets", serde_json::json!({"branch": "main"}))
            .unwrap();

        let repos = hub.list_repos().unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].id, "acme/widgets");

        hub.unregister_repo("acme/widgets").unwrap();
        assert!(hub.list_repos().unwrap().is_empty());
    }

    #[test]
    fn unregistering_unknown_repo_is_an_error() {
        let hub = Hub::open_in_memory().unwrap();
        assert!(matches!(hub.unregister_repo("missing"), Err(HubError::RepoNotFound(_))));
    }

    #[test]
    fn push_and_filter_diagnostics_by_source() {
        let hub = Hub::open_in_memory().unwrap();
        hub.register_repo("R", "/repos/r", serde_json::Value::Null).unwrap();

        let batch = vec![
            sample_diagnostic("d1", "R", DiagnosticSource::ExternalIssue),
            sample_diagnostic("d2", "R", DiagnosticSource::ExternalIssue),
            sample_diagnostic("d3", "R", DiagnosticSource::ExternalIssue),
            sample_diagnostic("d4", "R", DiagnosticSource::Tsc),
            sample_diagnostic("d5", "R", DiagnosticSource::Tsc),
        ];
        hub.push_diagnostics(&batch).unwrap();

        let filter = DiagnosticFilter {
            repo_id: Some("R".into()),
            source: Some(DiagnosticSource::Tsc),
            ..Default::default()
        };
        let results = hub.get_diagnostics(&filter).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d.source == DiagnosticSource::Tsc));
    }

    #[test]
    fn push_is_an_upsert_keyed_by_diagnostic_id() {
        let hub = Hub::open_in_memory().unwrap();
        hub.register_repo("R", "/repos/r", serde_json::Value::Null).unwrap();

        let mut d = sample_diagnostic("d1", "R", DiagnosticSource::Lint);
        hub.push_diagnostics(&[d.clone()]).unwrap();

        d.resolved = true;
        hub.push_diagnostics(&[d]).unwrap();

        let results = hub.get_diagnostics(&DiagnosticFilter::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].resolved);
    }

    #[test]
    fn closed_hub_rejects_further_calls() {
        let hub = Hub::open_in_memory().unwrap();
        hub.close().unwrap();
        assert!(matches!(hub.list_repos(), Err(HubError::Closed)));
    }
}
