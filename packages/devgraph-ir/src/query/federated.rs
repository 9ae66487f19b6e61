//! DataFusion-backed federated query engine: registers each requested
//! package's per-branch Parquet tables as a union view and runs caller SQL
//! against it.

use std::path::PathBuf;
use std::time::Instant;

use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::json::ArrayWriter;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::ParquetReadOptions;
use tracing::{instrument, warn};

use devgraph_storage::seed_path::{SeedLayout, TABLES};
use devgraph_storage::SeedReader;

use crate::error::{IrError, Result};

/// Readiness of the tables a query ran against, surfaced so callers can
/// distinguish "no data yet" from "query is simply wrong".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every requested package contributed at least one file to every table.
    Ready,
    /// No package has produced a seed generation yet.
    FirstRun,
    /// Some packages contributed, others have no generation yet.
    Partial,
    /// A package's seed directory carries an in-flight or abandoned marker.
    Locked,
}

pub struct QueryRequest {
    pub package_roots: Vec<PathBuf>,
    pub branch: String,
    pub sql: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub struct QueryResponse {
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub elapsed_ms: u128,
    pub views_created: Vec<String>,
    pub warnings: Vec<String>,
    pub readiness: Readiness,
}

/// Thin wrapper around a fresh [`SessionContext`] per query. Federated
/// queries are infrequent and cross-package, so there's no benefit to
/// pooling contexts the way OLTP engines pool connections.
pub struct FederatedQueryEngine;

impl FederatedQueryEngine {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, request), fields(branch = %request.branch, packages = request.package_roots.len()))]
    pub async fn run(&self, request: QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        let ctx = SessionContext::new();
        let mut views_created = Vec::new();
        let mut warnings = Vec::new();
        let mut any_ready = false;
        let mut any_missing = false;
        let mut locked = false;

        // Pin each package's current generation once, up front, rather than
        // re-resolving `meta.json` per table — every view built below reads
        // the same frozen file set even if a writer publishes a new
        // generation while this query is still running.
        let mut packages = Vec::with_capacity(request.package_roots.len());
        for root in &request.package_roots {
            let layout = SeedLayout::new(root.clone());
            if layout.has_inflight_markers().unwrap_or(false) {
                locked = true;
            }
            let generation = SeedReader::open(layout.clone(), &request.branch).ok().map(|r| r.meta.generation);
            if generation.is_none() {
                any_missing = true;
            }
            packages.push((layout, generation));
        }

        for table in TABLES {
            let mut member_tables = Vec::new();
            for (i, (layout, generation)) in packages.iter().enumerate() {
                let Some(generation) = generation else { continue };
                let path = layout.table_path(&request.branch, *generation, table);
                if !path.exists() {
                    any_missing = true;
                    continue;
                }
                let member = format!("__{table}_{i}");
                ctx.register_parquet(&member, path.to_string_lossy().as_ref(), ParquetReadOptions::default())
                    .await
                    .map_err(|e| IrError::Query(e.to_string()))?;
                member_tables.push(member);
            }

            if member_tables.is_empty() {
                warnings.push(format!("table `{table}` has no contributing packages for branch `{}`", request.branch));
                continue;
            }
            any_ready = true;

            let union_sql = member_tables
                .iter()
                .map(|m| format!("SELECT * FROM {m}"))
                .collect::<Vec<_>>()
                .join(" UNION ALL ");
            let create_view = format!("CREATE VIEW {table} AS {union_sql}");
            ctx.sql(&create_view).await.map_err(|e| IrError::Query(e.to_string()))?;
            views_created.push(table.to_string());
        }

        let readiness = if locked {
            Readiness::Locked
        } else if !any_ready {
            Readiness::FirstRun
        } else if any_missing {
            Readiness::Partial
        } else {
            Readiness::Ready
        };

        let sql = apply_paging(&substitute_placeholders(&request.sql), request.limit, request.offset)?;
        let df = ctx.sql(&sql).await.map_err(|e| IrError::Query(e.to_string()))?;
        let batches = df.collect().await.map_err(|e| IrError::Query(e.to_string()))?;
        let rows = batches_to_json(&batches)?;
        let row_count = rows.len();

        if rows.is_empty() && readiness != Readiness::Ready {
            warn!(?readiness, "query returned no rows against a non-ready table set");
        }

        Ok(QueryResponse {
            rows,
            row_count,
            elapsed_ms: started.elapsed().as_millis(),
            views_created,
            warnings,
            readiness,
        })
    }
}

impl Default for FederatedQueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces `{nodes}`/`{edges}`/`{external_refs}`/`{effects}` placeholders
/// with their literal view names. The views are always named identically to
/// the placeholders, so this is a no-op today, but predefined bundles (see
/// `bundles.rs`) author their templates against the placeholder form so a
/// future aliasing scheme doesn't require touching every bundle.
fn substitute_placeholders(sql: &str) -> String {
    let mut out = sql.to_string();
    for table in TABLES {
        out = out.replace(&format!("{{{table}}}"), table);
    }
    out
}

/// Wraps `sql` in an outer `SELECT * FROM (...) LIMIT n OFFSET m` when the
/// caller supplied paging, so individual bundle templates don't each need
/// to handle it. Integers only — never interpolated from a raw string, so
/// there is no injection surface here.
fn apply_paging(sql: &str, limit: Option<i64>, offset: Option<i64>) -> Result<String> {
    if limit.is_none() && offset.is_none() {
        return Ok(sql.to_string());
    }
    let mut wrapped = format!("SELECT * FROM ({sql}) AS __paged");
    if let Some(limit) = limit {
        wrapped.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        wrapped.push_str(&format!(" OFFSET {offset}"));
    }
    Ok(wrapped)
}

/// Doubles embedded single quotes so a value can be interpolated into a SQL
/// string literal. Used by bundle templates that splice user parameters
/// into `WHERE name = '...'` clauses rather than relying on DataFusion
/// prepared-statement support, which the embedded `SessionContext` API
/// doesn't expose for ad-hoc `.sql()` calls.
pub fn escape_string_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Validates that `raw` parses as a non-negative integer, for limit/offset
/// parameters accepted from request bodies as strings.
pub fn validate_integer(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| IrError::Query(format!("expected an integer, got `{raw}`")))
}

fn batches_to_json(batches: &[RecordBatch]) -> Result<Vec<serde_json::Value>> {
    let mut buf = Vec::new();
    {
        let mut writer = ArrayWriter::new(&mut buf);
        let refs: Vec<&RecordBatch> = batches.iter().collect();
        writer.write_batches(&refs).map_err(|e| IrError::Query(e.to_string()))?;
        writer.finish().map_err(|e| IrError::Query(e.to_string()))?;
    }
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_slice(&buf).map_err(|e| IrError::Query(e.to_string()))?;
    match value {
        serde_json::Value::Array(rows) => Ok(rows),
        other => Ok(vec![other]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_replaced_with_view_names() {
        let sql = substitute_placeholders("SELECT * FROM {nodes} JOIN {edges} ON true");
        assert_eq!(sql, "SELECT * FROM nodes JOIN edges ON true");
    }

    #[test]
    fn string_literal_escaping_doubles_single_quotes() {
        assert_eq!(escape_string_literal("O'Brien"), "O''Brien");
    }

    #[test]
    fn validate_integer_rejects_non_numeric_input() {
        assert!(validate_integer("12").is_ok());
        assert!(validate_integer("12; DROP TABLE nodes").is_err());
    }

    #[test]
    fn paging_wraps_sql_in_outer_select() {
        let wrapped = apply_paging("SELECT * FROM nodes", Some(10), Some(5)).unwrap();
        assert!(wrapped.contains("LIMIT 10"));
        assert!(wrapped.contains("OFFSET 5"));
    }

    #[test]
    fn paging_is_noop_without_limit_or_offset() {
        let sql = apply_paging("SELECT * FROM nodes", None, None).unwrap();
        assert_eq!(sql, "SELECT * FROM nodes");
    }
}
