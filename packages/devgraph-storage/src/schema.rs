//! Arrow schemas and RecordBatch (de)serialization for the four seed tables.
//!
//! Each column here is the exact projection of the corresponding
//! `devgraph_model` struct (§3 of the spec this crate implements); no
//! embedded indexes are stored, those are built on demand by the query
//! layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, StringArray, TimestampMicrosecondArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};

use devgraph_model::{DomainEffect, Edge, EdgeType, ExternalRef, ImportStyle, Node, NodeKind, SignificanceLevel, Visibility};

use crate::error::{Result, StorageError};

fn ts_field(name: &str) -> Field {
    Field::new(name, DataType::Timestamp(TimeUnit::Microsecond, None), false)
}

pub fn nodes_schema() -> Schema {
    Schema::new(vec![
        Field::new("entity_id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("qualified_name", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("visibility", DataType::Utf8, false),
        Field::new("source_file", DataType::Utf8, false),
        Field::new("line", DataType::UInt32, false),
        Field::new("column", DataType::UInt32, false),
        Field::new("repo", DataType::Utf8, false),
        Field::new("package", DataType::Utf8, false),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        ts_field("updated_at"),
        Field::new("file_hash", DataType::Utf8, false),
    ])
}

pub fn edges_schema() -> Schema {
    Schema::new(vec![
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("target_entity_id", DataType::Utf8, false),
        Field::new("edge_type", DataType::Utf8, false),
        Field::new("source_file_path", DataType::Utf8, false),
        Field::new("source_file_hash", DataType::Utf8, false),
        Field::new("source_line", DataType::UInt32, false),
        Field::new("source_column", DataType::UInt32, false),
        Field::new("properties", DataType::Utf8, false),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        ts_field("updated_at"),
    ])
}

pub fn external_refs_schema() -> Schema {
    Schema::new(vec![
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("source_file_path", DataType::Utf8, false),
        Field::new("source_line", DataType::UInt32, false),
        Field::new("source_column", DataType::UInt32, false),
        Field::new("referenced_name", DataType::Utf8, false),
        Field::new("import_style", DataType::Utf8, false),
        Field::new("module_specifier", DataType::Utf8, false),
        Field::new("alias", DataType::Utf8, true),
        Field::new("branch", DataType::Utf8, false),
        Field::new("resolved_entity_id", DataType::Utf8, true),
        Field::new("is_deleted", DataType::Boolean, false),
        ts_field("updated_at"),
    ])
}

pub fn effects_schema() -> Schema {
    Schema::new(vec![
        Field::new("source_entity_id", DataType::Utf8, false),
        Field::new("domain", DataType::Utf8, false),
        Field::new("provider", DataType::Utf8, false),
        Field::new("operation", DataType::Utf8, false),
        Field::new("significance_level", DataType::Utf8, false),
        Field::new("group", DataType::Utf8, true),
        Field::new("container", DataType::Utf8, true),
        Field::new("branch", DataType::Utf8, false),
        Field::new("is_deleted", DataType::Boolean, false),
        ts_field("updated_at"),
    ])
}

fn micros(dt: &chrono::DateTime<Utc>) -> i64 {
    dt.timestamp_micros()
}

fn from_micros(v: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_micros(v).single().unwrap_or_else(Utc::now)
}

pub fn nodes_to_batch(nodes: &[Node]) -> Result<RecordBatch> {
    let schema = Arc::new(nodes_schema());
    let entity_id = StringArray::from_iter_values(nodes.iter().map(|n| n.entity_id.clone()));
    let name = StringArray::from_iter_values(nodes.iter().map(|n| n.name.clone()));
    let qualified_name = StringArray::from_iter_values(nodes.iter().map(|n| n.qualified_name.clone()));
    let kind = StringArray::from_iter_values(nodes.iter().map(|n| n.kind.to_string()));
    let visibility = StringArray::from_iter_values(nodes.iter().map(|n| n.visibility.to_string()));
    let source_file = StringArray::from_iter_values(nodes.iter().map(|n| n.source_file.clone()));
    let line = UInt32Array::from_iter_values(nodes.iter().map(|n| n.line));
    let column = UInt32Array::from_iter_values(nodes.iter().map(|n| n.column));
    let repo = StringArray::from_iter_values(nodes.iter().map(|n| n.repo.clone()));
    let package = StringArray::from_iter_values(nodes.iter().map(|n| n.package.clone()));
    let branch = StringArray::from_iter_values(nodes.iter().map(|n| n.branch.clone()));
    let is_deleted = BooleanArray::from_iter(nodes.iter().map(|n| Some(n.is_deleted)));
    let updated_at = TimestampMicrosecondArray::from_iter_values(nodes.iter().map(|n| micros(&n.updated_at)));
    let file_hash = StringArray::from_iter_values(nodes.iter().map(|n| n.file_hash.clone()));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(entity_id) as ArrayRef,
            Arc::new(name),
            Arc::new(qualified_name),
            Arc::new(kind),
            Arc::new(visibility),
            Arc::new(source_file),
            Arc::new(line),
            Arc::new(column),
            Arc::new(repo),
            Arc::new(package),
            Arc::new(branch),
            Arc::new(is_deleted),
            Arc::new(updated_at),
            Arc::new(file_hash),
        ],
    )?)
}

pub fn batch_to_nodes(batch: &RecordBatch) -> Result<Vec<Node>> {
    let col = |name: &str| -> Result<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StorageError::Invariant(format!("nodes batch missing string column `{name}`")))
    };
    let entity_id = col("entity_id")?;
    let name = col("name")?;
    let qualified_name = col("qualified_name")?;
    let kind = col("kind")?;
    let visibility = col("visibility")?;
    let source_file = col("source_file")?;
    let repo = col("repo")?;
    let package = col("package")?;
    let branch = col("branch")?;
    let file_hash = col("file_hash")?;
    let line = downcast_u32(batch, "line")?;
    let column = downcast_u32(batch, "column")?;
    let is_deleted = downcast_bool(batch, "is_deleted")?;
    let updated_at = downcast_ts(batch, "updated_at")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(Node {
            entity_id: entity_id.value(i).to_string(),
            name: name.value(i).to_string(),
            qualified_name: qualified_name.value(i).to_string(),
            kind: kind
                .value(i)
                .parse::<NodeKind>()
                .map_err(|e| StorageError::Invariant(e.to_string()))?,
            visibility: parse_visibility(visibility.value(i))?,
            source_file: source_file.value(i).to_string(),
            line: line.value(i),
            column: column.value(i),
            repo: repo.value(i).to_string(),
            package: package.value(i).to_string(),
            branch: branch.value(i).to_string(),
            is_deleted: is_deleted.value(i),
            updated_at: from_micros(updated_at.value(i)),
            file_hash: file_hash.value(i).to_string(),
        });
    }
    Ok(out)
}

fn parse_visibility(s: &str) -> Result<Visibility> {
    Ok(match s {
        "public" => Visibility::Public,
        "private" => Visibility::Private,
        "protected" => Visibility::Protected,
        "internal" => Visibility::Internal,
        other => return Err(StorageError::Invariant(format!("unknown visibility `{other}`"))),
    })
}

pub fn edges_to_batch(edges: &[Edge]) -> Result<RecordBatch> {
    let schema = Arc::new(edges_schema());
    let source_entity_id = StringArray::from_iter_values(edges.iter().map(|e| e.source_entity_id.clone()));
    let target_entity_id = StringArray::from_iter_values(edges.iter().map(|e| e.target_entity_id.clone()));
    let edge_type = StringArray::from_iter_values(edges.iter().map(|e| e.edge_type.to_string()));
    let source_file_path = StringArray::from_iter_values(edges.iter().map(|e| e.source_file_path.clone()));
    let source_file_hash = StringArray::from_iter_values(edges.iter().map(|e| e.source_file_hash.clone()));
    let source_line = UInt32Array::from_iter_values(edges.iter().map(|e| e.source_line));
    let source_column = UInt32Array::from_iter_values(edges.iter().map(|e| e.source_column));
    let properties = StringArray::from_iter_values(
        edges
            .iter()
            .map(|e| serde_json::to_string(&e.properties).unwrap_or_default()),
    );
    let branch = StringArray::from_iter_values(edges.iter().map(|e| e.branch.clone()));
    let is_deleted = BooleanArray::from_iter(edges.iter().map(|e| Some(e.is_deleted)));
    let updated_at = TimestampMicrosecondArray::from_iter_values(edges.iter().map(|e| micros(&e.updated_at)));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(source_entity_id) as ArrayRef,
            Arc::new(target_entity_id),
            Arc::new(edge_type),
            Arc::new(source_file_path),
            Arc::new(source_file_hash),
            Arc::new(source_line),
            Arc::new(source_column),
            Arc::new(properties),
            Arc::new(branch),
            Arc::new(is_deleted),
            Arc::new(updated_at),
        ],
    )?)
}

pub fn batch_to_edges(batch: &RecordBatch) -> Result<Vec<Edge>> {
    let col = |name: &str| -> Result<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StorageError::Invariant(format!("edges batch missing string column `{name}`")))
    };
    let source_entity_id = col("source_entity_id")?;
    let target_entity_id = col("target_entity_id")?;
    let edge_type = col("edge_type")?;
    let source_file_path = col("source_file_path")?;
    let source_file_hash = col("source_file_hash")?;
    let properties = col("properties")?;
    let branch = col("branch")?;
    let source_line = downcast_u32(batch, "source_line")?;
    let source_column = downcast_u32(batch, "source_column")?;
    let is_deleted = downcast_bool(batch, "is_deleted")?;
    let updated_at = downcast_ts(batch, "updated_at")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let properties: BTreeMap<String, String> = serde_json::from_str(properties.value(i)).unwrap_or_default();
        out.push(Edge {
            source_entity_id: source_entity_id.value(i).to_string(),
            target_entity_id: target_entity_id.value(i).to_string(),
            edge_type: edge_type
                .value(i)
                .parse::<EdgeType>()
                .map_err(|e| StorageError::Invariant(e.to_string()))?,
            source_file_path: source_file_path.value(i).to_string(),
            source_file_hash: source_file_hash.value(i).to_string(),
            source_line: source_line.value(i),
            source_column: source_column.value(i),
            properties,
            branch: branch.value(i).to_string(),
            is_deleted: is_deleted.value(i),
            updated_at: from_micros(updated_at.value(i)),
        });
    }
    Ok(out)
}

pub fn external_refs_to_batch(refs: &[ExternalRef]) -> Result<RecordBatch> {
    let schema = Arc::new(external_refs_schema());
    let source_entity_id = StringArray::from_iter_values(refs.iter().map(|r| r.source_entity_id.clone()));
    let source_file_path = StringArray::from_iter_values(refs.iter().map(|r| r.source_file_path.clone()));
    let source_line = UInt32Array::from_iter_values(refs.iter().map(|r| r.source_line));
    let source_column = UInt32Array::from_iter_values(refs.iter().map(|r| r.source_column));
    let referenced_name = StringArray::from_iter_values(refs.iter().map(|r| r.referenced_name.clone()));
    let import_style = StringArray::from_iter_values(refs.iter().map(|r| r.import_style.to_string()));
    let module_specifier = StringArray::from_iter_values(refs.iter().map(|r| r.module_specifier.clone()));
    let alias = StringArray::from_iter(refs.iter().map(|r| r.alias.as_deref()));
    let branch = StringArray::from_iter_values(refs.iter().map(|r| r.branch.clone()));
    let resolved_entity_id = StringArray::from_iter(refs.iter().map(|r| r.resolved_entity_id.as_deref()));
    let is_deleted = BooleanArray::from_iter(refs.iter().map(|r| Some(r.is_deleted)));
    let updated_at = TimestampMicrosecondArray::from_iter_values(refs.iter().map(|r| micros(&r.updated_at)));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(source_entity_id) as ArrayRef,
            Arc::new(source_file_path),
            Arc::new(source_line),
            Arc::new(source_column),
            Arc::new(referenced_name),
            Arc::new(import_style),
            Arc::new(module_specifier),
            Arc::new(alias),
            Arc::new(branch),
            Arc::new(resolved_entity_id),
            Arc::new(is_deleted),
            Arc::new(updated_at),
        ],
    )?)
}

pub fn batch_to_external_refs(batch: &RecordBatch) -> Result<Vec<ExternalRef>> {
    let col = |name: &str| -> Result<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StorageError::Invariant(format!("external_refs batch missing column `{name}`")))
    };
    let source_entity_id = col("source_entity_id")?;
    let source_file_path = col("source_file_path")?;
    let referenced_name = col("referenced_name")?;
    let import_style = col("import_style")?;
    let module_specifier = col("module_specifier")?;
    let alias = col("alias")?;
    let branch = col("branch")?;
    let resolved_entity_id = col("resolved_entity_id")?;
    let source_line = downcast_u32(batch, "source_line")?;
    let source_column = downcast_u32(batch, "source_column")?;
    let is_deleted = downcast_bool(batch, "is_deleted")?;
    let updated_at = downcast_ts(batch, "updated_at")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(ExternalRef {
            source_entity_id: source_entity_id.value(i).to_string(),
            source_file_path: source_file_path.value(i).to_string(),
            source_line: source_line.value(i),
            source_column: source_column.value(i),
            referenced_name: referenced_name.value(i).to_string(),
            import_style: import_style
                .value(i)
                .parse::<ImportStyle>()
                .map_err(|e| StorageError::Invariant(e.to_string()))?,
            module_specifier: module_specifier.value(i).to_string(),
            alias: opt_value(alias, i),
            branch: branch.value(i).to_string(),
            resolved_entity_id: opt_value(resolved_entity_id, i),
            is_deleted: is_deleted.value(i),
            updated_at: from_micros(updated_at.value(i)),
        });
    }
    Ok(out)
}

pub fn effects_to_batch(effects: &[DomainEffect]) -> Result<RecordBatch> {
    let schema = Arc::new(effects_schema());
    let source_entity_id = StringArray::from_iter_values(effects.iter().map(|e| e.source_entity_id.clone()));
    let domain = StringArray::from_iter_values(effects.iter().map(|e| e.domain.clone()));
    let provider = StringArray::from_iter_values(effects.iter().map(|e| e.provider.clone()));
    let operation = StringArray::from_iter_values(effects.iter().map(|e| e.operation.clone()));
    let significance_level = StringArray::from_iter_values(effects.iter().map(|e| e.significance_level.to_string()));
    let group = StringArray::from_iter(effects.iter().map(|e| e.group.as_deref()));
    let container = StringArray::from_iter(effects.iter().map(|e| e.container.as_deref()));
    let branch = StringArray::from_iter_values(effects.iter().map(|e| e.branch.clone()));
    let is_deleted = BooleanArray::from_iter(effects.iter().map(|e| Some(e.is_deleted)));
    let updated_at = TimestampMicrosecondArray::from_iter_values(effects.iter().map(|e| micros(&e.updated_at)));

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(source_entity_id) as ArrayRef,
            Arc::new(domain),
            Arc::new(provider),
            Arc::new(operation),
            Arc::new(significance_level),
            Arc::new(group),
            Arc::new(container),
            Arc::new(branch),
            Arc::new(is_deleted),
            Arc::new(updated_at),
        ],
    )?)
}

pub fn batch_to_effects(batch: &RecordBatch) -> Result<Vec<DomainEffect>> {
    let col = |name: &str| -> Result<&StringArray> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StorageError::Invariant(format!("effects batch missing column `{name}`")))
    };
    let source_entity_id = col("source_entity_id")?;
    let domain = col("domain")?;
    let provider = col("provider")?;
    let operation = col("operation")?;
    let significance_level = col("significance_level")?;
    let group = col("group")?;
    let container = col("container")?;
    let branch = col("branch")?;
    let is_deleted = downcast_bool(batch, "is_deleted")?;
    let updated_at = downcast_ts(batch, "updated_at")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(DomainEffect {
            source_entity_id: source_entity_id.value(i).to_string(),
            domain: domain.value(i).to_string(),
            provider: provider.value(i).to_string(),
            operation: operation.value(i).to_string(),
            significance_level: significance_level
                .value(i)
                .parse::<SignificanceLevel>()
                .map_err(|e| StorageError::Invariant(e.to_string()))?,
            group: opt_value(group, i),
            container: opt_value(container, i),
            branch: branch.value(i).to_string(),
            is_deleted: is_deleted.value(i),
            updated_at: from_micros(updated_at.value(i)),
        });
    }
    Ok(out)
}

fn opt_value(array: &StringArray, i: usize) -> Option<String> {
    if array.is_null(i) {
        None
    } else {
        Some(array.value(i).to_string())
    }
}

fn downcast_u32<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| StorageError::Invariant(format!("missing u32 column `{name}`")))
}

fn downcast_bool<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a BooleanArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
        .ok_or_else(|| StorageError::Invariant(format!("missing bool column `{name}`")))
}

fn downcast_ts<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a TimestampMicrosecondArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMicrosecondArray>())
        .ok_or_else(|| StorageError::Invariant(format!("missing timestamp column `{name}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devgraph_model::EntityId;

    fn sample_node() -> Node {
        let id = EntityId::compute("acme", "core", NodeKind::Function, "a.ts:f");
        Node {
            entity_id: id.to_string(),
            name: "f".into(),
            qualified_name: "a.ts:f".into(),
            kind: NodeKind::Function,
            visibility: Visibility::Public,
            source_file: "a.ts".into(),
            line: 1,
            column: 0,
            repo: "acme".into(),
            package: "core".into(),
            branch: "main".into(),
            is_deleted: false,
            updated_at: Utc::now(),
            file_hash: "deadbeef".into(),
        }
    }

    #[test]
    fn nodes_round_trip_through_a_record_batch() {
        let nodes = vec![sample_node()];
        let batch = nodes_to_batch(&nodes).unwrap();
        let back = batch_to_nodes(&batch).unwrap();
        assert_eq!(nodes, back);
    }

    #[test]
    fn external_refs_round_trip_including_unresolved_optional_fields() {
        let refs = vec![ExternalRef {
            source_entity_id: "acme:core:function:abc".into(),
            source_file_path: "a.ts".into(),
            source_line: 1,
            source_column: 0,
            referenced_name: "g".into(),
            import_style: ImportStyle::Named,
            module_specifier: "./b".into(),
            alias: None,
            branch: "main".into(),
            resolved_entity_id: None,
            is_deleted: false,
            updated_at: Utc::now(),
        }];
        let batch = external_refs_to_batch(&refs).unwrap();
        let back = batch_to_external_refs(&batch).unwrap();
        assert_eq!(refs, back);
    }

    #[test]
    fn effects_round_trip_including_a_tombstoned_row() {
        let effects = vec![
            DomainEffect {
                source_entity_id: "acme:core:function:abc".into(),
                domain: "database".into(),
                provider: "postgres".into(),
                operation: "query".into(),
                significance_level: SignificanceLevel::Important,
                group: Some("billing".into()),
                container: None,
                branch: "main".into(),
                is_deleted: false,
                updated_at: Utc::now(),
            },
            DomainEffect {
                source_entity_id: "acme:core:function:def".into(),
                domain: "http".into(),
                provider: "fetch".into(),
                operation: "call".into(),
                significance_level: SignificanceLevel::Minor,
                group: None,
                container: None,
                branch: "main".into(),
                is_deleted: true,
                updated_at: Utc::now(),
            },
        ];
        let batch = effects_to_batch(&effects).unwrap();
        let back = batch_to_effects(&batch).unwrap();
        assert_eq!(effects, back);
    }
}
