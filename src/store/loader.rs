//! Bulk loader: ingests columnar batches into the Store (§4.2, §6).
//!
//! The tabular batch shape itself is an external contract the engine only
//! consumes (`spec.md` §1 Out of Scope); this module is the concrete, if
//! minimal, shape that contract takes inside this crate.

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{NodeId, PropertyMap, Value};
use crate::{Error, Result};

use super::Store;

/// One column of a [`TableBatch`].
#[derive(Debug, Clone)]
pub enum Column {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    /// ISO `YYYY-MM-DD` strings, parsed into `Value::Date` on load.
    Date(Vec<String>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Bool(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Date(v) => v.len(),
        }
    }

    fn value_at(&self, row: usize) -> Result<Value> {
        Ok(match self {
            Column::Bool(v) => Value::Bool(v[row]),
            Column::Int(v) => Value::Int(v[row]),
            Column::Float(v) => Value::Float(v[row]),
            Column::Text(v) => Value::Text(v[row].clone()),
            Column::Date(v) => {
                let parsed = NaiveDate::parse_from_str(&v[row], "%Y-%m-%d").map_err(|_| {
                    Error::SchemaError(format!("column value '{}' is not an ISO date", v[row]))
                })?;
                Value::Date(parsed)
            }
        })
    }
}

/// A columnar batch with named columns and a uniform row count (§6).
#[derive(Debug, Clone, Default)]
pub struct TableBatch {
    columns: Vec<(String, Column)>,
}

impl TableBatch {
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.push((name.into(), column));
        self
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}

/// Bulk-loads node rows. For each row: allocates a node, records the
/// synthetic `id`/`title`/`type` properties, copies the remaining named
/// columns as stored properties, and registers the primary-key index
/// entry (§4.2).
pub fn add_nodes(
    store: &Store,
    batch: &TableBatch,
    label: &str,
    id_col: &str,
    title_col: &str,
) -> Result<usize> {
    let id_column = batch
        .column(id_col)
        .ok_or_else(|| Error::SchemaError(format!("missing id column '{id_col}'")))?;
    let title_column = batch
        .column(title_col)
        .ok_or_else(|| Error::SchemaError(format!("missing title column '{title_col}'")))?;

    let rows = batch.row_count();
    for row in 0..rows {
        let pk = id_column.value_at(row)?;
        let title = title_column.value_at(row)?;
        let mut properties = PropertyMap::new();
        for (name, col) in &batch.columns {
            if name == id_col || name == title_col {
                continue;
            }
            properties.insert(name.clone(), col.value_at(row)?);
        }
        store.insert_node(label, pk, title, properties)?;
    }
    store.summarize_load(label, rows);
    Ok(rows)
}

/// Bulk-loads edge rows. For each row: looks up source and target through
/// the label primary-key indexes, allocates an edge, and copies the named
/// property columns (§4.2).
pub fn add_connections(
    store: &Store,
    batch: &TableBatch,
    rel_type: &str,
    src_label: &str,
    src_col: &str,
    tgt_label: &str,
    tgt_col: &str,
    columns: Option<&[&str]>,
) -> Result<usize> {
    let src_column = batch
        .column(src_col)
        .ok_or_else(|| Error::SchemaError(format!("missing source column '{src_col}'")))?;
    let tgt_column = batch
        .column(tgt_col)
        .ok_or_else(|| Error::SchemaError(format!("missing target column '{tgt_col}'")))?;

    let rows = batch.row_count();
    for row in 0..rows {
        let src_pk = src_column.value_at(row)?;
        let tgt_pk = tgt_column.value_at(row)?;
        let src = lookup_endpoint(store, src_label, &src_pk)?;
        let tgt = lookup_endpoint(store, tgt_label, &tgt_pk)?;

        let mut properties = PropertyMap::new();
        if let Some(cols) = columns {
            for &name in cols {
                let col = batch
                    .column(name)
                    .ok_or_else(|| Error::SchemaError(format!("missing property column '{name}'")))?;
                properties.insert(name.to_string(), col.value_at(row)?);
            }
        }
        store.insert_edge(rel_type, src, tgt, properties)?;
    }
    store.summarize_load(rel_type, rows);
    debug!(rel_type, rows, "loaded edges");
    Ok(rows)
}

fn lookup_endpoint(store: &Store, label: &str, pk: &Value) -> Result<NodeId> {
    store
        .node_by_pk(label, pk)
        .ok_or_else(|| Error::ReferenceError(format!("no {label} node with primary key {pk}")))
}
