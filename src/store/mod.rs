//! The Store: node/edge arenas, label and primary-key indexes, and
//! forward/reverse adjacency (§3, §4.2).
//!
//! Read-only once loaded (§5): query execution takes the read side of the
//! lock concurrently; bulk load takes the write side exclusively.

pub mod loader;

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::model::value::StructuralKey;
use crate::model::{Direction, Edge, EdgeId, Node, NodeId, PropertyMap, Value};
use crate::{Error, Result};

pub use loader::{Column, TableBatch};

struct StoreInner {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// label -> node ids in insertion order (nodes_by_label contract).
    label_index: HashMap<String, Vec<NodeId>>,
    /// label -> (primary key -> node id), for node_by_pk / seed pushdown.
    pk_index: HashMap<String, HashMap<StructuralKey, NodeId>>,
    out_adjacency: HashMap<NodeId, Vec<EdgeId>>,
    in_adjacency: HashMap<NodeId, Vec<EdgeId>>,
}

impl StoreInner {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            label_index: HashMap::new(),
            pk_index: HashMap::new(),
            out_adjacency: HashMap::new(),
            in_adjacency: HashMap::new(),
        }
    }
}

/// The in-memory property graph store.
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self { inner: RwLock::new(StoreInner::new()) }
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Every node id in the store, in insertion order. Backs an unlabeled
    /// `MATCH (n)` scan.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        (0..self.inner.read().nodes.len() as u64).map(NodeId).collect()
    }

    /// Nodes of the given label, in stable insertion order.
    pub fn nodes_by_label(&self, label: &str) -> Vec<NodeId> {
        self.inner.read().label_index.get(label).cloned().unwrap_or_default()
    }

    pub fn node_by_pk(&self, label: &str, pk: &Value) -> Option<NodeId> {
        let inner = self.inner.read();
        inner.pk_index.get(label)?.get(&StructuralKey(pk.clone())).copied()
    }

    pub fn get_node(&self, id: NodeId) -> Option<Node> {
        let inner = self.inner.read();
        inner.nodes.get(id.0 as usize).cloned()
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<Edge> {
        let inner = self.inner.read();
        inner.edges.get(id.0 as usize).cloned()
    }

    /// Edges adjacent to `node`, optionally filtered by relationship type,
    /// in insertion order. `direction` controls which adjacency list(s)
    /// are consulted; `Both` concatenates out-then-in.
    pub fn adjacent_edges(&self, node: NodeId, direction: Direction, rel_type: Option<&str>) -> Vec<EdgeId> {
        let inner = self.inner.read();
        let mut out = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            if let Some(ids) = inner.out_adjacency.get(&node) {
                out.extend(ids.iter().copied().filter(|id| {
                    rel_type.is_none_or(|rt| inner.edges[id.0 as usize].rel_type == rt)
                }));
            }
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            if let Some(ids) = inner.in_adjacency.get(&node) {
                out.extend(ids.iter().copied().filter(|id| {
                    rel_type.is_none_or(|rt| inner.edges[id.0 as usize].rel_type == rt)
                }));
            }
        }
        out
    }

    pub fn out_edges(&self, node: NodeId, rel_type: Option<&str>) -> Vec<EdgeId> {
        self.adjacent_edges(node, Direction::Outgoing, rel_type)
    }

    pub fn in_edges(&self, node: NodeId, rel_type: Option<&str>) -> Vec<EdgeId> {
        self.adjacent_edges(node, Direction::Incoming, rel_type)
    }

    /// Inserts a node; fails with `IntegrityError` on duplicate primary key
    /// within `label` (§4.2).
    fn insert_node(&self, label: &str, pk: Value, title: Value, properties: PropertyMap) -> Result<NodeId> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.pk_index.get(label).and_then(|idx| idx.get(&StructuralKey(pk.clone()))) {
            return Err(Error::IntegrityError(format!(
                "duplicate primary key {pk} for label {label} (existing node {existing})"
            )));
        }
        let id = NodeId(inner.nodes.len() as u64);
        let node = Node { id, label: label.to_string(), primary_key: pk.clone(), title, properties };
        inner.nodes.push(node);
        inner.label_index.entry(label.to_string()).or_default().push(id);
        inner.pk_index.entry(label.to_string()).or_default().insert(StructuralKey(pk), id);
        debug!(node_id = id.0, label, "inserted node");
        Ok(id)
    }

    /// Inserts an edge; fails with `ReferenceError` if either endpoint is
    /// unknown to the store (§4.2).
    fn insert_edge(&self, rel_type: &str, src: NodeId, dst: NodeId, properties: PropertyMap) -> Result<EdgeId> {
        let mut inner = self.inner.write();
        if src.0 as usize >= inner.nodes.len() {
            return Err(Error::ReferenceError(format!("edge source {src} does not exist")));
        }
        if dst.0 as usize >= inner.nodes.len() {
            return Err(Error::ReferenceError(format!("edge target {dst} does not exist")));
        }
        let id = EdgeId(inner.edges.len() as u64);
        let edge = Edge { id, rel_type: rel_type.to_string(), src, dst, properties };
        inner.edges.push(edge);
        inner.out_adjacency.entry(src).or_default().push(id);
        inner.in_adjacency.entry(dst).or_default().push(id);
        Ok(id)
    }

    pub(crate) fn summarize_load(&self, label_or_rel: &str, rows: usize) {
        info!(target = label_or_rel, rows, "bulk load complete");
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
