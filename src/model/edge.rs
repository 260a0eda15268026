//! Edge (relationship) in the property graph.

use serde::{Deserialize, Serialize};

use super::{ordered_keys, NodeId, PropertyMap, Value};

/// Opaque edge identifier, dense and stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction relative to a starting node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A directed edge in the property graph: one relationship type, a
/// property map, and the synthetic `type` property it carries implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub rel_type: String,
    pub src: NodeId,
    pub dst: NodeId,
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(id: EdgeId, src: NodeId, dst: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            rel_type: rel_type.into(),
            src,
            dst,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "type" => Some(Value::Text(self.rel_type.clone())),
            _ => self.properties.get(key).cloned(),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        ordered_keys(&["type"], &self.properties)
    }

    /// The "other" end of the edge from the given node.
    pub fn other_node(&self, from: NodeId) -> Option<NodeId> {
        if from == self.src {
            Some(self.dst)
        } else if from == self.dst {
            Some(self.src)
        } else {
            None
        }
    }
}
