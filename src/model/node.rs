//! Node in the property graph.

use serde::{Deserialize, Serialize};

use super::{ordered_keys, PropertyMap, Value};

/// Opaque node identifier, dense and stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the property graph: one label, a property map, and the
/// synthetic `id`/`title`/`type` properties every node carries implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    /// The user-supplied primary key value (synthetic `id` property).
    pub primary_key: Value,
    /// The user-supplied title/name value (synthetic `title` property).
    pub title: Value,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            primary_key: Value::Null,
            title: Value::Null,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Reads a stored or synthetic property by name. `id`/`title`/`type`
    /// resolve to the synthetic values even if no stored property shares
    /// the name.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(self.primary_key.clone()),
            "title" => Some(self.title.clone()),
            "type" => Some(Value::Text(self.label.clone())),
            _ => self.properties.get(key).cloned(),
        }
    }

    /// Every property name visible to `keys()`: synthetic keys first, then
    /// stored properties in insertion order, duplicates removed.
    pub fn keys(&self) -> Vec<String> {
        ordered_keys(&["id", "title", "type"], &self.properties)
    }
}
