//! PropertyMap — the key-value store on nodes and edges.
//!
//! `keys(x)` must see properties in insertion order with duplicates
//! removed, so this is backed by `IndexMap` rather than a plain hash map.

use indexmap::IndexMap;

use super::Value;

/// A map of property names to values, insertion-order preserving.
pub type PropertyMap = IndexMap<String, Value>;

/// Builds the `keys()` result: synthetic keys first (in the order given),
/// then stored property keys in insertion order, skipping any stored key
/// that collides with a synthetic one.
pub fn ordered_keys(synthetic: &[&str], properties: &PropertyMap) -> Vec<String> {
    let mut keys: Vec<String> = synthetic.iter().map(|s| s.to_string()).collect();
    for k in properties.keys() {
        if !synthetic.contains(&k.as_str()) {
            keys.push(k.clone());
        }
    }
    keys
}
