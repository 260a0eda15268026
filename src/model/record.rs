//! Result rows produced by the engine.

use indexmap::IndexMap;

use super::Value;

/// An ordered association from result column name to `Value` (§3, §6).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    columns: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self { columns: IndexMap::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self { columns: iter.into_iter().collect() }
    }
}
