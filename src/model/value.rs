//! The scalar value union evaluated expressions and stored properties
//! share, and the structural (hash/equality) rules layered on top of it.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId};

/// A value flowing through expressions, properties, and result rows.
///
/// `Node`/`Edge` are lightweight references (just the id) rather than
/// embedded copies of the entity — keeps frontier sets and intermediate
/// bindings compact; property/label access on them resolves through the
/// store at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<Value>),
    Node(NodeId),
    Edge(EdgeId),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Text(_) => "TEXT",
            Value::Date(_) => "DATE",
            Value::List(_) => "LIST",
            Value::Node(_) => "NODE",
            Value::Edge(_) => "EDGE",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) | Value::Date(_)
        )
    }

    /// Cypher truthiness: only `Bool(true)` is truthy; `Null` and anything
    /// else used in a boolean position is not (filters treat non-bool as
    /// false rather than erroring, matching §4.4's `Filter` semantics).
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Centralized scalar→Text coercion (§4.1, §9). The only place type
    /// laxity lives; every string builtin routes through this once.
    /// Returns `None` for `Null` (callers propagate Null) and for
    /// non-scalar values (callers raise `TypeError`).
    pub fn coerce_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "true".to_string() } else { "false".to_string() }),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format!("{f}")),
            Value::Text(s) => Some(s.clone()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::List(_) | Value::Node(_) | Value::Edge(_) => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Node(id) => write!(f, "node({id})"),
            Value::Edge(id) => write!(f, "edge({id})"),
        }
    }
}

impl Value {
    /// Three-valued comparison used by filters and ordering. `None` means
    /// incomparable (Null on either side, or mismatched non-numeric
    /// types) — callers treat that as "not true" rather than erroring.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// Structural equality: used for `IN`, grouping keys, and `DISTINCT`
    /// — a different notion from three-valued `=` (§4.1). `Null` equals
    /// `Null` here; `Float` follows plain IEEE comparison so `NaN` never
    /// equals itself, matching §4.5.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Edge(a), Value::Edge(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
            }
            _ => false,
        }
    }
}

/// Wraps a `Value` for use as a hash-set/hash-map key under
/// [`Value::structural_eq`] — `count(DISTINCT e)`'s structural hashing
/// (§4.5). `Eq`/`Hash` here are only as strict as `structural_eq`: two
/// `NaN` floats hash to the same bucket but compare unequal, so each is
/// counted as its own distinct value, exactly as the spec requires.
#[derive(Debug, Clone)]
pub struct StructuralKey(pub Value);

impl PartialEq for StructuralKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.structural_eq(&other.0)
    }
}
impl Eq for StructuralKey {}

impl Hash for StructuralKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.0).hash(state);
        match &self.0 {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Date(d) => d.num_days_from_ce().hash(state),
            Value::Node(id) => id.hash(state),
            Value::Edge(id) => id.hash(state),
            Value::List(items) => {
                items.len().hash(state);
                for v in items {
                    StructuralKey(v.clone()).hash(state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_from_conversions() {
        assert_eq!(Value::from("hello"), Value::Text("hello".into()));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(3.14), Value::Float(3.14));
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn null_never_compares() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
    }

    #[test]
    fn numeric_cross_type_comparison() {
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)),
            Some(std::cmp::Ordering::Less)
        );
    }

    #[test]
    fn structural_eq_treats_null_as_equal_to_itself() {
        assert!(Value::Null.structural_eq(&Value::Null));
    }

    #[test]
    fn nan_is_not_structurally_equal_to_itself() {
        let nan = Value::Float(f64::NAN);
        assert!(!nan.structural_eq(&nan));
    }

    #[test]
    fn structural_key_dedup_counts_each_nan_separately() {
        use std::collections::HashSet;
        let mut seen: HashSet<StructuralKey> = HashSet::new();
        seen.insert(StructuralKey(Value::Float(f64::NAN)));
        seen.insert(StructuralKey(Value::Float(f64::NAN)));
        assert_eq!(seen.len(), 2);
        seen.insert(StructuralKey(Value::Int(1)));
        seen.insert(StructuralKey(Value::Int(1)));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn coerce_text_matches_spec_rules() {
        assert_eq!(Value::Bool(true).coerce_text().as_deref(), Some("true"));
        assert_eq!(Value::Int(42).coerce_text().as_deref(), Some("42"));
        assert_eq!(Value::Null.coerce_text(), None);
    }
}
