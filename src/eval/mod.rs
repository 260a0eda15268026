//! Expression evaluator (§4.5). Operates on a `Row` — the binding of
//! in-scope aliases to `Value`s — plus query parameters and the store
//! (needed because `Value::Node`/`Value::Edge` are bare id references;
//! property and label access resolves through the store at evaluation
//! time rather than against an embedded copy).

pub mod functions;

use std::cmp::Ordering;

use chrono::Datelike;
use indexmap::IndexMap;

use crate::cypher::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::model::{PropertyMap, Value};
use crate::store::Store;
use crate::{Error, Result};

/// The binding of aliases to values flowing through plan operators.
pub type Row = IndexMap<String, Value>;

pub fn eval_expr(expr: &Expr, row: &Row, params: &PropertyMap, store: &Store) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Parameter(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ReferenceError(format!("unknown parameter '${name}'"))),
        Expr::Variable(name) => {
            row.get(name).cloned().ok_or_else(|| Error::ReferenceError(format!("unbound variable '{name}'")))
        }
        Expr::Property(inner, key) => {
            let base = eval_expr(inner, row, params, store)?;
            property_access(base, key, store)
        }
        Expr::FunctionCall { name, args, .. } => {
            let values = args
                .iter()
                .map(|a| eval_expr(a, row, params, store))
                .collect::<Result<Vec<_>>>()?;
            functions::call(name, values, store)
        }
        Expr::BinaryOp(op, l, r) => eval_binary(*op, l, r, row, params, store),
        Expr::UnaryOp(UnaryOp::Neg, inner) => numeric_neg(eval_expr(inner, row, params, store)?),
        Expr::UnaryOp(UnaryOp::Not, inner) => logical_not(eval_expr(inner, row, params, store)?),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|i| eval_expr(i, row, params, store))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(values))
        }
        Expr::In(lhs, rhs) => eval_in(lhs, rhs, row, params, store),
        Expr::IsNull { expr, negated } => {
            let v = eval_expr(expr, row, params, store)?;
            Ok(Value::Bool(v.is_null() ^ negated))
        }
        Expr::Star => Err(Error::TypeError("'*' is only valid as a count(*) argument".into())),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Text(s) => Value::Text(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

fn eval_binary(op: BinaryOp, l: &Expr, r: &Expr, row: &Row, params: &PropertyMap, store: &Store) -> Result<Value> {
    let lv = eval_expr(l, row, params, store)?;
    let rv = eval_expr(r, row, params, store)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, lv, rv)
        }
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            Ok(compare_op(op, &lv, &rv))
        }
        BinaryOp::And => logical_and(lv, rv),
        BinaryOp::Or => logical_or(lv, rv),
        BinaryOp::Xor => logical_xor(lv, rv),
    }
}

fn eval_in(lhs: &Expr, rhs: &Expr, row: &Row, params: &PropertyMap, store: &Store) -> Result<Value> {
    let lv = eval_expr(lhs, row, params, store)?;
    let list = eval_expr(rhs, row, params, store)?;
    let items = match list {
        Value::List(items) => items,
        Value::Null => return Ok(Value::Null),
        other => return Err(Error::TypeError(format!("IN requires a list, found {}", other.type_name()))),
    };
    if lv.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for item in &items {
        if item.is_null() {
            saw_null = true;
            continue;
        }
        if lv.structural_eq(item) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(if saw_null { Value::Null } else { Value::Bool(false) })
}

fn property_access(base: Value, key: &str, store: &Store) -> Result<Value> {
    match base {
        Value::Null => Ok(Value::Null),
        Value::Node(id) => {
            let node = store.get_node(id).ok_or_else(|| Error::ReferenceError(format!("node {id} no longer exists")))?;
            Ok(node.get(key).unwrap_or(Value::Null))
        }
        Value::Edge(id) => {
            let edge = store.get_edge(id).ok_or_else(|| Error::ReferenceError(format!("edge {id} no longer exists")))?;
            Ok(edge.get(key).unwrap_or(Value::Null))
        }
        Value::Date(d) => match key {
            "year" => Ok(Value::Int(d.year() as i64)),
            "month" => Ok(Value::Int(d.month() as i64)),
            "day" => Ok(Value::Int(d.day() as i64)),
            other => Err(Error::TypeError(format!("date has no property '{other}'"))),
        },
        other => Err(Error::TypeError(format!("cannot access property '{key}' on {}", other.type_name()))),
    }
}

/// `Int op Int` stays integral for `+ - * %`; any `Float` operand, or
/// `/`/`^`, promotes to `Float` (§4.1).
fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        match op {
            BinaryOp::Add => return a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => return a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => return a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mod => {
                return if b == 0 {
                    Err(Error::TypeError("modulo by zero".into()))
                } else {
                    Ok(Value::Int(a % b))
                };
            }
            _ => {}
        }
    }
    let lf = l.as_float().ok_or_else(|| type_mismatch(&l, &r))?;
    let rf = r.as_float().ok_or_else(|| type_mismatch(&l, &r))?;
    let result = match op {
        BinaryOp::Add => lf + rf,
        BinaryOp::Sub => lf - rf,
        BinaryOp::Mul => lf * rf,
        BinaryOp::Div => lf / rf,
        BinaryOp::Mod => lf % rf,
        BinaryOp::Pow => lf.powf(rf),
        _ => unreachable!("non-arithmetic operator reached arithmetic()"),
    };
    Ok(Value::Float(result))
}

fn overflow() -> Error {
    Error::TypeError("integer overflow".into())
}

fn type_mismatch(l: &Value, r: &Value) -> Error {
    Error::TypeError(format!("cannot apply arithmetic to {} and {}", l.type_name(), r.type_name()))
}

fn compare_op(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let ord = l.compare(r);
    let result = match op {
        BinaryOp::Eq => ord.map(|o| o == Ordering::Equal),
        BinaryOp::Neq => ord.map(|o| o != Ordering::Equal),
        BinaryOp::Lt => ord.map(|o| o == Ordering::Less),
        BinaryOp::Lte => ord.map(|o| o != Ordering::Greater),
        BinaryOp::Gt => ord.map(|o| o == Ordering::Greater),
        BinaryOp::Gte => ord.map(|o| o != Ordering::Less),
        _ => unreachable!("non-comparison operator reached compare_op()"),
    };
    result.map(Value::Bool).unwrap_or(Value::Null)
}

/// Three-valued (Kleene) logic: `Null` propagates except where the other
/// operand already decides the result (§4.5).
fn logical_and(l: Value, r: Value) -> Result<Value> {
    Ok(match (as_opt_bool(&l)?, as_opt_bool(&r)?) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    })
}

fn logical_or(l: Value, r: Value) -> Result<Value> {
    Ok(match (as_opt_bool(&l)?, as_opt_bool(&r)?) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    })
}

fn logical_xor(l: Value, r: Value) -> Result<Value> {
    Ok(match (as_opt_bool(&l)?, as_opt_bool(&r)?) {
        (Some(a), Some(b)) => Value::Bool(a ^ b),
        _ => Value::Null,
    })
}

fn logical_not(v: Value) -> Result<Value> {
    Ok(match as_opt_bool(&v)? {
        None => Value::Null,
        Some(b) => Value::Bool(!b),
    })
}

fn as_opt_bool(v: &Value) -> Result<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(Error::TypeError(format!("expected a boolean, found {}", other.type_name()))),
    }
}

fn numeric_neg(v: Value) -> Result<Value> {
    match v {
        Value::Null => Ok(Value::Null),
        Value::Int(n) => Ok(Value::Int(-n)),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Error::TypeError(format!("cannot negate {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher;

    fn eval_str(src: &str) -> Value {
        let ast = cypher::parse(src).unwrap();
        let expr = &ast.return_clause.items[0].expr;
        let store = Store::new();
        eval_expr(expr, &Row::new(), &PropertyMap::new(), &store).unwrap()
    }

    #[test]
    fn arithmetic_promotes_to_float_on_division() {
        assert_eq!(eval_str("RETURN 7 / 2"), Value::Float(3.5));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        assert_eq!(eval_str("RETURN 7 + 2"), Value::Int(9));
    }

    #[test]
    fn null_propagates_through_arithmetic() {
        assert_eq!(eval_str("RETURN 1 + null"), Value::Null);
    }

    #[test]
    fn three_valued_and() {
        assert_eq!(eval_str("RETURN false AND null"), Value::Bool(false));
        assert_eq!(eval_str("RETURN true AND null"), Value::Null);
    }

    #[test]
    fn three_valued_or() {
        assert_eq!(eval_str("RETURN true OR null"), Value::Bool(true));
        assert_eq!(eval_str("RETURN false OR null"), Value::Null);
    }

    #[test]
    fn equality_with_null_is_null_not_false() {
        assert_eq!(eval_str("RETURN 1 = null"), Value::Null);
    }

    #[test]
    fn in_list_with_null_member_and_no_match_is_null() {
        assert_eq!(eval_str("RETURN 3 IN [1, null, 2]"), Value::Null);
    }

    #[test]
    fn in_list_with_match_is_true_even_alongside_null() {
        assert_eq!(eval_str("RETURN 1 IN [1, null, 2]"), Value::Bool(true));
    }

    #[test]
    fn is_null_and_is_not_null() {
        assert_eq!(eval_str("RETURN null IS NULL"), Value::Bool(true));
        assert_eq!(eval_str("RETURN 1 IS NOT NULL"), Value::Bool(true));
    }

    #[test]
    fn power_operator_is_right_associative_and_float() {
        assert_eq!(eval_str("RETURN 2 ^ 10"), Value::Float(1024.0));
    }

    #[test]
    fn scientific_notation_literal_value() {
        assert_eq!(eval_str("RETURN 1e6"), Value::Float(1_000_000.0));
    }
}
