//! The built-in function library (§4.8). Argument evaluation happens in
//! `eval::eval_expr`; this module only validates arity/types and computes
//! results. Numeric domain errors (`log` of a non-positive number, etc.)
//! produce `Null`, not `Error`, per §4.1/§7 — only shape errors (wrong
//! arity, wrong argument type) raise `TypeError`.

use chrono::NaiveDate;

use crate::model::Value;
use crate::store::Store;
use crate::{Error, Result};

pub fn call(name: &str, args: Vec<Value>, store: &Store) -> Result<Value> {
    match name {
        "keys" => keys(args, store),
        "log" => unary_math(args, "log", |x| (x > 0.0).then(|| x.ln())),
        "log10" => unary_math(args, "log10", |x| (x > 0.0).then(|| x.log10())),
        "exp" => unary_math(args, "exp", |x| Some(x.exp())),
        "pow" => pow(args),
        "pi" => {
            expect_arity(&args, 0, "pi")?;
            Ok(Value::Float(std::f64::consts::PI))
        }
        "rand" => {
            expect_arity(&args, 0, "rand")?;
            Ok(Value::Float(rand::random::<f64>()))
        }
        "substring" => substring(args),
        "left" => left(args),
        "right" => right(args),
        "reverse" => reverse(args),
        "trim" => trim(args),
        "split" => split(args),
        "replace" => replace(args),
        "date" | "datetime" => date(args),
        "toInteger" => to_integer(args),
        "toFloat" => to_float(args),
        "toString" => to_string_fn(args),
        other => Err(Error::PlanError(format!("unknown function '{other}'"))),
    }
}

fn expect_arity(args: &[Value], n: usize, name: &str) -> Result<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(Error::TypeError(format!("{name}() expects {n} argument(s), got {}", args.len())))
    }
}

fn as_float_opt(v: &Value) -> Result<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::Int(n) => Ok(Some(*n as f64)),
        Value::Float(f) => Ok(Some(*f)),
        other => Err(Error::TypeError(format!("expected a number, found {}", other.type_name()))),
    }
}

fn as_text_opt(v: &Value) -> Result<Option<String>> {
    if v.is_null() {
        return Ok(None);
    }
    v.coerce_text().map(Some).ok_or_else(|| Error::TypeError(format!("cannot coerce {} to text", v.type_name())))
}

fn unary_math(args: Vec<Value>, name: &str, f: impl Fn(f64) -> Option<f64>) -> Result<Value> {
    expect_arity(&args, 1, name)?;
    match as_float_opt(&args[0])? {
        None => Ok(Value::Null),
        Some(x) => Ok(f(x).map(Value::Float).unwrap_or(Value::Null)),
    }
}

fn pow(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 2, "pow")?;
    match (as_float_opt(&args[0])?, as_float_opt(&args[1])?) {
        (Some(b), Some(e)) => Ok(Value::Float(b.powf(e))),
        _ => Ok(Value::Null),
    }
}

fn keys(args: Vec<Value>, store: &Store) -> Result<Value> {
    expect_arity(&args, 1, "keys")?;
    let names = match &args[0] {
        Value::Null => return Ok(Value::Null),
        Value::Node(id) => store
            .get_node(*id)
            .ok_or_else(|| Error::ReferenceError(format!("node {id} no longer exists")))?
            .keys(),
        Value::Edge(id) => store
            .get_edge(*id)
            .ok_or_else(|| Error::ReferenceError(format!("edge {id} no longer exists")))?
            .keys(),
        other => return Err(Error::TypeError(format!("keys() expects a node or relationship, found {}", other.type_name()))),
    };
    Ok(Value::List(names.into_iter().map(Value::Text).collect()))
}

fn substring(args: Vec<Value>) -> Result<Value> {
    if args.len() != 2 && args.len() != 3 {
        return Err(Error::TypeError(format!("substring() expects 2 or 3 arguments, got {}", args.len())));
    }
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    let chars: Vec<char> = text.chars().collect();
    let start = args[1].as_int().ok_or_else(|| Error::TypeError("substring() start must be an integer".into()))?;
    let start = start.max(0) as usize;
    let end = if args.len() == 3 {
        let len = args[2].as_int().ok_or_else(|| Error::TypeError("substring() length must be an integer".into()))?;
        start.saturating_add(len.max(0) as usize)
    } else {
        chars.len()
    };
    let end = end.min(chars.len());
    if start >= chars.len() {
        return Ok(Value::Text(String::new()));
    }
    Ok(Value::Text(chars[start..end].iter().collect()))
}

fn left(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 2, "left")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    let n = args[1].as_int().ok_or_else(|| Error::TypeError("left() length must be an integer".into()))?;
    let chars: Vec<char> = text.chars().collect();
    let n = (n.max(0) as usize).min(chars.len());
    Ok(Value::Text(chars[..n].iter().collect()))
}

fn right(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 2, "right")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    let n = args[1].as_int().ok_or_else(|| Error::TypeError("right() length must be an integer".into()))?;
    let chars: Vec<char> = text.chars().collect();
    let n = (n.max(0) as usize).min(chars.len());
    Ok(Value::Text(chars[chars.len() - n..].iter().collect()))
}

fn reverse(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "reverse")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    Ok(Value::Text(text.chars().rev().collect()))
}

fn trim(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "trim")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    Ok(Value::Text(text.trim().to_string()))
}

fn split(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 2, "split")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    let Some(sep) = as_text_opt(&args[1])? else { return Ok(Value::Null) };
    if sep.is_empty() {
        return Err(Error::TypeError("split() separator must not be empty".into()));
    }
    Ok(Value::List(text.split(sep.as_str()).map(|s| Value::Text(s.to_string())).collect()))
}

fn replace(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 3, "replace")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    let Some(search) = as_text_opt(&args[1])? else { return Ok(Value::Null) };
    let Some(replacement) = as_text_opt(&args[2])? else { return Ok(Value::Null) };
    Ok(Value::Text(text.replace(search.as_str(), &replacement)))
}

fn date(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "date")?;
    let Some(text) = as_text_opt(&args[0])? else { return Ok(Value::Null) };
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map(Value::Date)
        .map_err(|_| Error::TypeError(format!("'{text}' is not an ISO date (YYYY-MM-DD)")))
}

fn to_integer(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "toInteger")?;
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Int(n) => Value::Int(*n),
        Value::Float(f) => Value::Int(f.trunc() as i64),
        Value::Text(s) => s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        other => return Err(Error::TypeError(format!("toInteger() cannot convert {}", other.type_name()))),
    })
}

fn to_float(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "toFloat")?;
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Int(n) => Value::Float(*n as f64),
        Value::Float(f) => Value::Float(*f),
        Value::Text(s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        other => return Err(Error::TypeError(format!("toFloat() cannot convert {}", other.type_name()))),
    })
}

fn to_string_fn(args: Vec<Value>) -> Result<Value> {
    expect_arity(&args, 1, "toString")?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => other
            .coerce_text()
            .map(Value::Text)
            .ok_or_else(|| Error::TypeError(format!("toString() cannot convert {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_ok(name: &str, args: Vec<Value>) -> Value {
        let store = Store::new();
        call(name, args, &store).unwrap()
    }

    #[test]
    fn log_of_negative_is_null_not_error() {
        assert_eq!(call_ok("log", vec![Value::Int(-1)]), Value::Null);
    }

    #[test]
    fn pow_matches_spec_example() {
        assert_eq!(call_ok("pow", vec![Value::Int(2), Value::Int(10)]), Value::Float(1024.0));
    }

    #[test]
    fn substring_on_coerced_date() {
        let d = Value::Date(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap());
        assert_eq!(call_ok("substring", vec![d, Value::Int(0), Value::Int(4)]), Value::Text("2020".into()));
    }

    #[test]
    fn split_and_replace_roundtrip() {
        let parts = call_ok("split", vec![Value::Text("a,b,c".into()), Value::Text(",".into())]);
        assert_eq!(parts, Value::List(vec![Value::Text("a".into()), Value::Text("b".into()), Value::Text("c".into())]));
        assert_eq!(
            call_ok("replace", vec![Value::Text("a,b,c".into()), Value::Text(",".into()), Value::Text("-".into())]),
            Value::Text("a-b-c".into())
        );
    }

    #[test]
    fn date_parses_iso_string() {
        assert_eq!(call_ok("date", vec![Value::Text("2020-06-15".into())]), Value::Date(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()));
    }

    #[test]
    fn date_rejects_malformed_input() {
        let store = Store::new();
        assert!(call("date", vec![Value::Text("not-a-date".into())], &store).is_err());
    }

    #[test]
    fn to_integer_truncates_float() {
        assert_eq!(call_ok("toInteger", vec![Value::Float(3.9)]), Value::Int(3));
    }

    #[test]
    fn to_string_on_bool() {
        assert_eq!(call_ok("toString", vec![Value::Bool(true)]), Value::Text("true".into()));
    }

    #[test]
    fn keys_on_unsupported_type_is_type_error() {
        let store = Store::new();
        assert!(call("keys", vec![Value::Int(1)], &store).is_err());
    }
}
