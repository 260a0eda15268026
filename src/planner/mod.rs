//! Query planner — lowers the Cypher AST into the six logical operators
//! named in §4.4: `NodeScan`/`Seed`, `Expand`, `Filter`, `With`, `Project`,
//! `Aggregate`. No cost-based optimizer: `optimize` only applies the one
//! rewrite the spec calls out, seed pushdown, which happens during
//! construction rather than as a later pass.

use crate::cypher::ast::{
    BinaryOp, Clause, Expr, Literal, NodePattern, PatternDirection, PatternElement, Query,
    ReturnClause, ReturnItem, VarLength,
};
use crate::model::PropertyMap;
use crate::{Error, Result};

/// A logical query plan: a tree of the six operators from §4.4.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    /// Scans every node of `label` (or every node, if `label` is `None`).
    /// `seed` carries a pushed-down `alias.id IN [...]` predicate so the
    /// engine can probe the primary-key index instead of scanning (§4.4,
    /// §9).
    NodeScan { alias: String, label: Option<String>, seed: Option<Expr> },

    /// Expands from `from_alias` along `rel_type`/`direction`, binding
    /// `to_alias` (and optionally `rel_alias`). `min_hops`/`max_hops` are
    /// `1`/`1` for a plain relationship and the resolved bounds for a
    /// variable-length one (§4.4, §4.6). `distinct` records whether the
    /// surrounding query requests distinct endpoints (a `RETURN DISTINCT`
    /// or a `count(DISTINCT ...)` anywhere downstream) — set once, after
    /// the whole plan is built, by `mark_expand_distinct` (§4.6).
    Expand {
        input: Box<LogicalPlan>,
        from_alias: String,
        to_alias: String,
        rel_alias: Option<String>,
        rel_type: Option<String>,
        direction: PatternDirection,
        min_hops: u32,
        max_hops: u32,
        distinct: bool,
    },

    /// Drops rows where `predicate` is not `Value::Bool(true)` (§4.4,
    /// §4.5 three-valued logic).
    Filter { input: Box<LogicalPlan>, predicate: Expr },

    /// Re-binds the row to a new, possibly narrower, set of named
    /// expressions, flowing into the next clause (§4.4).
    With { input: Box<LogicalPlan>, items: Vec<ProjectItem> },

    /// Final projection into result columns, with optional `DISTINCT`
    /// de-duplication using structural equality (§4.4, §4.5).
    Project { input: Box<LogicalPlan>, items: Vec<ProjectItem>, distinct: bool },

    /// Groups by `keys` and computes `aggregates` per group, preserving
    /// first-seen group order (§4.4, §4.5, §4.8).
    Aggregate { input: Box<LogicalPlan>, keys: Vec<ProjectItem>, aggregates: Vec<AggregateItem> },
}

#[derive(Debug, Clone)]
pub struct ProjectItem {
    pub expr: Expr,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Collect,
}

#[derive(Debug, Clone)]
pub struct AggregateItem {
    pub func: AggFunc,
    /// `Expr::Star` for `count(*)`.
    pub arg: Expr,
    pub distinct: bool,
    pub alias: String,
}

/// Builds a logical plan from a parsed query. `params` is accepted for
/// symmetry with `engine::execute` but unused: parameter references are
/// resolved at evaluation time, not planning time.
pub fn plan(ast: &Query, _params: &PropertyMap) -> Result<LogicalPlan> {
    let mut current: Option<LogicalPlan> = None;
    for clause in &ast.clauses {
        current = Some(match clause {
            Clause::Match { pattern, where_expr } => {
                plan_match(current, &pattern[0], where_expr.as_ref())?
            }
            Clause::With { items, where_expr } => plan_with(current, items, where_expr.as_ref())?,
        });
    }
    let mut result = plan_return(current, &ast.return_clause)?;
    let distinct = query_requests_distinct(&result);
    mark_expand_distinct(&mut result, distinct);
    Ok(result)
}

/// Whether any `RETURN DISTINCT` or `count(DISTINCT ...)`-style aggregate
/// appears anywhere in the plan. A single query-wide flag rather than a
/// per-`Expand`/per-variable one — simpler, and sufficient since a query
/// with more than one variable-length expansion feeding one aggregate is
/// already an edge case outside the fixture scenarios in §8 (§4.6).
fn query_requests_distinct(plan: &LogicalPlan) -> bool {
    match plan {
        LogicalPlan::NodeScan { .. } => false,
        LogicalPlan::Expand { input, .. } => query_requests_distinct(input),
        LogicalPlan::Filter { input, .. } => query_requests_distinct(input),
        LogicalPlan::With { input, .. } => query_requests_distinct(input),
        LogicalPlan::Project { input, distinct, .. } => *distinct || query_requests_distinct(input),
        LogicalPlan::Aggregate { input, aggregates, .. } => {
            aggregates.iter().any(|a| a.distinct) || query_requests_distinct(input)
        }
    }
}

fn mark_expand_distinct(plan: &mut LogicalPlan, distinct: bool) {
    match plan {
        LogicalPlan::NodeScan { .. } => {}
        LogicalPlan::Expand { input, distinct: d, .. } => {
            *d = distinct;
            mark_expand_distinct(input, distinct);
        }
        LogicalPlan::Filter { input, .. }
        | LogicalPlan::With { input, .. }
        | LogicalPlan::Project { input, .. }
        | LogicalPlan::Aggregate { input, .. } => mark_expand_distinct(input, distinct),
    }
}

/// No separate optimization pass; seed pushdown already happens during
/// construction. Kept as a pipeline stage so callers don't special-case
/// the first query they plan (§9).
pub fn optimize(plan: LogicalPlan) -> LogicalPlan {
    plan
}

fn plan_match(
    current: Option<LogicalPlan>,
    pattern: &PatternElement,
    where_expr: Option<&Expr>,
) -> Result<LogicalPlan> {
    let start_alias = pattern
        .start
        .var
        .clone()
        .ok_or_else(|| Error::PlanError("pattern start node must be bound to a variable".into()))?;

    let (mut plan, pending_where) = match current {
        None => {
            // A seeded scan needs the primary-key index, which is keyed by
            // label; an unlabeled `MATCH (n)` has no index to probe, so
            // leave `n.id IN [...]` as an ordinary filter instead (§4.4).
            let (seed, remaining) = if pattern.start.label.is_some() {
                extract_seed(where_expr, &start_alias)
            } else {
                (None, where_expr.cloned())
            };
            let mut p = LogicalPlan::NodeScan {
                alias: start_alias.clone(),
                label: pattern.start.label.clone(),
                seed,
            };
            p = apply_inline_props(p, &start_alias, &pattern.start);
            (p, remaining)
        }
        Some(existing) => {
            if !output_aliases(&existing).contains(&start_alias) {
                return Err(Error::PlanError(format!(
                    "variable '{start_alias}' used as a MATCH start must already be bound by a preceding WITH"
                )));
            }
            let mut p = existing;
            if let Some(label) = &pattern.start.label {
                p = LogicalPlan::Filter { input: Box::new(p), predicate: label_predicate(&start_alias, label) };
            }
            p = apply_inline_props(p, &start_alias, &pattern.start);
            (p, where_expr.cloned())
        }
    };

    let mut from_alias = start_alias;
    for (i, (rel, node)) in pattern.steps.iter().enumerate() {
        let to_alias = node.var.clone().unwrap_or_else(|| format!("__anon{i}"));
        let (min_hops, max_hops) = resolve_var_length(rel.var_length)?;
        plan = LogicalPlan::Expand {
            input: Box::new(plan),
            from_alias,
            to_alias: to_alias.clone(),
            rel_alias: rel.var.clone(),
            rel_type: rel.rel_type.clone(),
            direction: rel.direction,
            min_hops,
            max_hops,
            // Overwritten by `mark_expand_distinct` once the whole query is planned.
            distinct: false,
        };
        if let Some(label) = &node.label {
            plan = LogicalPlan::Filter { input: Box::new(plan), predicate: label_predicate(&to_alias, label) };
        }
        plan = apply_inline_props(plan, &to_alias, node);
        from_alias = to_alias;
    }

    if let Some(w) = pending_where {
        plan = LogicalPlan::Filter { input: Box::new(plan), predicate: w };
    }
    Ok(plan)
}

fn apply_inline_props(mut plan: LogicalPlan, alias: &str, node: &NodePattern) -> LogicalPlan {
    for (key, value) in &node.props {
        plan = LogicalPlan::Filter { input: Box::new(plan), predicate: prop_eq_predicate(alias, key, value.clone()) };
    }
    plan
}

fn plan_with(current: Option<LogicalPlan>, items: &[ReturnItem], where_expr: Option<&Expr>) -> Result<LogicalPlan> {
    let input = current.ok_or_else(|| Error::PlanError("WITH requires a preceding MATCH".into()))?;
    let mut plan = build_projection_or_aggregate(input, items, true)?;
    if let Some(w) = where_expr {
        plan = LogicalPlan::Filter { input: Box::new(plan), predicate: w.clone() };
    }
    Ok(plan)
}

fn plan_return(current: Option<LogicalPlan>, ret: &ReturnClause) -> Result<LogicalPlan> {
    let input = current.ok_or_else(|| Error::PlanError("query has no MATCH clause".into()))?;
    let items = expand_star(&input, &ret.items);
    let mut plan = build_projection_or_aggregate(input, &items, false)?;
    if ret.distinct {
        match &mut plan {
            LogicalPlan::Project { distinct, .. } => *distinct = true,
            LogicalPlan::Aggregate { .. } => {
                return Err(Error::PlanError("RETURN DISTINCT cannot be combined with aggregation".into()));
            }
            _ => unreachable!("build_projection_or_aggregate never returns a bare With for a RETURN clause"),
        }
    }
    Ok(plan)
}

fn expand_star(input: &LogicalPlan, items: &[ReturnItem]) -> Vec<ReturnItem> {
    let mut expanded = Vec::with_capacity(items.len());
    for item in items {
        if matches!(item.expr, Expr::Star) {
            for alias in output_aliases(input) {
                expanded.push(ReturnItem { expr: Expr::Variable(alias.clone()), alias: Some(alias) });
            }
        } else {
            expanded.push(item.clone());
        }
    }
    expanded
}

/// Builds either an `Aggregate` (if any item is a top-level aggregate
/// function call) or a `With`/`Project` (otherwise). `is_with` selects
/// which of the two non-aggregate shapes to produce.
fn build_projection_or_aggregate(input: LogicalPlan, items: &[ReturnItem], is_with: bool) -> Result<LogicalPlan> {
    let mut keys = Vec::new();
    let mut aggregates = Vec::new();

    for (i, item) in items.iter().enumerate() {
        if let Expr::FunctionCall { name, args, distinct } = &item.expr {
            if let Some(func) = agg_func(name) {
                let arg = args.first().cloned().unwrap_or(Expr::Star);
                let alias = item.alias.clone().unwrap_or_else(|| default_alias(&item.expr, i));
                aggregates.push(AggregateItem { func, arg, distinct: *distinct, alias });
                continue;
            }
        }
        let alias = item.alias.clone().unwrap_or_else(|| default_alias(&item.expr, i));
        keys.push(ProjectItem { expr: item.expr.clone(), alias });
    }

    if !aggregates.is_empty() {
        Ok(LogicalPlan::Aggregate { input: Box::new(input), keys, aggregates })
    } else if is_with {
        Ok(LogicalPlan::With { input: Box::new(input), items: keys })
    } else {
        Ok(LogicalPlan::Project { input: Box::new(input), items: keys, distinct: false })
    }
}

fn agg_func(name: &str) -> Option<AggFunc> {
    Some(match name {
        "count" => AggFunc::Count,
        "sum" => AggFunc::Sum,
        "avg" => AggFunc::Avg,
        "min" => AggFunc::Min,
        "max" => AggFunc::Max,
        "collect" => AggFunc::Collect,
        _ => return None,
    })
}

fn default_alias(expr: &Expr, idx: usize) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Property(inner, key) => format!("{}.{key}", default_alias(inner, idx)),
        Expr::FunctionCall { name, .. } => name.clone(),
        Expr::Star => "*".to_string(),
        _ => format!("expr_{idx}"),
    }
}

/// Every alias a plan binds, in no particular order (consumed only for
/// membership checks and `RETURN *` expansion).
fn output_aliases(plan: &LogicalPlan) -> Vec<String> {
    match plan {
        LogicalPlan::NodeScan { alias, .. } => vec![alias.clone()],
        LogicalPlan::Expand { input, to_alias, rel_alias, .. } => {
            let mut v = output_aliases(input);
            v.push(to_alias.clone());
            if let Some(r) = rel_alias {
                v.push(r.clone());
            }
            v
        }
        LogicalPlan::Filter { input, .. } => output_aliases(input),
        LogicalPlan::With { items, .. } | LogicalPlan::Project { items, .. } => {
            items.iter().map(|i| i.alias.clone()).collect()
        }
        LogicalPlan::Aggregate { keys, aggregates, .. } => {
            let mut v: Vec<String> = keys.iter().map(|i| i.alias.clone()).collect();
            v.extend(aggregates.iter().map(|a| a.alias.clone()));
            v
        }
    }
}

/// Resolves `*min..max` against the default rules in §4.6: missing min
/// defaults to `1`; missing max (with `..` present) defaults to min;
/// a bare `*` with neither bound is a `PlanError`.
fn resolve_var_length(vl: Option<VarLength>) -> Result<(u32, u32)> {
    match vl {
        None => Ok((1, 1)),
        Some(VarLength { min: None, max: None }) => Err(Error::PlanError(
            "bare '*' variable-length relationship is not allowed; specify bounds, e.g. '*1..3'".into(),
        )),
        Some(VarLength { min: None, max: Some(max) }) => Ok((1, max)),
        Some(VarLength { min: Some(min), max: None }) => Ok((min, min)),
        Some(VarLength { min: Some(min), max: Some(max) }) => Ok((min, max)),
    }
}

fn label_predicate(alias: &str, label: &str) -> Expr {
    Expr::BinaryOp(
        BinaryOp::Eq,
        Box::new(Expr::Property(Box::new(Expr::Variable(alias.to_string())), "type".to_string())),
        Box::new(Expr::Literal(Literal::Text(label.to_string()))),
    )
}

fn prop_eq_predicate(alias: &str, key: &str, value: Expr) -> Expr {
    Expr::BinaryOp(
        BinaryOp::Eq,
        Box::new(Expr::Property(Box::new(Expr::Variable(alias.to_string())), key.to_string())),
        Box::new(value),
    )
}

/// Pulls a top-level `alias.id IN [...]` conjunct out of `where_expr` for
/// seed pushdown, returning it separately from the remaining predicate
/// (§4.4, §9).
fn extract_seed(where_expr: Option<&Expr>, alias: &str) -> (Option<Expr>, Option<Expr>) {
    let Some(w) = where_expr else { return (None, None) };
    let conjuncts = split_conjuncts(w);
    let mut seed = None;
    let mut keep = Vec::new();
    for c in conjuncts {
        if seed.is_none() {
            if let Expr::In(lhs, rhs) = &c {
                if is_id_ref(lhs, alias) {
                    seed = Some((**rhs).clone());
                    continue;
                }
            }
        }
        keep.push(c);
    }
    (seed, rejoin_conjuncts(keep))
}

fn is_id_ref(expr: &Expr, alias: &str) -> bool {
    matches!(expr, Expr::Property(inner, key) if key == "id" && matches!(&**inner, Expr::Variable(v) if v == alias))
}

fn split_conjuncts(expr: &Expr) -> Vec<Expr> {
    match expr {
        Expr::BinaryOp(BinaryOp::And, l, r) => {
            let mut v = split_conjuncts(l);
            v.extend(split_conjuncts(r));
            v
        }
        other => vec![other.clone()],
    }
}

fn rejoin_conjuncts(mut exprs: Vec<Expr>) -> Option<Expr> {
    if exprs.is_empty() {
        return None;
    }
    let mut acc = exprs.remove(0);
    for e in exprs {
        acc = Expr::BinaryOp(BinaryOp::And, Box::new(acc), Box::new(e));
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher;

    fn plan_query(src: &str) -> LogicalPlan {
        let ast = cypher::parse(src).unwrap();
        plan(&ast, &PropertyMap::new()).unwrap_or_else(|e| panic!("plan failed for {src:?}: {e}"))
    }

    #[test]
    fn simple_scan_and_project() {
        let p = plan_query("MATCH (n:Person) RETURN n.name AS name");
        match p {
            LogicalPlan::Project { input, items, distinct } => {
                assert!(!distinct);
                assert_eq!(items[0].alias, "name");
                assert!(matches!(*input, LogicalPlan::NodeScan { label: Some(ref l), .. } if l == "Person"));
            }
            _ => panic!("expected Project"),
        }
    }

    #[test]
    fn seed_pushdown_from_where_in() {
        let p = plan_query("MATCH (n:Person) WHERE n.id IN [1, 2] RETURN n");
        let mut cur = &p;
        loop {
            match cur {
                LogicalPlan::Project { input, .. } => cur = input,
                LogicalPlan::NodeScan { seed, .. } => {
                    assert!(seed.is_some());
                    break;
                }
                LogicalPlan::Filter { input, .. } => cur = input,
                _ => panic!("unexpected node on path to scan"),
            }
        }
    }

    #[test]
    fn expand_chain_for_relationship() {
        let p = plan_query("MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN b");
        match p {
            LogicalPlan::Project { input, .. } => match *input {
                LogicalPlan::Filter { input, .. } => {
                    assert!(matches!(*input, LogicalPlan::Expand { min_hops: 1, max_hops: 1, .. }));
                }
                _ => panic!("expected label filter after expand"),
            },
            _ => panic!("expected Project"),
        }
    }

    #[test]
    fn variable_length_bounds_resolved() {
        let p = plan_query("MATCH (a)-[:LINKED*..3]->(b) RETURN b");
        fn find_expand(p: &LogicalPlan) -> &LogicalPlan {
            match p {
                LogicalPlan::Project { input, .. } => find_expand(input),
                LogicalPlan::Filter { input, .. } => find_expand(input),
                e @ LogicalPlan::Expand { .. } => e,
                _ => panic!("expected to find Expand"),
            }
        }
        match find_expand(&p) {
            LogicalPlan::Expand { min_hops, max_hops, .. } => {
                assert_eq!(*min_hops, 1);
                assert_eq!(*max_hops, 3);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn bare_star_variable_length_is_plan_error() {
        let ast = cypher::parse("MATCH (a)-[:LINKED*]->(b) RETURN b").unwrap();
        let err = plan(&ast, &PropertyMap::new()).unwrap_err();
        assert!(matches!(err, Error::PlanError(_)));
    }

    #[test]
    fn aggregate_with_group_key() {
        let p = plan_query("MATCH (n:Person) RETURN n.city AS city, count(*) AS total");
        match p {
            LogicalPlan::Aggregate { keys, aggregates, .. } => {
                assert_eq!(keys[0].alias, "city");
                assert_eq!(aggregates[0].alias, "total");
                assert_eq!(aggregates[0].func, AggFunc::Count);
                assert!(matches!(aggregates[0].arg, Expr::Star));
            }
            _ => panic!("expected Aggregate"),
        }
    }

    #[test]
    fn return_distinct_sets_flag() {
        let p = plan_query("MATCH (n) RETURN DISTINCT n.label AS label");
        match p {
            LogicalPlan::Project { distinct, .. } => assert!(distinct),
            _ => panic!("expected Project"),
        }
    }

    #[test]
    fn return_star_expands_bound_aliases() {
        let p = plan_query("MATCH (a)-[r:KNOWS]->(b) RETURN *");
        match p {
            LogicalPlan::Project { items, .. } => {
                let aliases: Vec<_> = items.iter().map(|i| i.alias.as_str()).collect();
                assert!(aliases.contains(&"a"));
                assert!(aliases.contains(&"b"));
                assert!(aliases.contains(&"r"));
            }
            _ => panic!("expected Project"),
        }
    }

    #[test]
    fn with_then_match_continuation_requires_bound_variable() {
        let ast = cypher::parse("MATCH (a:Person) WITH a AS x MATCH (y)-[:KNOWS]->(b) RETURN b").unwrap();
        let err = plan(&ast, &PropertyMap::new()).unwrap_err();
        assert!(matches!(err, Error::PlanError(_)));
    }
}
