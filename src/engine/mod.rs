//! Query execution engine (§4.7, §9).
//!
//! Each logical operator lowers to a function that consumes its input
//! rows and produces its output rows eagerly rather than through a
//! pull-based `next()` iterator: the store is an immutable snapshot for
//! the duration of a query (§5), so there is no streaming backpressure
//! to gain from lazier evaluation, and eager evaluation keeps deadline
//! checks simple to reason about. Deadline checks happen at the cadence
//! §5 specifies: once per leaf scan row, once per BFS hop, and once
//! every 4096 tuples while aggregating.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::cypher::ast::{Expr, PatternDirection};
use crate::eval::{self, Row};
use crate::model::value::StructuralKey;
use crate::model::{Direction, EdgeId, NodeId, PropertyMap, Record, Value};
use crate::planner::{AggFunc, AggregateItem, LogicalPlan, ProjectItem};
use crate::store::Store;
use crate::{Error, Result};

/// A monotonic deadline captured once at query entry (§4.7, §5, §9).
/// `timeout_ms = Some(0)` must forbid any forward progress: the first
/// `check()` call (before any row is produced) already observes it as
/// elapsed.
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn new(timeout_ms: Option<u64>) -> Self {
        Self { at: timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms)) }
    }

    pub fn check(&self) -> Result<()> {
        match self.at {
            Some(at) if Instant::now() >= at => {
                Err(Error::TimeoutError("query exceeded its deadline".into()))
            }
            _ => Ok(()),
        }
    }
}

pub fn execute(store: &Store, plan: &LogicalPlan, params: &PropertyMap, deadline: &Deadline) -> Result<Vec<Record>> {
    let rows = eval_plan(store, plan, params, deadline)?;
    Ok(rows.into_iter().map(|row| row.into_iter().collect()).collect())
}

fn eval_plan(store: &Store, plan: &LogicalPlan, params: &PropertyMap, deadline: &Deadline) -> Result<Vec<Row>> {
    match plan {
        LogicalPlan::NodeScan { alias, label, seed } => {
            exec_node_scan(store, alias, label.as_deref(), seed.as_ref(), params, deadline)
        }
        LogicalPlan::Expand { input, from_alias, to_alias, rel_alias, rel_type, direction, min_hops, max_hops, distinct } => {
            let rows = eval_plan(store, input, params, deadline)?;
            exec_expand(
                store,
                rows,
                from_alias,
                to_alias,
                rel_alias.as_deref(),
                rel_type.as_deref(),
                *direction,
                *min_hops,
                *max_hops,
                *distinct,
                deadline,
            )
        }
        LogicalPlan::Filter { input, predicate } => {
            let rows = eval_plan(store, input, params, deadline)?;
            exec_filter(store, rows, predicate, params, deadline)
        }
        LogicalPlan::With { input, items } => {
            let rows = eval_plan(store, input, params, deadline)?;
            exec_project(store, rows, items, params, deadline)
        }
        LogicalPlan::Project { input, items, distinct } => {
            let rows = eval_plan(store, input, params, deadline)?;
            let projected = exec_project(store, rows, items, params, deadline)?;
            Ok(if *distinct { dedup_structural(projected) } else { projected })
        }
        LogicalPlan::Aggregate { input, keys, aggregates } => {
            let rows = eval_plan(store, input, params, deadline)?;
            exec_aggregate(store, rows, keys, aggregates, params, deadline)
        }
    }
}

fn exec_node_scan(
    store: &Store,
    alias: &str,
    label: Option<&str>,
    seed: Option<&Expr>,
    params: &PropertyMap,
    deadline: &Deadline,
) -> Result<Vec<Row>> {
    deadline.check()?;
    let ids: Vec<NodeId> = match seed {
        Some(seed_expr) => {
            let label = label.ok_or_else(|| Error::PlanError("a seeded scan requires a label".into()))?;
            let empty_row = Row::new();
            let list = eval::eval_expr(seed_expr, &empty_row, params, store)?;
            match list {
                Value::List(pks) => pks.iter().filter_map(|pk| store.node_by_pk(label, pk)).collect(),
                other => {
                    return Err(Error::PlanError(format!(
                        "seed expression must evaluate to a list, found {}",
                        other.type_name()
                    )));
                }
            }
        }
        None => match label {
            Some(l) => store.nodes_by_label(l),
            None => store.all_node_ids(),
        },
    };

    let mut rows = Vec::with_capacity(ids.len());
    for id in ids {
        deadline.check()?;
        let mut row = Row::new();
        row.insert(alias.to_string(), Value::Node(id));
        rows.push(row);
    }
    Ok(rows)
}

/// Expands from each input row's `from_alias` binding along `rel_type`/
/// `direction`, bounded to `[min_hops, max_hops]` (§4.6).
///
/// Two modes, chosen by `distinct` (set by `planner::mark_expand_distinct`
/// from whether the query requests distinct endpoints anywhere downstream):
/// - `distinct == true`: `exec_expand_distinct` — a level-by-level frontier
///   that emits each endpoint once, at the first depth within range.
/// - `distinct == false`: `exec_expand_paths` — every trail (no repeated
///   edge) through the bound contributes its own row, per §4.6's
///   "without DISTINCT, each path contributes a row".
#[allow(clippy::too_many_arguments)]
fn exec_expand(
    store: &Store,
    rows: Vec<Row>,
    from_alias: &str,
    to_alias: &str,
    rel_alias: Option<&str>,
    rel_type: Option<&str>,
    direction: PatternDirection,
    min_hops: u32,
    max_hops: u32,
    distinct: bool,
    deadline: &Deadline,
) -> Result<Vec<Row>> {
    let dir = match direction {
        PatternDirection::Outgoing => Direction::Outgoing,
        PatternDirection::Incoming => Direction::Incoming,
        PatternDirection::Either => Direction::Both,
    };

    let mut out = Vec::new();
    for row in rows {
        deadline.check()?;
        let start = match row.get(from_alias) {
            Some(Value::Node(id)) => *id,
            _ => return Err(Error::TypeError(format!("'{from_alias}' is not bound to a node"))),
        };

        let hits: Vec<(NodeId, Vec<EdgeId>)> = if distinct {
            expand_distinct(store, start, dir, rel_type, min_hops, max_hops, deadline)?
        } else {
            let mut hits = Vec::new();
            let mut path = Vec::new();
            expand_paths(store, start, 0, &mut path, dir, rel_type, min_hops, max_hops, deadline, &mut hits)?;
            hits
        };

        for (node, path) in hits {
            let mut new_row = row.clone();
            new_row.insert(to_alias.to_string(), Value::Node(node));
            if let Some(ra) = rel_alias {
                let value = if max_hops == 1 && path.len() == 1 {
                    Value::Edge(path[0])
                } else {
                    Value::List(path.iter().map(|e| Value::Edge(*e)).collect())
                };
                new_row.insert(ra.to_string(), value);
            }
            out.push(new_row);
        }
    }
    Ok(out)
}

/// Level-by-level frontier expansion: at each depth the frontier holds at
/// most one path per node (the first one found at that depth), so work is
/// bounded by `O(max_hops * reachable nodes)` rather than the number of
/// paths. Crucially, a node can appear in more than one depth's frontier —
/// this is NOT a single global "visited once" set — so a node only
/// reachable within `[min,max]` via a longer route is still found even
/// when a shorter, out-of-range path to it also exists (§4.6).
fn expand_distinct(
    store: &Store,
    start: NodeId,
    dir: Direction,
    rel_type: Option<&str>,
    min_hops: u32,
    max_hops: u32,
    deadline: &Deadline,
) -> Result<Vec<(NodeId, Vec<EdgeId>)>> {
    let mut emitted: HashSet<NodeId> = HashSet::new();
    let mut out = Vec::new();
    let mut frontier: Vec<(NodeId, Vec<EdgeId>)> = vec![(start, Vec::new())];

    if 0 >= min_hops && 0 <= max_hops && emitted.insert(start) {
        out.push((start, Vec::new()));
    }

    let mut depth = 0u32;
    while depth < max_hops && !frontier.is_empty() {
        deadline.check()?;
        depth += 1;
        let mut next_frontier: HashMap<NodeId, Vec<EdgeId>> = HashMap::new();
        for (node, path) in &frontier {
            for edge_id in store.adjacent_edges(*node, dir, rel_type) {
                let edge = store.get_edge(edge_id).expect("adjacency index references a live edge");
                let Some(other) = edge.other_node(*node) else { continue };
                next_frontier.entry(other).or_insert_with(|| {
                    let mut p = path.clone();
                    p.push(edge_id);
                    p
                });
            }
        }
        frontier = next_frontier.into_iter().collect();
        if depth >= min_hops && depth <= max_hops {
            for (node, path) in &frontier {
                if emitted.insert(*node) {
                    out.push((*node, path.clone()));
                }
            }
        }
    }
    Ok(out)
}

/// Full trail enumeration (no repeated edge within one path) up to
/// `max_hops`, recording every endpoint reached at a depth within
/// `[min_hops, max_hops]` — once per path, duplicates included (§4.6's
/// path-count mode). Exponential in the worst case; that is the
/// documented cost of exact, non-distinct path counting.
#[allow(clippy::too_many_arguments)]
fn expand_paths(
    store: &Store,
    node: NodeId,
    depth: u32,
    path: &mut Vec<EdgeId>,
    dir: Direction,
    rel_type: Option<&str>,
    min_hops: u32,
    max_hops: u32,
    deadline: &Deadline,
    out: &mut Vec<(NodeId, Vec<EdgeId>)>,
) -> Result<()> {
    if depth >= min_hops && depth <= max_hops {
        out.push((node, path.clone()));
    }
    if depth == max_hops {
        return Ok(());
    }
    deadline.check()?;
    for edge_id in store.adjacent_edges(node, dir, rel_type) {
        if path.contains(&edge_id) {
            continue;
        }
        let edge = store.get_edge(edge_id).expect("adjacency index references a live edge");
        let Some(other) = edge.other_node(node) else { continue };
        path.push(edge_id);
        expand_paths(store, other, depth + 1, path, dir, rel_type, min_hops, max_hops, deadline, out)?;
        path.pop();
    }
    Ok(())
}

fn exec_filter(store: &Store, rows: Vec<Row>, predicate: &Expr, params: &PropertyMap, deadline: &Deadline) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        deadline.check()?;
        if eval::eval_expr(predicate, &row, params, store)?.is_truthy() {
            out.push(row);
        }
    }
    Ok(out)
}

fn exec_project(store: &Store, rows: Vec<Row>, items: &[ProjectItem], params: &PropertyMap, deadline: &Deadline) -> Result<Vec<Row>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        deadline.check()?;
        let mut new_row = Row::new();
        for item in items {
            new_row.insert(item.alias.clone(), eval::eval_expr(&item.expr, &row, params, store)?);
        }
        out.push(new_row);
    }
    Ok(out)
}

fn dedup_structural(rows: Vec<Row>) -> Vec<Row> {
    let mut seen: HashSet<Vec<StructuralKey>> = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let key: Vec<StructuralKey> = row.values().map(|v| StructuralKey(v.clone())).collect();
        if seen.insert(key) {
            out.push(row);
        }
    }
    out
}

struct Group {
    key_values: Row,
    counts: Vec<i64>,
    sums: Vec<f64>,
    sum_is_float: Vec<bool>,
    mins: Vec<Option<Value>>,
    maxs: Vec<Option<Value>>,
    collects: Vec<Vec<Value>>,
    distinct_seen: Vec<Option<HashSet<StructuralKey>>>,
}

/// Groups by `keys` and computes `aggregates` per group, preserving
/// first-seen group order (§4.4, §4.5). Aggregating zero rows with no
/// `GROUP BY` keys still yields exactly one row — `count(*)` over an
/// empty match is `0`, not no rows at all.
fn exec_aggregate(
    store: &Store,
    rows: Vec<Row>,
    keys: &[ProjectItem],
    aggregates: &[AggregateItem],
    params: &PropertyMap,
    deadline: &Deadline,
) -> Result<Vec<Row>> {
    let mut order: Vec<Vec<StructuralKey>> = Vec::new();
    let mut groups: HashMap<Vec<StructuralKey>, Group> = HashMap::new();

    for (i, row) in rows.iter().enumerate() {
        if i % 4096 == 0 {
            deadline.check()?;
        }

        let mut key_row = Row::new();
        let mut key_sig = Vec::with_capacity(keys.len());
        for k in keys {
            let v = eval::eval_expr(&k.expr, row, params, store)?;
            key_sig.push(StructuralKey(v.clone()));
            key_row.insert(k.alias.clone(), v);
        }

        if !groups.contains_key(&key_sig) {
            order.push(key_sig.clone());
            groups.insert(
                key_sig.clone(),
                Group {
                    key_values: key_row,
                    counts: vec![0; aggregates.len()],
                    sums: vec![0.0; aggregates.len()],
                    sum_is_float: vec![false; aggregates.len()],
                    mins: vec![None; aggregates.len()],
                    maxs: vec![None; aggregates.len()],
                    collects: vec![Vec::new(); aggregates.len()],
                    distinct_seen: aggregates.iter().map(|a| a.distinct.then(HashSet::new)).collect(),
                },
            );
        }
        let group = groups.get_mut(&key_sig).expect("group was just inserted if missing");

        for (idx, agg) in aggregates.iter().enumerate() {
            let value = if matches!(agg.arg, Expr::Star) {
                Value::Bool(true)
            } else {
                eval::eval_expr(&agg.arg, row, params, store)?
            };

            if let Some(seen) = &mut group.distinct_seen[idx] {
                if value.is_null() || !seen.insert(StructuralKey(value.clone())) {
                    continue;
                }
            }

            accumulate(group, idx, agg.func, &agg.arg, value)?;
        }
    }

    if keys.is_empty() && order.is_empty() {
        let mut row = Row::new();
        for agg in aggregates {
            let value = match agg.func {
                AggFunc::Count | AggFunc::Sum => Value::Int(0),
                AggFunc::Avg | AggFunc::Min | AggFunc::Max => Value::Null,
                AggFunc::Collect => Value::List(Vec::new()),
            };
            row.insert(agg.alias.clone(), value);
        }
        return Ok(vec![row]);
    }

    let mut out = Vec::with_capacity(order.len());
    for key_sig in order {
        let group = groups.remove(&key_sig).expect("group recorded in order must exist in map");
        let mut row = group.key_values.clone();
        for (idx, agg) in aggregates.iter().enumerate() {
            row.insert(agg.alias.clone(), finalize(&group, idx, agg.func));
        }
        out.push(row);
    }
    Ok(out)
}

fn accumulate(group: &mut Group, idx: usize, func: AggFunc, arg: &Expr, value: Value) -> Result<()> {
    match func {
        AggFunc::Count => {
            if matches!(arg, Expr::Star) || !value.is_null() {
                group.counts[idx] += 1;
            }
        }
        AggFunc::Sum | AggFunc::Avg => {
            if let Some(f) = value.as_float() {
                group.sums[idx] += f;
                group.counts[idx] += 1;
                if matches!(value, Value::Float(_)) {
                    group.sum_is_float[idx] = true;
                }
            } else if !value.is_null() {
                let name = if func == AggFunc::Sum { "sum" } else { "avg" };
                return Err(Error::TypeError(format!("{name}() requires a numeric argument, found {}", value.type_name())));
            }
        }
        AggFunc::Min => {
            if !value.is_null() {
                group.mins[idx] = Some(match group.mins[idx].take() {
                    None => value,
                    Some(cur) => if value.compare(&cur) == Some(Ordering::Less) { value } else { cur },
                });
            }
        }
        AggFunc::Max => {
            if !value.is_null() {
                group.maxs[idx] = Some(match group.maxs[idx].take() {
                    None => value,
                    Some(cur) => if value.compare(&cur) == Some(Ordering::Greater) { value } else { cur },
                });
            }
        }
        AggFunc::Collect => {
            if !value.is_null() {
                group.collects[idx].push(value);
            }
        }
    }
    Ok(())
}

fn finalize(group: &Group, idx: usize, func: AggFunc) -> Value {
    match func {
        AggFunc::Count => Value::Int(group.counts[idx]),
        AggFunc::Sum => {
            if group.counts[idx] == 0 {
                Value::Int(0)
            } else if group.sum_is_float[idx] {
                Value::Float(group.sums[idx])
            } else {
                Value::Int(group.sums[idx] as i64)
            }
        }
        AggFunc::Avg => {
            if group.counts[idx] == 0 {
                Value::Null
            } else {
                Value::Float(group.sums[idx] / group.counts[idx] as f64)
            }
        }
        AggFunc::Min => group.mins[idx].clone().unwrap_or(Value::Null),
        AggFunc::Max => group.maxs[idx].clone().unwrap_or(Value::Null),
        AggFunc::Collect => Value::List(group.collects[idx].clone()),
    }
}
