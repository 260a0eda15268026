//! End-to-end tests for relationship traversal: single-hop, variable-length
//! bounds, direction, and relationship-type filtering (spec §4.4, §4.6, §8).

use kglite::{open_graph, store::Column, store::TableBatch, Value};

/// A 5-node chain: Alice -[:KNOWS]-> Bob -[:KNOWS]-> Carol -[:KNOWS]-> Dave,
/// plus an unrelated Eve -[:LIKES]-> Alice edge of a different type.
fn chain() -> kglite::Graph {
    let graph = open_graph();
    let people = TableBatch::new()
        .with_column("person_id", Column::Int(vec![1, 2, 3, 4, 5]))
        .with_column("name", Column::Text(vec!["Alice".into(), "Bob".into(), "Carol".into(), "Dave".into(), "Eve".into()]));
    graph.add_nodes(&people, "Person", "person_id", "name").unwrap();

    let knows = TableBatch::new()
        .with_column("src", Column::Int(vec![1, 2, 3]))
        .with_column("dst", Column::Int(vec![2, 3, 4]));
    graph.add_connections(&knows, "KNOWS", "Person", "src", "Person", "dst", None).unwrap();

    let likes = TableBatch::new().with_column("src", Column::Int(vec![5])).with_column("dst", Column::Int(vec![1]));
    graph.add_connections(&likes, "LIKES", "Person", "src", "Person", "dst", None).unwrap();
    graph
}

fn names(rows: &[kglite::Record], col: &str) -> std::collections::HashSet<String> {
    rows.iter().map(|r| r.get(col).unwrap().as_str().unwrap().to_string()).collect()
}

#[test]
fn single_hop_binds_scalar_relationship() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person)-[r:KNOWS]->(b:Person) RETURN a.name AS a, b.name AS b", None, None).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|r| r.get("a") == Some(&Value::Text("Alice".into())) && r.get("b") == Some(&Value::Text("Bob".into()))));
}

#[test]
fn relationship_type_filters_unrelated_edges() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Eve'})-[:KNOWS]->(b:Person) RETURN b", None, None).unwrap();
    assert!(rows.is_empty(), "Eve only has a LIKES edge, not KNOWS");
}

#[test]
fn variable_length_default_min_is_one() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Alice'})-[:KNOWS*..2]->(b:Person) RETURN b.name AS name", None, None).unwrap();
    assert_eq!(names(&rows, "name"), ["Bob", "Carol"].into_iter().map(String::from).collect());
}

#[test]
fn variable_length_explicit_bounds() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Alice'})-[:KNOWS*2..3]->(b:Person) RETURN b.name AS name", None, None).unwrap();
    assert_eq!(names(&rows, "name"), ["Carol", "Dave"].into_iter().map(String::from).collect());
}

#[test]
fn variable_length_single_bound_means_exact_hop_count() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Alice'})-[:KNOWS*3..]->(b:Person) RETURN b.name AS name", None, None).unwrap();
    assert_eq!(names(&rows, "name"), ["Dave"].into_iter().map(String::from).collect());
}

#[test]
fn bare_star_is_a_plan_error() {
    let graph = chain();
    let err = graph.cypher("MATCH (a)-[:KNOWS*]->(b) RETURN b", None, None).unwrap_err();
    assert!(matches!(err, kglite::Error::PlanError(_)));
}

#[test]
fn incoming_direction_reverses_traversal() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Dave'})<-[:KNOWS]-(b:Person) RETURN b.name AS name", None, None).unwrap();
    assert_eq!(names(&rows, "name"), ["Carol"].into_iter().map(String::from).collect());
}

#[test]
fn either_direction_matches_both_ways() {
    let graph = chain();
    let rows = graph.cypher("MATCH (a:Person {name:'Bob'})-[:KNOWS]-(b:Person) RETURN b.name AS name", None, None).unwrap();
    assert_eq!(names(&rows, "name"), ["Alice", "Carol"].into_iter().map(String::from).collect());
}

#[test]
fn variable_length_shortest_path_reached_once_per_node() {
    let graph = chain();
    // Alice reaches Dave via exactly one shortest path (3 hops); the BFS
    // must not emit Dave more than once even though *1..3 permits multiple
    // path lengths to reach it indirectly through Bob and Carol.
    let rows = graph.cypher("MATCH (a:Person {name:'Alice'})-[:KNOWS*1..3]->(b:Person {name:'Dave'}) RETURN b", None, None).unwrap();
    assert_eq!(rows.len(), 1);
}
