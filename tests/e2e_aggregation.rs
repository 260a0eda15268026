//! End-to-end tests for WITH/aggregation semantics: count/sum/avg/min/max/
//! collect, grouping, DISTINCT, and the zero-row synthesis case (spec §4.4,
//! §4.8, §8).

use kglite::{open_graph, store::Column, store::TableBatch, Value};

fn people() -> kglite::Graph {
    let graph = open_graph();
    let batch = TableBatch::new()
        .with_column("person_id", Column::Int(vec![1, 2, 3, 4, 5]))
        .with_column("name", Column::Text(vec!["Alice".into(), "Bob".into(), "Carol".into(), "Diana".into(), "Eve".into()]))
        .with_column("age", Column::Int(vec![25, 30, 35, 28, 22]))
        .with_column("city", Column::Text(vec!["NYC".into(), "NYC".into(), "LA".into(), "LA".into(), "LA".into()]));
    graph.add_nodes(&batch, "Person", "person_id", "name").unwrap();
    graph
}

#[test]
fn count_star_over_all_nodes() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) RETURN count(*) AS total", None, None).unwrap();
    assert_eq!(rows[0].get("total"), Some(&Value::Int(5)));
}

#[test]
fn count_star_over_empty_match_yields_zero_not_no_rows() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) WHERE n.age > 100 RETURN count(*) AS total", None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("total"), Some(&Value::Int(0)));
}

#[test]
fn sum_avg_min_max_over_ages() {
    let graph = people();
    let rows = graph
        .cypher(
            "MATCH (n:Person) RETURN sum(n.age) AS s, avg(n.age) AS a, min(n.age) AS mn, max(n.age) AS mx",
            None,
            None,
        )
        .unwrap();
    assert_eq!(rows[0].get("s"), Some(&Value::Int(140)));
    assert_eq!(rows[0].get("a"), Some(&Value::Float(28.0)));
    assert_eq!(rows[0].get("mn"), Some(&Value::Int(22)));
    assert_eq!(rows[0].get("mx"), Some(&Value::Int(35)));
}

#[test]
fn group_by_city_preserves_first_seen_order() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) RETURN n.city AS city, count(*) AS total", None, None).unwrap();
    let cities: Vec<&str> = rows.iter().map(|r| r.get("city").unwrap().as_str().unwrap()).collect();
    assert_eq!(cities, vec!["NYC", "LA"]);
    assert_eq!(rows[0].get("total"), Some(&Value::Int(2)));
    assert_eq!(rows[1].get("total"), Some(&Value::Int(3)));
}

#[test]
fn collect_gathers_values_in_row_order() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) WHERE n.city = 'NYC' RETURN collect(n.name) AS names", None, None).unwrap();
    assert_eq!(
        rows[0].get("names"),
        Some(&Value::List(vec![Value::Text("Alice".into()), Value::Text("Bob".into())]))
    );
}

#[test]
fn count_distinct_deduplicates_by_structural_equality() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) RETURN count(DISTINCT n.city) AS cities", None, None).unwrap();
    assert_eq!(rows[0].get("cities"), Some(&Value::Int(2)));
}

#[test]
fn return_distinct_cannot_combine_with_aggregation() {
    let graph = people();
    let err = graph.cypher("MATCH (n:Person) RETURN DISTINCT count(*) AS total", None, None).unwrap_err();
    assert!(matches!(err, kglite::Error::PlanError(_)));
}

#[test]
fn return_distinct_dedups_projected_rows() {
    let graph = people();
    let rows = graph.cypher("MATCH (n:Person) RETURN DISTINCT n.city AS city", None, None).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn with_then_match_continuation_carries_bound_alias() {
    let graph = people();
    let rows = graph
        .cypher(
            "MATCH (n:Person) WITH n.city AS city, count(*) AS total WHERE total > 2 RETURN city",
            None,
            None,
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("city"), Some(&Value::Text("LA".into())));
}
