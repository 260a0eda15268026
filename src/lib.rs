//! # KGLite — embedded in-process property graph with a Cypher subset
//!
//! KGLite holds a labeled property graph in memory and answers read-only
//! Cypher queries (`MATCH`/`WHERE`/`WITH`/`RETURN`) against it. There is
//! no mutation query surface: nodes and edges are created only through
//! bulk tabular loads (`add_nodes`, `add_connections`).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kglite::{open_graph, store::{Column, TableBatch}};
//!
//! let graph = open_graph();
//! let people = TableBatch::new()
//!     .with_column("person_id", Column::Int(vec![1, 2]))
//!     .with_column("name", Column::Text(vec!["Alice".into(), "Bob".into()]))
//!     .with_column("age", Column::Int(vec![30, 25]));
//! graph.add_nodes(&people, "Person", "person_id", "name").unwrap();
//!
//! let rows = graph.cypher("MATCH (n:Person) RETURN n.name AS name", None, None).unwrap();
//! assert_eq!(rows.len(), 2);
//! ```

pub mod cypher;
pub mod engine;
pub mod eval;
pub mod model;
pub mod planner;
pub mod store;

pub use model::{Direction, Edge, EdgeId, Node, NodeId, PropertyMap, Record, Value};
pub use store::{Column, Store, TableBatch};

use tracing::{trace, warn};

/// The primary entry point: an empty in-memory graph (§6 `open_graph`).
pub struct Graph {
    store: Store,
}

/// Creates an empty in-memory graph.
pub fn open_graph() -> Graph {
    Graph::new()
}

impl Graph {
    pub fn new() -> Self {
        Self { store: Store::new() }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Bulk-loads node rows (§4.2, §6).
    pub fn add_nodes(&self, batch: &TableBatch, label: &str, id_col: &str, title_col: &str) -> Result<usize> {
        store::loader::add_nodes(&self.store, batch, label, id_col, title_col)
    }

    /// Bulk-loads edge rows (§4.2, §6).
    #[allow(clippy::too_many_arguments)]
    pub fn add_connections(
        &self,
        batch: &TableBatch,
        rel_type: &str,
        src_label: &str,
        src_col: &str,
        tgt_label: &str,
        tgt_col: &str,
        columns: Option<&[&str]>,
    ) -> Result<usize> {
        store::loader::add_connections(&self.store, batch, rel_type, src_label, src_col, tgt_label, tgt_col, columns)
    }

    /// Parses, plans, and executes a Cypher query, returning every row
    /// (§6 `cypher`). `timeout_ms` of `Some(0)` forbids any forward
    /// progress (§8 invariant); `None` means no deadline.
    pub fn cypher(
        &self,
        query_text: &str,
        parameters: Option<&PropertyMap>,
        timeout_ms: Option<u64>,
    ) -> Result<Vec<Record>> {
        let empty = PropertyMap::new();
        let params = parameters.unwrap_or(&empty);

        let ast = cypher::parse(query_text)?;
        let logical = planner::plan(&ast, params)?;
        let logical = planner::optimize(logical);

        let start = std::time::Instant::now();
        let deadline = engine::Deadline::new(timeout_ms);
        let result = engine::execute(&self.store, &logical, params, &deadline);

        match &result {
            Ok(rows) => trace!(rows = rows.len(), elapsed_ms = start.elapsed().as_millis() as u64, "query complete"),
            Err(Error::TimeoutError(msg)) => warn!(elapsed_ms = start.elapsed().as_millis() as u64, "{msg}"),
            Err(_) => {}
        }
        result
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

/// Structured error kinds (§7). Every entry point reports one of these;
/// none are silently swallowed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("syntax error at line {line}, column {column}: {message}")]
    SyntaxError { line: usize, column: usize, message: String },

    #[error("plan error: {0}")]
    PlanError(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("integrity error: {0}")]
    IntegrityError(String),

    #[error("reference error: {0}")]
    ReferenceError(String),

    #[error("query timed out: {0}")]
    TimeoutError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
