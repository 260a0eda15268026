//! # Cypher Language
//!
//! The read-only subset (§4.3): lexer, AST, and a recursive-descent
//! parser. Pure functions — no I/O, no state, no storage dependency.

pub mod ast;
pub mod lexer;
pub mod parser;

use crate::Result;
use ast::Query;

/// Parses a Cypher query string into an AST.
pub fn parse(query: &str) -> Result<Query> {
    parser::parse(query)
}
