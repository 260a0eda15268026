//! Recursive-descent parser with a precedence-climbing expression layer
//! (§4.3, §9) — no parser generator, matching the grammar's small size.

use super::ast::*;
use super::lexer::{Lexer, Span, Token, TokenKind};
use crate::{Error, Result};

pub fn parse(src: &str) -> Result<Query> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let query = parser.parse_query()?;
    if !parser.at(&TokenKind::Eof) {
        return Err(parser.error(format!("unexpected trailing input near {:?}", parser.peek())));
    }
    Ok(query)
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> &TokenKind {
        let kind = &self.tokens[self.pos].kind;
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let span = self.peek_span();
        Error::SyntaxError { line: span.line, column: span.column, message: message.into() }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    fn parse_query(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        loop {
            if self.eat(&TokenKind::Match) {
                let pattern = self.parse_pattern_element()?;
                let where_expr = if self.eat(&TokenKind::Where) { Some(self.parse_expr()?) } else { None };
                clauses.push(Clause::Match { pattern: vec![pattern], where_expr });
            } else if self.eat(&TokenKind::With) {
                let items = self.parse_return_items()?;
                let where_expr = if self.eat(&TokenKind::Where) { Some(self.parse_expr()?) } else { None };
                clauses.push(Clause::With { items, where_expr });
            } else {
                break;
            }
        }
        self.expect(TokenKind::Return)?;
        let distinct = self.eat(&TokenKind::Distinct);
        let items = self.parse_return_items()?;
        Ok(Query { clauses, return_clause: ReturnClause { items, distinct } })
    }

    fn parse_return_items(&mut self) -> Result<Vec<ReturnItem>> {
        let mut items = Vec::new();
        loop {
            if self.eat(&TokenKind::Star) {
                items.push(ReturnItem { expr: Expr::Star, alias: None });
            } else {
                let expr = self.parse_expr()?;
                let alias = if self.eat(&TokenKind::As) { Some(self.ident()?) } else { None };
                items.push(ReturnItem { expr, alias });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn parse_pattern_element(&mut self) -> Result<PatternElement> {
        let start = self.parse_node_pattern()?;
        let mut steps = Vec::new();
        while self.at(&TokenKind::Minus) || self.at(&TokenKind::ArrowLeft) {
            let rel = self.parse_rel_pattern()?;
            let node = self.parse_node_pattern()?;
            steps.push((rel, node));
        }
        Ok(PatternElement { start, steps })
    }

    fn parse_node_pattern(&mut self) -> Result<NodePattern> {
        self.expect(TokenKind::LParen)?;
        let mut node = NodePattern::default();
        if matches!(self.peek(), TokenKind::Ident(_)) {
            node.var = Some(self.ident()?);
        }
        if self.eat(&TokenKind::Colon) {
            node.label = Some(self.ident()?);
        }
        if self.at(&TokenKind::LBrace) {
            node.props = self.parse_map_literal_inner()?;
        }
        self.expect(TokenKind::RParen)?;
        Ok(node)
    }

    fn parse_rel_pattern(&mut self) -> Result<RelPattern> {
        let left_arrow = self.eat(&TokenKind::ArrowLeft);
        if !left_arrow {
            self.expect(TokenKind::Minus)?;
        }

        let mut var = None;
        let mut rel_type = None;
        let mut var_length = None;
        if self.eat(&TokenKind::LBracket) {
            if matches!(self.peek(), TokenKind::Ident(_)) {
                var = Some(self.ident()?);
            }
            if self.eat(&TokenKind::Colon) {
                rel_type = Some(self.ident()?);
            }
            if self.eat(&TokenKind::Star) {
                var_length = Some(self.parse_var_length_range()?);
            }
            self.expect(TokenKind::RBracket)?;
        }

        let direction = if left_arrow {
            self.expect(TokenKind::Minus)?;
            PatternDirection::Incoming
        } else if self.eat(&TokenKind::Arrow) {
            PatternDirection::Outgoing
        } else {
            self.expect(TokenKind::Minus)?;
            PatternDirection::Either
        };

        Ok(RelPattern { var, rel_type, direction, var_length })
    }

    /// `*`, `*N`, `*..N`, `*N..`, `*N..M` (§4.3, §4.6). Bounds left
    /// unresolved here; the planner applies the default-range rules and
    /// rejects a bare `*` with `PlanError`.
    fn parse_var_length_range(&mut self) -> Result<VarLength> {
        let min = if let TokenKind::Int(n) = *self.peek() {
            self.advance();
            Some(n as u32)
        } else {
            None
        };
        let max = if self.eat(&TokenKind::DotDot) {
            if let TokenKind::Int(n) = *self.peek() {
                self.advance();
                Some(n as u32)
            } else {
                None
            }
        } else {
            min
        };
        Ok(VarLength { min, max })
    }

    fn parse_map_literal_inner(&mut self) -> Result<Vec<(String, Expr)>> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        if !self.at(&TokenKind::RBrace) {
            loop {
                let key = self.ident()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expr()?;
                items.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    // ------------------------------------------------------------------
    // Expressions — precedence-climbing layer (§9)
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_xor()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_xor()?;
            left = Expr::BinaryOp(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Xor) {
            let right = self.parse_and()?;
            left = Expr::BinaryOp(BinaryOp::Xor, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = Expr::BinaryOp(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_not()?;
            Ok(Expr::UnaryOp(UnaryOp::Not, Box::new(inner)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_addition()?;
        loop {
            if self.eat(&TokenKind::Is) {
                let negated = self.eat(&TokenKind::Not);
                self.expect(TokenKind::Null)?;
                left = Expr::IsNull { expr: Box::new(left), negated };
            } else if self.eat(&TokenKind::In) {
                let list = self.parse_addition()?;
                left = Expr::In(Box::new(left), Box::new(list));
            } else if let Some(op) = self.comparison_op() {
                self.advance();
                let right = self.parse_addition()?;
                left = Expr::BinaryOp(op, Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Neq => BinaryOp::Neq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Gte => BinaryOp::Gte,
            _ => return None,
        })
    }

    fn parse_addition(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplication()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = Expr::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> Result<Expr> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::BinaryOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Right-associative: `2 ^ 3 ^ 2 == 2 ^ (3 ^ 2)`.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_unary()?;
        if self.eat(&TokenKind::Caret) {
            let exponent = self.parse_power()?;
            Ok(Expr::BinaryOp(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.parse_unary()?;
            Ok(Expr::UnaryOp(UnaryOp::Neg, Box::new(inner)))
        } else {
            self.parse_property_access()
        }
    }

    fn parse_property_access(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(&TokenKind::Dot) {
            let name = self.ident()?;
            expr = Expr::Property(Box::new(expr), name);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Text(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::Param(name) => {
                self.advance();
                Ok(Expr::Parameter(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::List(items))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.eat(&TokenKind::LParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        let distinct = self.eat(&TokenKind::Distinct);
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                if self.eat(&TokenKind::Star) {
                    args.push(Expr::Star);
                } else {
                    args.push(self.parse_expr()?);
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::FunctionCall { name, args, distinct })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Query {
        parse(src).unwrap_or_else(|e| panic!("parse failed for {src:?}: {e}"))
    }

    #[test]
    fn match_return_variable() {
        let q = parse_ok("MATCH (n:Person) RETURN n");
        assert_eq!(q.clauses.len(), 1);
        assert_eq!(q.return_clause.items.len(), 1);
    }

    #[test]
    fn where_clause() {
        let q = parse_ok("MATCH (n:Person) WHERE n.age > 18 RETURN n.name");
        match &q.clauses[0] {
            Clause::Match { where_expr, .. } => assert!(where_expr.is_some()),
            _ => panic!("expected match clause"),
        }
    }

    #[test]
    fn relationship_pattern_with_type_and_variable() {
        let q = parse_ok("MATCH (a)-[r:KNOWS]->(b) RETURN r");
        match &q.clauses[0] {
            Clause::Match { pattern, .. } => {
                let step = &pattern[0].steps[0];
                assert_eq!(step.0.rel_type.as_deref(), Some("KNOWS"));
                assert_eq!(step.0.direction, PatternDirection::Outgoing);
            }
            _ => panic!("expected match clause"),
        }
    }

    #[test]
    fn variable_length_range() {
        let q = parse_ok("MATCH (a)-[:LINKED*1..4]->(b) RETURN b");
        match &q.clauses[0] {
            Clause::Match { pattern, .. } => {
                let vl = pattern[0].steps[0].0.var_length.unwrap();
                assert_eq!(vl.min, Some(1));
                assert_eq!(vl.max, Some(4));
            }
            _ => panic!("expected match clause"),
        }
    }

    #[test]
    fn bare_star_parses_with_unresolved_bounds() {
        let q = parse_ok("MATCH (a)-[:LINKED*]->(b) RETURN b");
        match &q.clauses[0] {
            Clause::Match { pattern, .. } => {
                let vl = pattern[0].steps[0].0.var_length.unwrap();
                assert_eq!(vl.min, None);
                assert_eq!(vl.max, None);
            }
            _ => panic!("expected match clause"),
        }
    }

    #[test]
    fn with_clause_and_alias() {
        let q = parse_ok("WITH 1 AS x RETURN x AS y");
        assert_eq!(q.clauses.len(), 1);
        assert_eq!(q.return_clause.items[0].alias.as_deref(), Some("y"));
    }

    #[test]
    fn list_literal_and_in() {
        let q = parse_ok("MATCH (n) WHERE n.id IN [1, 2, 3] RETURN n");
        match &q.clauses[0] {
            Clause::Match { where_expr: Some(Expr::In(_, _)), .. } => {}
            _ => panic!("expected IN expression"),
        }
    }

    #[test]
    fn is_null_and_is_not_null() {
        let q = parse_ok("MATCH (n) WHERE n.age IS NOT NULL RETURN n");
        match &q.clauses[0] {
            Clause::Match { where_expr: Some(Expr::IsNull { negated: true, .. }), .. } => {}
            _ => panic!("expected IS NOT NULL"),
        }
    }

    #[test]
    fn return_star() {
        let q = parse_ok("MATCH (n) RETURN *");
        assert!(matches!(q.return_clause.items[0].expr, Expr::Star));
    }

    #[test]
    fn count_distinct_and_count_star() {
        let q = parse_ok("MATCH (n) RETURN count(DISTINCT n) AS c, count(*) AS total");
        match &q.return_clause.items[0].expr {
            Expr::FunctionCall { name, distinct, .. } => {
                assert_eq!(name, "count");
                assert!(distinct);
            }
            _ => panic!("expected function call"),
        }
        match &q.return_clause.items[1].expr {
            Expr::FunctionCall { args, .. } => assert!(matches!(args[0], Expr::Star)),
            _ => panic!("expected function call"),
        }
    }

    #[test]
    fn scientific_literal_in_expression() {
        let q = parse_ok("RETURN 1e6 / 1e3 AS v");
        match &q.return_clause.items[0].expr {
            Expr::BinaryOp(BinaryOp::Div, l, r) => {
                assert!(matches!(**l, Expr::Literal(Literal::Float(_))));
                assert!(matches!(**r, Expr::Literal(Literal::Float(_))));
            }
            _ => panic!("expected division"),
        }
    }

    #[test]
    fn inline_node_property_map() {
        let q = parse_ok("MATCH (n:Person {name: 'Alice'}) RETURN n");
        match &q.clauses[0] {
            Clause::Match { pattern, .. } => {
                assert_eq!(pattern[0].start.props.len(), 1);
                assert_eq!(pattern[0].start.props[0].0, "name");
            }
            _ => panic!("expected match clause"),
        }
    }

    #[test]
    fn property_accessor_chain() {
        let q = parse_ok("WITH date('2020-06-15') AS d RETURN d.year AS y");
        match &q.return_clause.items[0].expr {
            Expr::Property(_, key) => assert_eq!(key, "year"),
            _ => panic!("expected property access"),
        }
    }

    #[test]
    fn boolean_expression_precedence() {
        let q = parse_ok("MATCH (n) WHERE n.a = 1 AND n.b = 2 OR n.c = 3 RETURN n");
        match &q.clauses[0] {
            Clause::Match { where_expr: Some(Expr::BinaryOp(BinaryOp::Or, _, _)), .. } => {}
            _ => panic!("expected top-level OR"),
        }
    }
}
