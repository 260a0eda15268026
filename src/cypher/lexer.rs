//! Cypher lexer — tokenizes the query subset (§4.3).
//!
//! Hand-written, character-at-a-time, in the teacher's style: no
//! generated tables, one pass over `char_indices()`.

use crate::{Error, Result};

/// Source span, in bytes, plus 1-based line/column of the first byte —
/// carried through to `SyntaxError` (§4.3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Param(String),

    Match,
    Where,
    With,
    Return,
    As,
    And,
    Or,
    Xor,
    Not,
    In,
    Is,
    Null,
    True,
    False,
    Distinct,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    DotDot,
    Colon,

    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Caret,

    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Arrow,
    ArrowLeft,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, line: 1, line_start: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let at_eof = matches!(tok.kind, TokenKind::Eof);
            tokens.push(tok);
            if at_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn column(&self) -> usize {
        self.pos - self.line_start + 1
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::SyntaxError { line: self.line, column: self.column(), message: message.into() }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated block comment")),
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let start = self.pos;
        let line = self.line;
        let column = self.column();
        let span = |end: usize| Span { start, end, line, column };

        let Some(c) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, span: span(self.pos) });
        };

        let kind = match c {
            b'(' => { self.bump(); TokenKind::LParen }
            b')' => { self.bump(); TokenKind::RParen }
            b'[' => { self.bump(); TokenKind::LBracket }
            b']' => { self.bump(); TokenKind::RBracket }
            b'{' => { self.bump(); TokenKind::LBrace }
            b'}' => { self.bump(); TokenKind::RBrace }
            b',' => { self.bump(); TokenKind::Comma }
            b':' => { self.bump(); TokenKind::Colon }
            b'*' => { self.bump(); TokenKind::Star }
            b'+' => { self.bump(); TokenKind::Plus }
            b'/' => { self.bump(); TokenKind::Slash }
            b'%' => { self.bump(); TokenKind::Percent }
            b'^' => { self.bump(); TokenKind::Caret }
            b'=' => { self.bump(); TokenKind::Eq }
            b'.' => {
                self.bump();
                if self.peek() == Some(b'.') {
                    self.bump();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            b'-' => {
                self.bump();
                if self.peek() == Some(b'>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'<' => {
                self.bump();
                match self.peek() {
                    Some(b'-') => { self.bump(); TokenKind::ArrowLeft }
                    Some(b'=') => { self.bump(); TokenKind::Lte }
                    Some(b'>') => { self.bump(); TokenKind::Neq }
                    _ => TokenKind::Lt,
                }
            }
            b'>' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            b'\'' | b'"' => self.scan_string(c)?,
            b'$' => self.scan_parameter()?,
            b'0'..=b'9' => self.scan_number()?,
            c if c == b'_' || c.is_ascii_alphabetic() => self.scan_ident_or_keyword(),
            other => return Err(self.error(format!("unexpected character '{}'", other as char))),
        };

        Ok(Token { kind, span: span(self.pos) })
    }

    fn scan_string(&mut self, quote: u8) -> Result<TokenKind> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'\\') => out.push('\\'),
                    Some(c) if c == quote => out.push(quote as char),
                    Some(other) => out.push(other as char),
                    None => return Err(self.error("unterminated string literal")),
                },
                Some(c) => out.push(c as char),
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn scan_parameter(&mut self) -> Result<TokenKind> {
        self.bump();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected parameter name after '$'"));
        }
        Ok(TokenKind::Param(std::str::from_utf8(&self.src[start..self.pos]).unwrap().to_string()))
    }

    /// Scans an integer or float literal, including scientific notation
    /// with an optional signed exponent (`1e6`, `1.5e3`, `2e-3`) — §4.3.
    fn scan_number(&mut self) -> Result<TokenKind> {
        let start = self.pos;
        let mut is_float = false;

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }

        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(lookahead), Some(b'+') | Some(b'-')) {
                lookahead += 1;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.bump(); // e/E
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.bump();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        if is_float {
            text.parse::<f64>().map(TokenKind::Float).map_err(|_| self.error("invalid float literal"))
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| self.error("invalid integer literal"))
        }
    }

    fn scan_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match text.to_uppercase().as_str() {
            "MATCH" => TokenKind::Match,
            "WHERE" => TokenKind::Where,
            "WITH" => TokenKind::With,
            "RETURN" => TokenKind::Return,
            "AS" => TokenKind::As,
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "XOR" => TokenKind::Xor,
            "NOT" => TokenKind::Not,
            "IN" => TokenKind::In,
            "IS" => TokenKind::Is,
            "NULL" => TokenKind::Null,
            "TRUE" => TokenKind::True,
            "FALSE" => TokenKind::False,
            "DISTINCT" => TokenKind::Distinct,
            _ => TokenKind::Ident(text.to_string()),
        }
    }
}
