//! Minimal s-expression reader, shared by the solver process (SMT-LIB2 responses)
//! and the problem file parser.

use anyhow::*;
use itertools::Itertools;
use std::fmt::{Debug, Display, Error, Formatter};

#[derive(Eq, PartialEq, Clone)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn atom(s: impl Into<String>) -> Self {
        SExpr::Atom(s.into())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(a) => Some(a.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// If the expression is a list whose first element is the atom `head`, returns the remaining elements.
    pub fn as_application_args(&self, head: &str) -> Option<&[SExpr]> {
        match self {
            SExpr::List(v) => match v.first() {
                Some(SExpr::Atom(h)) if h == head => Some(&v[1..]),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            SExpr::Atom(a) => write!(f, "{}", a),
            SExpr::List(v) => write!(f, "({})", v.iter().format(" ")),
        }
    }
}
impl Debug for SExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Sym(String),
    LParen,
    RParen,
}

/// Parses a single s-expression.
pub fn parse(s: &str) -> Result<SExpr> {
    let mut all = parse_many(s)?;
    match all.len() {
        1 => Result::Ok(all.remove(0)),
        0 => bail!("Empty input"),
        n => bail!("Expected a single expression but got {n}"),
    }
}

/// Parses a sequence of s-expressions.
pub fn parse_many(s: &str) -> Result<Vec<SExpr>> {
    let tokenized = tokenize(s)?;
    let mut tokens = tokenized.iter().peekable();
    let mut exprs = Vec::new();
    while tokens.peek().is_some() {
        exprs.push(read(&mut tokens)?);
    }
    Result::Ok(exprs)
}

/// Parenthesis depth at the end of `s`, ignoring comments, quoted symbols and strings.
/// A complete solver response has a depth of zero.
pub fn depth(s: &str) -> i64 {
    let mut depth = 0;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '|' => {
                chars.by_ref().take_while(|c| *c != '|').count();
            }
            '"' => {
                chars.by_ref().take_while(|c| *c != '"').count();
            }
            ';' => {
                chars.by_ref().take_while(|c| *c != '\n').count();
            }
            _ => {}
        }
    }
    depth
}

fn tokenize(s: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars = &mut s.chars();
    let mut cur = String::new();
    let flush = |cur: &mut String, tokens: &mut Vec<Token>| {
        if !cur.is_empty() {
            tokens.push(Token::Sym(std::mem::take(cur)));
        }
    };
    while let Some(n) = chars.next() {
        if n == ';' {
            // drop all chars until a new line is found, counting to force consuming the iterator.
            chars.take_while(|c| *c != '\n').count();
        } else if n == '|' || n == '"' {
            // quoted symbol or string literal: kept verbatim, without the delimiters
            let mut closed = false;
            for c in chars.by_ref() {
                if c == n {
                    closed = true;
                    break;
                }
                cur.push(c);
            }
            ensure!(closed, "Unterminated {n}");
            tokens.push(Token::Sym(std::mem::take(&mut cur)));
        } else if n.is_whitespace() || n == '(' || n == ')' {
            flush(&mut cur, &mut tokens);
            if n == '(' {
                tokens.push(Token::LParen);
            }
            if n == ')' {
                tokens.push(Token::RParen);
            }
        } else {
            cur.push(n);
        }
    }
    flush(&mut cur, &mut tokens);
    Result::Ok(tokens)
}

fn read(tokens: &mut std::iter::Peekable<core::slice::Iter<Token>>) -> Result<SExpr> {
    match tokens.next() {
        Some(Token::Sym(s)) => Result::Ok(SExpr::atom(s.as_str())),
        Some(Token::LParen) => {
            let mut es = Vec::new();
            loop {
                match tokens.peek() {
                    Some(Token::RParen) => break,
                    None => bail!("Unclosed parenthesis"),
                    _ => es.push(read(tokens)?),
                }
            }
            tokens.next();
            Result::Ok(SExpr::List(es))
        }
        Some(Token::RParen) => bail!("Unexpected closing parenthesis"),
        None => bail!("Unexpected end of output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_model_response() {
        let e = parse("((a_@t0 true) (|move(a,b)_@t1| false) (x_@t0 (- 3)))").unwrap();
        let pairs = e.as_list().unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].as_list().unwrap()[0].as_atom(), Some("move(a,b)_@t1"));
        assert_eq!(pairs[2].as_list().unwrap()[1].as_application_args("-").unwrap()[0].as_atom(), Some("3"));
    }

    #[test]
    fn comments_and_sequences() {
        let es = parse_many("; header\n(a b) ; trailing\n c").unwrap();
        assert_eq!(es.len(), 2);
        assert_eq!(es[0].to_string(), "(a b)");
        assert_eq!(es[1].as_atom(), Some("c"));
    }

    #[test]
    fn errors() {
        assert!(parse("(a (b)").is_err());
        assert!(parse(")").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("|unterminated").is_err());
    }

    #[test]
    fn response_depth() {
        assert_eq!(depth("((a true)"), 1);
        assert_eq!(depth("((a true) (|)(| false))"), 0);
        assert_eq!(depth("(error \"unbalanced ( in message\")"), 0);
    }
}
