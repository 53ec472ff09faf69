//! 🧮 Just enough of the Meilisearch filter language to make the in-memory index honest.
//!
//! ```text
//!   expr      := or
//!   or        := and ("OR" and)*
//!   and       := not ("AND" not)*
//!   not       := "NOT" not | "(" expr ")" | condition
//!   condition := field ("=" | "!=" | ">" | ">=" | "<" | "<=") value
//!              | field value "TO" value
//!              | field ["NOT"] "EXISTS"
//!              | field ["NOT"] "IN" "[" value ("," value)* "]"
//! ```
//!
//! Keywords are case-insensitive. Values are bare words or quoted with `'` or `"`.
//! A field holding an array matches when any element does, same as the real thing.

use std::iter::Peekable;
use std::str::Chars;

use serde_json::Value;

use crate::common::Row;
use crate::error::{Result, TaskError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    Condition { field: String, condition: Condition },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Equal(String),
    Greater(f64),
    GreaterOrEqual(f64),
    Less(f64),
    LessOrEqual(f64),
    Between(f64, f64),
    Exists,
    In(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    OpenBracket,
    CloseBracket,
    Comma,
    Op(Op),
    Word(String),
    Quoted(String),
}

/// 🚫 What the real server answers for a filter it cannot parse.
fn invalid(expression: &str, why: impl std::fmt::Display) -> TaskError {
    TaskError::remote(Some(400), "invalid_search_filter", format!("`{expression}`: {why}"))
}

/// 🔗 Parse every filter and AND them together. No filters, no constraint.
pub(crate) fn parse_all(filters: &[String]) -> Result<Option<Filter>> {
    let mut combined: Option<Filter> = None;
    for expression in filters {
        let parsed = parse(expression)?;
        combined = Some(match combined {
            Some(left) => Filter::And(Box::new(left), Box::new(parsed)),
            None => parsed,
        });
    }
    Ok(combined)
}

pub(crate) fn parse(expression: &str) -> Result<Filter> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        position: 0,
    };
    let filter = parser.parse_or()?;
    match parser.peek() {
        None => Ok(filter),
        Some(token) => Err(invalid(expression, format!("unexpected {token:?} after a complete filter"))),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => push(&mut chars, &mut tokens, Token::Open),
            ')' => push(&mut chars, &mut tokens, Token::Close),
            '[' => push(&mut chars, &mut tokens, Token::OpenBracket),
            ']' => push(&mut chars, &mut tokens, Token::CloseBracket),
            ',' => push(&mut chars, &mut tokens, Token::Comma),
            '=' => push(&mut chars, &mut tokens, Token::Op(Op::Eq)),
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(invalid(expression, "`!` must be followed by `=`"));
                }
                tokens.push(Token::Op(Op::Ne));
            }
            '>' | '<' => {
                chars.next();
                let or_equal = chars.next_if_eq(&'=').is_some();
                tokens.push(Token::Op(match (c, or_equal) {
                    ('>', false) => Op::Gt,
                    ('>', true) => Op::Ge,
                    ('<', false) => Op::Lt,
                    _ => Op::Le,
                }));
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Quoted(read_quoted(expression, &mut chars, c)?));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "()[],=!<>\"'".contains(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn push(chars: &mut Peekable<Chars<'_>>, tokens: &mut Vec<Token>, token: Token) {
    chars.next();
    tokens.push(token);
}

fn read_quoted(expression: &str, chars: &mut Peekable<Chars<'_>>, quote: char) -> Result<String> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => value.push(escaped),
                None => break,
            },
            c if c == quote => return Ok(value),
            c => value.push(c),
        }
    }
    Err(invalid(expression, "unterminated quoted value"))
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.at_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(invalid(self.expression, format!("expected `{keyword}`")))
        }
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.at_keyword("OR") {
            self.advance();
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_not()?;
        while self.at_keyword("AND") {
            self.advance();
            let right = self.parse_not()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Filter> {
        if self.at_keyword("NOT") {
            self.advance();
            return Ok(Filter::Not(Box::new(self.parse_not()?)));
        }
        if self.peek() == Some(&Token::Open) {
            self.advance();
            let inner = self.parse_or()?;
            return match self.advance() {
                Some(Token::Close) => Ok(inner),
                _ => Err(invalid(self.expression, "missing closing `)`")),
            };
        }
        self.parse_condition()
    }

    fn parse_condition(&mut self) -> Result<Filter> {
        let field = self.expect_value("a field name")?;
        let condition = |condition| Filter::Condition {
            field: field.clone(),
            condition,
        };

        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let value = self.expect_value("a value")?;
            let filter = match op {
                Op::Eq => condition(Condition::Equal(value)),
                Op::Ne => Filter::Not(Box::new(condition(Condition::Equal(value)))),
                Op::Gt => condition(Condition::Greater(self.number(&value)?)),
                Op::Ge => condition(Condition::GreaterOrEqual(self.number(&value)?)),
                Op::Lt => condition(Condition::Less(self.number(&value)?)),
                Op::Le => condition(Condition::LessOrEqual(self.number(&value)?)),
            };
            return Ok(filter);
        }
        if self.at_keyword("EXISTS") {
            self.advance();
            return Ok(condition(Condition::Exists));
        }
        if self.at_keyword("IN") {
            self.advance();
            return Ok(condition(Condition::In(self.parse_list()?)));
        }
        if self.at_keyword("NOT") {
            self.advance();
            if self.at_keyword("EXISTS") {
                self.advance();
                return Ok(Filter::Not(Box::new(condition(Condition::Exists))));
            }
            self.expect_keyword("IN")?;
            return Ok(Filter::Not(Box::new(condition(Condition::In(self.parse_list()?)))));
        }

        // 📏 `field low TO high`
        let low = self.expect_value("an operator")?;
        self.expect_keyword("TO")?;
        let high = self.expect_value("an upper bound")?;
        Ok(condition(Condition::Between(self.number(&low)?, self.number(&high)?)))
    }

    fn parse_list(&mut self) -> Result<Vec<String>> {
        if self.advance() != Some(Token::OpenBracket) {
            return Err(invalid(self.expression, "expected `[` to open a list"));
        }
        let mut values = Vec::new();
        if self.peek() == Some(&Token::CloseBracket) {
            self.advance();
            return Ok(values);
        }
        loop {
            values.push(self.expect_value("a list value")?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::CloseBracket) => return Ok(values),
                _ => return Err(invalid(self.expression, "expected `,` or `]` in list")),
            }
        }
    }

    fn expect_value(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Some(Token::Word(word)) | Some(Token::Quoted(word)) => Ok(word),
            Some(other) => Err(invalid(self.expression, format!("expected {what}, found {other:?}"))),
            None => Err(invalid(self.expression, format!("expected {what}, found the end"))),
        }
    }

    fn number(&self, raw: &str) -> Result<f64> {
        raw.parse::<f64>()
            .map_err(|_| invalid(self.expression, format!("`{raw}` is not a number")))
    }
}

impl Filter {
    pub(crate) fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::And(left, right) => left.matches(row) && right.matches(row),
            Filter::Or(left, right) => left.matches(row) || right.matches(row),
            Filter::Not(inner) => !inner.matches(row),
            Filter::Condition { field, condition } => {
                let Some(value) = lookup(row, field) else {
                    return false;
                };
                if *condition == Condition::Exists {
                    return true;
                }
                leaves(value).into_iter().any(|leaf| condition.accepts(leaf))
            }
        }
    }
}

impl Condition {
    fn accepts(&self, leaf: &Value) -> bool {
        let number = || leaf.as_f64();
        match self {
            Condition::Equal(expected) => loosely_equal(leaf, expected),
            Condition::Greater(bound) => number().is_some_and(|n| n > *bound),
            Condition::GreaterOrEqual(bound) => number().is_some_and(|n| n >= *bound),
            Condition::Less(bound) => number().is_some_and(|n| n < *bound),
            Condition::LessOrEqual(bound) => number().is_some_and(|n| n <= *bound),
            Condition::Between(low, high) => number().is_some_and(|n| n >= *low && n <= *high),
            Condition::Exists => true,
            Condition::In(candidates) => candidates.iter().any(|c| loosely_equal(leaf, c)),
        }
    }
}

/// 🔍 `a.b.c` walks nested objects, unless a key literally named `a.b.c` exists.
pub(crate) fn lookup<'a>(row: &'a Row, field: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(field) {
        return Some(value);
    }
    let mut segments = field.split('.');
    let first = row.get(segments.next()?)?;
    segments.try_fold(first, |value, segment| value.as_object()?.get(segment))
}

pub(crate) fn leaves(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn loosely_equal(leaf: &Value, expected: &str) -> bool {
    match leaf {
        Value::String(s) => s.to_lowercase() == expected.to_lowercase(),
        Value::Number(n) => expected.parse::<f64>().ok() == n.as_f64(),
        Value::Bool(b) => expected.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        Value::Null => expected.eq_ignore_ascii_case("null"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn book(value: Value) -> Row {
        value.as_object().cloned().expect("💀 fixture must be an object")
    }

    fn passes(expression: &str, row: &Row) -> bool {
        parse(expression).expect("💀 filter should parse").matches(row)
    }

    #[test]
    fn the_one_where_comparisons_do_what_they_say() {
        let dune = book(json!({"title": "Dune", "genre": "Fiction", "rating": 4.5}));
        assert!(passes("rating > 3", &dune));
        assert!(passes("rating >= 4.5", &dune));
        assert!(!passes("rating < 4", &dune));
        assert!(passes("rating <= 4.5", &dune));
        assert!(passes("genre = fiction", &dune));
        assert!(passes("genre != Romance", &dune));
        assert!(passes("rating 4 TO 5", &dune));
        assert!(!passes("rating 1 TO 4", &dune));
    }

    #[test]
    fn the_one_where_and_binds_tighter_than_or() {
        let row = book(json!({"genre": "Fiction", "rating": 2}));
        assert!(passes("genre = Romance AND rating > 1 OR genre = Fiction", &row));
        assert!(!passes("genre = Romance AND (rating > 1 OR genre = Fiction)", &row));
        assert!(passes("NOT genre = Romance", &row));
    }

    #[test]
    fn the_one_where_missing_fields_and_arrays_behave() {
        let row = book(json!({"genres": ["Drama", "Romance"], "meta": {"year": 2004}}));
        assert!(passes("genres = romance", &row));
        assert!(passes("genres IN [Horror, Drama]", &row));
        assert!(passes("genres NOT IN [Horror]", &row));
        assert!(passes("meta.year > 2000", &row));
        assert!(passes("meta EXISTS", &row));
        assert!(passes("rating NOT EXISTS", &row));
        assert!(!passes("rating > 0", &row));
        assert!(passes("rating != 3", &row));
    }

    #[test]
    fn the_one_where_quoted_values_keep_their_spaces() {
        let row = book(json!({"title": "The Notebook"}));
        assert!(passes("title = 'The Notebook'", &row));
        assert!(passes("title = \"the notebook\"", &row));
    }

    #[test]
    fn the_one_where_several_filters_are_anded() -> Result<()> {
        let row = book(json!({"genre": "Fiction", "rating": 5}));
        let filter = parse_all(&["genre = Fiction".into(), "rating < 5".into()])?.expect("a filter");
        assert!(!filter.matches(&row));
        assert!(parse_all(&[])?.is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_nonsense_is_rejected_like_the_server_would() {
        for nonsense in ["rating >", "rating > high", "(genre = a", "genre", "genre IN [a b]", "a ! b", "title = 'open"] {
            let err = parse(nonsense).expect_err(nonsense);
            assert_eq!(err.kind(), ErrorKind::RemoteIndexError, "{nonsense}");
            assert!(err.to_string().contains("invalid_search_filter"), "{nonsense}: {err}");
        }
    }
}
