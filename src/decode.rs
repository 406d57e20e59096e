//! Event-list decoding
//!
//! Event cells arrive as text in one of two dialects: a language-literal
//! collection (`['A', ('B', 1.5)]`, single or double quotes, tuples, `None`,
//! parsed with `py_literal`)
//! or JSON. Decoding tries the literal grammar first and falls back to JSON
//! after swapping single quotes for double quotes. A cell that decodes under
//! neither dialect, or that is not text at all, becomes an empty sequence.

use num_traits::ToPrimitive;
use py_literal::Value as PyValue;
use serde_json::Value;

/// One decoded element of an event sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Token>),
    Tuple(Vec<Token>),
    Set(Vec<Token>),
    Map(Vec<(Token, Token)>),
}

impl Token {
    /// The string payload, if this token is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an indexable sequence (list or tuple).
    pub fn as_sequence(&self) -> Option<&[Token]> {
        match self {
            Token::List(items) | Token::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric value of this token, accepting numeric strings.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Token::Int(i) => Some(*i as f64),
            Token::Float(f) => Some(*f),
            Token::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Token::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Flatten a top-level collection into its elements.
    fn into_elements(self) -> Option<Vec<Token>> {
        match self {
            Token::List(items) | Token::Tuple(items) | Token::Set(items) => Some(items),
            Token::Map(pairs) => Some(pairs.into_iter().map(|(k, _)| k).collect()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Bytes(b) => write!(f, "b'{}'", String::from_utf8_lossy(b)),
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Token::None => write!(f, "None"),
            Token::List(items) => write_items(f, "[", items, "]"),
            Token::Tuple(items) => write_items(f, "(", items, ")"),
            Token::Set(items) => write_items(f, "{", items, "}"),
            Token::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_items(
    f: &mut std::fmt::Formatter<'_>,
    open: &str,
    items: &[Token],
    close: &str,
) -> std::fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

/// Decode a raw event cell, returning an empty sequence on any failure.
pub fn decode_events(cell: Option<&str>) -> Vec<Token> {
    cell.and_then(try_decode_events).unwrap_or_default()
}

/// Decode a raw event cell with both dialects.
///
/// Returns `None` when neither the literal grammar nor JSON accepts the text,
/// or when the decoded value is not a collection.
pub fn try_decode_events(raw: &str) -> Option<Vec<Token>> {
    let cleaned = raw.replace("\\n", " ");

    let value = parse_literal(&cleaned).or_else(|| parse_json(&cleaned.replace('\'', "\"")))?;
    value.into_elements()
}

fn parse_json(text: &str) -> Option<Token> {
    serde_json::from_str::<Value>(text).ok().map(json_to_token)
}

fn json_to_token(value: Value) -> Token {
    match value {
        Value::Null => Token::None,
        Value::Bool(b) => Token::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Token::Int(i),
            None => Token::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Token::Str(s),
        Value::Array(items) => Token::List(items.into_iter().map(json_to_token).collect()),
        Value::Object(map) => Token::Map(
            map.into_iter()
                .map(|(k, v)| (Token::Str(k), json_to_token(v)))
                .collect(),
        ),
    }
}

/// Parse a whole cell as a literal expression.
fn parse_literal(text: &str) -> Option<Token> {
    text.trim()
        .parse::<PyValue>()
        .ok()
        .map(literal_to_token)
}

fn literal_to_token(value: PyValue) -> Token {
    match value {
        PyValue::String(s) => Token::Str(s),
        PyValue::Bytes(b) => Token::Bytes(b),
        PyValue::Integer(i) => match i.to_i64() {
            Some(i) => Token::Int(i),
            None => Token::Float(i.to_f64().unwrap_or(f64::NAN)),
        },
        PyValue::Float(f) => Token::Float(f),
        // Complex numbers have no real value
        PyValue::Complex(_) => Token::None,
        PyValue::Boolean(b) => Token::Bool(b),
        PyValue::None => Token::None,
        PyValue::List(items) => Token::List(items.into_iter().map(literal_to_token).collect()),
        PyValue::Tuple(items) => Token::Tuple(items.into_iter().map(literal_to_token).collect()),
        PyValue::Set(items) => Token::Set(items.into_iter().map(literal_to_token).collect()),
        PyValue::Dict(pairs) => Token::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (literal_to_token(k), literal_to_token(v)))
                .collect(),
        ),
    }
}
