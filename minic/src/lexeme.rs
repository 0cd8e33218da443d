//! Lexeme records handed over by the lexical-analysis stage
//!
//! Every leaf syntax tree node (identifier or literal) keeps the lexeme it
//! was built from, so diagnostics can point back at the source position.

use serde::{Deserialize, Serialize};

/// Payload of a lexeme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LexValue {
    Ident(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// A single lexeme: its payload plus the 1-based source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexeme {
    pub value: LexValue,
    pub line: u64,
    pub column: u64,
}

impl Lexeme {
    pub fn new(value: LexValue, line: u64, column: u64) -> Self {
        Self {
            value,
            line,
            column,
        }
    }

    pub fn ident(text: impl Into<String>, line: u64, column: u64) -> Self {
        Self::new(LexValue::Ident(text.into()), line, column)
    }

    pub fn int(value: i64, line: u64, column: u64) -> Self {
        Self::new(LexValue::Int(value), line, column)
    }

    pub fn float(value: f64, line: u64, column: u64) -> Self {
        Self::new(LexValue::Float(value), line, column)
    }

    pub fn boolean(value: bool, line: u64, column: u64) -> Self {
        Self::new(LexValue::Bool(value), line, column)
    }
}
