use crate::DocId;
use std::fmt;

/// Malformed query input, pointing at the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset of the offending token in the query string.
    pub position: usize,
    pub token: String,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self { position, token: token.into(), message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token.is_empty() {
            write!(f, "{} at position {}", self.message, self.position)
        } else {
            write!(f, "{} at position {} near {:?}", self.message, self.position, self.token)
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("query parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("document {0} not found")]
    NotFound(DocId),
    #[error("no document with key {0:?}")]
    UnknownKey(String),
    #[error("field {field:?} is indexed as {existing} but document supplies {supplied}")]
    FieldKindMismatch { field: String, existing: &'static str, supplied: &'static str },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
