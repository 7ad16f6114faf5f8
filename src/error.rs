use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    LexError,
    SyntaxError,
    NameError,
    TypeError,
    ArityError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::LexError => "LexError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::NameError => "NameError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ArityError => "ArityError",
        };
        f.write_str(name)
    }
}

/// A single diagnostic as reported by any phase of the pipeline.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("[line {line}:{col}] {kind}: {message}")]
pub struct OkraError {
    pub kind: ErrorKind,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl OkraError {
    pub fn new(kind: ErrorKind, line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            col,
            message: message.into(),
        }
    }
}
