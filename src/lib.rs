use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Once,
};

use thiserror::Error;
use tracing::{debug, info, instrument};

pub mod ast;
pub mod callable;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod stdlib;
pub mod token;
pub mod value;

use ast::Stmt;
use error::OkraError;
use interpreter::{Interpreter, RuntimeError};
use parser::Parser;
use token::TokenType;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Couldn't read '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Every lex and syntax error in the source, in source order.
    #[error("{} error(s) found before execution", .0.len())]
    Static(Vec<OkraError>),
    #[error("{0}")]
    Runtime(OkraError),
    #[error("failed to write program output: {0}")]
    Output(io::Error),
}

impl From<RuntimeError> for RunError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Eval {
                kind,
                line,
                col,
                message,
            } => RunError::Runtime(OkraError::new(kind, line, col, message)),
            RuntimeError::Output(e) => RunError::Output(e),
        }
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=okra=debug` or `RUST_LOG=okra=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}

/// Scans and parses `source`, returning the program or every static error found.
#[instrument(level = "debug", skip_all, fields(bytes = source.len()))]
pub fn check_source(source: &str) -> Result<Vec<Stmt>, Vec<OkraError>> {
    let (mut tokens, lex_errors) = scanner::scan(source);

    // already reported by the scanner
    tokens.retain(|token| token.t_type != TokenType::Invalid);

    let (statements, parse_errors) = Parser::new(&tokens).parse();

    let mut errors: Vec<OkraError> = lex_errors
        .into_iter()
        .chain(parse_errors.into_iter().map(OkraError::from))
        .collect();

    if errors.is_empty() {
        return Ok(statements);
    }

    errors.sort_by_key(|e| (e.line, e.col));
    Err(errors)
}

/// Runs `source` on `interpreter`. Nothing executes if the source has static errors.
pub fn run_source(source: &str, interpreter: &mut Interpreter) -> Result<(), RunError> {
    let statements = check_source(source).map_err(RunError::Static)?;
    interpreter.interpret(&statements)?;

    Ok(())
}

fn read_source(path: &Path) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|source| RunError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs a script with the standard library loaded, printing to stdout.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn run_file(path: &Path) -> Result<(), RunError> {
    let source = read_source(path)?;

    let mut interpreter = Interpreter::new(Box::new(io::stdout()));
    interpreter.load_stdlib(stdlib::builtins());

    run_source(&source, &mut interpreter)
}

/// The formatter is not implemented: the file is read but left untouched.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn format_file(path: &Path) -> Result<(), RunError> {
    let source = read_source(path)?;
    debug!(bytes = source.len(), "read source for formatting");
    info!("formatter is not implemented, leaving file unchanged");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn static_errors_are_collected_in_source_order() {
        let errors = check_source("print 1; #\nvar = 3;\nprint 'open").unwrap_err();
        let summary: Vec<(ErrorKind, usize, usize)> =
            errors.iter().map(|e| (e.kind, e.line, e.col)).collect();

        assert_eq!(
            summary,
            vec![
                (ErrorKind::LexError, 1, 10),
                (ErrorKind::SyntaxError, 2, 5),
                (ErrorKind::LexError, 3, 7),
                (ErrorKind::SyntaxError, 3, 12),
            ]
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = run_file(Path::new("definitely/not/here.okr")).unwrap_err();
        assert!(matches!(err, RunError::FileRead { .. }));
    }
}
