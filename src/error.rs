//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All stages (scanner, parser, resolver, runtime) convert their failure modes
//! into one of the variants defined here.  Static stages do not stop at the
//! first problem: they hand every error to a [`Reporter`] and keep going, so a
//! single run can surface several diagnostics.
//!
//! The module **does not** decide where diagnostics end up; that is the job of
//! whichever [`Reporter`] the host injects.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `location` is `" at end"`, `" at 'x'"` or empty.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure found by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error, attributed to the offending token's line.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Build the `" at 'lexeme'"` / `" at end"` hint for a token.
fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        LoxError::Runtime {
            message: msg.into(),
            line: token.line,
        }
    }

    /// Source line the error is attributed to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) | LoxError::Utf8(_) => None,
        }
    }

}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Diagnostic sink injected into every stage of the pipeline.
pub trait Reporter {
    fn report(&mut self, error: &LoxError);
}

impl<F: FnMut(&LoxError)> Reporter for F {
    fn report(&mut self, error: &LoxError) {
        self(error)
    }
}

/// Default sink: one diagnostic per line on standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&mut self, error: &LoxError) {
        eprintln!("{}", error);
    }
}

/// Forwards to another reporter while counting what passes through.
pub struct Tally<'r> {
    inner: &'r mut dyn Reporter,
    count: usize,
}

impl<'r> Tally<'r> {
    pub fn new(inner: &'r mut dyn Reporter) -> Self {
        Self { inner, count: 0 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn had_error(&self) -> bool {
        self.count > 0
    }
}

impl Reporter for Tally<'_> {
    fn report(&mut self, error: &LoxError) {
        self.count += 1;
        self.inner.report(error);
    }
}
