//! Pipeline driver: scan → parse → resolve → interpret, with the gating
//! rules between stages.

use log::{debug, info};

use crate::error::{Reporter, StderrReporter, Tally};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;

/// How a run of one source unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// Lexical, syntax or resolve errors; nothing was executed.
    StaticError,
    /// Execution started and was aborted by a runtime error.
    RuntimeError,
}

/// Owns one interpreter (and so one set of globals) plus the diagnostic
/// sink.  Successive [`Lox::run`] calls share globals, which is what a REPL
/// needs.
pub struct Lox<R: Reporter = StderrReporter> {
    interpreter: Interpreter,
    reporter: R,
}

impl Default for Lox<StderrReporter> {
    fn default() -> Self {
        Self::new()
    }
}

impl Lox<StderrReporter> {
    /// Prints to stdout, reports to stderr.
    pub fn new() -> Self {
        Self::with_parts(Interpreter::new(), StderrReporter)
    }
}

impl<R: Reporter> Lox<R> {
    pub fn with_parts(interpreter: Interpreter, reporter: R) -> Self {
        Self {
            interpreter,
            reporter,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Run one source unit.  Any static error skips resolution and/or
    /// execution; a runtime error is reported once and stops the unit.
    pub fn run(&mut self, source: &str) -> Outcome {
        let mut tally = Tally::new(&mut self.reporter);

        let tokens = scan_tokens(source, &mut tally);
        let statements = Parser::new(&tokens, &mut tally).parse();

        if tally.had_error() {
            info!("{} static error(s) before resolution", tally.count());
            return Outcome::StaticError;
        }

        Resolver::new(&mut self.interpreter, &mut tally).resolve(&statements);

        if tally.had_error() {
            info!("{} resolve error(s); skipping execution", tally.count());
            return Outcome::StaticError;
        }

        match self.interpreter.interpret(&statements) {
            Ok(()) => Outcome::Ok,
            Err(e) => {
                debug!("Runtime failure on line {:?}: {}", e.line(), e);
                tally.report(&e);
                Outcome::RuntimeError
            }
        }
    }
}
