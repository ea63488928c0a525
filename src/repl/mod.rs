//! Interactive REPL
//!
//! This module contains:
//! - [`ReplBackend`] - what the loop needs from an evaluator
//! - [`LineRepl`] - line-based REPL with rustyline
//! - [`CommandHandler`] - `:command` / `,command` processor
//! - [`is_complete`] - balanced-input check used for continuation lines

pub mod commands;
pub mod completer;
pub mod line;

pub use commands::{CommandHandler, CommandResult};
pub use completer::SymbolCompleter;
pub use line::LineRepl;

/// Evaluation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalOutcome {
    /// Evaluation produced a value, already in `write` notation
    Value(String),
    /// Evaluation produced nothing worth printing
    Ok,
    /// Evaluation raised an error
    Error(String),
    /// More input needed
    Incomplete,
}

/// REPL backend
pub trait ReplBackend {
    /// Evaluate a complete chunk of input
    fn eval(
        &mut self,
        code: &str,
    ) -> EvalOutcome;

    /// Names visible in the user namespace, for completion and `:symbols`
    fn symbols(&self) -> Vec<String>;
}

/// Whether `code` has balanced parentheses outside strings and comments
///
/// Stray close parentheses count as complete so the reader gets to report them.
pub fn is_complete(code: &str) -> bool {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for c in code.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' => in_comment = true,
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    depth == 0 && !in_string
}
