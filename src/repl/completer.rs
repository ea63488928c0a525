//! REPL Completer
//!
//! Completes identifiers from a snapshot of the names bound in the user
//! namespace. The snapshot is refreshed by the line editor after every
//! evaluation.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// Special forms, which are not bindings and never show up in the snapshot
const SYNTAX_KEYWORDS: &[&str] = &[
    "quote",
    "if",
    "define",
    "set!",
    "lambda",
    "begin",
    "let",
    "let*",
    "and",
    "or",
    "cond",
    "when",
    "unless",
    "cond-expand",
];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"')
}

#[derive(Debug, Default)]
pub struct SymbolCompleter {
    names: Vec<String>,
}

impl SymbolCompleter {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn set_names(
        &mut self,
        names: Vec<String>,
    ) {
        self.names = names;
    }

    /// Candidates for the word ending at `pos`, with the word's start offset
    pub fn candidates(
        &self,
        line: &str,
        pos: usize,
    ) -> (usize, Vec<String>) {
        let start = line[..pos].rfind(is_delimiter).map(|i| i + 1).unwrap_or(0);
        let word = &line[start..pos];
        if word.is_empty() {
            return (start, Vec::new());
        }

        let mut found: Vec<String> = self
            .names
            .iter()
            .map(String::as_str)
            .chain(SYNTAX_KEYWORDS.iter().copied())
            .filter(|name| name.starts_with(word))
            .map(str::to_string)
            .collect();
        found.sort();
        found.dedup();
        (start, found)
    }
}

impl Completer for SymbolCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, names) = self.candidates(line, pos);
        let pairs = names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for SymbolCompleter {
    type Hint = String;
}

impl Highlighter for SymbolCompleter {}

impl Validator for SymbolCompleter {}

impl Helper for SymbolCompleter {}
