//! Line-based REPL with rustyline
//!
//! Reads lines until the parentheses balance, evaluates the chunk and prints
//! the result. Errors are printed and the loop continues.

use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, EditMode, Editor};
use thiserror::Error;
use tracing::debug;

use super::commands::{CommandHandler, CommandResult};
use super::completer::SymbolCompleter;
use super::{is_complete, EvalOutcome, ReplBackend};
use crate::util::config::ReplConfig;

#[derive(Debug, Error)]
pub enum ReplError {
    #[error("line editor error: {0}")]
    Readline(#[from] ReadlineError),
}

/// Line REPL
pub struct LineRepl<'a, B: ReplBackend> {
    config: ReplConfig,
    editor: Editor<SymbolCompleter, FileHistory>,
    backend: &'a mut B,
    colors: bool,
}

impl<'a, B: ReplBackend> LineRepl<'a, B> {
    pub fn new(
        backend: &'a mut B,
        config: ReplConfig,
    ) -> Result<Self, ReplError> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .max_history_size(config.history_size)?
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(SymbolCompleter::new(backend.symbols())));

        if let Some(ref history_file) = config.history_file {
            if history_file.exists() {
                if let Err(e) = editor.load_history(history_file) {
                    debug!("could not load history {}: {}", history_file.display(), e);
                }
            }
        }

        Ok(Self {
            config,
            editor,
            backend,
            colors: io::stdout().is_terminal(),
        })
    }

    /// Run until end of input or a quit command
    pub fn run(&mut self) -> Result<(), ReplError> {
        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                &self.config.prompt
            } else {
                &self.config.continuation_prompt
            };

            let line = match self.editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => {
                    buffer.clear();
                    println!("(Interrupted)");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if buffer.is_empty() && CommandHandler::<B>::is_command(&line) {
                let _ = self.editor.add_history_entry(line.as_str());
                match CommandHandler::new(&mut *self.backend).handle(&line) {
                    CommandResult::Exit => break,
                    CommandResult::Continue => {}
                    CommandResult::Output(msg) => println!("{}", msg),
                }
                continue;
            }

            buffer.push_str(&line);
            buffer.push('\n');
            if !is_complete(&buffer) {
                continue;
            }

            let input = std::mem::take(&mut buffer);
            if input.trim().is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(input.trim_end());

            match self.backend.eval(&input) {
                EvalOutcome::Value(v) => println!("{}", v),
                EvalOutcome::Ok => {}
                EvalOutcome::Error(e) => self.print_error(&e),
                EvalOutcome::Incomplete => buffer = input,
            }

            let names = self.backend.symbols();
            if let Some(helper) = self.editor.helper_mut() {
                helper.set_names(names);
            }
        }

        if let Some(ref history_file) = self.config.history_file {
            if let Err(e) = self.editor.save_history(history_file) {
                debug!("could not save history {}: {}", history_file.display(), e);
            }
        }

        Ok(())
    }

    fn print_error(
        &self,
        message: &str,
    ) {
        let line = format!("*** ERROR: {}", message);
        if self.colors {
            println!("{}", line.red());
        } else {
            println!("{}", line);
        }
    }
}
