//! REPL Command Handler
//!
//! Handles toplevel commands starting with `:` or `,`.

use super::ReplBackend;

/// Command result
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Exit the REPL
    Exit,
    /// Continue to next input
    Continue,
    /// Output a message
    Output(String),
}

const HELP: &str = "\
Available commands:
  :quit, :q       - Exit the REPL (also ,q)
  :help, :h       - Show this help
  :symbols, :i    - List names bound in the user namespace";

/// Command handler for REPL
pub struct CommandHandler<'a, B: ReplBackend> {
    backend: &'a mut B,
}

impl<'a, B: ReplBackend> CommandHandler<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self { backend }
    }

    /// Whether `line` is a toplevel command rather than a form
    pub fn is_command(line: &str) -> bool {
        let line = line.trim_start();
        line.starts_with(':') || line.starts_with(',')
    }

    /// Handle a command line
    pub fn handle(
        &mut self,
        line: &str,
    ) -> CommandResult {
        let cmd = line.trim().trim_start_matches([':', ',']).trim();
        let name = cmd.split_whitespace().next().unwrap_or("");

        match name {
            "quit" | "q" | "exit" => CommandResult::Exit,
            "help" | "h" | "?" => CommandResult::Output(HELP.to_string()),
            "symbols" | "info" | "i" => CommandResult::Output(self.backend.symbols().join("\n")),
            "" => CommandResult::Continue,
            _ => CommandResult::Output(format!("Unknown command: {}", line.trim())),
        }
    }
}
