//! Batch and interactive sessions
//!
//! With no script operand the launcher either reads forms from stdin until end
//! of input (batch) or runs the read-eval-print loop (interactive). Unless
//! `-q` was given, the interactive helpers are imported first in both cases.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::launcher::error::LauncherError;
use crate::launcher::options::ParsedOptions;
use crate::runtime::Runtime;

/// Library providing the interactive helpers
pub const INTERACTIVE_FEATURE: &str = "gosh/interactive";
/// Module imported into the user namespace for interactive sessions
pub const INTERACTIVE_MODULE: &str = "gosh.interactive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Batch,
    Interactive,
}

impl SessionMode {
    /// `-i` forces interactive, `-b` forces batch; otherwise stdin decides.
    pub fn select(
        batch: bool,
        interactive: bool,
        stdin_is_terminal: bool,
    ) -> Self {
        if interactive || (!batch && stdin_is_terminal) {
            SessionMode::Interactive
        } else {
            SessionMode::Batch
        }
    }
}

/// Make the interactive helpers available; a failure only warns.
pub fn import_interactive<R: Runtime>(runtime: &mut R) {
    let result = runtime
        .require(INTERACTIVE_FEATURE)
        .and_then(|()| runtime.import_module(INTERACTIVE_MODULE));
    if let Err(condition) = result {
        warn!("couldn't load {}: {}", INTERACTIVE_MODULE, condition);
    }
}

pub fn run_session<R: Runtime>(
    runtime: &mut R,
    options: &ParsedOptions,
    stdin_is_terminal: bool,
    input: &mut dyn BufRead,
) -> Result<(), LauncherError> {
    let mode = SessionMode::select(
        options.batch_mode,
        options.interactive_mode,
        stdin_is_terminal,
    );
    debug!("starting {:?} session", mode);

    if options.load_init_file {
        import_interactive(runtime);
    }
    match mode {
        SessionMode::Batch => runtime.load_from_reader(input).map_err(LauncherError::Batch),
        SessionMode::Interactive => runtime.run_repl().map_err(LauncherError::Repl),
    }
}
