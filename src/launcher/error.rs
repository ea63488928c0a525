//! Launcher errors
//!
//! Every variant is fatal and maps to exit status 1. Errors raised by the
//! runtime are carried as opaque [`Condition`]s and reported as
//! `gosh: <type-name>: <message>`.

use thiserror::Error;

use crate::launcher::actions::ReplayError;
use crate::runtime::Condition;

/// Exit status for configuration and bootstrap failures
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum LauncherError {
    /// The script operand was an empty string
    #[error("bad script name")]
    BadScriptName,

    /// A deferred `-I -A -u -l -L -e -E` action failed
    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("{0}")]
    ScriptLoad(Condition),

    /// Reading forms from stdin failed
    #[error("{0}")]
    Batch(Condition),

    /// The profiler module could not be loaded
    #[error("{0}")]
    Profiler(Condition),

    #[error("{0}")]
    Repl(Condition),
}

impl LauncherError {
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }

    /// Print the error to stderr and return the exit status
    pub fn report(&self) -> i32 {
        eprintln!("gosh: {}", self);
        self.exit_code()
    }
}
