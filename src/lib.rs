//! gosh - bootstrap launcher for an embeddable Scheme runtime
//!
//! The launcher turns a command line into an ordered list of runtime actions
//! (load path changes, module imports, file loads, expression evaluations),
//! replays them against a [`runtime::Runtime`], and then hands control to a
//! script's `main` or to a batch or interactive session.
//!
//! # Example
//!
//! ```no_run
//! use gosh::launcher::main_with_args;
//!
//! let args = vec!["gosh".to_string(), "-e".to_string(), "(display 1)".to_string()];
//! std::process::exit(main_with_args(args));
//! ```

#![doc(html_root_url = "https://docs.rs/gosh")]
#![warn(rust_2018_idioms)]

pub mod launcher;
pub mod repl;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use launcher::{main_with_args, Launcher};
pub use runtime::eval::with_eval_stack;
pub use runtime::{Condition, Interpreter, Runtime};

use tracing::debug;

/// Launcher version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "gosh";

/// Evaluate Scheme source in a fresh interpreter
///
/// ```no_run
/// gosh::run("(display (+ 1 2))")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn run(source: &str) -> Result<()> {
    debug!("run called with {} bytes", source.len());
    let source = source.to_string();
    with_eval_stack(move || -> Result<()> {
        let mut interpreter = Interpreter::new();
        interpreter.eval_string(&source)?;
        Ok(())
    })?
}
