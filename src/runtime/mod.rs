//! Runtime facade
//!
//! The launcher talks to the interpreter only through the [`Runtime`] trait.
//! Every failure that crosses the facade is an opaque [`Condition`]: the
//! launcher looks at whether an operation failed and, for reporting, at the
//! condition's type name and message. It never inspects subtypes.
//!
//! [`Interpreter`] is the reference implementation shipped with the crate:
//! a strict Scheme subset that is just large enough to exercise every
//! facade operation.

pub mod builtins;
pub mod eval;
pub mod interp;
pub mod reader;
pub mod value;

use std::io::{self, BufRead, Write};
use std::rc::Rc;

use indexmap::IndexSet;
use thiserror::Error;

pub use interp::Interpreter;

/// Condition type for generic errors
pub const ERROR_TYPE: &str = "<error>";
/// Condition type for reader errors
pub const READ_ERROR_TYPE: &str = "<read-error>";
/// Condition type for failures of the host system (files, I/O)
pub const SYSTEM_ERROR_TYPE: &str = "<system-error>";

/// An error value raised by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{type_name}: {message}")]
pub struct Condition {
    /// Name of the condition type, e.g. `<error>`
    pub type_name: String,
    /// Human readable message
    pub message: String,
}

impl Condition {
    pub fn new(
        type_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ERROR_TYPE, message)
    }

    pub fn read_error(message: impl Into<String>) -> Self {
        Self::new(READ_ERROR_TYPE, message)
    }

    pub fn system_error(message: impl Into<String>) -> Self {
        Self::new(SYSTEM_ERROR_TYPE, message)
    }

    pub fn unbound_variable(name: &str) -> Self {
        Self::error(format!("unbound variable: {}", name))
    }
}

impl From<io::Error> for Condition {
    fn from(err: io::Error) -> Self {
        Condition::system_error(err.to_string())
    }
}

/// Result type for facade operations
pub type RuntimeResult<T> = Result<T, Condition>;

/// Where a new directory enters the load path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPathPosition {
    Front,
    Back,
}

/// What `load` does when the file cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingFile {
    Error,
    Ignore,
}

/// Compiler toggles set from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerFlag {
    NoInlineGlobals,
    NoInlineLocals,
    NoInlineConstants,
    NoPostInlinePass,
    NoSourceInfo,
    NoCombineInstructions,
    DebugCompiler,
}

/// Runtime toggles set from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFlag {
    CaseFold,
    LoadVerbose,
    CollectVmStats,
    CollectLoadStats,
    LimitModuleMutation,
}

/// Settings handed to the runtime once option parsing is finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Feature identifiers visible to `cond-expand`
    pub features: IndexSet<String>,
    pub compiler_flags: IndexSet<CompilerFlag>,
    pub runtime_flags: IndexSet<RuntimeFlag>,
}

impl RuntimeSettings {
    pub fn has_compiler_flag(
        &self,
        flag: CompilerFlag,
    ) -> bool {
        self.compiler_flags.contains(&flag)
    }

    pub fn has_runtime_flag(
        &self,
        flag: RuntimeFlag,
    ) -> bool {
        self.runtime_flags.contains(&flag)
    }
}

/// Reports a runtime can print when the process shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    /// Output of the time profiler
    Profile,
    /// Evaluator counters
    VmStats,
    /// Per-file load timings
    LoadStats,
}

/// The launcher's view of an embedded interpreter.
pub trait Runtime {
    /// A callable value found in the user namespace
    type Procedure;

    /// Apply features and flags gathered from the command line.
    fn configure(
        &mut self,
        settings: &RuntimeSettings,
    );

    fn add_load_path(
        &mut self,
        path: &str,
        position: LoadPathPosition,
    ) -> RuntimeResult<()>;

    /// Load a library by its slash separated path, once.
    fn require(
        &mut self,
        feature: &str,
    ) -> RuntimeResult<()>;

    /// Bind the exports of a loaded module in the user namespace.
    fn import_module(
        &mut self,
        module: &str,
    ) -> RuntimeResult<()>;

    fn load(
        &mut self,
        path: &str,
        missing: MissingFile,
    ) -> RuntimeResult<()>;

    /// Evaluate every form in `source` in the user namespace.
    fn eval_string(
        &mut self,
        source: &str,
    ) -> RuntimeResult<()>;

    /// Evaluate forms read from `input` until end of input; the first error is returned.
    fn load_from_reader(
        &mut self,
        input: &mut dyn BufRead,
    ) -> RuntimeResult<()>;

    fn run_repl(&mut self) -> RuntimeResult<()>;

    /// Define `*program-name*` and `*argv*` in the user namespace.
    fn set_program_args(
        &mut self,
        program_name: &Rc<str>,
        args: &[Rc<str>],
    );

    /// Look up `symbol` in the user namespace; `None` unless it names a procedure.
    fn find_procedure(
        &self,
        symbol: &str,
    ) -> Option<Self::Procedure>;

    /// Call `procedure` with a single argument: the list of `args`.
    ///
    /// Returns `Some(n)` when the procedure returned an exact integer.
    fn apply_entry(
        &mut self,
        procedure: &Self::Procedure,
        args: &[Rc<str>],
    ) -> RuntimeResult<Option<i64>>;

    /// The runtime's standard error reporter.
    fn report_error(
        &mut self,
        condition: &Condition,
    ) {
        eprintln!("*** ERROR: {}", condition.message);
    }

    fn start_profiler(&mut self) {}

    fn stop_profiler(&mut self) {}

    fn write_report(
        &mut self,
        _report: Report,
        _out: &mut dyn Write,
    ) -> io::Result<()> {
        Ok(())
    }
}
