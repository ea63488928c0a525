//! Script resolution
//!
//! Decides the path handed to the loader for the script operand, and the
//! argument vector exposed to the program as `*program-name*` and `*argv*`.

use std::path::{self, Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::launcher::error::LauncherError;

/// A script to load and run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    /// Path handed to the loader; never empty
    pub path: String,
    /// The script name followed by its arguments
    pub argv: Vec<Rc<str>>,
}

impl ScriptInvocation {
    pub fn program_name(&self) -> &Rc<str> {
        &self.argv[0]
    }

    /// Arguments after the script name
    pub fn rest_args(&self) -> &[Rc<str>] {
        &self.argv[1..]
    }
}

/// What the launcher runs after bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Script(ScriptInvocation),
    /// No script: batch or interactive session; `argv` is `[program-name]`
    Session { argv: Vec<Rc<str>> },
}

impl Invocation {
    pub fn argv(&self) -> &[Rc<str>] {
        match self {
            Invocation::Script(script) => &script.argv,
            Invocation::Session { argv } => argv,
        }
    }

    pub fn program_name(&self) -> &Rc<str> {
        &self.argv()[0]
    }

    pub fn rest_args(&self) -> &[Rc<str>] {
        &self.argv()[1..]
    }
}

#[derive(Debug, Clone)]
pub struct ScriptResolver {
    /// Directory relative script names are checked against
    base: PathBuf,
    /// Accept `X:` as an absolute path
    drive_letters: bool,
}

impl Default for ScriptResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptResolver {
    /// Resolver for the current directory
    pub fn new() -> Self {
        Self {
            base: PathBuf::from("."),
            drive_letters: cfg!(windows),
        }
    }

    pub fn with_base(
        mut self,
        base: impl Into<PathBuf>,
    ) -> Self {
        self.base = base.into();
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn with_drive_letters(
        mut self,
        enabled: bool,
    ) -> Self {
        self.drive_letters = enabled;
        self
    }

    fn is_absolute(
        &self,
        name: &str,
    ) -> bool {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(first), _) if path::is_separator(first) => true,
            (Some(letter), Some(':')) => self.drive_letters && letter.is_ascii_alphabetic(),
            _ => false,
        }
    }

    /// The loader path for script operand `name`
    pub fn resolve_path(
        &self,
        name: &str,
    ) -> Result<String, LauncherError> {
        if name.is_empty() {
            return Err(LauncherError::BadScriptName);
        }
        if self.is_absolute(name) {
            return Ok(name.to_string());
        }
        if self.base.join(name).exists() {
            return Ok(format!("./{}", name));
        }
        // left to the load path search
        Ok(name.to_string())
    }

    /// Build the invocation from the operands following the options
    pub fn resolve(
        &self,
        program_name: &str,
        operands: &[String],
    ) -> Result<Invocation, LauncherError> {
        let Some(script) = operands.first() else {
            return Ok(Invocation::Session {
                argv: vec![Rc::from(program_name)],
            });
        };
        let path = self.resolve_path(script)?;
        debug!("script {} resolved to {}", script, path);
        let argv = operands.iter().map(|arg| Rc::from(arg.as_str())).collect();
        Ok(Invocation::Script(ScriptInvocation { path, argv }))
    }
}
