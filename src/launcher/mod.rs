//! Bootstrap launcher
//!
//! Turns a command line into runtime actions and runs them in order:
//!
//! 1. parse options; immediate flags configure the runtime
//! 2. set up the load path from the environment, the config file and `-ftest`
//! 3. resolve the script operand, load the init file, bind `*argv*`
//! 4. replay the deferred `-I -A -u -l -L -e -E` actions
//! 5. start the profiler, then run the script's `main` or a session
//! 6. cleanup: stop instruments and print their reports

pub mod actions;
pub mod entry;
pub mod error;
pub mod options;
pub mod script;
pub mod session;
pub mod signals;

#[cfg(test)]
mod testing;

use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use actions::{replay, ActionKind, DeferredAction, ReplayError};
pub use error::LauncherError;
pub use options::{parse_command_line, CommandLine, OptionError, ParsedOptions};
pub use script::{Invocation, ScriptInvocation, ScriptResolver};

use crate::runtime::{Interpreter, LoadPathPosition, MissingFile, Report, Runtime};
use crate::util::config::{self, LauncherConfig};

/// Library that provides the profiler front end
pub const PROFILER_FEATURE: &str = "gosh/vm/profiler";

/// Source trees added to the load path by `-ftest`, nearest first
const TEST_TREES: &[&str] = &["..", "../.."];

/// Build directories of a source tree, in the order they are pushed to the
/// front of the load path; `lib` ends up searched first.
const TEST_TREE_DIRS: &[&str] = &["src", "libsrc", "lib"];

/// Build directories of the first source tree found above `base`
pub fn test_load_paths(base: &Path) -> Vec<String> {
    for tree in TEST_TREES {
        let dirs: Vec<String> = TEST_TREE_DIRS
            .iter()
            .map(|dir| format!("{}/{}", tree, dir))
            .collect();
        if dirs.iter().all(|dir| base.join(dir).is_dir()) {
            return dirs;
        }
    }
    Vec::new()
}

pub struct Launcher<R: Runtime> {
    runtime: R,
    config: LauncherConfig,
    /// Directories from `GOSH_LOAD_PATH`
    env_paths: Vec<PathBuf>,
    resolver: ScriptResolver,
    input: Box<dyn BufRead>,
    stdin_is_terminal: bool,
}

impl<R: Runtime> Launcher<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            config: LauncherConfig::default(),
            env_paths: Vec::new(),
            resolver: ScriptResolver::new(),
            input: Box::new(BufReader::new(io::stdin())),
            stdin_is_terminal: io::stdin().is_terminal(),
        }
    }

    pub fn with_config(
        mut self,
        config: LauncherConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn with_env_paths(
        mut self,
        paths: Vec<PathBuf>,
    ) -> Self {
        self.env_paths = paths;
        self
    }

    pub fn with_resolver(
        mut self,
        resolver: ScriptResolver,
    ) -> Self {
        self.resolver = resolver;
        self
    }

    /// Read batch input from `input` instead of stdin
    pub fn with_input(
        mut self,
        input: Box<dyn BufRead>,
        is_terminal: bool,
    ) -> Self {
        self.input = input;
        self.stdin_is_terminal = is_terminal;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Run with `args[0]` as the program name; returns the exit status
    pub fn run(
        &mut self,
        args: &[String],
    ) -> i32 {
        let (program_name, rest) = match args.split_first() {
            Some((name, rest)) => (name.as_str(), rest),
            None => ("gosh", args),
        };

        let line = match parse_command_line(rest) {
            Ok(line) => line,
            Err(err) => return err.report(),
        };
        debug!(
            "{} deferred actions, first operand at {}",
            line.actions.len(),
            line.first_operand
        );

        let CommandLine {
            options,
            actions,
            operands,
            ..
        } = line;

        self.runtime.configure(&options.runtime_settings());
        self.setup_load_path(&options);

        let invocation = match self.resolver.resolve(program_name, &operands) {
            Ok(invocation) => invocation,
            Err(err) => return err.report(),
        };

        if options.load_init_file {
            self.load_init_file();
        }
        self.runtime
            .set_program_args(invocation.program_name(), invocation.rest_args());

        if let Err(err) = replay(&mut self.runtime, actions) {
            return self.fail(err.into());
        }

        if options.profiling_mode {
            if let Err(condition) = self.runtime.require(PROFILER_FEATURE) {
                return self.fail(LauncherError::Profiler(condition));
            }
            self.runtime.start_profiler();
        }

        let status = match &invocation {
            Invocation::Script(script) => self.run_script(script),
            Invocation::Session { .. } => {
                match session::run_session(
                    &mut self.runtime,
                    &options,
                    self.stdin_is_terminal,
                    &mut *self.input,
                ) {
                    Ok(()) => 0,
                    Err(err) => self.fail(err),
                }
            }
        };

        self.cleanup(&options);
        status
    }

    fn setup_load_path(
        &mut self,
        options: &ParsedOptions,
    ) {
        let mut entries: Vec<(String, LoadPathPosition)> = Vec::new();
        // pushing to the front in reverse keeps the variable's order
        for path in self.env_paths.iter().rev() {
            entries.push((path.to_string_lossy().into_owned(), LoadPathPosition::Front));
        }
        for path in &self.config.load.paths {
            entries.push((path.to_string_lossy().into_owned(), LoadPathPosition::Back));
        }
        if options.test_mode {
            for path in test_load_paths(self.resolver.base()) {
                entries.push((path, LoadPathPosition::Front));
            }
        }

        for (path, position) in entries {
            if let Err(condition) = self.runtime.add_load_path(&path, position) {
                warn!("cannot add {} to the load path: {}", path, condition);
            }
        }
    }

    fn load_init_file(&mut self) {
        let init_file = self.config.init_file.clone();
        if let Err(condition) = self.runtime.load(&init_file, MissingFile::Ignore) {
            warn!(
                "Error while loading initialization file: {}({})",
                condition.message, condition.type_name
            );
        }
    }

    fn run_script(
        &mut self,
        script: &ScriptInvocation,
    ) -> i32 {
        debug!("loading script {}", script.path);
        if let Err(condition) = self.runtime.load(&script.path, MissingFile::Error) {
            return self.fail(LauncherError::ScriptLoad(condition));
        }
        entry::dispatch(&mut self.runtime, script)
    }

    fn fail(
        &mut self,
        err: LauncherError,
    ) -> i32 {
        debug!("bootstrap failed: {:?}", err);
        err.report()
    }

    fn cleanup(
        &mut self,
        options: &ParsedOptions,
    ) {
        let mut reports = Vec::new();
        if options.profiling_mode {
            self.runtime.stop_profiler();
            reports.push(Report::Profile);
        }
        if options.stats_mode {
            reports.push(Report::VmStats);
        }
        if options.load_stats_mode {
            reports.push(Report::LoadStats);
        }

        let stderr = io::stderr();
        let mut err = stderr.lock();
        for report in reports {
            if let Err(e) = self.runtime.write_report(report, &mut err) {
                warn!("cannot write {:?} report: {}", report, e);
            }
        }
        if let Err(e) = io::stdout().flush() {
            debug!("flushing stdout: {}", e);
        }
    }
}

/// Run gosh with the process arguments; returns the exit status
pub fn main_with_args(args: Vec<String>) -> i32 {
    let config = match config::load_user_config() {
        Ok(config) => config,
        Err(e) => {
            warn!("ignoring configuration: {:#}", e);
            LauncherConfig::default()
        }
    };

    let mut interpreter = Interpreter::new();
    interpreter.set_repl_config(config.repl.clone());

    let mut launcher = Launcher::new(interpreter)
        .with_config(config)
        .with_env_paths(config::env_load_paths());
    launcher.run(&args)
}

#[cfg(test)]
mod tests;
