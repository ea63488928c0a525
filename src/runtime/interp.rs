//! Reference interpreter implementing the [`Runtime`] facade
//!
//! Two namespaces matter to the launcher: the root namespace holding the
//! builtins, and the user namespace (a child of root) where `-e`, `-l` and
//! the script are evaluated. A library required as `a/b` is evaluated in its
//! own module environment, registered as `a.b`, and `import_module` copies
//! its bindings into the user namespace.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::repl::{self, EvalOutcome, LineRepl, ReplBackend};
use crate::runtime::builtins::{lookup_builtin_module, Builtin, BUILTINS};
use crate::runtime::eval::{Machine, Profiler};
use crate::runtime::reader::{fold_case, read_all};
use crate::runtime::value::{Env, Value};
use crate::runtime::{
    CompilerFlag, Condition, LoadPathPosition, MissingFile, Report, Runtime, RuntimeFlag,
    RuntimeResult, RuntimeSettings,
};
use crate::util::config::ReplConfig;

/// Source file extension tried when a load target has none
pub const SOURCE_EXTENSION: &str = "scm";

/// One completed file load, for `-pload`
#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub path: PathBuf,
    pub elapsed: Duration,
}

/// The reference interpreter
pub struct Interpreter {
    machine: Machine,
    root: Env,
    user: Env,
    load_paths: Vec<PathBuf>,
    /// Loaded modules by dotted name
    modules: IndexMap<String, Env>,
    /// Features already required
    provided: IndexSet<String>,
    settings: RuntimeSettings,
    load_stats: Vec<LoadRecord>,
    repl_config: ReplConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter writing program output to stdout
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        let root = Env::new();
        bind_builtins(&root, BUILTINS);
        let user = root.child();

        let mut machine = Machine::new(user.clone(), output);
        machine.features.insert("gosh".to_string());
        machine.features.insert(std::env::consts::OS.to_string());
        machine.features.insert(std::env::consts::FAMILY.to_string());

        Self {
            machine,
            root,
            user,
            load_paths: Vec::new(),
            modules: IndexMap::new(),
            provided: IndexSet::new(),
            settings: RuntimeSettings::default(),
            load_stats: Vec::new(),
            repl_config: ReplConfig::default(),
        }
    }

    pub fn set_repl_config(
        &mut self,
        config: ReplConfig,
    ) {
        self.repl_config = config;
    }

    pub fn load_paths(&self) -> &[PathBuf] {
        &self.load_paths
    }

    pub fn is_provided(
        &self,
        feature: &str,
    ) -> bool {
        self.provided.contains(feature)
    }

    pub fn load_stats(&self) -> &[LoadRecord] {
        &self.load_stats
    }

    /// Value bound to `name` in the user namespace
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        self.user.lookup(name)
    }

    /// Evaluate `source` in `env`, returning the value of the last form
    fn eval_source(
        &mut self,
        source: &str,
        env: &Env,
    ) -> RuntimeResult<Value> {
        let fold = self.settings.has_runtime_flag(RuntimeFlag::CaseFold);
        let debug_forms = self.settings.has_compiler_flag(CompilerFlag::DebugCompiler);
        let mut last = Value::Unspecified;
        for form in read_all(source)? {
            let form = if fold { fold_case(form) } else { form };
            if debug_forms {
                debug!("eval: {}", form.written());
            }
            last = self.machine.eval(&form, env)?;
        }
        Ok(last)
    }

    /// Find the file `path` names, trying the source extension too
    fn resolve_load_target(
        &self,
        path: &str,
    ) -> Option<PathBuf> {
        let candidate = Path::new(path);
        let explicit = candidate.is_absolute() || path.starts_with("./") || path.starts_with("../");
        let bases: Vec<PathBuf> = if explicit {
            vec![candidate.to_path_buf()]
        } else {
            self.load_paths.iter().map(|dir| dir.join(candidate)).collect()
        };

        bases.into_iter().find_map(|base| {
            if base.is_file() {
                return Some(base);
            }
            let with_ext = base.with_extension(SOURCE_EXTENSION);
            if base.extension().is_none() && with_ext.is_file() {
                return Some(with_ext);
            }
            None
        })
    }

    fn load_file(
        &mut self,
        path: &Path,
        env: &Env,
    ) -> RuntimeResult<()> {
        if self.settings.has_runtime_flag(RuntimeFlag::LoadVerbose) {
            eprintln!(";;Loading {:?}", path.display().to_string());
        }
        let started = Instant::now();
        let source = fs::read_to_string(path).map_err(|e| {
            Condition::system_error(format!("couldn't open input file: {}: {}", path.display(), e))
        })?;
        self.eval_source(&source, env)?;

        if self.settings.has_runtime_flag(RuntimeFlag::CollectLoadStats) {
            self.load_stats.push(LoadRecord {
                path: path.to_path_buf(),
                elapsed: started.elapsed(),
            });
        }
        trace!("loaded {}", path.display());
        Ok(())
    }

    fn register_module(
        &mut self,
        feature: &str,
        module: &str,
        env: Env,
    ) {
        debug!("module {} provided by {}", module, feature);
        self.modules.insert(module.to_string(), env);
        self.provided.insert(feature.to_string());
    }

    fn load_path_listing(&self) -> String {
        let dirs: Vec<String> = self
            .load_paths
            .iter()
            .map(|p| format!("{:?}", p.display().to_string()))
            .collect();
        format!("({})", dirs.join(" "))
    }
}

fn bind_builtins(
    env: &Env,
    table: &'static [Builtin],
) {
    for builtin in table {
        env.define(builtin.name, Value::Builtin(builtin));
    }
}

impl Runtime for Interpreter {
    type Procedure = Value;

    fn configure(
        &mut self,
        settings: &RuntimeSettings,
    ) {
        self.machine
            .features
            .extend(settings.features.iter().cloned());
        self.settings = settings.clone();
    }

    fn add_load_path(
        &mut self,
        path: &str,
        position: LoadPathPosition,
    ) -> RuntimeResult<()> {
        let dir = PathBuf::from(path);
        match position {
            LoadPathPosition::Front => self.load_paths.insert(0, dir),
            LoadPathPosition::Back => self.load_paths.push(dir),
        }
        Ok(())
    }

    fn require(
        &mut self,
        feature: &str,
    ) -> RuntimeResult<()> {
        if self.provided.contains(feature) {
            return Ok(());
        }
        let module = feature.replace('/', ".");

        if let Some((name, exports)) = lookup_builtin_module(feature) {
            let env = self.root.child();
            bind_builtins(&env, exports);
            self.register_module(feature, name, env);
            return Ok(());
        }

        let file = format!("{}.{}", feature, SOURCE_EXTENSION);
        let path = match self.resolve_load_target(&file) {
            Some(path) => path,
            None => {
                return Err(Condition::error(format!(
                    "cannot find \"{}\" in {}",
                    feature,
                    self.load_path_listing()
                )));
            }
        };

        let env = self.root.child();
        self.load_file(&path, &env)?;
        self.register_module(feature, &module, env);
        Ok(())
    }

    fn import_module(
        &mut self,
        module: &str,
    ) -> RuntimeResult<()> {
        let env = self
            .modules
            .get(module)
            .ok_or_else(|| Condition::error(format!("no such module: {}", module)))?;
        for (name, value) in env.local_bindings() {
            self.user.define(name, value);
        }
        Ok(())
    }

    fn load(
        &mut self,
        path: &str,
        missing: MissingFile,
    ) -> RuntimeResult<()> {
        match self.resolve_load_target(path) {
            Some(resolved) => {
                let user = self.user.clone();
                self.load_file(&resolved, &user)
            }
            None if missing == MissingFile::Ignore => {
                debug!("{} not found, skipped", path);
                Ok(())
            }
            None => Err(Condition::system_error(format!(
                "cannot find \"{}\" to load",
                path
            ))),
        }
    }

    fn eval_string(
        &mut self,
        source: &str,
    ) -> RuntimeResult<()> {
        let user = self.user.clone();
        self.eval_source(source, &user).map(|_| ())
    }

    fn load_from_reader(
        &mut self,
        input: &mut dyn BufRead,
    ) -> RuntimeResult<()> {
        let user = self.user.clone();
        let mut buffer = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = input.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            buffer.push_str(&line);
            if repl::is_complete(&buffer) {
                let chunk = std::mem::take(&mut buffer);
                self.eval_source(&chunk, &user)?;
            }
        }
        if !buffer.trim().is_empty() {
            self.eval_source(&buffer, &user)?;
        }
        Ok(())
    }

    fn run_repl(&mut self) -> RuntimeResult<()> {
        let config = self.repl_config.clone();
        let mut repl = LineRepl::new(self, config)
            .map_err(|e| Condition::system_error(e.to_string()))?;
        repl.run().map_err(|e| Condition::system_error(e.to_string()))
    }

    fn set_program_args(
        &mut self,
        program_name: &Rc<str>,
        args: &[Rc<str>],
    ) {
        self.user.define("*program-name*", Value::Str(program_name.clone()));
        let argv = args.iter().cloned().map(Value::Str).collect();
        self.user.define("*argv*", Value::list(argv));
    }

    fn find_procedure(
        &self,
        symbol: &str,
    ) -> Option<Value> {
        self.user.lookup(symbol).filter(Value::is_procedure)
    }

    fn apply_entry(
        &mut self,
        procedure: &Value,
        args: &[Rc<str>],
    ) -> RuntimeResult<Option<i64>> {
        let arg_list = Value::list(args.iter().cloned().map(Value::Str).collect());
        match self.machine.apply(procedure, vec![arg_list])? {
            Value::Int(n) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    fn start_profiler(&mut self) {
        self.machine.profiler = Some(Profiler::new());
    }

    fn stop_profiler(&mut self) {
        if let Some(profiler) = &mut self.machine.profiler {
            profiler.stop();
        }
    }

    fn write_report(
        &mut self,
        report: Report,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        match report {
            Report::Profile => {
                if let Some(profiler) = &self.machine.profiler {
                    out.write_all(profiler.report().as_bytes())?;
                }
            }
            Report::VmStats => {
                let stats = &self.machine.stats;
                writeln!(out, ";; evaluator statistics")?;
                writeln!(out, ";;   evaluations:   {}", stats.evaluations)?;
                writeln!(out, ";;   applications:  {}", stats.applications)?;
                writeln!(out, ";;   max depth:     {}", stats.max_depth)?;
            }
            Report::LoadStats => {
                writeln!(out, ";; load statistics")?;
                for record in &self.load_stats {
                    writeln!(
                        out,
                        ";; {:>10.3}ms  {}",
                        record.elapsed.as_secs_f64() * 1000.0,
                        record.path.display()
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl ReplBackend for Interpreter {
    fn eval(
        &mut self,
        code: &str,
    ) -> EvalOutcome {
        if !repl::is_complete(code) {
            return EvalOutcome::Incomplete;
        }
        let user = self.user.clone();
        match self.eval_source(code, &user) {
            Ok(Value::Unspecified) => EvalOutcome::Ok,
            Ok(value) => EvalOutcome::Value(value.written().to_string()),
            Err(condition) => EvalOutcome::Error(condition.message),
        }
    }

    fn symbols(&self) -> Vec<String> {
        self.user
            .visible_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }
}
