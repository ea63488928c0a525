//! A [`Runtime`] that records every facade call, for launcher tests

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use crate::runtime::{
    Condition, LoadPathPosition, MissingFile, Report, Runtime, RuntimeResult, RuntimeSettings,
};

/// What a procedure registered with [`RecordingRuntime::with_procedure`] does when applied
#[derive(Debug, Clone)]
pub enum EntryBehavior {
    Returns(i64),
    ReturnsNonInteger,
    Raises(Condition),
}

#[derive(Debug, Default)]
pub struct RecordingRuntime {
    calls: Vec<String>,
    fail_on: Vec<String>,
    procedures: HashMap<String, EntryBehavior>,
    pub settings: Option<RuntimeSettings>,
    pub program_name: Option<Rc<str>>,
    pub program_args: Vec<Rc<str>>,
    pub entry_args: Option<Vec<Rc<str>>>,
    pub reported: Vec<Condition>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the call whose record equals `call` fail
    pub fn fail_on(
        mut self,
        call: &str,
    ) -> Self {
        self.fail_on.push(call.to_string());
        self
    }

    pub fn with_procedure(
        mut self,
        name: &str,
        behavior: EntryBehavior,
    ) -> Self {
        self.procedures.insert(name.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    fn record(
        &mut self,
        call: String,
    ) -> RuntimeResult<()> {
        let failed = self.fail_on.contains(&call);
        self.calls.push(call.clone());
        if failed {
            Err(Condition::error(format!("failed: {}", call)))
        } else {
            Ok(())
        }
    }
}

impl Runtime for RecordingRuntime {
    type Procedure = EntryBehavior;

    fn configure(
        &mut self,
        settings: &RuntimeSettings,
    ) {
        self.settings = Some(settings.clone());
    }

    fn add_load_path(
        &mut self,
        path: &str,
        position: LoadPathPosition,
    ) -> RuntimeResult<()> {
        self.record(format!("add_load_path {} {:?}", path, position))
    }

    fn require(
        &mut self,
        feature: &str,
    ) -> RuntimeResult<()> {
        self.record(format!("require {}", feature))
    }

    fn import_module(
        &mut self,
        module: &str,
    ) -> RuntimeResult<()> {
        self.record(format!("import_module {}", module))
    }

    fn load(
        &mut self,
        path: &str,
        missing: MissingFile,
    ) -> RuntimeResult<()> {
        self.record(format!("load {} {:?}", path, missing))
    }

    fn eval_string(
        &mut self,
        source: &str,
    ) -> RuntimeResult<()> {
        self.record(format!("eval_string {}", source))
    }

    fn load_from_reader(
        &mut self,
        _input: &mut dyn BufRead,
    ) -> RuntimeResult<()> {
        self.record("load_from_reader".to_string())
    }

    fn run_repl(&mut self) -> RuntimeResult<()> {
        self.record("run_repl".to_string())
    }

    fn set_program_args(
        &mut self,
        program_name: &Rc<str>,
        args: &[Rc<str>],
    ) {
        self.program_name = Some(program_name.clone());
        self.program_args = args.to_vec();
    }

    fn find_procedure(
        &self,
        symbol: &str,
    ) -> Option<EntryBehavior> {
        self.procedures.get(symbol).cloned()
    }

    fn apply_entry(
        &mut self,
        procedure: &EntryBehavior,
        args: &[Rc<str>],
    ) -> RuntimeResult<Option<i64>> {
        self.calls.push("apply_entry".to_string());
        self.entry_args = Some(args.to_vec());
        match procedure {
            EntryBehavior::Returns(n) => Ok(Some(*n)),
            EntryBehavior::ReturnsNonInteger => Ok(None),
            EntryBehavior::Raises(condition) => Err(condition.clone()),
        }
    }

    fn report_error(
        &mut self,
        condition: &Condition,
    ) {
        self.reported.push(condition.clone());
    }

    fn start_profiler(&mut self) {
        self.calls.push("start_profiler".to_string());
    }

    fn stop_profiler(&mut self) {
        self.calls.push("stop_profiler".to_string());
    }

    fn write_report(
        &mut self,
        report: Report,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        self.calls.push(format!("write_report {:?}", report));
        writeln!(out, ";; {:?}", report)
    }
}
