//! Evaluator of the reference runtime
//!
//! [`Machine`] evaluates forms against an [`Env`]. Tail positions of `if`,
//! `begin`, `let`, `cond` and procedure bodies are evaluated in a loop, so
//! iterative procedures run in constant native stack. Non-tail nesting is
//! bounded by [`MAX_EVAL_DEPTH`], which needs more native stack than the
//! 2 MiB a spawned thread gets by default; evaluate through
//! [`with_eval_stack`] when the calling thread's stack is not known.

use std::collections::HashMap;
use std::io::{self, Write};
use std::panic;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexSet;

use crate::runtime::value::{Env, Lambda, Value};
use crate::runtime::{Condition, RuntimeResult};

/// Maximum depth of non-tail evaluation
pub const MAX_EVAL_DEPTH: usize = 1000;

/// Native stack for a thread that may reach [`MAX_EVAL_DEPTH`]
pub const EVAL_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Run `f` on a thread with [`EVAL_STACK_SIZE`] of stack and wait for it
///
/// A panic in `f` is resumed on the calling thread.
pub fn with_eval_stack<T, F>(f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("gosh-eval".to_string())
        .stack_size(EVAL_STACK_SIZE)
        .spawn(f)?;
    match handle.join() {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Evaluator counters, reported with `-fcollect-stats`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EvalStats {
    pub evaluations: u64,
    pub applications: u64,
    pub max_depth: usize,
}

/// Call-count profiler enabled by `-ptime`
#[derive(Debug)]
pub struct Profiler {
    started: Instant,
    stopped: Option<Duration>,
    calls: HashMap<String, u64>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            stopped: None,
            calls: HashMap::new(),
        }
    }

    fn record(
        &mut self,
        name: &str,
    ) {
        if self.stopped.is_none() {
            *self.calls.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    pub fn stop(&mut self) {
        if self.stopped.is_none() {
            self.stopped = Some(self.started.elapsed());
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.stopped.unwrap_or_else(|| self.started.elapsed())
    }

    pub fn call_count(
        &self,
        name: &str,
    ) -> u64 {
        self.calls.get(name).copied().unwrap_or(0)
    }

    /// Procedures sorted by descending call count
    pub fn report(&self) -> String {
        let mut rows: Vec<_> = self.calls.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let mut out = format!(
            "Profiler statistics (total time: {:.3} sec)\n",
            self.elapsed().as_secs_f64()
        );
        out.push_str(&format!("{:<40} {:>10}\n", "Name", "Num calls"));
        out.push_str(&format!("{}\n", "-".repeat(51)));
        for (name, count) in rows {
            out.push_str(&format!("{:<40} {:>10}\n", name, count));
        }
        out
    }
}

/// Result of evaluating a form one step
enum Step {
    Done(Value),
    /// Continue with this expression in this environment
    Tail(Value, Env),
}

#[derive(Debug, Clone, Copy)]
enum SpecialForm {
    Quote,
    If,
    Define,
    Set,
    Lambda,
    Begin,
    Let,
    LetStar,
    And,
    Or,
    Cond,
    When,
    Unless,
    CondExpand,
}

impl SpecialForm {
    fn from_name(name: &str) -> Option<Self> {
        let form = match name {
            "quote" => SpecialForm::Quote,
            "if" => SpecialForm::If,
            "define" => SpecialForm::Define,
            "set!" => SpecialForm::Set,
            "lambda" => SpecialForm::Lambda,
            "begin" => SpecialForm::Begin,
            "let" => SpecialForm::Let,
            "let*" => SpecialForm::LetStar,
            "and" => SpecialForm::And,
            "or" => SpecialForm::Or,
            "cond" => SpecialForm::Cond,
            "when" => SpecialForm::When,
            "unless" => SpecialForm::Unless,
            "cond-expand" => SpecialForm::CondExpand,
            _ => return None,
        };
        Some(form)
    }
}

fn syntax_error(
    form: &str,
    args: &[Value],
) -> Condition {
    let shown: Vec<String> = args.iter().map(|a| a.written().to_string()).collect();
    Condition::error(format!("syntax-error: malformed {}: ({} {})", form, form, shown.join(" ")))
}

/// The evaluator state
///
/// Reaching [`MAX_EVAL_DEPTH`] takes tens of MiB of native stack in debug
/// builds. Threads that evaluate arbitrary programs should be spawned with
/// [`EVAL_STACK_SIZE`], e.g. through [`with_eval_stack`].
pub struct Machine {
    /// Feature identifiers visible to `cond-expand`
    pub features: IndexSet<String>,
    /// The user namespace, used by introspection builtins
    pub namespace: Env,
    pub stats: EvalStats,
    pub profiler: Option<Profiler>,
    output: Box<dyn Write>,
    depth: usize,
}

impl Machine {
    pub fn new(
        namespace: Env,
        output: Box<dyn Write>,
    ) -> Self {
        Self {
            features: IndexSet::new(),
            namespace,
            stats: EvalStats::default(),
            profiler: None,
            output,
            depth: 0,
        }
    }

    /// Write `text` to the program's output port
    pub fn write_output(
        &mut self,
        text: &str,
    ) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    pub fn eval(
        &mut self,
        expr: &Value,
        env: &Env,
    ) -> RuntimeResult<Value> {
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(Condition::error(format!(
                "stack overflow (evaluation depth exceeded {})",
                MAX_EVAL_DEPTH
            )));
        }
        self.depth += 1;
        self.stats.max_depth = self.stats.max_depth.max(self.depth);
        let result = self.eval_loop(expr.clone(), env.clone());
        self.depth -= 1;
        result
    }

    /// Apply a procedure to already evaluated arguments
    pub fn apply(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
    ) -> RuntimeResult<Value> {
        match self.enter(callee, args)? {
            Step::Done(value) => Ok(value),
            Step::Tail(expr, env) => self.eval(&expr, &env),
        }
    }

    fn eval_loop(
        &mut self,
        mut expr: Value,
        mut env: Env,
    ) -> RuntimeResult<Value> {
        loop {
            self.stats.evaluations += 1;
            let form = match &expr {
                Value::Symbol(name) => {
                    return env.lookup(name).ok_or_else(|| Condition::unbound_variable(name));
                }
                Value::List(items) if items.is_empty() => {
                    return Err(Condition::error("cannot evaluate an empty list"));
                }
                Value::List(items) => items.clone(),
                other => return Ok(other.clone()),
            };

            let special = form[0].as_symbol().and_then(SpecialForm::from_name);
            let step = match special {
                Some(special) => self.eval_special(special, &form[1..], &env)?,
                None => {
                    let callee = self.eval(&form[0], &env)?;
                    let mut args = Vec::with_capacity(form.len() - 1);
                    for arg in &form[1..] {
                        args.push(self.eval(arg, &env)?);
                    }
                    self.enter(&callee, args)?
                }
            };

            match step {
                Step::Done(value) => return Ok(value),
                Step::Tail(next, next_env) => {
                    expr = next;
                    env = next_env;
                }
            }
        }
    }

    /// Start a call: builtins finish immediately, lambdas leave their last body form
    fn enter(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
    ) -> RuntimeResult<Step> {
        self.stats.applications += 1;
        match callee {
            Value::Builtin(builtin) => {
                if let Some(profiler) = &mut self.profiler {
                    profiler.record(builtin.name);
                }
                builtin.arity.check(builtin.name, args.len())?;
                Ok(Step::Done((builtin.func)(self, &args)?))
            }
            Value::Lambda(lambda) => {
                if let Some(profiler) = &mut self.profiler {
                    profiler.record(lambda.display_name());
                }
                let frame = bind_arguments(lambda, args)?;
                self.eval_sequence(&lambda.body, &frame)
            }
            other => Err(Condition::error(format!(
                "invalid application: {}",
                other.written()
            ))),
        }
    }

    /// Evaluate all but the last form; the last one is returned as a tail step
    fn eval_sequence(
        &mut self,
        body: &[Value],
        env: &Env,
    ) -> RuntimeResult<Step> {
        match body.split_last() {
            None => Ok(Step::Done(Value::Unspecified)),
            Some((last, init)) => {
                for form in init {
                    self.eval(form, env)?;
                }
                Ok(Step::Tail(last.clone(), env.clone()))
            }
        }
    }

    fn eval_special(
        &mut self,
        form: SpecialForm,
        args: &[Value],
        env: &Env,
    ) -> RuntimeResult<Step> {
        match form {
            SpecialForm::Quote => match args {
                [datum] => Ok(Step::Done(datum.clone())),
                _ => Err(syntax_error("quote", args)),
            },
            SpecialForm::If => match args {
                [test, then] => {
                    if self.eval(test, env)?.is_true() {
                        Ok(Step::Tail(then.clone(), env.clone()))
                    } else {
                        Ok(Step::Done(Value::Unspecified))
                    }
                }
                [test, then, otherwise] => {
                    let branch = if self.eval(test, env)?.is_true() {
                        then
                    } else {
                        otherwise
                    };
                    Ok(Step::Tail(branch.clone(), env.clone()))
                }
                _ => Err(syntax_error("if", args)),
            },
            SpecialForm::Define => self.eval_define(args, env),
            SpecialForm::Set => match args {
                [Value::Symbol(name), expr] => {
                    let value = self.eval(expr, env)?;
                    if env.set(name, value) {
                        Ok(Step::Done(Value::Unspecified))
                    } else {
                        Err(Condition::unbound_variable(name))
                    }
                }
                _ => Err(syntax_error("set!", args)),
            },
            SpecialForm::Lambda => match args {
                [params, body @ ..] if !body.is_empty() => {
                    let lambda = make_lambda(None, params, body, env)?;
                    Ok(Step::Done(Value::Lambda(Rc::new(lambda))))
                }
                _ => Err(syntax_error("lambda", args)),
            },
            SpecialForm::Begin => self.eval_sequence(args, env),
            SpecialForm::Let => self.eval_let(args, env),
            SpecialForm::LetStar => match args {
                [Value::List(bindings), body @ ..] => {
                    let frame = env.child();
                    for (name, expr) in parse_bindings("let*", bindings)? {
                        let value = self.eval(expr, &frame)?;
                        frame.define(name, value);
                    }
                    self.eval_sequence(body, &frame)
                }
                _ => Err(syntax_error("let*", args)),
            },
            SpecialForm::And => match args.split_last() {
                None => Ok(Step::Done(Value::Bool(true))),
                Some((last, init)) => {
                    for expr in init {
                        let value = self.eval(expr, env)?;
                        if !value.is_true() {
                            return Ok(Step::Done(value));
                        }
                    }
                    Ok(Step::Tail(last.clone(), env.clone()))
                }
            },
            SpecialForm::Or => match args.split_last() {
                None => Ok(Step::Done(Value::Bool(false))),
                Some((last, init)) => {
                    for expr in init {
                        let value = self.eval(expr, env)?;
                        if value.is_true() {
                            return Ok(Step::Done(value));
                        }
                    }
                    Ok(Step::Tail(last.clone(), env.clone()))
                }
            },
            SpecialForm::Cond => {
                for clause in args {
                    let Some([test, body @ ..]) = clause.as_list() else {
                        return Err(syntax_error("cond", args));
                    };
                    if test.as_symbol() == Some("else") {
                        return self.eval_sequence(body, env);
                    }
                    let value = self.eval(test, env)?;
                    if value.is_true() {
                        if body.is_empty() {
                            return Ok(Step::Done(value));
                        }
                        return self.eval_sequence(body, env);
                    }
                }
                Ok(Step::Done(Value::Unspecified))
            }
            SpecialForm::When | SpecialForm::Unless => match args {
                [test, body @ ..] => {
                    let wanted = matches!(form, SpecialForm::When);
                    if self.eval(test, env)?.is_true() == wanted {
                        self.eval_sequence(body, env)
                    } else {
                        Ok(Step::Done(Value::Unspecified))
                    }
                }
                _ => {
                    let name = if matches!(form, SpecialForm::When) {
                        "when"
                    } else {
                        "unless"
                    };
                    Err(syntax_error(name, args))
                }
            },
            SpecialForm::CondExpand => {
                for clause in args {
                    let Some([requirement, body @ ..]) = clause.as_list() else {
                        return Err(syntax_error("cond-expand", args));
                    };
                    if self.feature_matches(requirement)? {
                        return self.eval_sequence(body, env);
                    }
                }
                Err(Condition::error("unfulfilled cond-expand"))
            }
        }
    }

    fn eval_define(
        &mut self,
        args: &[Value],
        env: &Env,
    ) -> RuntimeResult<Step> {
        match args {
            [Value::Symbol(name)] => {
                env.define(name.clone(), Value::Unspecified);
                Ok(Step::Done(Value::Symbol(name.clone())))
            }
            [Value::Symbol(name), expr] => {
                let value = match expr.as_list() {
                    Some([head, params, body @ ..])
                        if head.as_symbol() == Some("lambda") && !body.is_empty() =>
                    {
                        Value::Lambda(Rc::new(make_lambda(Some(name.clone()), params, body, env)?))
                    }
                    _ => self.eval(expr, env)?,
                };
                env.define(name.clone(), value);
                Ok(Step::Done(Value::Symbol(name.clone())))
            }
            [Value::List(signature), body @ ..] if !body.is_empty() => match &signature[..] {
                [Value::Symbol(name), params @ ..] => {
                    let params = Value::list(params.to_vec());
                    let lambda = make_lambda(Some(name.clone()), &params, body, env)?;
                    env.define(name.clone(), Value::Lambda(Rc::new(lambda)));
                    Ok(Step::Done(Value::Symbol(name.clone())))
                }
                _ => Err(syntax_error("define", args)),
            },
            _ => Err(syntax_error("define", args)),
        }
    }

    fn eval_let(
        &mut self,
        args: &[Value],
        env: &Env,
    ) -> RuntimeResult<Step> {
        match args {
            // named let
            [Value::Symbol(name), Value::List(bindings), body @ ..] if !body.is_empty() => {
                let pairs = parse_bindings("let", bindings)?;
                let mut params = Vec::with_capacity(pairs.len());
                let mut values = Vec::with_capacity(pairs.len());
                for (param, expr) in pairs {
                    params.push(param);
                    values.push(self.eval(expr, env)?);
                }
                let loop_env = env.child();
                let lambda = Lambda {
                    name: Some(name.clone()),
                    params,
                    rest: None,
                    body: Rc::from(body.to_vec()),
                    env: loop_env.clone(),
                };
                let procedure = Value::Lambda(Rc::new(lambda));
                loop_env.define(name.clone(), procedure.clone());
                self.enter(&procedure, values)
            }
            [Value::List(bindings), body @ ..] => {
                let frame = env.child();
                for (name, expr) in parse_bindings("let", bindings)? {
                    let value = self.eval(expr, env)?;
                    frame.define(name, value);
                }
                self.eval_sequence(body, &frame)
            }
            _ => Err(syntax_error("let", args)),
        }
    }

    fn feature_matches(
        &self,
        requirement: &Value,
    ) -> RuntimeResult<bool> {
        match requirement {
            Value::Symbol(name) if &**name == "else" => Ok(true),
            Value::Symbol(name) => Ok(self.features.contains(&**name)),
            Value::List(items) => match &items[..] {
                [Value::Symbol(op), rest @ ..] if &**op == "and" => {
                    for r in rest {
                        if !self.feature_matches(r)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                [Value::Symbol(op), rest @ ..] if &**op == "or" => {
                    for r in rest {
                        if self.feature_matches(r)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                [Value::Symbol(op), inner] if &**op == "not" => Ok(!self.feature_matches(inner)?),
                _ => Err(Condition::error(format!(
                    "invalid cond-expand feature requirement: {}",
                    requirement.written()
                ))),
            },
            other => Err(Condition::error(format!(
                "invalid cond-expand feature requirement: {}",
                other.written()
            ))),
        }
    }
}

fn parse_bindings<'a>(
    form: &str,
    bindings: &'a [Value],
) -> RuntimeResult<Vec<(Rc<str>, &'a Value)>> {
    bindings
        .iter()
        .map(|binding| match binding.as_list() {
            Some([Value::Symbol(name), expr]) => Ok((name.clone(), expr)),
            _ => Err(Condition::error(format!(
                "syntax-error: malformed binding in {}: {}",
                form,
                binding.written()
            ))),
        })
        .collect()
}

fn make_lambda(
    name: Option<Rc<str>>,
    params: &Value,
    body: &[Value],
    env: &Env,
) -> RuntimeResult<Lambda> {
    let (params, rest) = match params {
        Value::Symbol(all) => (Vec::new(), Some(all.clone())),
        Value::List(items) => {
            let mut names: Vec<Rc<str>> = Vec::with_capacity(items.len());
            for item in items.iter() {
                match item {
                    Value::Symbol(param) if !names.contains(param) => names.push(param.clone()),
                    Value::Symbol(param) => {
                        return Err(Condition::error(format!(
                            "duplicate parameter name: {}",
                            param
                        )));
                    }
                    other => {
                        return Err(Condition::error(format!(
                            "invalid parameter: {}",
                            other.written()
                        )));
                    }
                }
            }
            (names, None)
        }
        other => {
            return Err(Condition::error(format!(
                "invalid parameter list: {}",
                other.written()
            )));
        }
    };
    Ok(Lambda {
        name,
        params,
        rest,
        body: Rc::from(body.to_vec()),
        env: env.clone(),
    })
}

fn bind_arguments(
    lambda: &Lambda,
    args: Vec<Value>,
) -> RuntimeResult<Env> {
    let required = lambda.params.len();
    let arity_ok = match lambda.rest {
        Some(_) => args.len() >= required,
        None => args.len() == required,
    };
    if !arity_ok {
        return Err(Condition::error(format!(
            "wrong number of arguments for {} (required {}, got {})",
            lambda.display_name(),
            required,
            args.len()
        )));
    }

    let frame = lambda.env.child();
    let mut args = args.into_iter();
    for param in &lambda.params {
        if let Some(arg) = args.next() {
            frame.define(param.clone(), arg);
        }
    }
    if let Some(rest) = &lambda.rest {
        frame.define(rest.clone(), Value::list(args.collect()));
    }
    Ok(frame)
}
