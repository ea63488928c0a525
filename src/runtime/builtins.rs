//! Built-in procedures
//!
//! Procedures are registered in static tables with their arity; the
//! evaluator checks the argument count before calling into the table.
//! Arithmetic is on `i64` and reports overflow instead of wrapping.
//!
//! Special forms (`if`, `define`, ...) live in the evaluator, not here.

use std::rc::Rc;

use crate::runtime::eval::Machine;
use crate::runtime::value::{is_eq, Value};
use crate::runtime::{Condition, RuntimeResult};

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive range
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(
        &self,
        count: usize,
    ) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(min, max) => (min..=max).contains(&count),
        }
    }

    pub fn check(
        &self,
        name: &str,
        count: usize,
    ) -> RuntimeResult<()> {
        if self.accepts(count) {
            return Ok(());
        }
        let required = match *self {
            Arity::Exact(n) => n.to_string(),
            Arity::AtLeast(n) => format!("at least {}", n),
            Arity::Range(min, max) => format!("{} to {}", min, max),
        };
        Err(Condition::error(format!(
            "wrong number of arguments for {} (required {}, got {})",
            name, required, count
        )))
    }
}

pub type BuiltinFn = fn(&mut Machine, &[Value]) -> RuntimeResult<Value>;

/// A procedure implemented in Rust
pub struct Builtin {
    pub name: &'static str,
    pub arity: Arity,
    pub func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "#<subr {}>", self.name)
    }
}

macro_rules! builtin {
    ($name:expr, $arity:expr, $func:expr) => {
        Builtin {
            name: $name,
            arity: $arity,
            func: $func,
        }
    };
}

/// Procedures bound in every namespace
pub static BUILTINS: &[Builtin] = &[
    // numbers
    builtin!("+", Arity::AtLeast(0), add),
    builtin!("-", Arity::AtLeast(1), sub),
    builtin!("*", Arity::AtLeast(0), mul),
    builtin!("quotient", Arity::Exact(2), quotient),
    builtin!("remainder", Arity::Exact(2), remainder),
    builtin!("modulo", Arity::Exact(2), modulo),
    builtin!("abs", Arity::Exact(1), abs),
    builtin!("=", Arity::AtLeast(1), num_eq),
    builtin!("<", Arity::AtLeast(1), num_lt),
    builtin!(">", Arity::AtLeast(1), num_gt),
    builtin!("<=", Arity::AtLeast(1), num_le),
    builtin!(">=", Arity::AtLeast(1), num_ge),
    builtin!("zero?", Arity::Exact(1), is_zero),
    // predicates
    builtin!("not", Arity::Exact(1), not),
    builtin!("eq?", Arity::Exact(2), eq),
    builtin!("eqv?", Arity::Exact(2), eq),
    builtin!("equal?", Arity::Exact(2), equal),
    builtin!("null?", Arity::Exact(1), is_null),
    builtin!("pair?", Arity::Exact(1), is_pair),
    builtin!("list?", Arity::Exact(1), is_list),
    builtin!("number?", Arity::Exact(1), is_integer),
    builtin!("integer?", Arity::Exact(1), is_integer),
    builtin!("string?", Arity::Exact(1), is_string),
    builtin!("symbol?", Arity::Exact(1), is_symbol),
    builtin!("boolean?", Arity::Exact(1), is_boolean),
    builtin!("procedure?", Arity::Exact(1), is_procedure),
    // lists
    builtin!("list", Arity::AtLeast(0), list),
    builtin!("cons", Arity::Exact(2), cons),
    builtin!("car", Arity::Exact(1), car),
    builtin!("cdr", Arity::Exact(1), cdr),
    builtin!("cadr", Arity::Exact(1), cadr),
    builtin!("length", Arity::Exact(1), length),
    builtin!("append", Arity::AtLeast(0), append),
    builtin!("reverse", Arity::Exact(1), reverse),
    builtin!("list-ref", Arity::Exact(2), list_ref),
    // control
    builtin!("apply", Arity::AtLeast(2), apply),
    builtin!("map", Arity::AtLeast(2), map),
    builtin!("for-each", Arity::AtLeast(2), for_each),
    builtin!("error", Arity::AtLeast(1), error),
    // output
    builtin!("display", Arity::Exact(1), display),
    builtin!("write", Arity::Exact(1), write),
    builtin!("newline", Arity::Exact(0), newline),
    builtin!("print", Arity::AtLeast(0), print),
    // strings and symbols
    builtin!("string-append", Arity::AtLeast(0), string_append),
    builtin!("string-length", Arity::Exact(1), string_length),
    builtin!("number->string", Arity::Exact(1), number_to_string),
    builtin!("string->number", Arity::Exact(1), string_to_number),
    builtin!("symbol->string", Arity::Exact(1), symbol_to_string),
    builtin!("string->symbol", Arity::Exact(1), string_to_symbol),
    // system
    builtin!("features", Arity::Exact(0), features),
];

/// Exports of the `gosh.interactive` module
pub static INTERACTIVE_BUILTINS: &[Builtin] = &[builtin!("apropos", Arity::Exact(1), apropos)];

/// Exports of the `gosh.vm.profiler` module
pub static PROFILER_BUILTINS: &[Builtin] =
    &[builtin!("profiler-show", Arity::Exact(0), profiler_show)];

/// Modules provided without a source file: (feature, module name, exports)
pub static BUILTIN_MODULES: &[(&str, &str, &[Builtin])] = &[
    ("gosh/interactive", "gosh.interactive", INTERACTIVE_BUILTINS),
    ("gosh/vm/profiler", "gosh.vm.profiler", PROFILER_BUILTINS),
];

pub fn lookup_builtin_module(feature: &str) -> Option<(&'static str, &'static [Builtin])> {
    BUILTIN_MODULES
        .iter()
        .find(|(name, _, _)| *name == feature)
        .map(|(_, module, exports)| (*module, *exports))
}

fn type_error(
    name: &str,
    expected: &str,
    got: &Value,
) -> Condition {
    Condition::error(format!(
        "{} required, but got {} (in {})",
        expected,
        got.written(),
        name
    ))
}

fn expect_int(
    name: &str,
    value: &Value,
) -> RuntimeResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(type_error(name, "integer", other)),
    }
}

fn expect_list<'a>(
    name: &str,
    value: &'a Value,
) -> RuntimeResult<&'a [Value]> {
    value.as_list().ok_or_else(|| type_error(name, "list", value))
}

fn expect_pair<'a>(
    name: &str,
    value: &'a Value,
) -> RuntimeResult<&'a [Value]> {
    match value.as_list() {
        Some(items) if !items.is_empty() => Ok(items),
        _ => Err(type_error(name, "pair", value)),
    }
}

fn expect_str<'a>(
    name: &str,
    value: &'a Value,
) -> RuntimeResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(name, "string", other)),
    }
}

fn overflow(name: &str) -> Condition {
    Condition::error(format!("integer overflow in {}", name))
}

fn add(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut sum: i64 = 0;
    for arg in args {
        sum = sum
            .checked_add(expect_int("+", arg)?)
            .ok_or_else(|| overflow("+"))?;
    }
    Ok(Value::Int(sum))
}

fn sub(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let first = expect_int("-", &args[0])?;
    if args.len() == 1 {
        return first.checked_neg().map(Value::Int).ok_or_else(|| overflow("-"));
    }
    let mut acc = first;
    for arg in &args[1..] {
        acc = acc
            .checked_sub(expect_int("-", arg)?)
            .ok_or_else(|| overflow("-"))?;
    }
    Ok(Value::Int(acc))
}

fn mul(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut product: i64 = 1;
    for arg in args {
        product = product
            .checked_mul(expect_int("*", arg)?)
            .ok_or_else(|| overflow("*"))?;
    }
    Ok(Value::Int(product))
}

fn divisor(
    name: &str,
    args: &[Value],
) -> RuntimeResult<(i64, i64)> {
    let n = expect_int(name, &args[0])?;
    let d = expect_int(name, &args[1])?;
    if d == 0 {
        return Err(Condition::error(format!("attempt to divide by zero (in {})", name)));
    }
    Ok((n, d))
}

fn quotient(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let (n, d) = divisor("quotient", args)?;
    n.checked_div(d)
        .map(Value::Int)
        .ok_or_else(|| overflow("quotient"))
}

fn remainder(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let (n, d) = divisor("remainder", args)?;
    n.checked_rem(d)
        .map(Value::Int)
        .ok_or_else(|| overflow("remainder"))
}

fn modulo(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let (n, d) = divisor("modulo", args)?;
    let r = n.checked_rem(d).ok_or_else(|| overflow("modulo"))?;
    // result takes the sign of the divisor
    if r != 0 && (r < 0) != (d < 0) {
        Ok(Value::Int(r + d))
    } else {
        Ok(Value::Int(r))
    }
}

fn abs(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    expect_int("abs", &args[0])?
        .checked_abs()
        .map(Value::Int)
        .ok_or_else(|| overflow("abs"))
}

fn compare_chain(
    name: &str,
    args: &[Value],
    holds: fn(i64, i64) -> bool,
) -> RuntimeResult<Value> {
    let numbers = args
        .iter()
        .map(|arg| expect_int(name, arg))
        .collect::<RuntimeResult<Vec<_>>>()?;
    Ok(Value::Bool(numbers.windows(2).all(|w| holds(w[0], w[1]))))
}

fn num_eq(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    compare_chain("=", args, |a, b| a == b)
}

fn num_lt(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    compare_chain("<", args, |a, b| a < b)
}

fn num_gt(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    compare_chain(">", args, |a, b| a > b)
}

fn num_le(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    compare_chain("<=", args, |a, b| a <= b)
}

fn num_ge(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    compare_chain(">=", args, |a, b| a >= b)
}

fn is_zero(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(expect_int("zero?", &args[0])? == 0))
}

fn not(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(!args[0].is_true()))
}

fn eq(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(is_eq(&args[0], &args[1])))
}

fn equal(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(args[0] == args[1]))
}

fn is_null(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(args[0].is_nil()))
}

fn is_pair(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(&args[0], Value::List(items) if !items.is_empty())))
}

fn is_list(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::List(_))))
}

fn is_integer(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}

fn is_string(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Str(_))))
}

fn is_symbol(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn is_boolean(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn is_procedure(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::Bool(args[0].is_procedure()))
}

fn list(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::list(args.to_vec()))
}

fn cons(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let tail = match args[1].as_list() {
        Some(tail) => tail,
        None => {
            return Err(Condition::error(format!(
                "improper lists are not supported: (cons {} {})",
                args[0].written(),
                args[1].written()
            )));
        }
    };
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(args[0].clone());
    items.extend_from_slice(tail);
    Ok(Value::list(items))
}

fn car(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(expect_pair("car", &args[0])?[0].clone())
}

fn cdr(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::list(expect_pair("cdr", &args[0])?[1..].to_vec()))
}

fn cadr(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    match expect_pair("cadr", &args[0])?.get(1) {
        Some(second) => Ok(second.clone()),
        None => Err(type_error("cadr", "list of at least two elements", &args[0])),
    }
}

fn length(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let len = expect_list("length", &args[0])?.len();
    Ok(Value::Int(len as i64))
}

fn append(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut items = Vec::new();
    for arg in args {
        items.extend_from_slice(expect_list("append", arg)?);
    }
    Ok(Value::list(items))
}

fn reverse(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut items = expect_list("reverse", &args[0])?.to_vec();
    items.reverse();
    Ok(Value::list(items))
}

fn list_ref(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let items = expect_list("list-ref", &args[0])?;
    let k = expect_int("list-ref", &args[1])?;
    usize::try_from(k)
        .ok()
        .and_then(|k| items.get(k))
        .cloned()
        .ok_or_else(|| Condition::error(format!("argument out of range: {} (in list-ref)", k)))
}

fn apply(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let (last, init) = match args[1..].split_last() {
        Some(parts) => parts,
        None => return Err(Condition::error("apply requires an argument list")),
    };
    let mut call_args = init.to_vec();
    call_args.extend_from_slice(expect_list("apply", last)?);
    machine.apply(&args[0], call_args)
}

/// Rows of arguments for `map`/`for-each`, stopping at the shortest list
fn zip_lists(
    name: &str,
    lists: &[Value],
) -> RuntimeResult<Vec<Vec<Value>>> {
    let lists = lists
        .iter()
        .map(|l| expect_list(name, l))
        .collect::<RuntimeResult<Vec<_>>>()?;
    let shortest = lists.iter().map(|l| l.len()).min().unwrap_or(0);
    Ok((0..shortest)
        .map(|i| lists.iter().map(|l| l[i].clone()).collect())
        .collect())
}

fn map(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let results = zip_lists("map", &args[1..])?
        .into_iter()
        .map(|row| machine.apply(&args[0], row))
        .collect::<RuntimeResult<Vec<_>>>()?;
    Ok(Value::list(results))
}

fn for_each(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    for row in zip_lists("for-each", &args[1..])? {
        machine.apply(&args[0], row)?;
    }
    Ok(Value::Unspecified)
}

fn error(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut message = args[0].to_string();
    for irritant in &args[1..] {
        message.push(' ');
        message.push_str(&irritant.written().to_string());
    }
    Err(Condition::error(message))
}

fn display(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    machine.write_output(&args[0].to_string())?;
    Ok(Value::Unspecified)
}

fn write(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    machine.write_output(&args[0].written().to_string())?;
    Ok(Value::Unspecified)
}

fn newline(
    machine: &mut Machine,
    _: &[Value],
) -> RuntimeResult<Value> {
    machine.write_output("\n")?;
    Ok(Value::Unspecified)
}

fn print(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut line: String = args.iter().map(|a| a.to_string()).collect();
    line.push('\n');
    machine.write_output(&line)?;
    Ok(Value::Unspecified)
}

fn string_append(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(expect_str("string-append", arg)?);
    }
    Ok(Value::string(&out))
}

fn string_length(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let len = expect_str("string-length", &args[0])?.chars().count();
    Ok(Value::Int(len as i64))
}

fn number_to_string(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::string(&expect_int("number->string", &args[0])?.to_string()))
}

fn string_to_number(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let text = expect_str("string->number", &args[0])?;
    Ok(text.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Bool(false)))
}

fn symbol_to_string(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    match &args[0] {
        Value::Symbol(name) => Ok(Value::Str(name.clone())),
        other => Err(type_error("symbol->string", "symbol", other)),
    }
}

fn string_to_symbol(
    _: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let name = expect_str("string->symbol", &args[0])?;
    Ok(Value::Symbol(Rc::from(name)))
}

fn features(
    machine: &mut Machine,
    _: &[Value],
) -> RuntimeResult<Value> {
    Ok(Value::list(machine.features.iter().map(|f| Value::symbol(f)).collect()))
}

fn apropos(
    machine: &mut Machine,
    args: &[Value],
) -> RuntimeResult<Value> {
    let pattern = match &args[0] {
        Value::Str(s) | Value::Symbol(s) => s.clone(),
        other => return Err(type_error("apropos", "string or symbol", other)),
    };
    let mut out = String::new();
    for name in machine.namespace.visible_names() {
        if name.contains(&*pattern) {
            out.push_str(&name);
            out.push('\n');
        }
    }
    machine.write_output(&out)?;
    Ok(Value::Unspecified)
}

fn profiler_show(
    machine: &mut Machine,
    _: &[Value],
) -> RuntimeResult<Value> {
    let report = match &machine.profiler {
        Some(profiler) => profiler.report(),
        None => "No profiling data has been gathered.\n".to_string(),
    };
    machine.write_output(&report)?;
    Ok(Value::Unspecified)
}
