//! Values and environments of the reference runtime

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::runtime::builtins::Builtin;

/// A runtime value
///
/// Lists are proper lists backed by a shared slice; the empty list is `'()`.
/// Strings are immutable.
#[derive(Clone)]
pub enum Value {
    /// Result of forms that have no useful value (`define`, `display`, ...)
    Unspecified,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Symbol(Rc<str>),
    List(Rc<[Value]>),
    Lambda(Rc<Lambda>),
    Builtin(&'static Builtin),
}

/// A user defined procedure
pub struct Lambda {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    /// Parameter collecting the remaining arguments, if any
    pub rest: Option<Rc<str>>,
    /// Never empty
    pub body: Rc<[Value]>,
    pub env: Env,
}

impl Lambda {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("#<closure>")
    }
}

impl Value {
    pub fn nil() -> Self {
        Value::List(Rc::from(Vec::new()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::from(items))
    }

    pub fn string(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn symbol(s: &str) -> Self {
        Value::Symbol(Rc::from(s))
    }

    /// Everything except `#f` counts as true
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Builtin(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(items) if items.is_empty())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unspecified => "<undef>",
            Value::Bool(_) => "<boolean>",
            Value::Int(_) => "<integer>",
            Value::Str(_) => "<string>",
            Value::Symbol(_) => "<symbol>",
            Value::List(items) if items.is_empty() => "<null>",
            Value::List(_) => "<pair>",
            Value::Lambda(_) | Value::Builtin(_) => "<procedure>",
        }
    }

    /// Wrapper displaying the value in `write` notation
    pub fn written(&self) -> Written<'_> {
        Written(self)
    }
}

/// `eq?`: identity for heap values, value equality for immediates
pub fn is_eq(
    a: &Value,
    b: &Value,
) -> bool {
    match (a, b) {
        (Value::Unspecified, Value::Unspecified) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y),
        (Value::List(x), Value::List(y)) => (x.is_empty() && y.is_empty()) || Rc::ptr_eq(x, y),
        (Value::Lambda(x), Value::Lambda(y)) => Rc::ptr_eq(x, y),
        (Value::Builtin(x), Value::Builtin(y)) => std::ptr::eq(*x, *y),
        _ => false,
    }
}

/// `equal?` semantics
impl PartialEq for Value {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        match (self, other) {
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::List(x), Value::List(y)) => x == y,
            _ => is_eq(self, other),
        }
    }
}

fn write_items(
    f: &mut fmt::Formatter<'_>,
    items: &[Value],
    written: bool,
) -> fmt::Result {
    write!(f, "(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        if written {
            write!(f, "{}", item.written())?;
        } else {
            write!(f, "{}", item)?;
        }
    }
    write!(f, ")")
}

/// `display` notation
impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => write_items(f, items, false),
            other => write!(f, "{}", other.written()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.written())
    }
}

/// `write` notation
pub struct Written<'a>(&'a Value);

impl fmt::Display for Written<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.0 {
            Value::Unspecified => write!(f, "#<undef>"),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Value::Symbol(name) => write!(f, "{}", name),
            Value::List(items) => {
                if let [Value::Symbol(head), quoted] = &items[..] {
                    if &**head == "quote" {
                        return write!(f, "'{}", quoted.written());
                    }
                }
                write_items(f, items, true)
            }
            Value::Lambda(lambda) => write!(f, "#<closure {}>", lambda.display_name()),
            Value::Builtin(builtin) => write!(f, "#<subr {}>", builtin.name),
        }
    }
}

/// A chain of binding frames
///
/// Closures keep their defining environment alive; cycles between a frame and
/// the closures stored in it are never collected.
#[derive(Clone)]
pub struct Env(Rc<RefCell<Frame>>);

struct Frame {
    vars: HashMap<Rc<str>, Value>,
    parent: Option<Env>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(RefCell::new(Frame {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(Frame {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Bind `name` in this frame, shadowing outer bindings
    pub fn define(
        &self,
        name: impl Into<Rc<str>>,
        value: Value,
    ) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    /// Assign an existing binding; returns false when `name` is unbound
    pub fn set(
        &self,
        name: &str,
        value: Value,
    ) -> bool {
        let mut current = self.clone();
        loop {
            let parent = {
                let mut frame = current.0.borrow_mut();
                if let Some(slot) = frame.vars.get_mut(name) {
                    *slot = value;
                    return true;
                }
                frame.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let parent = {
                let frame = current.0.borrow();
                if let Some(value) = frame.vars.get(name) {
                    return Some(value.clone());
                }
                frame.parent.clone()
            };
            current = parent?;
        }
    }

    /// Bindings of this frame only, sorted by name
    pub fn local_bindings(&self) -> Vec<(Rc<str>, Value)> {
        let mut bindings: Vec<_> = self
            .0
            .borrow()
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }

    /// Every name visible from this frame, sorted and deduplicated
    pub fn visible_names(&self) -> Vec<Rc<str>> {
        let mut names = Vec::new();
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let frame = env.0.borrow();
            names.extend(frame.vars.keys().cloned());
            current = frame.parent.clone();
        }
        names.sort();
        names.dedup();
        names
    }
}

impl fmt::Debug for Env {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#<env {} bindings>", self.0.borrow().vars.len())
    }
}
