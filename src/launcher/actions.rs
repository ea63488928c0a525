//! Deferred actions and their replay
//!
//! `-I -A -u -l -L -e -E` are not performed while the command line is
//! scanned. They are recorded in command-line order and replayed against the
//! runtime once the runtime is configured. The first failure stops the replay.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::runtime::{Condition, LoadPathPosition, MissingFile, Runtime, RuntimeResult};

/// What a deferred action does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// `-I`: prepend to the load path
    AddLoadPathFront,
    /// `-A`: append to the load path
    AddLoadPathBack,
    /// `-u`: require and import a module by dotted name
    Require,
    /// `-l`: load a file, failing if it is missing
    LoadFile,
    /// `-L`: load a file if it exists
    LoadFileOptional,
    /// `-e`: evaluate an expression
    EvalExpr,
    /// `-E`: evaluate an expression wrapped in parentheses
    EvalExprParenWrapped,
}

impl ActionKind {
    /// The command-line flag that produces this kind
    pub fn flag(self) -> char {
        match self {
            ActionKind::AddLoadPathFront => 'I',
            ActionKind::AddLoadPathBack => 'A',
            ActionKind::Require => 'u',
            ActionKind::LoadFile => 'l',
            ActionKind::LoadFileOptional => 'L',
            ActionKind::EvalExpr => 'e',
            ActionKind::EvalExprParenWrapped => 'E',
        }
    }
}

/// A command-line directive performed during bootstrap replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredAction {
    kind: ActionKind,
    argument: String,
}

impl DeferredAction {
    pub fn new(
        kind: ActionKind,
        argument: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            argument: argument.into(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn argument(&self) -> &str {
        &self.argument
    }

    /// Perform this action against `runtime`
    pub fn perform<R: Runtime>(
        &self,
        runtime: &mut R,
    ) -> RuntimeResult<()> {
        let arg = self.argument.as_str();
        match self.kind {
            ActionKind::AddLoadPathFront => runtime.add_load_path(arg, LoadPathPosition::Front),
            ActionKind::AddLoadPathBack => runtime.add_load_path(arg, LoadPathPosition::Back),
            ActionKind::Require => {
                runtime.require(&module_to_feature(arg))?;
                runtime.import_module(arg)
            }
            ActionKind::LoadFile => runtime.load(arg, MissingFile::Error),
            ActionKind::LoadFileOptional => runtime.load(arg, MissingFile::Ignore),
            ActionKind::EvalExpr => runtime.eval_string(arg),
            ActionKind::EvalExprParenWrapped => runtime.eval_string(&format!("({})", arg)),
        }
    }
}

impl fmt::Display for DeferredAction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "-{}{}", self.kind.flag(), self.argument)
    }
}

/// `a.b.c` becomes `a/b/c`
pub fn module_to_feature(module: &str) -> String {
    module.split('.').collect::<Vec<_>>().join("/")
}

/// A deferred action failed; nothing after it ran
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{condition}")]
pub struct ReplayError {
    pub action: DeferredAction,
    pub condition: Condition,
}

/// Perform `actions` in order, stopping at the first failure
pub fn replay<R: Runtime>(
    runtime: &mut R,
    actions: Vec<DeferredAction>,
) -> Result<(), ReplayError> {
    for action in actions {
        debug!("replaying {}", action);
        if let Err(condition) = action.perform(runtime) {
            return Err(ReplayError { action, condition });
        }
    }
    Ok(())
}
