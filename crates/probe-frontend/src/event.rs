//! Task lifecycle events, the listener slot and plugins.

use std::fmt;
use std::sync::Arc;

use crate::ast::UnitTree;
use crate::diagnostic::Log;
use crate::error::{FrontendError, FrontendResult};
use crate::options::Options;
use crate::symbols::TypeSymbol;

/// Phase a [`TaskEvent`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    /// A unit is being parsed. `unit` is set on `finished` when parsing
    /// succeeded.
    Parse,
    /// A parsed unit is entered into the symbol table.
    Enter,
    /// A top-level type is attributed and checked.
    Analyze,
    /// Artifacts for a top-level type and its nested types are written.
    Generate,
}

impl fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Enter => write!(f, "enter"),
            Self::Analyze => write!(f, "analyze"),
            Self::Generate => write!(f, "generate"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    /// Name of the compilation unit the event is about.
    pub source_name: String,
    pub unit: Option<Arc<UnitTree>>,
    /// Set for `Analyze` and `Generate`.
    pub type_symbol: Option<TypeSymbol>,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, source_name: impl Into<String>) -> Self {
        Self {
            kind,
            source_name: source_name.into(),
            unit: None,
            type_symbol: None,
        }
    }

    pub fn with_unit(mut self, unit: Arc<UnitTree>) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_type(mut self, symbol: TypeSymbol) -> Self {
        self.type_symbol = Some(symbol);
        self
    }
}

/// Observer of task phases. Listeners may report diagnostics through the
/// task's [`Log`].
pub trait TaskListener: Send {
    fn started(&mut self, _event: &TaskEvent, _log: &mut Log<'_>) {}

    fn finished(&mut self, _event: &TaskEvent, _log: &mut Log<'_>) {}
}

/// Per-task state handed to plugins during initialisation.
///
/// The task owns exactly one listener slot. Components that want to
/// observe events alongside an existing listener must take it out and put
/// back a composite.
pub struct Context {
    options: Options,
    task_listener: Option<Box<dyn TaskListener>>,
}

impl Context {
    pub(crate) fn new(options: Options, task_listener: Option<Box<dyn TaskListener>>) -> Self {
        Self {
            options,
            task_listener,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn has_task_listener(&self) -> bool {
        self.task_listener.is_some()
    }

    /// Remove and return the current listener, leaving the slot empty.
    pub fn take_task_listener(&mut self) -> Option<Box<dyn TaskListener>> {
        self.task_listener.take()
    }

    /// Fill the empty slot. Fails if a listener is already installed.
    pub fn put_task_listener(&mut self, listener: Box<dyn TaskListener>) -> FrontendResult<()> {
        if self.task_listener.is_some() {
            return Err(FrontendError::DuplicateListener);
        }
        self.task_listener = Some(listener);
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Options, Option<Box<dyn TaskListener>>) {
        (self.options, self.task_listener)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.options)
            .field("task_listener", &self.task_listener.is_some())
            .finish()
    }
}

/// Component initialised by every task before it runs.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn init(&self, cx: &mut Context) -> FrontendResult<()>;
}
