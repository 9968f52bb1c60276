use super::{ExceptionHandler, ValueStack};
use crate::bytecode::Method;
use std::fmt;

/// Handle to a scope in an [`IrGraph`](super::IrGraph)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ScopeId(pub(crate) usize);

impl fmt::Debug for ScopeId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("s{}", self.0))
    }
}

/// One method activation in the graph: the method being compiled, or a method inlined into it
#[derive(Debug)]
pub struct IrScope<'a> {
    pub method: &'a Method,

    /// Scope this one was inlined into
    pub caller: Option<ScopeId>,

    /// State of the caller at the invoke being inlined
    pub caller_state: Option<ValueStack>,

    /// Inlining depth (0 for the method being compiled)
    pub level: usize,

    /// `None` until the scope declares a handler
    exception_handlers: Option<Vec<ExceptionHandler>>,
}

impl<'a> IrScope<'a> {
    /// Scope for the method being compiled
    pub fn root(method: &'a Method) -> IrScope<'a> {
        IrScope {
            method,
            caller: None,
            caller_state: None,
            level: 0,
            exception_handlers: None,
        }
    }

    /// Scope for `method` inlined into `caller` (at depth `caller_level + 1`)
    pub fn inlined(
        method: &'a Method,
        caller: ScopeId,
        caller_level: usize,
        caller_state: ValueStack,
    ) -> IrScope<'a> {
        IrScope {
            method,
            caller: Some(caller),
            caller_state: Some(caller_state),
            level: caller_level + 1,
            exception_handlers: None,
        }
    }

    /// Handlers declared in this scope (`None` if there are none)
    pub fn exception_handlers(&self) -> Option<&[ExceptionHandler]> {
        self.exception_handlers.as_deref()
    }

    pub fn add_exception_handler(&mut self, handler: ExceptionHandler) {
        self.exception_handlers
            .get_or_insert_with(Vec::new)
            .push(handler);
    }

    pub fn caller_stack_size(&self) -> usize {
        self.caller_state
            .as_ref()
            .map_or(0, |state| state.stack_size())
    }
}

impl<'a> fmt::Display for IrScope<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.method.name, self.level)
    }
}
