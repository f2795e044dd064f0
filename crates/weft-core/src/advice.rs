//! Advice: prioritized callbacks bound to lifecycle phases of a named
//! invocation.

use std::fmt;
use std::sync::Arc;

use crate::context::InvocationContext;

/// Error produced by an advice handler.
///
/// Handlers are arbitrary user code, so the error is an opaque boxed value.
/// What the engine does with it depends on the phase: Before/Around errors
/// become faults, observer-phase errors are discarded.
pub type AdviceError = Box<dyn std::error::Error + Send + Sync>;

/// Handler capability: receives the invocation context and may mutate it.
pub type AdviceHandler =
    Arc<dyn Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync>;

/// Lifecycle phase of a named invocation. Closed set; never extended at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs before the target. A handler error here is a fatal
    /// configuration fault.
    Before,
    /// Always runs as the final step of a guarded invocation, on every
    /// path including abnormal termination. Observation only.
    After,
    /// Wraps the target and may skip it via the context's skip flag. A
    /// handler error here is a fatal configuration fault.
    Around,
    /// Runs only when the invocation completes with no error and no fault.
    AfterReturning,
    /// Runs only when the invocation terminates abnormally, after the
    /// fault payload has been captured into the context.
    AfterThrowing,
}

impl Phase {
    /// All phases, in bucket order.
    pub const ALL: [Phase; 5] = [
        Phase::Before,
        Phase::After,
        Phase::Around,
        Phase::AfterReturning,
        Phase::AfterThrowing,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Before => "before",
            Phase::After => "after",
            Phase::Around => "around",
            Phase::AfterReturning => "after-returning",
            Phase::AfterThrowing => "after-throwing",
        };
        f.write_str(name)
    }
}

/// A prioritized callback bound to one lifecycle phase of a named
/// operation.
///
/// Immutable once constructed; cheap to clone (the handler is shared).
/// Within a phase, higher priority runs first and equal priorities run in
/// registration order.
#[derive(Clone)]
pub struct Advice {
    phase: Phase,
    priority: i32,
    handler: AdviceHandler,
}

impl Advice {
    /// Create advice for an explicit phase.
    pub fn new<F>(phase: Phase, priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self {
            phase,
            priority,
            handler: Arc::new(handler),
        }
    }

    /// Before advice: runs before the target.
    pub fn before<F>(priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::new(Phase::Before, priority, handler)
    }

    /// After advice: always runs as the terminal step.
    pub fn after<F>(priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::new(Phase::After, priority, handler)
    }

    /// Around advice: wraps the target and may skip it.
    pub fn around<F>(priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::new(Phase::Around, priority, handler)
    }

    /// AfterReturning advice: runs only on error-free completion.
    pub fn after_returning<F>(priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::new(Phase::AfterReturning, priority, handler)
    }

    /// AfterThrowing advice: runs only on abnormal termination.
    pub fn after_throwing<F>(priority: i32, handler: F) -> Self
    where
        F: Fn(&mut InvocationContext) -> Result<(), AdviceError> + Send + Sync + 'static,
    {
        Self::new(Phase::AfterThrowing, priority, handler)
    }

    /// Phase this advice is bound to.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Priority; higher runs first within a phase.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn run(&self, ctx: &mut InvocationContext) -> Result<(), AdviceError> {
        (self.handler)(ctx)
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
