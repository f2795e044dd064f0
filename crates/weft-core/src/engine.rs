//! The phase-execution protocol: drives registered advice around a target
//! invocation and decides how errors and faults propagate.
//!
//! Two failure channels exist and are never conflated:
//!
//! - a **normal function error** lives in the context's error slot, is
//!   handed back to the caller as a value, and only gates AfterReturning;
//! - a **fault** is an unwind — raised by the target itself, or converted
//!   from a Before/Around handler error — that is captured, shown to the
//!   AfterThrowing and After phases, and then re-raised unchanged.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::{trace, warn};

use crate::advice::{AdviceError, Phase};
use crate::chain::AdviceChain;
use crate::context::{BoxedValue, InvocationContext};
use crate::registry::{self, Registry};

/// Unwind payload raised when a Before or Around handler fails.
///
/// A handler error in those phases is a configuration fault, not a normal
/// function error: it aborts the invocation, flows through AfterThrowing
/// and After, and re-raises to the caller.
#[derive(Debug, Error)]
#[error("{phase} advice failed: {source}")]
pub struct PhaseFault {
    phase: Phase,
    source: AdviceError,
}

impl PhaseFault {
    fn new(phase: Phase, source: AdviceError) -> Self {
        Self { phase, source }
    }

    /// The phase whose handler failed.
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Run the full phase protocol for `name` around `target`.
///
/// The target closure is responsible for writing its results into the
/// context (slot 0 upward) and a normal error into the error slot. The
/// returned context carries the final result/error state.
///
/// An unregistered name takes the unguarded fast path: the target runs
/// directly, with no phases and no fault containment.
///
/// # Panics
///
/// Re-raises any fault (target panic, or Before/Around handler error
/// converted into a [`PhaseFault`] payload) after the AfterThrowing and
/// After phases have observed it. Faults are never swallowed.
pub fn invoke<F>(registry: &Registry, name: &str, args: Vec<BoxedValue>, target: F) -> InvocationContext
where
    F: FnOnce(&mut InvocationContext),
{
    let mut ctx = InvocationContext::new(name, args);

    let Ok(chain) = registry.chain(name) else {
        trace!(function = name, "no advice chain, direct invocation");
        target(&mut ctx);
        return ctx;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_guarded(&chain, &mut ctx, target)));
    match outcome {
        Ok(()) => {
            observe(&chain, Phase::After, &mut ctx);
            ctx
        }
        Err(payload) => {
            ctx.set_fault(payload);
            observe(&chain, Phase::AfterThrowing, &mut ctx);
            observe(&chain, Phase::After, &mut ctx);
            match ctx.take_fault() {
                Some(payload) => panic::resume_unwind(payload),
                // The fault slot is only drained here.
                None => unreachable!("fault payload drained during observer phases"),
            }
        }
    }
}

/// [`invoke`] against the process-wide default registry, resolved per call.
pub fn invoke_default<F>(name: &str, args: Vec<BoxedValue>, target: F) -> InvocationContext
where
    F: FnOnce(&mut InvocationContext),
{
    invoke(&registry::default_registry(), name, args, target)
}

/// Before → Around → skip decision → target → AfterReturning. Exits either
/// normally or by unwinding; AfterThrowing/After handling stays with the
/// caller.
fn run_guarded<F>(chain: &AdviceChain, ctx: &mut InvocationContext, target: F)
where
    F: FnOnce(&mut InvocationContext),
{
    trace!(
        function = ctx.function_name(),
        advice = chain.count(),
        "guarded invocation"
    );

    if let Err(err) = chain.execute_phase(Phase::Before, ctx) {
        panic::panic_any(PhaseFault::new(Phase::Before, err));
    }

    if chain.has_around() {
        if let Err(err) = chain.execute_phase(Phase::Around, ctx) {
            panic::panic_any(PhaseFault::new(Phase::Around, err));
        }
        if ctx.skipped() {
            trace!(function = ctx.function_name(), "target skipped by around advice");
            // Skip is not an error; Around may have supplied the result.
            if !ctx.has_error() && !ctx.has_fault() {
                observe(chain, Phase::AfterReturning, ctx);
            }
            return;
        }
    }

    target(ctx);

    if !ctx.has_error() && !ctx.has_fault() {
        observe(chain, Phase::AfterReturning, ctx);
    }
}

/// Run an observer phase. Handler errors here are computed but not
/// escalated; they surface only in the log.
fn observe(chain: &AdviceChain, phase: Phase, ctx: &mut InvocationContext) {
    if let Err(err) = chain.execute_phase(phase, ctx) {
        warn!(
            function = ctx.function_name(),
            phase = %phase,
            error = %err,
            "observer advice error discarded"
        );
    }
}
