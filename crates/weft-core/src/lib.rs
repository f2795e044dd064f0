//! # weft-core
//!
//! Invocation interception around named operations: register a symbolic
//! name, attach prioritized advice to lifecycle phases of that name's
//! invocations, and drive the phases around the real function through the
//! execution engine.
//!
//! The pieces, leaves first:
//!
//! - [`InvocationContext`] — the mutable per-call record (boxed args,
//!   sparse results, error slot, fault slot, metadata, skip flag);
//! - [`Advice`] and [`Phase`] — prioritized handlers bound to Before,
//!   After, Around, AfterReturning, or AfterThrowing;
//! - [`AdviceChain`] — the five ordered phase buckets for one name,
//!   priority descending with insertion order breaking ties;
//! - [`Registry`] — concurrent-safe name→chain mapping, with a swappable
//!   process-wide default instance;
//! - [`engine::invoke`] — the phase protocol: guaranteed After, fault
//!   capture and re-raise, Around skip semantics.
//!
//! Typed per-arity wrappers over the engine live in the `weft-wrap` crate.
//!
//! Everything runs synchronously on the caller's thread. The engine adds
//! no scheduler, no cancellation, no timeouts, and no retry; retry
//! composes externally as repeated calls to a wrapped function.

pub mod advice;
pub mod chain;
pub mod context;
pub mod engine;
pub mod registry;

pub use advice::{Advice, AdviceError, AdviceHandler, Phase};
pub use chain::AdviceChain;
pub use context::{BoxedValue, FaultPayload, InvocationContext};
pub use engine::{invoke, invoke_default, PhaseFault};
pub use registry::{default_registry, set_default_registry, Registry, RegistryError};
