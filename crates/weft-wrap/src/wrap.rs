//! The invocation-adapter family: per-(arity, return-shape) typed wrappers
//! over the interception engine.
//!
//! Each constructor takes a symbolic name and a target function and
//! returns a closure with the same shape. Arguments are cloned into the
//! context's boxed argument sequence, the engine runs the phase protocol
//! against the process-wide default registry (resolved on every call, so a
//! swapped default is observed), and the context's result/error slots are
//! downcast back to the caller's types.
//!
//! Typing fails closed: a boxed value that does not match the adapter's
//! static types raises a [`WrapFault`] fault instead of silently
//! truncating.
//!
//! Naming: `wrap{N}` wraps an `N`-argument function returning nothing,
//! `_r` one returning a value, `_re` one returning `Result<R, E>`, and
//! `_e` one returning `Result<(), E>`.

use std::any::type_name;
use std::error::Error;
use std::panic;

use thiserror::Error as ThisError;
use weft_core::{engine, BoxedValue, InvocationContext};

/// Fault raised when a wrapped call's boxed state does not match the
/// adapter's static types.
///
/// Raised as an unwind payload at the unboxing step, after the phase
/// protocol has completed; it reaches the ultimate caller uncontained.
#[derive(Debug, ThisError)]
pub enum WrapFault {
    /// Result slot holds a value of the wrong type.
    #[error("wrapped call '{function}': result slot {slot} does not hold a {expected}")]
    ResultType {
        /// Registered name of the wrapped function.
        function: String,
        /// Result slot index.
        slot: usize,
        /// Expected Rust type.
        expected: &'static str,
    },

    /// A value-returning call ended with no value in its result slot
    /// (typically Around skip without a supplied result).
    #[error("wrapped call '{function}': result slot {slot} is empty")]
    MissingResult {
        /// Registered name of the wrapped function.
        function: String,
        /// Result slot index.
        slot: usize,
    },

    /// Error slot holds an error of the wrong type.
    #[error("wrapped call '{function}': error slot does not hold a {expected}")]
    ErrorType {
        /// Registered name of the wrapped function.
        function: String,
        /// Expected Rust error type.
        expected: &'static str,
    },
}

/// Drain slot 0 as `R`, failing closed on absence or a type mismatch.
fn take_result<R: 'static>(ctx: &mut InvocationContext) -> R {
    match ctx.take_result(0) {
        Some(value) => match value.downcast::<R>() {
            Ok(value) => *value,
            Err(_) => panic::panic_any(WrapFault::ResultType {
                function: ctx.function_name().to_owned(),
                slot: 0,
                expected: type_name::<R>(),
            }),
        },
        None => panic::panic_any(WrapFault::MissingResult {
            function: ctx.function_name().to_owned(),
            slot: 0,
        }),
    }
}

/// Drain the error slot as `E`, failing closed on a type mismatch.
fn take_error<E>(ctx: &mut InvocationContext) -> Option<E>
where
    E: Error + Send + Sync + 'static,
{
    let err = ctx.take_error()?;
    match err.downcast::<E>() {
        Ok(err) => Some(*err),
        Err(_) => panic::panic_any(WrapFault::ErrorType {
            function: ctx.function_name().to_owned(),
            expected: type_name::<E>(),
        }),
    }
}

fn value_outcome<R: 'static>(mut ctx: InvocationContext) -> R {
    take_result(&mut ctx)
}

fn result_outcome<R, E>(mut ctx: InvocationContext) -> Result<R, E>
where
    R: 'static,
    E: Error + Send + Sync + 'static,
{
    if let Some(err) = take_error::<E>(&mut ctx) {
        return Err(err);
    }
    Ok(take_result(&mut ctx))
}

fn error_outcome<E>(mut ctx: InvocationContext) -> Result<(), E>
where
    E: Error + Send + Sync + 'static,
{
    match take_error::<E>(&mut ctx) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Arity 0
// ---------------------------------------------------------------------------

/// Wrap a no-argument, no-return function.
pub fn wrap0<F>(name: impl Into<String>, f: F) -> impl Fn()
where
    F: Fn(),
{
    let name = name.into();
    move || {
        engine::invoke_default(&name, Vec::new(), |_ctx| f());
    }
}

/// Wrap a no-argument function returning a value.
pub fn wrap0_r<R, F>(name: impl Into<String>, f: F) -> impl Fn() -> R
where
    R: Send + 'static,
    F: Fn() -> R,
{
    let name = name.into();
    move || {
        let ctx = engine::invoke_default(&name, Vec::new(), |ctx| {
            let value = f();
            ctx.set_result(0, value);
        });
        value_outcome(ctx)
    }
}

/// Wrap a no-argument function returning `Result<R, E>`.
pub fn wrap0_re<R, E, F>(name: impl Into<String>, f: F) -> impl Fn() -> Result<R, E>
where
    R: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn() -> Result<R, E>,
{
    let name = name.into();
    move || {
        let ctx = engine::invoke_default(&name, Vec::new(), |ctx| match f() {
            Ok(value) => ctx.set_result(0, value),
            Err(err) => ctx.set_error(err),
        });
        result_outcome(ctx)
    }
}

/// Wrap a no-argument function returning `Result<(), E>`.
pub fn wrap0_e<E, F>(name: impl Into<String>, f: F) -> impl Fn() -> Result<(), E>
where
    E: Error + Send + Sync + 'static,
    F: Fn() -> Result<(), E>,
{
    let name = name.into();
    move || {
        let ctx = engine::invoke_default(&name, Vec::new(), |ctx| {
            if let Err(err) = f() {
                ctx.set_error(err);
            }
        });
        error_outcome(ctx)
    }
}

// ---------------------------------------------------------------------------
// Arity 1
// ---------------------------------------------------------------------------

/// Wrap a one-argument, no-return function.
pub fn wrap1<A, F>(name: impl Into<String>, f: F) -> impl Fn(A)
where
    A: Clone + Send + 'static,
    F: Fn(A),
{
    let name = name.into();
    move |a: A| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone())];
        engine::invoke_default(&name, args, |_ctx| f(a));
    }
}

/// Wrap a one-argument function returning a value.
pub fn wrap1_r<A, R, F>(name: impl Into<String>, f: F) -> impl Fn(A) -> R
where
    A: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(A) -> R,
{
    let name = name.into();
    move |a: A| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            let value = f(a);
            ctx.set_result(0, value);
        });
        value_outcome(ctx)
    }
}

/// Wrap a one-argument function returning `Result<R, E>`.
pub fn wrap1_re<A, R, E, F>(name: impl Into<String>, f: F) -> impl Fn(A) -> Result<R, E>
where
    A: Clone + Send + 'static,
    R: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A) -> Result<R, E>,
{
    let name = name.into();
    move |a: A| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| match f(a) {
            Ok(value) => ctx.set_result(0, value),
            Err(err) => ctx.set_error(err),
        });
        result_outcome(ctx)
    }
}

/// Wrap a one-argument function returning `Result<(), E>`.
pub fn wrap1_e<A, E, F>(name: impl Into<String>, f: F) -> impl Fn(A) -> Result<(), E>
where
    A: Clone + Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A) -> Result<(), E>,
{
    let name = name.into();
    move |a: A| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            if let Err(err) = f(a) {
                ctx.set_error(err);
            }
        });
        error_outcome(ctx)
    }
}

// ---------------------------------------------------------------------------
// Arity 2
// ---------------------------------------------------------------------------

/// Wrap a two-argument, no-return function.
pub fn wrap2<A, B, F>(name: impl Into<String>, f: F) -> impl Fn(A, B)
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    F: Fn(A, B),
{
    let name = name.into();
    move |a: A, b: B| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone()), Box::new(b.clone())];
        engine::invoke_default(&name, args, |_ctx| f(a, b));
    }
}

/// Wrap a two-argument function returning a value.
pub fn wrap2_r<A, B, R, F>(name: impl Into<String>, f: F) -> impl Fn(A, B) -> R
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(A, B) -> R,
{
    let name = name.into();
    move |a: A, b: B| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone()), Box::new(b.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            let value = f(a, b);
            ctx.set_result(0, value);
        });
        value_outcome(ctx)
    }
}

/// Wrap a two-argument function returning `Result<R, E>`.
pub fn wrap2_re<A, B, R, E, F>(name: impl Into<String>, f: F) -> impl Fn(A, B) -> Result<R, E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    R: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A, B) -> Result<R, E>,
{
    let name = name.into();
    move |a: A, b: B| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone()), Box::new(b.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| match f(a, b) {
            Ok(value) => ctx.set_result(0, value),
            Err(err) => ctx.set_error(err),
        });
        result_outcome(ctx)
    }
}

/// Wrap a two-argument function returning `Result<(), E>`.
pub fn wrap2_e<A, B, E, F>(name: impl Into<String>, f: F) -> impl Fn(A, B) -> Result<(), E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A, B) -> Result<(), E>,
{
    let name = name.into();
    move |a: A, b: B| {
        let args: Vec<BoxedValue> = vec![Box::new(a.clone()), Box::new(b.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            if let Err(err) = f(a, b) {
                ctx.set_error(err);
            }
        });
        error_outcome(ctx)
    }
}

// ---------------------------------------------------------------------------
// Arity 3
// ---------------------------------------------------------------------------

/// Wrap a three-argument, no-return function.
pub fn wrap3<A, B, C, F>(name: impl Into<String>, f: F) -> impl Fn(A, B, C)
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
    F: Fn(A, B, C),
{
    let name = name.into();
    move |a: A, b: B, c: C| {
        let args: Vec<BoxedValue> =
            vec![Box::new(a.clone()), Box::new(b.clone()), Box::new(c.clone())];
        engine::invoke_default(&name, args, |_ctx| f(a, b, c));
    }
}

/// Wrap a three-argument function returning a value.
pub fn wrap3_r<A, B, C, R, F>(name: impl Into<String>, f: F) -> impl Fn(A, B, C) -> R
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(A, B, C) -> R,
{
    let name = name.into();
    move |a: A, b: B, c: C| {
        let args: Vec<BoxedValue> =
            vec![Box::new(a.clone()), Box::new(b.clone()), Box::new(c.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            let value = f(a, b, c);
            ctx.set_result(0, value);
        });
        value_outcome(ctx)
    }
}

/// Wrap a three-argument function returning `Result<R, E>`.
pub fn wrap3_re<A, B, C, R, E, F>(name: impl Into<String>, f: F) -> impl Fn(A, B, C) -> Result<R, E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
    R: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A, B, C) -> Result<R, E>,
{
    let name = name.into();
    move |a: A, b: B, c: C| {
        let args: Vec<BoxedValue> =
            vec![Box::new(a.clone()), Box::new(b.clone()), Box::new(c.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| match f(a, b, c) {
            Ok(value) => ctx.set_result(0, value),
            Err(err) => ctx.set_error(err),
        });
        result_outcome(ctx)
    }
}

/// Wrap a three-argument function returning `Result<(), E>`.
pub fn wrap3_e<A, B, C, E, F>(name: impl Into<String>, f: F) -> impl Fn(A, B, C) -> Result<(), E>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(A, B, C) -> Result<(), E>,
{
    let name = name.into();
    move |a: A, b: B, c: C| {
        let args: Vec<BoxedValue> =
            vec![Box::new(a.clone()), Box::new(b.clone()), Box::new(c.clone())];
        let ctx = engine::invoke_default(&name, args, |ctx| {
            if let Err(err) = f(a, b, c) {
                ctx.set_error(err);
            }
        });
        error_outcome(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serial_test::serial;
    use weft_core::{set_default_registry, Advice, Registry};

    fn isolated_registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        set_default_registry(Arc::clone(&registry));
        registry
    }

    #[test]
    #[serial]
    fn unregistered_wrapped_call_is_transparent() {
        let _registry = isolated_registry();

        let double = wrap1_r("double", |x: i32| x * 2);
        assert_eq!(double(21), 42);
    }

    #[test]
    #[serial]
    fn skip_value_of_the_wrong_type_is_a_fault() {
        let registry = isolated_registry();
        registry.must_register("typed");
        registry.must_add_advice(
            "typed",
            Advice::around(10, |ctx| {
                ctx.set_skipped(true);
                ctx.set_result(0, "not an i32");
                Ok(())
            }),
        );

        let wrapped = wrap0_r("typed", || 1_i32);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| wrapped()));

        let payload = outcome.unwrap_err();
        let fault = payload.downcast_ref::<WrapFault>().unwrap();
        assert_matches!(fault, WrapFault::ResultType { slot: 0, .. });
    }

    #[test]
    #[serial]
    fn skip_without_a_result_is_a_fault_for_value_shapes() {
        let registry = isolated_registry();
        registry.must_register("empty_skip");
        registry.must_add_advice(
            "empty_skip",
            Advice::around(10, |ctx| {
                ctx.set_skipped(true);
                Ok(())
            }),
        );

        let wrapped = wrap0_r("empty_skip", || 1_i32);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| wrapped()));

        let payload = outcome.unwrap_err();
        let fault = payload.downcast_ref::<WrapFault>().unwrap();
        assert_matches!(fault, WrapFault::MissingResult { slot: 0, .. });
    }

    #[test]
    #[serial]
    fn replaced_error_of_the_wrong_type_is_a_fault() {
        let registry = isolated_registry();
        registry.must_register("bad_error");
        registry.must_add_advice(
            "bad_error",
            Advice::around(10, |ctx| {
                ctx.set_skipped(true);
                // Not the io::Error the adapter expects.
                ctx.set_error("stringly error".to_owned());
                Ok(())
            }),
        );

        let wrapped = wrap0_e("bad_error", || Ok::<(), std::io::Error>(()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| wrapped()));

        let payload = outcome.unwrap_err();
        let fault = payload.downcast_ref::<WrapFault>().unwrap();
        assert_matches!(fault, WrapFault::ErrorType { .. });
    }

    #[test]
    #[serial]
    fn arguments_are_visible_to_advice_as_boxed_values() {
        let registry = isolated_registry();
        registry.must_register("args");
        registry.must_add_advice(
            "args",
            Advice::before(10, |ctx| {
                assert_eq!(ctx.arg_as::<i32>(0), Some(&2));
                assert_eq!(ctx.arg_as::<i32>(1), Some(&3));
                assert_eq!(ctx.arg_as::<String>(2), Some(&"z".to_owned()));
                Ok(())
            }),
        );

        let wrapped = wrap3_r("args", |a: i32, b: i32, _tag: String| a + b);
        assert_eq!(wrapped(2, 3, "z".to_owned()), 5);
    }
}
