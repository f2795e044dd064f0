//! # weft-wrap
//!
//! Type-preserving invocation adapters over the `weft-core` interception
//! engine.
//!
//! A wrapped function keeps its original signature. Internally the adapter
//! boxes the arguments into a fresh invocation context, runs the phase
//! protocol against the process-wide default registry, and downcasts the
//! context's result and error slots back to the caller's types — taking an
//! Around-skip value in place of the target's result when the target was
//! bypassed. Downcasts fail closed with a [`WrapFault`] fault.
//!
//! ```
//! use weft_core::{registry, Advice};
//! use weft_wrap::wrap2_r;
//!
//! registry::must_register("Sum");
//! registry::must_add_advice(
//!     "Sum",
//!     Advice::before(10, |ctx| {
//!         assert_eq!(ctx.arg_as::<i32>(0), Some(&2));
//!         Ok(())
//!     }),
//! );
//!
//! let sum = wrap2_r("Sum", |a: i32, b: i32| a + b);
//! assert_eq!(sum(2, 3), 5);
//! ```

pub mod wrap;

pub use wrap::{
    wrap0, wrap0_e, wrap0_r, wrap0_re, wrap1, wrap1_e, wrap1_r, wrap1_re, wrap2, wrap2_e, wrap2_r,
    wrap2_re, wrap3, wrap3_e, wrap3_r, wrap3_re, WrapFault,
};
