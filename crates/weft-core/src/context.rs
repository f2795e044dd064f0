//! Per-invocation execution record shared by advice handlers and the
//! target function.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::advice::AdviceError;

/// A dynamically typed argument, result, or metadata slot. Static types
/// are recovered only at the adapter boundary, via checked downcasts.
pub type BoxedValue = Box<dyn Any + Send>;

/// Captured unwind payload of an abnormal termination.
pub type FaultPayload = Box<dyn Any + Send>;

/// Mutable state of a single invocation.
///
/// Created fresh by the engine for every call, mutated by advice handlers
/// and by the target's result/error capture, and discarded once the call
/// returns or the fault is re-raised. Arguments are fixed at creation;
/// results are a growable, sparsely indexed sequence.
pub struct InvocationContext {
    function_name: String,
    args: Vec<BoxedValue>,
    results: Vec<Option<BoxedValue>>,
    error: Option<AdviceError>,
    fault: Option<FaultPayload>,
    metadata: HashMap<String, BoxedValue>,
    skipped: bool,
}

impl InvocationContext {
    /// New context for one invocation of `function_name`.
    pub fn new(function_name: impl Into<String>, args: Vec<BoxedValue>) -> Self {
        Self {
            function_name: function_name.into(),
            args,
            results: Vec::new(),
            error: None,
            fault: None,
            metadata: HashMap::new(),
            skipped: false,
        }
    }

    /// Registered name of the invoked function.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Number of boxed arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Argument at `index`, untyped.
    pub fn arg(&self, index: usize) -> Option<&(dyn Any + Send)> {
        self.args.get(index).map(AsRef::as_ref)
    }

    /// Argument at `index`, downcast to `T`. `None` when absent or of a
    /// different type.
    pub fn arg_as<T: 'static>(&self, index: usize) -> Option<&T> {
        self.args.get(index).and_then(|value| value.downcast_ref::<T>())
    }

    /// Store a result at `index`, extending the sequence with empty
    /// placeholders as needed.
    pub fn set_result<T: Send + 'static>(&mut self, index: usize, value: T) {
        self.set_boxed_result(index, Box::new(value));
    }

    /// Store an already-boxed result at `index`.
    pub fn set_boxed_result(&mut self, index: usize, value: BoxedValue) {
        while self.results.len() <= index {
            self.results.push(None);
        }
        self.results[index] = Some(value);
    }

    /// Result at `index`, untyped. Placeholders and out-of-range indices
    /// read as absent.
    pub fn result(&self, index: usize) -> Option<&(dyn Any + Send)> {
        self.results.get(index).and_then(|slot| slot.as_deref())
    }

    /// Result at `index`, downcast to `T`.
    pub fn result_as<T: 'static>(&self, index: usize) -> Option<&T> {
        self.result(index).and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove and return the result at `index`, leaving a placeholder.
    pub fn take_result(&mut self, index: usize) -> Option<BoxedValue> {
        self.results.get_mut(index).and_then(Option::take)
    }

    /// Current length of the results sequence, placeholders included.
    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Record a normal function error. Gates AfterReturning; never treated
    /// as a fault.
    pub fn set_error(&mut self, error: impl Into<AdviceError>) {
        self.error = Some(error.into());
    }

    /// The recorded error, if any.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.error.as_deref()
    }

    /// Whether an error has been recorded.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Remove and return the recorded error.
    pub fn take_error(&mut self) -> Option<AdviceError> {
        self.error.take()
    }

    /// Drop any recorded error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// True iff an abnormal-termination payload has been captured.
    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// The captured fault payload, untyped.
    pub fn fault(&self) -> Option<&(dyn Any + Send)> {
        self.fault.as_deref()
    }

    /// The captured fault payload, downcast to `T`.
    pub fn fault_as<T: 'static>(&self) -> Option<&T> {
        self.fault().and_then(|value| value.downcast_ref::<T>())
    }

    // The fault slot is written and drained only by the engine: the payload
    // must survive the observer phases intact so it can be re-raised.
    pub(crate) fn set_fault(&mut self, payload: FaultPayload) {
        self.fault = Some(payload);
    }

    pub(crate) fn take_fault(&mut self) -> Option<FaultPayload> {
        self.fault.take()
    }

    /// Attach a metadata value under `key`. Free-form channel for
    /// inter-advice communication.
    pub fn set_metadata<T: Send + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.metadata.insert(key.into(), Box::new(value));
    }

    /// Metadata under `key`, downcast to `T`.
    pub fn metadata_as<T: 'static>(&self, key: &str) -> Option<&T> {
        self.metadata.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Whether any metadata is stored under `key`.
    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Set the skip flag. When set by Around advice, the target is not
    /// invoked.
    pub fn set_skipped(&mut self, skipped: bool) {
        self.skipped = skipped;
    }

    /// Whether the target has been marked as skipped.
    pub fn skipped(&self) -> bool {
        self.skipped
    }
}

impl fmt::Display for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated = self.results.iter().filter(|slot| slot.is_some()).count();
        write!(
            f,
            "InvocationContext{{function: {}, args: {}, results: {}/{}, error: {}, fault: {}, skipped: {}}}",
            self.function_name,
            self.args.len(),
            populated,
            self.results.len(),
            self.error.as_ref().map_or_else(|| "none".to_owned(), |e| e.to_string()),
            if self.fault.is_some() { "yes" } else { "no" },
            self.skipped,
        )
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("function_name", &self.function_name)
            .field("args", &self.args.len())
            .field("results", &self.results.len())
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .field("fault", &self.fault.is_some())
            .field("metadata_keys", &self.metadata.len())
            .field("skipped", &self.skipped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(value: impl Any + Send) -> BoxedValue {
        Box::new(value)
    }

    #[test]
    fn set_result_extends_with_placeholders() {
        let mut ctx = InvocationContext::new("extend", Vec::new());
        ctx.set_result(3, "late");

        assert_eq!(ctx.result_count(), 4);
        assert!(ctx.result(0).is_none());
        assert!(ctx.result(2).is_none());
        assert_eq!(ctx.result_as::<&str>(3), Some(&"late"));
    }

    #[test]
    fn result_reads_outside_length_are_absent() {
        let ctx = InvocationContext::new("absent", Vec::new());
        assert!(ctx.result(0).is_none());
        assert!(ctx.result_as::<i32>(7).is_none());
    }

    #[test]
    fn take_result_leaves_a_placeholder() {
        let mut ctx = InvocationContext::new("take", Vec::new());
        ctx.set_result(0, 42_i32);

        let taken = ctx.take_result(0).and_then(|v| v.downcast::<i32>().ok());
        assert_eq!(taken.as_deref(), Some(&42));
        assert!(ctx.result(0).is_none());
        assert_eq!(ctx.result_count(), 1);
    }

    #[test]
    fn args_are_typed_reads_only() {
        let ctx = InvocationContext::new("args", vec![boxed(2_i32), boxed("b".to_owned())]);

        assert_eq!(ctx.arg_count(), 2);
        assert_eq!(ctx.arg_as::<i32>(0), Some(&2));
        assert_eq!(ctx.arg_as::<String>(1), Some(&"b".to_owned()));
        assert!(ctx.arg_as::<i32>(1).is_none());
        assert!(ctx.arg(5).is_none());
    }

    #[test]
    fn error_slot_round_trip() {
        let mut ctx = InvocationContext::new("errs", Vec::new());
        assert!(!ctx.has_error());

        ctx.set_error(std::io::Error::other("bad input"));
        assert!(ctx.has_error());
        assert_eq!(ctx.error().map(|e| e.to_string()), Some("bad input".to_owned()));

        let taken = ctx.take_error();
        assert!(taken.is_some());
        assert!(!ctx.has_error());
    }

    #[test]
    fn metadata_is_typed_per_key() {
        let mut ctx = InvocationContext::new("meta", Vec::new());
        ctx.set_metadata("user_id", "user_123".to_owned());
        ctx.set_metadata("attempt", 3_u32);

        assert_eq!(ctx.metadata_as::<String>("user_id"), Some(&"user_123".to_owned()));
        assert_eq!(ctx.metadata_as::<u32>("attempt"), Some(&3));
        assert!(ctx.metadata_as::<u32>("user_id").is_none());
        assert!(!ctx.has_metadata("missing"));
    }

    #[test]
    fn display_summarizes_state() {
        let mut ctx = InvocationContext::new("render", vec![boxed(1_i32)]);
        ctx.set_result(1, "x");
        ctx.set_error("boom".to_owned());

        let rendered = ctx.to_string();
        assert!(rendered.contains("function: render"));
        assert!(rendered.contains("args: 1"));
        assert!(rendered.contains("results: 1/2"));
        assert!(rendered.contains("error: boom"));
        assert!(rendered.contains("fault: no"));
    }
}
