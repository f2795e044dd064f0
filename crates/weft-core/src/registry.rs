//! Concurrent-safe mapping from symbolic function names to advice chains,
//! plus the swappable process-wide default instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::advice::Advice;
use crate::chain::AdviceChain;

/// Errors returned by registry operations.
///
/// These are ordinary configuration errors; the `must_*` variants convert
/// them into fatal panics for startup wiring that must not fail silently.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The symbolic name was empty.
    #[error("function name cannot be empty")]
    EmptyName,

    /// The name already has a chain; chains are never replaced.
    #[error("function '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No chain exists for the name.
    #[error("function '{0}' is not registered")]
    NotRegistered(String),
}

/// Registry of advice chains keyed by symbolic function name.
///
/// A name maps to at most one chain. Once created, a chain is only ever
/// appended to or removed together with its name. Reads proceed
/// concurrently; writes take the exclusive lock. Independent instances are
/// first-class — the engine works against any of them — and a process-wide
/// default exists for convenience (see [`default_registry`]).
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<AdviceChain>>>,
}

impl Registry {
    /// New empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chain for `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::EmptyName`] for an empty name,
    /// [`RegistryError::AlreadyRegistered`] when a chain already exists.
    pub fn register(&self, name: &str) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_owned()));
        }
        entries.insert(name.to_owned(), Arc::new(AdviceChain::new()));
        debug!(function = name, "registered advice chain");
        Ok(())
    }

    /// Return the chain for `name`, atomically creating it if absent.
    ///
    /// # Panics
    ///
    /// Panics on an empty name. That is a caller error, not a recoverable
    /// condition.
    pub fn register_or_get(&self, name: &str) -> Arc<AdviceChain> {
        assert!(!name.is_empty(), "function name cannot be empty");
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(AdviceChain::new())),
        )
    }

    /// Register `name` and panic on failure. Startup wiring helper.
    ///
    /// # Panics
    ///
    /// Panics on any registration error.
    pub fn must_register(&self, name: &str) {
        if let Err(err) = self.register(name) {
            panic!("registration failed: {err}");
        }
    }

    /// Append advice to the chain registered under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::EmptyName`] for an empty name,
    /// [`RegistryError::NotRegistered`] when no chain exists.
    pub fn add_advice(&self, name: &str, advice: Advice) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let entries = self.entries.read();
        let chain = entries
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_owned()))?;
        chain.add(advice);
        Ok(())
    }

    /// Append advice and panic on failure. Startup wiring helper.
    ///
    /// # Panics
    ///
    /// Panics on any [`RegistryError`].
    pub fn must_add_advice(&self, name: &str, advice: Advice) {
        if let Err(err) = self.add_advice(name, advice) {
            panic!("adding advice failed: {err}");
        }
    }

    /// The chain registered under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::EmptyName`] or [`RegistryError::NotRegistered`].
    pub fn chain(&self, name: &str) -> Result<Arc<AdviceChain>, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(name.to_owned()))
    }

    /// Whether `name` has a chain.
    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Remove `name` and its chain. No-op when absent.
    pub fn unregister(&self, name: &str) {
        if self.entries.write().remove(name).is_some() {
            debug!(function = name, "unregistered advice chain");
        }
    }

    /// All registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered names.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    /// Total advice registered under `name`; 0 when unregistered.
    pub fn advice_count(&self, name: &str) -> usize {
        self.entries.read().get(name).map_or(0, |chain| chain.count())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Process-wide default instance
// ---------------------------------------------------------------------------

static DEFAULT_REGISTRY: Lazy<RwLock<Arc<Registry>>> =
    Lazy::new(|| RwLock::new(Arc::new(Registry::new())));

/// The current process-wide default registry.
///
/// The free functions below and the `weft-wrap` adapters resolve this on
/// every call, so a swap is observed by adapters created earlier.
pub fn default_registry() -> Arc<Registry> {
    Arc::clone(&DEFAULT_REGISTRY.read())
}

/// Replace the process-wide default registry. Test-isolation hook.
pub fn set_default_registry(registry: Arc<Registry>) {
    *DEFAULT_REGISTRY.write() = registry;
}

/// [`Registry::register`] on the default registry.
pub fn register(name: &str) -> Result<(), RegistryError> {
    default_registry().register(name)
}

/// [`Registry::register_or_get`] on the default registry.
pub fn register_or_get(name: &str) -> Arc<AdviceChain> {
    default_registry().register_or_get(name)
}

/// [`Registry::must_register`] on the default registry.
pub fn must_register(name: &str) {
    default_registry().must_register(name);
}

/// [`Registry::add_advice`] on the default registry.
pub fn add_advice(name: &str, advice: Advice) -> Result<(), RegistryError> {
    default_registry().add_advice(name, advice)
}

/// [`Registry::must_add_advice`] on the default registry.
pub fn must_add_advice(name: &str, advice: Advice) {
    default_registry().must_add_advice(name, advice);
}

/// [`Registry::chain`] on the default registry.
pub fn chain(name: &str) -> Result<Arc<AdviceChain>, RegistryError> {
    default_registry().chain(name)
}

/// [`Registry::is_registered`] on the default registry.
pub fn is_registered(name: &str) -> bool {
    default_registry().is_registered(name)
}

/// [`Registry::unregister`] on the default registry.
pub fn unregister(name: &str) {
    default_registry().unregister(name);
}

/// [`Registry::names`] on the default registry.
pub fn names() -> Vec<String> {
    default_registry().names()
}

/// [`Registry::clear`] on the default registry.
pub fn clear() {
    default_registry().clear();
}

/// [`Registry::count`] on the default registry.
pub fn count() -> usize {
    default_registry().count()
}

/// [`Registry::advice_count`] on the default registry.
pub fn advice_count(name: &str) -> usize {
    default_registry().advice_count(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{Advice, Phase};
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::thread;

    fn noop_advice(phase: Phase) -> Advice {
        Advice::new(phase, 0, |_ctx| Ok(()))
    }

    #[test]
    fn register_rejects_duplicates_and_empty_names() {
        let registry = Registry::new();

        registry.register("Sum").unwrap();
        assert_matches!(
            registry.register("Sum"),
            Err(RegistryError::AlreadyRegistered(name)) if name == "Sum"
        );
        assert_matches!(registry.register(""), Err(RegistryError::EmptyName));
    }

    #[test]
    fn register_or_get_returns_the_same_chain() {
        let registry = Registry::new();

        let first = registry.register_or_get("Sum");
        let second = registry.register_or_get("Sum");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_or_get_sees_a_previously_registered_chain() {
        let registry = Registry::new();
        registry.register("Sum").unwrap();

        let chain = registry.register_or_get("Sum");
        let looked_up = registry.chain("Sum").unwrap();
        assert!(Arc::ptr_eq(&chain, &looked_up));
    }

    #[test]
    #[should_panic(expected = "function name cannot be empty")]
    fn register_or_get_panics_on_empty_name() {
        Registry::new().register_or_get("");
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn must_register_panics_on_duplicate() {
        let registry = Registry::new();
        registry.must_register("Sum");
        registry.must_register("Sum");
    }

    #[test]
    fn add_advice_requires_registration() {
        let registry = Registry::new();

        assert_matches!(
            registry.add_advice("Missing", noop_advice(Phase::Before)),
            Err(RegistryError::NotRegistered(name)) if name == "Missing"
        );
        assert_matches!(
            registry.add_advice("", noop_advice(Phase::Before)),
            Err(RegistryError::EmptyName)
        );

        registry.register("Sum").unwrap();
        registry.add_advice("Sum", noop_advice(Phase::Before)).unwrap();
        registry.add_advice("Sum", noop_advice(Phase::After)).unwrap();
        assert_eq!(registry.advice_count("Sum"), 2);
    }

    #[test]
    fn advice_count_is_zero_for_unregistered_names() {
        assert_eq!(Registry::new().advice_count("Missing"), 0);
    }

    #[test]
    fn unregister_is_a_no_op_when_absent() {
        let registry = Registry::new();
        registry.unregister("Missing");

        registry.register("Sum").unwrap();
        registry.unregister("Sum");
        assert!(!registry.is_registered("Sum"));
        assert_matches!(registry.chain("Sum"), Err(RegistryError::NotRegistered(_)));
    }

    #[test]
    fn names_clear_and_count() {
        let registry = Registry::new();
        registry.register("A").unwrap();
        registry.register("B").unwrap();

        let mut names = registry.names();
        names.sort();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(registry.count(), 2);

        registry.clear();
        assert_eq!(registry.count(), 0);
        assert!(registry.names().is_empty());
    }

    #[test]
    fn concurrent_register_or_get_converges_on_one_chain() {
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let chain = registry.register_or_get("Shared");
                    chain.add(Advice::before(i, |_ctx| Ok(())));
                    registry.register_or_get(&format!("worker-{i}"));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.count(), 9);
        assert_eq!(registry.advice_count("Shared"), 8);
    }

    #[test]
    #[serial]
    fn default_registry_can_be_swapped_for_isolation() {
        let previous = default_registry();

        let isolated = Arc::new(Registry::new());
        set_default_registry(Arc::clone(&isolated));

        register("Swapped").unwrap();
        assert!(isolated.is_registered("Swapped"));
        assert!(is_registered("Swapped"));
        assert_eq!(count(), 1);

        unregister("Swapped");
        assert_eq!(count(), 0);

        set_default_registry(previous);
    }
}
