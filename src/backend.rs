//! Registry of event sinks and the fan-out that feeds them.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::RegistryError;
use crate::model::EventRecord;

/// Callback invoked with each event record delivered to a backend.
pub type BackendCallback = Arc<dyn Fn(&EventRecord) + Send + Sync>;

/// Thread-safe name-to-callback registry for event sinks.
///
/// Registration under an existing name replaces the prior entry. Delivery
/// iterates a stable snapshot of the registry, so no lock is held while a
/// callback runs, and a panicking callback cannot prevent sibling
/// backends from receiving the record.
pub struct BackendRegistry {
    backends: DashMap<String, BackendCallback>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> BackendRegistry {
        BackendRegistry {
            backends: DashMap::new(),
        }
    }

    /// Register `callback` under `name`.
    ///
    /// Fails on an empty name; a duplicate name replaces the prior entry.
    pub fn register<F>(&self, name: &str, callback: F) -> Result<(), RegistryError>
    where
        F: Fn(&EventRecord) + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.backends.insert(name.to_string(), Arc::new(callback));
        Ok(())
    }

    /// Remove the backend registered under `name`.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        self.backends
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Deliver `record` to every registered backend.
    ///
    /// Iteration order is unspecified. A callback that panics is caught
    /// and logged; the remaining callbacks still run.
    pub fn for_each(&self, record: &EventRecord) {
        let backends: Vec<(String, BackendCallback)> = self
            .backends
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (name, callback) in backends {
            if catch_unwind(AssertUnwindSafe(|| callback(record))).is_err() {
                tracing::error!(backend = %name, "CEL backend panicked while handling an event");
            }
        }
    }

    /// Names of all registered backends.
    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the registry has no backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Remove every backend.
    pub fn clear(&self) {
        self.backends.clear();
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
