//! Process-wide adapter registry.
//!
//! Backends register themselves under a short name at startup; application
//! code resolves adapters by name instead of holding concrete types, so
//! swapping the backing store is a one-line configuration change.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StorageError;
use crate::traits::MetadataAdapter;

/// Named registry of [`MetadataAdapter`] instances.
///
/// Registration is last-write-wins; re-registering a name replaces the
/// previous adapter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<dyn MetadataAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under `name`, replacing any previous entry.
    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn MetadataAdapter>) {
        let name = name.into();
        tracing::debug!(adapter = %name, "registering metadata adapter");
        self.adapters.insert(name, adapter);
    }

    /// Looks up the adapter registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn MetadataAdapter>, StorageError> {
        self.adapters
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::AdapterNotFound(name.to_string()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Removes every registered adapter (for test isolation).
    pub fn clear(&self) {
        self.adapters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use trove_core::SchemaRegistry;

    fn memory_adapter() -> Arc<dyn MetadataAdapter> {
        Arc::new(MemoryAdapter::new(SchemaRegistry::new()))
    }

    #[test]
    fn resolves_registered_adapter() {
        let registry = AdapterRegistry::new();
        registry.register("memory", memory_adapter());
        assert!(registry.resolve("memory").is_ok());
        assert!(registry.is_registered("memory"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = AdapterRegistry::new();
        assert!(matches!(
            registry.resolve("postgres"),
            Err(StorageError::AdapterNotFound(name)) if name == "postgres"
        ));
    }

    #[test]
    fn reregistration_replaces() {
        let registry = AdapterRegistry::new();
        let first = memory_adapter();
        let second = memory_adapter();
        registry.register("memory", Arc::clone(&first));
        registry.register("memory", Arc::clone(&second));
        let resolved = registry.resolve("memory").unwrap();
        assert!(Arc::ptr_eq(&resolved, &second));
    }

    #[test]
    fn clear_empties_the_registry() {
        let registry = AdapterRegistry::new();
        registry.register("memory", memory_adapter());
        registry.clear();
        assert!(!registry.is_registered("memory"));
    }
}
