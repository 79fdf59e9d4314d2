//! Product registry: maps product keys to constructors.
//!
//! The registry stores factories rather than instances. Every lookup builds a
//! fresh [`BoxProduct`], so concurrent executions of the same product never
//! share product state. The registry itself is a plain value; callers share
//! it behind an `Arc` and may register products at any time before or during
//! a run.

use std::sync::Arc;

use dashmap::DashMap;

use leadpilot_types::product::ProductMetadata;

use crate::product::{BoxProduct, Product};

/// Errors surfaced by registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown product '{0}'")]
    ProductNotFound(String),
}

type ProductFactory = Arc<dyn Fn() -> BoxProduct + Send + Sync>;

/// Concurrent product key -> factory map.
#[derive(Default)]
pub struct ProductRegistry {
    factories: DashMap<String, ProductFactory>,
}

impl ProductRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a product constructor under its metadata key. Re-registering
    /// a key replaces the previous factory.
    pub fn register<T, F>(&self, factory: F)
    where
        T: Product + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let key = factory().metadata().key;
        tracing::debug!(product = key.as_str(), "registering product");
        self.factories
            .insert(key, Arc::new(move || BoxProduct::new(factory())));
    }

    /// Remove a product. Returns whether anything was registered under `key`.
    pub fn unregister(&self, key: &str) -> bool {
        self.factories.remove(key).is_some()
    }

    pub fn has(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Build a fresh instance of the product registered under `key`.
    pub fn get(&self, key: &str) -> Result<BoxProduct, RegistryError> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| RegistryError::ProductNotFound(key.to_string()))?;
        Ok(factory())
    }

    /// All registered keys, sorted for stable listing output.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Metadata for every registered product, sorted by key.
    pub fn metadata_list(&self) -> Vec<ProductMetadata> {
        let mut list: Vec<ProductMetadata> = self
            .factories
            .iter()
            .map(|entry| entry.value()().metadata())
            .collect();
        list.sort_by(|a, b| a.key.cmp(&b.key));
        list
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn clear(&self) {
        self.factories.clear();
    }
}
