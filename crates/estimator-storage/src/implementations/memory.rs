//! In-memory storage backend.
//!
//! Stores state in a shared HashMap, useful for tests and for nodes that
//! preload state at startup. Driver handles share the backing map but
//! keep private write caches, so staged writes from one request are never
//! visible to another.

use crate::{contract_code_key, StateBackend, StateDriver, StorageError};
use async_trait::async_trait;
use estimator_types::{ConfigSchema, Schema, StateValue, ValidationError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory backing store.
pub struct MemoryBackend {
	/// Committed state, shared by every driver handle.
	store: Arc<RwLock<HashMap<String, StateValue>>>,
}

impl MemoryBackend {
	/// Creates an empty in-memory backend.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}

impl StateBackend for MemoryBackend {
	fn driver(&self) -> Box<dyn StateDriver> {
		Box::new(MemoryDriver {
			store: Arc::clone(&self.store),
			cache: RwLock::new(BTreeMap::new()),
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryBackendSchema)
	}
}

/// A driver handle over the shared in-memory store.
pub struct MemoryDriver {
	store: Arc<RwLock<HashMap<String, StateValue>>>,
	cache: RwLock<BTreeMap<String, StateValue>>,
}

#[async_trait]
impl StateDriver for MemoryDriver {
	async fn get(&self, key: &str) -> Result<Option<StateValue>, StorageError> {
		if let Some(value) = self.cache.read().await.get(key) {
			return Ok(Some(value.clone()));
		}
		Ok(self.store.read().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: StateValue) -> Result<(), StorageError> {
		self.cache.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut keys: Vec<String> = self
			.store
			.read()
			.await
			.keys()
			.filter(|k| k.starts_with(prefix))
			.cloned()
			.collect();
		keys.extend(
			self.cache
				.read()
				.await
				.keys()
				.filter(|k| k.starts_with(prefix))
				.cloned(),
		);
		keys.sort();
		keys.dedup();
		Ok(keys)
	}

	async fn get_contract(&self, name: &str) -> Result<Option<String>, StorageError> {
		let value = self.get(&contract_code_key(name)).await?;
		Ok(value.and_then(|v| v.as_text().map(str::to_string)))
	}

	async fn flush_cache(&self) -> Result<(), StorageError> {
		self.cache.write().await.clear();
		Ok(())
	}

	async fn commit(&self) -> Result<(), StorageError> {
		let mut cache = self.cache.write().await;
		let mut store = self.store.write().await;
		for (key, value) in std::mem::take(&mut *cache) {
			store.insert(key, value);
		}
		Ok(())
	}
}

/// Configuration schema for the in-memory backend.
pub struct MemoryBackendSchema;

impl ConfigSchema for MemoryBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// The memory backend has no required configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create an in-memory backend from configuration.
pub fn create_backend(
	_config: &toml::Value,
) -> Result<Arc<dyn StateBackend>, StorageError> {
	Ok(Arc::new(MemoryBackend::new()))
}
