//! State driver module for the stamp estimation service.
//!
//! This module defines the abstraction over the node's state storage that
//! the execution pipeline consumes, supporting different backend
//! implementations such as in-memory or file-based stores.
//!
//! Every estimation request gets its own driver handle with a private
//! write cache: reads see the cache first and fall through to the shared
//! backing store, writes stay in the cache until `commit`, and
//! `flush_cache` discards them. The estimation pipeline always flushes,
//! which is what keeps estimation side-effect-free.

use async_trait::async_trait;
use estimator_types::{ConfigSchema, StateValue};
use std::sync::Arc;
use thiserror::Error;

/// Helpers over the chain's singleton state keys.
pub mod chain;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during state driver operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// A requested item is not present.
	#[error("Not found")]
	NotFound,
	/// Serialization or deserialization of a stored value failed.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The storage backend itself failed.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Configuration validation failed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A per-request handle onto chain state.
///
/// Handles are cheap to create and are never shared between requests;
/// cross-request isolation comes from each handle owning its write cache.
#[async_trait]
pub trait StateDriver: Send + Sync {
	/// Reads the value for a key, consulting the handle's write cache
	/// before the backing store.
	async fn get(&self, key: &str) -> Result<Option<StateValue>, StorageError>;

	/// Stages a write in the handle's cache. Nothing becomes durable
	/// until `commit`.
	async fn set(&self, key: &str, value: StateValue) -> Result<(), StorageError>;

	/// Lists all keys starting with the given prefix, cached writes
	/// included, in lexicographic order.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Looks up a contract's source by name.
	async fn get_contract(&self, name: &str) -> Result<Option<String>, StorageError>;

	/// Discards every staged write in the cache.
	async fn flush_cache(&self) -> Result<(), StorageError>;

	/// Persists every staged write to the backing store and clears the
	/// cache.
	async fn commit(&self) -> Result<(), StorageError>;
}

/// A shared storage backend from which per-request drivers are created.
pub trait StateBackend: Send + Sync {
	/// Creates a fresh driver handle with an empty write cache.
	fn driver(&self) -> Box<dyn StateDriver>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for backend factory functions.
pub type BackendFactory = fn(&toml::Value) -> Result<Arc<dyn StateBackend>, StorageError>;

/// Get all registered backend implementations.
///
/// Returns (name, factory) tuples for the available storage backends,
/// used by the service wiring to build its factory map.
pub fn get_all_implementations() -> Vec<(&'static str, BackendFactory)> {
	use implementations::{file, memory};

	vec![
		("file", file::create_backend as BackendFactory),
		("memory", memory::create_backend as BackendFactory),
	]
}

/// The state key under which a contract's source is stored.
pub fn contract_code_key(name: &str) -> String {
	format!("{}.__code__", name)
}
