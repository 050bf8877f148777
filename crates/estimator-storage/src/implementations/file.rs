//! File-based storage backend.
//!
//! Stores each state key as one JSON document under a root directory,
//! providing simple persistence without external dependencies. Key names
//! are hex-encoded into file names so arbitrary key characters survive
//! the filesystem. Driver handles share the directory but keep private
//! write caches; only `commit` touches disk.

use crate::{contract_code_key, StateBackend, StateDriver, StorageError};
use async_trait::async_trait;
use estimator_types::{ConfigSchema, Field, FieldType, Schema, StateValue, ValidationError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

const VALUE_EXTENSION: &str = "json";

/// File-backed backing store rooted at a directory.
pub struct FileBackend {
	root: PathBuf,
}

impl FileBackend {
	/// Creates a backend rooted at the given directory, creating it if
	/// necessary.
	pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
		let root = root.into();
		std::fs::create_dir_all(&root)
			.map_err(|e| StorageError::Backend(format!("Failed to create {:?}: {}", root, e)))?;
		Ok(Self { root })
	}
}

impl StateBackend for FileBackend {
	fn driver(&self) -> Box<dyn StateDriver> {
		Box::new(FileDriver {
			root: self.root.clone(),
			cache: RwLock::new(BTreeMap::new()),
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileBackendSchema)
	}
}

/// A driver handle over the shared storage directory.
pub struct FileDriver {
	root: PathBuf,
	cache: RwLock<BTreeMap<String, StateValue>>,
}

impl FileDriver {
	fn value_path(&self, key: &str) -> PathBuf {
		self.root
			.join(format!("{}.{}", hex::encode(key), VALUE_EXTENSION))
	}
}

/// Recovers a state key from an on-disk file name.
fn key_from_file_name(path: &Path) -> Option<String> {
	let stem = path.file_stem()?.to_str()?;
	if path.extension()?.to_str()? != VALUE_EXTENSION {
		return None;
	}
	let bytes = hex::decode(stem).ok()?;
	String::from_utf8(bytes).ok()
}

#[async_trait]
impl StateDriver for FileDriver {
	async fn get(&self, key: &str) -> Result<Option<StateValue>, StorageError> {
		if let Some(value) = self.cache.read().await.get(key) {
			return Ok(Some(value.clone()));
		}
		match fs::read(self.value_path(key)).await {
			Ok(bytes) => serde_json::from_slice(&bytes)
				.map(Some)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set(&self, key: &str, value: StateValue) -> Result<(), StorageError> {
		self.cache.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut keys: Vec<String> = Vec::new();
		let mut entries = fs::read_dir(&self.root)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			if let Some(key) = key_from_file_name(&entry.path()) {
				if key.starts_with(prefix) {
					keys.push(key);
				}
			}
		}
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
		let staged = std::mem::take(&mut *self.cache.write().await);
		for (key, value) in staged {
			let bytes = serde_json::to_vec(&value)
				.map_err(|e| StorageError::Serialization(e.to_string()))?;
			fs::write(self.value_path(&key), bytes)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}
		Ok(())
	}
}

/// Configuration schema for the file backend.
pub struct FileBackendSchema;

impl ConfigSchema for FileBackendSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![
				Field::new("path", FieldType::String).with_validator(|v| {
					if v.as_str().is_some_and(|s| s.is_empty()) {
						Err("storage path must not be empty".to_string())
					} else {
						Ok(())
					}
				}),
			],
			vec![],
		)
		.validate(config)
	}
}

/// Factory function to create a file backend from configuration.
///
/// Configuration parameters:
/// - `path`: directory the state files live under
pub fn create_backend(config: &toml::Value) -> Result<Arc<dyn StateBackend>, StorageError> {
	FileBackendSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	let path = config
		.get("path")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("Missing 'path'".to_string()))?;
	Ok(Arc::new(FileBackend::new(path)?))
}
