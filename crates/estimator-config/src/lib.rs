//! Configuration module for the stamp estimation service.
//!
//! This module provides structures and utilities for managing service
//! configuration. It supports loading configuration from TOML files and
//! validates that all required configuration values are properly set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the estimation service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration for the socket service itself.
	pub service: ServiceConfig,
	/// Configuration for the state storage backend.
	pub storage: StorageConfig,
	/// Configuration for the execution engine.
	#[serde(default)]
	pub execution: ExecutionConfig,
}

/// Configuration for the socket service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Filesystem path of the Unix domain socket to listen on.
	pub socket_path: PathBuf,
}

/// Configuration for the state storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of backend implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the execution engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
	/// Which implementation to use as primary.
	#[serde(default = "default_engine")]
	pub primary: String,
	/// Map of engine implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl Default for ExecutionConfig {
	fn default() -> Self {
		Self {
			primary: default_engine(),
			implementations: HashMap::new(),
		}
	}
}

/// Returns the default execution engine implementation name.
fn default_engine() -> String {
	"native".to_string()
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		Self::from_toml_str(&contents)
	}

	/// Async variant of `from_file`.
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		let contents = tokio::fs::read_to_string(path).await?;
		Self::from_toml_str(&contents)
	}

	/// Parses and validates configuration from TOML text.
	pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates cross-field constraints after parsing.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.socket_path.as_os_str().is_empty() {
			return Err(ConfigError::Validation(
				"service.socket_path must not be empty".to_string(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"storage.primary must not be empty".to_string(),
			));
		}
		if !self.storage.implementations.contains_key(&self.storage.primary) {
			return Err(ConfigError::Validation(format!(
				"storage.implementations is missing the primary backend '{}'",
				self.storage.primary
			)));
		}
		Ok(())
	}

	/// Returns the configuration table for the primary storage backend,
	/// or an empty table when none was given.
	pub fn primary_storage(&self) -> toml::Value {
		self.storage
			.implementations
			.get(&self.storage.primary)
			.cloned()
			.unwrap_or(toml::Value::Table(toml::map::Map::new()))
	}

	/// Returns the configuration table for the primary engine, or an
	/// empty table when none was given.
	pub fn primary_engine(&self) -> toml::Value {
		self.execution
			.implementations
			.get(&self.execution.primary)
			.cloned()
			.unwrap_or(toml::Value::Table(toml::map::Map::new()))
	}
}
