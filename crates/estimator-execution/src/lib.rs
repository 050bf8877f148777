//! Execution engine module for the stamp estimation service.
//!
//! This module defines the interface to the contract execution engine the
//! estimation pipeline consumes. The engine is an opaque capability: given
//! a contract call, an execution environment, and sandbox settings, it
//! produces a status code, proposed writes, a stamp count, and a return
//! value. Contract-level failures are normal output (a non-zero status
//! code); only internal engine faults surface as errors.

use async_trait::async_trait;
use estimator_storage::{StateDriver, StorageError};
use estimator_types::{ExecutionEnvironment, ExecutionOutput, StateValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod native;
}

/// Errors that can occur inside the execution engine.
///
/// These are engine faults, not contract failures: a request that hits
/// one gets no response and its connection is closed.
#[derive(Debug, Error)]
pub enum ExecutionError {
	/// The state driver failed underneath the engine.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// The engine itself failed.
	#[error("Engine error: {0}")]
	Internal(String),
	/// Configuration validation failed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// The contract call extracted from a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
	/// The calling account.
	pub sender: String,
	/// The contract to call.
	pub contract: String,
	/// The function to invoke.
	pub function: String,
	/// Keyword arguments, decoded from their canonical JSON forms.
	pub kwargs: BTreeMap<String, StateValue>,
}

/// Sandbox settings for one engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSettings {
	/// Hard ceiling on stamps the call may consume.
	pub stamps_budget: u64,
	/// Price of one stamp in the fee currency.
	pub stamp_cost: u64,
	/// Whether stamp metering is enforced.
	pub metering: bool,
	/// Whether the sender's balance check for the stamp purchase is
	/// skipped.
	pub bypass_balance: bool,
	/// Whether any engine-side read cache is skipped.
	pub bypass_cache: bool,
	/// Whether staged writes are committed after a successful call.
	pub auto_commit: bool,
}

/// The contract execution engine consumed by the estimation pipeline.
#[async_trait]
pub trait ExecutionInterface: Send + Sync {
	/// Executes a contract call against the given driver handle.
	///
	/// Writes land in the driver's cache and in the returned output; the
	/// caller decides whether they are committed or flushed.
	async fn execute(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		environment: &ExecutionEnvironment,
		settings: &ExecutionSettings,
	) -> Result<ExecutionOutput, ExecutionError>;
}

/// Type alias for engine factory functions.
pub type EngineFactory = fn(&toml::Value) -> Result<Arc<dyn ExecutionInterface>, ExecutionError>;

/// Get all registered engine implementations.
pub fn get_all_implementations() -> Vec<(&'static str, EngineFactory)> {
	use implementations::native;

	vec![("native", native::create_engine as EngineFactory)]
}
