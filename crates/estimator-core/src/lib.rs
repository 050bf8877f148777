//! Core estimation pipeline for the stamp estimation service.
//!
//! This module coordinates one estimation request end to end: generate a
//! synthetic execution environment, resolve the current stamp cost, run
//! the transaction through the execution engine under sandbox settings,
//! and shape the output into the transport-safe response structure.
//! Nothing in the pipeline ever commits state; every request runs against
//! a fresh driver handle whose write cache is discarded afterwards.

use estimator_execution::{ExecutionError, ExecutionInterface};
use estimator_storage::StateBackend;
use estimator_types::{Transaction, TxOutput};
use std::sync::Arc;
use thiserror::Error;

pub mod adapter;
pub mod environment;
pub mod format;
pub mod stamp_cost;

/// Errors that can occur during estimation.
#[derive(Debug, Error)]
pub enum EstimatorError {
	/// The execution engine faulted; no response is produced.
	#[error("Execution error: {0}")]
	Execution(#[from] ExecutionError),
	/// The response could not be serialized.
	#[error("Serialization error: {0}")]
	Serialization(String),
}

/// The estimation pipeline.
///
/// Owns the shared state backend and the execution engine; everything
/// else is created fresh per request.
pub struct Estimator {
	/// Shared backing store; each request gets its own driver handle.
	backend: Arc<dyn StateBackend>,
	/// The contract execution engine.
	engine: Arc<dyn ExecutionInterface>,
}

impl Estimator {
	/// Creates an estimator over the given backend and engine.
	pub fn new(backend: Arc<dyn StateBackend>, engine: Arc<dyn ExecutionInterface>) -> Self {
		Self { backend, engine }
	}

	/// Estimates one transaction.
	///
	/// Runs the full pipeline and returns the response payload. An error
	/// here is an engine or serialization fault; contract-level failures
	/// come back as a successful `TxOutput` with a non-zero status.
	pub async fn estimate(&self, transaction: Transaction) -> Result<TxOutput, EstimatorError> {
		let environment = environment::generate();
		let driver = self.backend.driver();
		let stamp_cost = stamp_cost::resolve(&*driver).await;
		tracing::debug!(
			contract = %transaction.payload.contract,
			function = %transaction.payload.function,
			stamp_cost,
			"Estimating transaction"
		);

		let output = adapter::run(
			&*self.engine,
			&*driver,
			&transaction,
			&environment,
			stamp_cost,
		)
		.await?;
		tracing::debug!(
			status = output.status_code,
			stamps_used = output.stamps_used,
			"Estimation complete"
		);

		Ok(format::format(transaction, output))
	}
}
