//! Execution adapter.
//!
//! Bridges a parsed transaction onto the execution engine with the
//! sandbox settings estimation requires: metering on, the stamp-purchase
//! balance check bypassed, no read caching, no auto-commit, and a stamp
//! budget far above anything a real wallet would fund so the estimate is
//! never clipped by affordability.
//!
//! Whatever the engine does, the driver's write cache is flushed before
//! the adapter returns. That unconditional flush is the sandbox
//! guarantee: no estimation can leave a durable write behind.

use estimator_execution::{ContractCall, ExecutionError, ExecutionInterface, ExecutionSettings};
use estimator_storage::StateDriver;
use estimator_types::{ExecutionEnvironment, ExecutionOutput, StateValue, Transaction};

/// Surrogate wallet balance used to compute the stamp budget.
pub const FIXED_BALANCE: u64 = 9_999_999;

/// Runs one transaction against the engine under estimation settings.
pub async fn run(
	engine: &dyn ExecutionInterface,
	driver: &dyn StateDriver,
	transaction: &Transaction,
	environment: &ExecutionEnvironment,
	stamp_cost: u64,
) -> Result<ExecutionOutput, ExecutionError> {
	let call = ContractCall {
		sender: transaction.payload.sender.clone(),
		contract: transaction.payload.contract.clone(),
		function: transaction.payload.function.clone(),
		kwargs: transaction
			.payload
			.kwargs
			.iter()
			.map(|(k, v)| (k.clone(), StateValue::from_canonical_json(v.clone())))
			.collect(),
	};
	let settings = ExecutionSettings {
		stamps_budget: FIXED_BALANCE.saturating_mul(stamp_cost),
		stamp_cost,
		metering: true,
		bypass_balance: true,
		bypass_cache: true,
		auto_commit: false,
	};

	let executed = engine.execute(driver, &call, environment, &settings).await;
	// The flush must happen even when the engine faulted
	let flushed = driver.flush_cache().await;

	let output = executed?;
	flushed?;
	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::environment;
	use estimator_storage::implementations::memory::MemoryBackend;
	use estimator_storage::StateBackend;
	use estimator_execution::implementations::native::NativeEngine;

	fn transfer_transaction(amount: i64) -> Transaction {
		serde_json::from_value(serde_json::json!({
			"payload": {
				"sender": "bob",
				"contract": "currency",
				"function": "transfer",
				"kwargs": { "to": "alice", "amount": amount }
			},
			"metadata": { "signature": "sig" }
		}))
		.unwrap()
	}

	async fn seeded_backend() -> MemoryBackend {
		let backend = MemoryBackend::new();
		let driver = backend.driver();
		driver
			.set("currency.balances:bob", StateValue::Int(100))
			.await
			.unwrap();
		driver.commit().await.unwrap();
		backend
	}

	#[tokio::test]
	async fn test_run_reports_writes_without_committing() {
		let backend = seeded_backend().await;
		let engine = NativeEngine::new();

		let driver = backend.driver();
		let output = run(
			&engine,
			&*driver,
			&transfer_transaction(50),
			&environment::generate(),
			20,
		)
		.await
		.unwrap();

		assert_eq!(output.status_code, 0);
		assert_eq!(output.writes.len(), 2);
		// The backing store must still hold the original balance
		assert_eq!(
			backend
				.driver()
				.get("currency.balances:bob")
				.await
				.unwrap(),
			Some(StateValue::Int(100))
		);
	}

	#[tokio::test]
	async fn test_repeated_runs_never_mutate_durable_state() {
		let backend = seeded_backend().await;
		let engine = NativeEngine::new();

		for _ in 0..5 {
			let driver = backend.driver();
			run(
				&engine,
				&*driver,
				&transfer_transaction(50),
				&environment::generate(),
				20,
			)
			.await
			.unwrap();
		}

		assert_eq!(
			backend
				.driver()
				.get("currency.balances:bob")
				.await
				.unwrap(),
			Some(StateValue::Int(100))
		);
		assert_eq!(
			backend
				.driver()
				.get("currency.balances:alice")
				.await
				.unwrap(),
			None
		);
	}

	#[tokio::test]
	async fn test_budget_scales_with_stamp_cost() {
		let backend = seeded_backend().await;
		let engine = NativeEngine::new();

		let driver = backend.driver();
		let output = run(
			&engine,
			&*driver,
			&transfer_transaction(50),
			&environment::generate(),
			40,
		)
		.await
		.unwrap();

		// A generous budget means a simple transfer never exhausts it
		assert_eq!(output.status_code, 0);
		assert!(output.stamps_used < FIXED_BALANCE * 40);
	}
}
