//! Built-in native execution engine.
//!
//! A deterministic engine that executes the node's built-in `currency`
//! contract (`transfer`, `balance_of`) with byte-based stamp metering.
//! It exists so the estimation service runs end-to-end without an
//! external engine process; chains with a full contract engine plug it in
//! behind the same interface.
//!
//! Metering charges per byte moved through state: reads cost 3 stamps per
//! byte of key plus value, writes cost 25. Exceeding the stamp budget
//! aborts the call with a non-zero status; it is never an engine fault.

use crate::{ContractCall, ExecutionError, ExecutionInterface, ExecutionSettings};
use async_trait::async_trait;
use estimator_storage::StateDriver;
use estimator_types::{ConfigSchema, ExecutionEnvironment, ExecutionOutput, Schema, StateValue, ValidationError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stamps charged per byte read from state.
const READ_COST_PER_BYTE: u64 = 3;
/// Stamps charged per byte written to state.
const WRITE_COST_PER_BYTE: u64 = 25;

/// Name of the built-in token contract.
const CURRENCY_CONTRACT: &str = "currency";

/// The built-in deterministic engine.
pub struct NativeEngine;

impl NativeEngine {
	/// Creates a native engine.
	pub fn new() -> Self {
		Self
	}
}

impl Default for NativeEngine {
	fn default() -> Self {
		Self::new()
	}
}

/// A contract-level failure, reported as normal non-zero-status output.
struct CallFailure(String);

/// Tracks stamps consumed against the budget.
struct Meter {
	used: u64,
	budget: u64,
	enforced: bool,
}

impl Meter {
	fn new(settings: &ExecutionSettings) -> Self {
		Self {
			used: 0,
			budget: settings.stamps_budget,
			enforced: settings.metering,
		}
	}

	fn charge(&mut self, bytes: u64, per_byte: u64) -> Result<(), CallFailure> {
		if !self.enforced {
			return Ok(());
		}
		self.used = self.used.saturating_add(bytes.saturating_mul(per_byte));
		if self.used > self.budget {
			self.used = self.budget;
			Err(CallFailure(format!(
				"execution exceeded the stamp budget of {}",
				self.budget
			)))
		} else {
			Ok(())
		}
	}

	fn charge_read(&mut self, key: &str, value: &Option<StateValue>) -> Result<(), CallFailure> {
		self.charge(
			key.len() as u64 + encoded_len(value),
			READ_COST_PER_BYTE,
		)
	}

	fn charge_write(&mut self, key: &str, value: &StateValue) -> Result<(), CallFailure> {
		self.charge(
			key.len() as u64 + encoded_len(&Some(value.clone())),
			WRITE_COST_PER_BYTE,
		)
	}
}

/// Byte size of a value's canonical encoding; absent values cost nothing.
fn encoded_len(value: &Option<StateValue>) -> u64 {
	value
		.as_ref()
		.map(|v| v.to_canonical_json().to_string().len() as u64)
		.unwrap_or(0)
}

/// State key for an account's token balance.
fn balance_key(account: &str) -> String {
	format!("{}.balances:{}", CURRENCY_CONTRACT, account)
}

/// Coerces a stored or supplied value into a decimal amount.
fn as_amount(value: &StateValue) -> Option<Decimal> {
	match value {
		StateValue::Int(i) => Some(Decimal::from(*i)),
		StateValue::Decimal(d) => Some(*d),
		_ => None,
	}
}

/// Renders a balance for state writes: integers stay integers, anything
/// fractional is stored as a fixed-point decimal.
fn balance_value(amount: Decimal) -> StateValue {
	if amount.is_integer() {
		amount
			.trunc()
			.to_i64()
			.map(StateValue::Int)
			.unwrap_or(StateValue::Decimal(amount))
	} else {
		StateValue::Decimal(amount)
	}
}

#[async_trait]
impl ExecutionInterface for NativeEngine {
	async fn execute(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		_environment: &ExecutionEnvironment,
		settings: &ExecutionSettings,
	) -> Result<ExecutionOutput, ExecutionError> {
		let mut meter = Meter::new(settings);
		let mut writes = BTreeMap::new();

		let outcome = self
			.dispatch(driver, call, settings, &mut meter, &mut writes)
			.await?;

		let output = match outcome {
			Ok(result) => {
				if settings.auto_commit {
					driver.commit().await?;
				}
				ExecutionOutput {
					status_code: 0,
					writes,
					stamps_used: meter.used,
					result,
				}
			},
			Err(CallFailure(reason)) => ExecutionOutput {
				status_code: 1,
				writes: BTreeMap::new(),
				stamps_used: meter.used,
				result: StateValue::Opaque(reason),
			},
		};
		Ok(output)
	}
}

impl NativeEngine {
	/// Routes a call to its handler. `Ok(Err(_))` is a contract failure,
	/// `Err(_)` an engine fault.
	async fn dispatch(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		settings: &ExecutionSettings,
		meter: &mut Meter,
		writes: &mut BTreeMap<String, StateValue>,
	) -> Result<Result<StateValue, CallFailure>, ExecutionError> {
		if !settings.bypass_balance {
			match self.check_stamp_funding(driver, call, settings, meter).await? {
				Ok(()) => {},
				Err(failure) => return Ok(Err(failure)),
			}
		}

		if call.contract != CURRENCY_CONTRACT {
			let known = driver.get_contract(&call.contract).await?;
			let reason = match known {
				Some(_) => format!(
					"contract '{}' has no native implementation",
					call.contract
				),
				None => format!("contract '{}' not found", call.contract),
			};
			return Ok(Err(CallFailure(reason)));
		}

		match call.function.as_str() {
			"transfer" => self.transfer(driver, call, meter, writes).await,
			"balance_of" => self.balance_of(driver, call, meter).await,
			other => Ok(Err(CallFailure(format!(
				"contract '{}' has no function '{}'",
				CURRENCY_CONTRACT, other
			)))),
		}
	}

	/// Verifies the sender could pay for the stamp budget when the
	/// balance check is not bypassed.
	async fn check_stamp_funding(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		settings: &ExecutionSettings,
		meter: &mut Meter,
	) -> Result<Result<(), CallFailure>, ExecutionError> {
		let key = balance_key(&call.sender);
		let stored = driver.get(&key).await?;
		if let Err(failure) = meter.charge_read(&key, &stored) {
			return Ok(Err(failure));
		}
		let balance = stored.as_ref().and_then(as_amount).unwrap_or_default();
		let required = Decimal::from(settings.stamps_budget / settings.stamp_cost.max(1));
		if balance < required {
			return Ok(Err(CallFailure(format!(
				"balance of {} cannot fund a budget of {} stamps",
				balance, settings.stamps_budget
			))));
		}
		Ok(Ok(()))
	}

	async fn transfer(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		meter: &mut Meter,
		writes: &mut BTreeMap<String, StateValue>,
	) -> Result<Result<StateValue, CallFailure>, ExecutionError> {
		let to = match call.kwargs.get("to").and_then(|v| v.as_text()) {
			Some(to) => to.to_string(),
			None => return Ok(Err(CallFailure("missing keyword argument 'to'".into()))),
		};
		let amount = match call.kwargs.get("amount").and_then(as_amount) {
			Some(amount) => amount,
			None => {
				return Ok(Err(CallFailure(
					"missing or non-numeric keyword argument 'amount'".into(),
				)))
			},
		};
		if amount <= Decimal::ZERO {
			return Ok(Err(CallFailure(format!(
				"cannot transfer non-positive amount {}",
				amount
			))));
		}

		let sender_key = balance_key(&call.sender);
		let stored_sender = driver.get(&sender_key).await?;
		if let Err(failure) = meter.charge_read(&sender_key, &stored_sender) {
			return Ok(Err(failure));
		}
		let sender_balance = stored_sender.as_ref().and_then(as_amount).unwrap_or_default();
		if sender_balance < amount {
			return Ok(Err(CallFailure(format!(
				"insufficient balance of {} for transfer of {}",
				sender_balance, amount
			))));
		}

		let to_key = balance_key(&to);
		let stored_to = driver.get(&to_key).await?;
		if let Err(failure) = meter.charge_read(&to_key, &stored_to) {
			return Ok(Err(failure));
		}
		let to_balance = stored_to.as_ref().and_then(as_amount).unwrap_or_default();

		let debited = balance_value(sender_balance - amount);
		let credited = balance_value(to_balance + amount);
		if let Err(failure) = meter.charge_write(&sender_key, &debited) {
			return Ok(Err(failure));
		}
		if let Err(failure) = meter.charge_write(&to_key, &credited) {
			return Ok(Err(failure));
		}

		driver.set(&sender_key, debited.clone()).await?;
		driver.set(&to_key, credited.clone()).await?;
		writes.insert(sender_key, debited);
		writes.insert(to_key, credited);

		Ok(Ok(StateValue::Null))
	}

	async fn balance_of(
		&self,
		driver: &dyn StateDriver,
		call: &ContractCall,
		meter: &mut Meter,
	) -> Result<Result<StateValue, CallFailure>, ExecutionError> {
		let account = match call.kwargs.get("account").and_then(|v| v.as_text()) {
			Some(account) => account.to_string(),
			None => {
				return Ok(Err(CallFailure(
					"missing keyword argument 'account'".into(),
				)))
			},
		};
		let key = balance_key(&account);
		let stored = driver.get(&key).await?;
		if let Err(failure) = meter.charge_read(&key, &stored) {
			return Ok(Err(failure));
		}
		Ok(Ok(stored.unwrap_or(StateValue::Int(0))))
	}
}

/// Configuration schema for the native engine.
pub struct NativeEngineSchema;

impl ConfigSchema for NativeEngineSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// The native engine has no required configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a native engine from configuration.
pub fn create_engine(
	_config: &toml::Value,
) -> Result<Arc<dyn ExecutionInterface>, ExecutionError> {
	Ok(Arc::new(NativeEngine::new()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use estimator_storage::implementations::memory::MemoryBackend;
	use estimator_storage::StateBackend;

	fn environment() -> ExecutionEnvironment {
		ExecutionEnvironment {
			block_hash: "0".repeat(64),
			block_num: 1,
			input_hash: "0".repeat(64),
			now: chrono_now(),
			auxiliary_salt: "0".repeat(64),
		}
	}

	fn chrono_now() -> chrono::DateTime<chrono::Utc> {
		chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()
	}

	fn settings() -> ExecutionSettings {
		ExecutionSettings {
			stamps_budget: 9_999_999 * 20,
			stamp_cost: 20,
			metering: true,
			bypass_balance: true,
			bypass_cache: true,
			auto_commit: false,
		}
	}

	fn call(function: &str, kwargs: &[(&str, StateValue)]) -> ContractCall {
		ContractCall {
			sender: "bob".to_string(),
			contract: CURRENCY_CONTRACT.to_string(),
			function: function.to_string(),
			kwargs: kwargs
				.iter()
				.map(|(k, v)| (k.to_string(), v.clone()))
				.collect(),
		}
	}

	async fn seeded_backend(balance: i64) -> MemoryBackend {
		let backend = MemoryBackend::new();
		let driver = backend.driver();
		driver
			.set(&balance_key("bob"), StateValue::Int(balance))
			.await
			.unwrap();
		driver.commit().await.unwrap();
		backend
	}

	#[tokio::test]
	async fn test_transfer_debits_and_credits() {
		let backend = seeded_backend(100).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let output = engine
			.execute(
				&*driver,
				&call(
					"transfer",
					&[("to", StateValue::from("alice")), ("amount", StateValue::Int(50))],
				),
				&environment(),
				&settings(),
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 0);
		assert!(output.stamps_used > 0);
		assert_eq!(output.result, StateValue::Null);
		assert_eq!(
			output.writes.get(&balance_key("bob")),
			Some(&StateValue::Int(50))
		);
		assert_eq!(
			output.writes.get(&balance_key("alice")),
			Some(&StateValue::Int(50))
		);
	}

	#[tokio::test]
	async fn test_insufficient_balance_is_normal_output() {
		let backend = seeded_backend(10).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let output = engine
			.execute(
				&*driver,
				&call(
					"transfer",
					&[("to", StateValue::from("alice")), ("amount", StateValue::Int(50))],
				),
				&environment(),
				&settings(),
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 1);
		assert!(output.writes.is_empty());
		match output.result {
			StateValue::Opaque(reason) => assert!(reason.contains("insufficient balance")),
			other => panic!("expected failure reason, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_decimal_amount_produces_decimal_balances() {
		let backend = seeded_backend(100).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let output = engine
			.execute(
				&*driver,
				&call(
					"transfer",
					&[
						("to", StateValue::from("alice")),
						("amount", StateValue::Decimal("2.5".parse().unwrap())),
					],
				),
				&environment(),
				&settings(),
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 0);
		assert_eq!(
			output.writes.get(&balance_key("bob")),
			Some(&StateValue::Decimal("97.5".parse().unwrap()))
		);
	}

	#[tokio::test]
	async fn test_unknown_contract_reports_not_found() {
		let backend = seeded_backend(100).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let mut unknown = call("transfer", &[]);
		unknown.contract = "token".to_string();
		let output = engine
			.execute(&*driver, &unknown, &environment(), &settings())
			.await
			.unwrap();

		assert_eq!(output.status_code, 1);
		match output.result {
			StateValue::Opaque(reason) => assert!(reason.contains("not found")),
			other => panic!("expected failure reason, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_budget_exhaustion_caps_stamps() {
		let backend = seeded_backend(100).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let mut tight = settings();
		tight.stamps_budget = 10;
		let output = engine
			.execute(
				&*driver,
				&call(
					"transfer",
					&[("to", StateValue::from("alice")), ("amount", StateValue::Int(50))],
				),
				&environment(),
				&tight,
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 1);
		assert_eq!(output.stamps_used, 10);
		assert!(output.writes.is_empty());
	}

	#[tokio::test]
	async fn test_balance_check_applies_when_not_bypassed() {
		let backend = seeded_backend(10).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let mut checked = settings();
		checked.bypass_balance = false;
		let output = engine
			.execute(
				&*driver,
				&call("balance_of", &[("account", StateValue::from("bob"))]),
				&environment(),
				&checked,
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 1);
		match output.result {
			StateValue::Opaque(reason) => assert!(reason.contains("cannot fund")),
			other => panic!("expected failure reason, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_balance_of_reads_without_writes() {
		let backend = seeded_backend(75).await;
		let driver = backend.driver();
		let engine = NativeEngine::new();

		let output = engine
			.execute(
				&*driver,
				&call("balance_of", &[("account", StateValue::from("bob"))]),
				&environment(),
				&settings(),
			)
			.await
			.unwrap();

		assert_eq!(output.status_code, 0);
		assert_eq!(output.result, StateValue::Int(75));
		assert!(output.writes.is_empty());
		assert!(output.stamps_used > 0);
	}
}
