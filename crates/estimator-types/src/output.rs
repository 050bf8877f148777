//! Execution and response output types.

use crate::transaction::Transaction;
use crate::value::StateValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Normalized output of one engine invocation.
///
/// `writes` are proposed state changes only; nothing here has been
/// committed. The map keeps keys in lexicographic order, which is the
/// order the response reports them in.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
	/// Engine status code; zero is success, anything else is a
	/// contract-level failure reported as normal output.
	pub status_code: u64,
	/// Proposed state writes, keyed by state key.
	pub writes: BTreeMap<String, StateValue>,
	/// Stamps the call consumed under metering.
	pub stamps_used: u64,
	/// The contract call's return value.
	pub result: StateValue,
}

/// One proposed state write in a response, already in wire form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateWrite {
	/// The state key the contract would write.
	pub key: String,
	/// The proposed value, encoded to native JSON.
	pub value: Value,
}

/// The response payload for one estimation request.
///
/// Every field is JSON-native by the time this structure exists; the
/// result formatter guarantees there are no decimals, timestamps, or
/// opaque objects left anywhere in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxOutput {
	/// The transaction as submitted, echoed back.
	pub transaction: Transaction,
	/// Engine status code.
	pub status: u64,
	/// Proposed state writes in deterministic key order.
	pub state: Vec<StateWrite>,
	/// Stamps the call consumed.
	pub stamps_used: u64,
	/// Safe textual form of the return value, if one could be produced.
	pub result: Option<String>,
}
