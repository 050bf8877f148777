//! Transaction request types.
//!
//! A transaction is the request payload a client submits for estimation.
//! Beyond the fields the execution pipeline needs, it is treated as opaque:
//! unknown fields are captured and echoed back so the engine can see them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate transaction submitted for stamp estimation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
	/// The contract call the transaction performs.
	pub payload: TransactionPayload,
	/// Signature and other envelope metadata.
	pub metadata: TransactionMetadata,
}

/// The contract call carried by a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionPayload {
	/// Address of the account submitting the transaction.
	pub sender: String,
	/// Name of the contract to call.
	pub contract: String,
	/// Name of the function to invoke on the contract.
	pub function: String,
	/// Keyword arguments for the function, in canonical JSON form.
	#[serde(default)]
	pub kwargs: Map<String, Value>,
	/// Stamps the sender attached; estimation computes its own budget.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stamps_supplied: Option<u64>,
	/// Fields the estimator does not interpret, preserved verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Envelope metadata attached to a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionMetadata {
	/// Signature over the payload.
	pub signature: String,
	/// Fields the estimator does not interpret, preserved verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
