//! Execution environment types for sandboxed contract calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The synthetic block context a contract call is estimated against.
///
/// No real block is being produced during estimation, so every field is
/// surrogate data: the hashes and salt are drawn fresh per request and the
/// block number defaults to 1. An environment lives for exactly one
/// request and is never reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionEnvironment {
	/// Surrogate block hash, 64 hex characters.
	pub block_hash: String,
	/// Block number the call pretends to run at, >= 1.
	pub block_num: u64,
	/// Surrogate input hash, 64 hex characters.
	pub input_hash: String,
	/// Wall-clock time at environment creation.
	pub now: DateTime<Utc>,
	/// Salt available to randomness-consuming contracts, 64 hex characters.
	pub auxiliary_salt: String,
}
