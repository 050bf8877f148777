//! Execution environment generation.
//!
//! Estimation runs against a synthetic block context rather than real
//! chain data: the block hash, input hash, and salt are drawn fresh from
//! a cryptographically secure source on every call so a client cannot
//! bias randomness-consuming contract logic by predicting them.

use chrono::Utc;
use estimator_types::ExecutionEnvironment;
use rand::rngs::OsRng;
use rand::RngCore;

/// Default block number an estimation pretends to run at.
pub const DEFAULT_BLOCK_NUM: u64 = 1;

/// Generates a fresh environment with the default block number.
pub fn generate() -> ExecutionEnvironment {
	generate_with(None, DEFAULT_BLOCK_NUM)
}

/// Generates a fresh environment, optionally pinning the block hash and
/// number.
///
/// The input hash and auxiliary salt are always drawn independently;
/// only the block coordinates can be pinned by callers that estimate
/// against a known block.
pub fn generate_with(block_hash: Option<String>, block_num: u64) -> ExecutionEnvironment {
	ExecutionEnvironment {
		block_hash: block_hash.unwrap_or_else(random_hex),
		block_num,
		input_hash: random_hex(),
		now: Utc::now(),
		auxiliary_salt: random_hex(),
	}
}

/// Draws 32 bytes from the OS CSPRNG and hex-encodes them to 64
/// characters.
fn random_hex() -> String {
	let mut bytes = [0u8; 32];
	OsRng.fill_bytes(&mut bytes);
	hex::encode(bytes)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_environment_shape() {
		let env = generate();
		assert_eq!(env.block_hash.len(), 64);
		assert_eq!(env.input_hash.len(), 64);
		assert_eq!(env.auxiliary_salt.len(), 64);
		assert!(env.block_hash.chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(env.block_num, 1);
	}

	#[test]
	fn test_fields_are_drawn_independently() {
		let env = generate();
		assert_ne!(env.block_hash, env.input_hash);
		assert_ne!(env.input_hash, env.auxiliary_salt);

		let other = generate();
		assert_ne!(env.block_hash, other.block_hash);
	}

	#[test]
	fn test_overrides_pin_block_coordinates() {
		let env = generate_with(Some("f".repeat(64)), 9);
		assert_eq!(env.block_hash, "f".repeat(64));
		assert_eq!(env.block_num, 9);
	}
}
