//! Canonical hashing helpers.
//!
//! These digests commit to node-level data the chain exchanges with its
//! consensus layer: joined transaction hashes, reward payouts, and
//! validator update sets. All of them are SHA3-256 over a canonical
//! encoding and return lowercase 64-hex-character digests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Sha3_256};

/// Hashes a list of items by joining them and digesting the canonical
/// JSON encoding of the joined string.
pub fn hash_list(items: &[String]) -> String {
	let joined = items.concat();
	let encoded = Value::String(joined).to_string();
	let mut hasher = Sha3_256::new();
	hasher.update(encoded.as_bytes());
	hex::encode(hasher.finalize())
}

/// Hashes a reward payout structure via its canonical JSON encoding.
pub fn hash_from_rewards(rewards: &Value) -> String {
	let mut hasher = Sha3_256::new();
	hasher.update(rewards.to_string().as_bytes());
	hex::encode(hasher.finalize())
}

/// One entry in a validator update set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorUpdate {
	/// The validator's public key bytes.
	pub public_key: Vec<u8>,
	/// The validator's new voting power.
	pub power: i64,
}

impl ValidatorUpdate {
	/// Canonical binary serialization: public key bytes followed by the
	/// power as an 8-byte big-endian integer.
	pub fn canonical_bytes(&self) -> Vec<u8> {
		let mut bytes = Vec::with_capacity(self.public_key.len() + 8);
		bytes.extend_from_slice(&self.public_key);
		bytes.extend_from_slice(&self.power.to_be_bytes());
		bytes
	}
}

/// Hashes a validator update set.
///
/// The digest is accumulated over each update's canonical serialization
/// in sequence order, so reordering the set changes the digest.
pub fn hash_from_validator_updates(updates: &[ValidatorUpdate]) -> String {
	let mut hasher = Sha3_256::new();
	for update in updates {
		hasher.update(update.canonical_bytes());
	}
	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_list_is_stable_and_hex() {
		let items = vec!["aa".to_string(), "bb".to_string()];
		let digest = hash_list(&items);
		assert_eq!(digest.len(), 64);
		assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
		assert_eq!(digest, hash_list(&items));
	}

	#[test]
	fn test_hash_list_depends_on_content() {
		let a = hash_list(&["aa".to_string()]);
		let b = hash_list(&["ab".to_string()]);
		assert_ne!(a, b);
	}

	#[test]
	fn test_rewards_hash_tracks_encoding() {
		let rewards = serde_json::json!({ "alice": "1.5", "bob": "0.5" });
		let digest = hash_from_rewards(&rewards);
		assert_eq!(digest.len(), 64);
		assert_ne!(digest, hash_from_rewards(&serde_json::json!({})));
	}

	#[test]
	fn test_validator_update_hash_is_order_sensitive() {
		let a = ValidatorUpdate {
			public_key: vec![1, 2, 3],
			power: 10,
		};
		let b = ValidatorUpdate {
			public_key: vec![4, 5, 6],
			power: 20,
		};
		let forward = hash_from_validator_updates(&[a.clone(), b.clone()]);
		let reversed = hash_from_validator_updates(&[b, a]);
		assert_eq!(forward.len(), 64);
		assert_ne!(forward, reversed);
	}
}
