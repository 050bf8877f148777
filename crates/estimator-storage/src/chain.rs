//! Helpers over the chain's singleton state keys.
//!
//! The node tracks the latest block hash and height under two well-known
//! keys. Height is always handled as a plain integer: legacy state may
//! hold it as a fixed-point decimal, which is coerced down on read.

use crate::{StateDriver, StorageError};
use estimator_types::StateValue;

/// Singleton key for the latest committed block hash.
pub const LATEST_BLOCK_HASH_KEY: &str = "__latest_block.hash";
/// Singleton key for the latest committed block height.
pub const LATEST_BLOCK_HEIGHT_KEY: &str = "__latest_block.height";

/// Reads the latest block hash, defaulting to the empty string when the
/// chain has no blocks yet.
pub async fn latest_block_hash(driver: &dyn StateDriver) -> Result<String, StorageError> {
	let value = driver.get(LATEST_BLOCK_HASH_KEY).await?;
	Ok(value
		.and_then(|v| v.as_text().map(str::to_string))
		.unwrap_or_default())
}

/// Writes the latest block hash through to the backing store.
pub async fn set_latest_block_hash(
	driver: &dyn StateDriver,
	hash: &str,
) -> Result<(), StorageError> {
	driver
		.set(LATEST_BLOCK_HASH_KEY, StateValue::from(hash))
		.await?;
	driver.commit().await
}

/// Reads the latest block height, defaulting to 0.
pub async fn latest_block_height(driver: &dyn StateDriver) -> Result<u64, StorageError> {
	let value = driver.get(LATEST_BLOCK_HEIGHT_KEY).await?;
	let height = value.and_then(|v| v.as_integer()).unwrap_or(0);
	u64::try_from(height)
		.map_err(|_| StorageError::Serialization(format!("Negative block height {}", height)))
}

/// Writes the latest block height through to the backing store as a
/// plain integer.
pub async fn set_latest_block_height(
	driver: &dyn StateDriver,
	height: u64,
) -> Result<(), StorageError> {
	let height = i64::try_from(height)
		.map_err(|_| StorageError::Serialization(format!("Block height {} overflows", height)))?;
	driver
		.set(LATEST_BLOCK_HEIGHT_KEY, StateValue::Int(height))
		.await?;
	driver.commit().await
}

/// Reads an arbitrary state key.
pub async fn value_of_key(
	driver: &dyn StateDriver,
	key: &str,
) -> Result<Option<StateValue>, StorageError> {
	driver.get(key).await
}

/// Lists the keys under a prefix.
pub async fn keys_with_prefix(
	driver: &dyn StateDriver,
	prefix: &str,
) -> Result<Vec<String>, StorageError> {
	driver.keys(prefix).await
}

/// Looks up a contract's source by name.
pub async fn contract_source(
	driver: &dyn StateDriver,
	name: &str,
) -> Result<Option<String>, StorageError> {
	driver.get_contract(name).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryBackend;
	use crate::StateBackend;

	#[tokio::test]
	async fn test_defaults_for_empty_chain() {
		let backend = MemoryBackend::new();
		let driver = backend.driver();
		assert_eq!(latest_block_hash(&*driver).await.unwrap(), "");
		assert_eq!(latest_block_height(&*driver).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_singletons_round_trip_durably() {
		let backend = MemoryBackend::new();
		let driver = backend.driver();
		set_latest_block_hash(&*driver, "ab".repeat(32).as_str())
			.await
			.unwrap();
		set_latest_block_height(&*driver, 42).await.unwrap();

		let fresh = backend.driver();
		assert_eq!(latest_block_hash(&*fresh).await.unwrap(), "ab".repeat(32));
		assert_eq!(latest_block_height(&*fresh).await.unwrap(), 42);
	}

	#[tokio::test]
	async fn test_decimal_height_is_coerced_to_integer() {
		let backend = MemoryBackend::new();
		let driver = backend.driver();
		driver
			.set(
				LATEST_BLOCK_HEIGHT_KEY,
				StateValue::Decimal("17.0".parse().unwrap()),
			)
			.await
			.unwrap();
		driver.commit().await.unwrap();

		assert_eq!(
			latest_block_height(&*backend.driver()).await.unwrap(),
			17
		);
	}
}
