//! Stamp cost resolution.
//!
//! The price of one stamp is governed on chain and read from the
//! `stamp_cost` contract's state. Estimation must never fail because
//! pricing metadata is temporarily unavailable, so resolution always
//! succeeds: any lookup failure falls back to the fixed default, and
//! `resolve` returns a plain integer, not a `Result`.

use estimator_storage::StateDriver;

/// Fallback price used when the chain-configured value is unavailable.
pub const DEFAULT_STAMP_COST: u64 = 20;

/// State key holding the governed cost per stamp.
pub const STAMP_COST_KEY: &str = "stamp_cost.S:value";

/// Resolves the current cost per stamp.
///
/// Supports both native integers and fixed-point decimal representations
/// of the stored value; anything else, a missing key, or a driver error
/// yields the default.
pub async fn resolve(driver: &dyn StateDriver) -> u64 {
	match driver.get(STAMP_COST_KEY).await {
		Ok(Some(value)) => match value.as_integer().and_then(|i| u64::try_from(i).ok()) {
			Some(cost) if cost > 0 => cost,
			_ => {
				tracing::debug!(?value, "Unusable stamp cost value, using default");
				DEFAULT_STAMP_COST
			},
		},
		Ok(None) => DEFAULT_STAMP_COST,
		Err(e) => {
			tracing::debug!("Stamp cost lookup failed, using default: {}", e);
			DEFAULT_STAMP_COST
		},
	}
}
