//! Boundary value union for the estimation service.
//!
//! Contract state and contract return values cross three boundaries: the
//! state driver, the execution engine, and the JSON wire protocol. This
//! module models the closed set of value kinds that may cross those
//! boundaries as a single tagged union, with an explicit `Opaque` fallback
//! carrying a safe textual form for anything the engine produces that has
//! no native encoding.
//!
//! At rest (and in kwargs), decimals and timestamps use the chain's
//! canonical tagged encodings: `{"__fixed__": "<digits>"}` and
//! `{"__time__": [year, month, day, hour, minute, second, microsecond]}`.
//! The result formatter converts these into plain strings before anything
//! reaches the wire.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Tag key for the canonical fixed-point decimal encoding.
pub const FIXED_TAG: &str = "__fixed__";
/// Tag key for the canonical timestamp encoding.
pub const TIME_TAG: &str = "__time__";

/// A value stored in chain state or produced by a contract call.
///
/// The variants are the finite set of "boundary-crossable" kinds the
/// execution engine can produce. `Opaque` is the explicit fallback for
/// unencodable values and carries their textual representation.
#[derive(Debug, Clone, PartialEq)]
pub enum StateValue {
	/// The absent / null value.
	Null,
	/// A boolean.
	Bool(bool),
	/// A signed integer.
	Int(i64),
	/// A fixed-point decimal.
	Decimal(Decimal),
	/// A UTF-8 string.
	Text(String),
	/// A point in time, second + microsecond precision.
	Timestamp(DateTime<Utc>),
	/// An ordered sequence of values.
	List(Vec<StateValue>),
	/// A key-ordered mapping of string keys to values.
	Map(BTreeMap<String, StateValue>),
	/// An unencodable value, represented only by its textual form.
	Opaque(String),
}

impl StateValue {
	/// Converts the value into its canonical JSON form.
	///
	/// Decimals and timestamps use the tagged `__fixed__` / `__time__`
	/// encodings so they survive a round trip through storage; opaque
	/// values degrade to their textual form.
	pub fn to_canonical_json(&self) -> Value {
		match self {
			StateValue::Null => Value::Null,
			StateValue::Bool(b) => Value::Bool(*b),
			StateValue::Int(i) => Value::from(*i),
			StateValue::Decimal(d) => {
				serde_json::json!({ FIXED_TAG: d.to_string() })
			},
			StateValue::Text(s) => Value::String(s.clone()),
			StateValue::Timestamp(t) => {
				serde_json::json!({
					TIME_TAG: [
						i64::from(t.year()),
						i64::from(t.month()),
						i64::from(t.day()),
						i64::from(t.hour()),
						i64::from(t.minute()),
						i64::from(t.second()),
						i64::from(t.nanosecond() / 1_000),
					]
				})
			},
			StateValue::List(items) => {
				Value::Array(items.iter().map(StateValue::to_canonical_json).collect())
			},
			StateValue::Map(map) => Value::Object(
				map.iter()
					.map(|(k, v)| (k.clone(), v.to_canonical_json()))
					.collect(),
			),
			StateValue::Opaque(s) => Value::String(s.clone()),
		}
	}

	/// Builds a value from its canonical JSON form.
	///
	/// Recognizes the tagged decimal and timestamp encodings; any JSON
	/// number that does not fit an `i64` becomes a `Decimal`, and a number
	/// no decimal can represent degrades to `Opaque`.
	pub fn from_canonical_json(value: Value) -> StateValue {
		match value {
			Value::Null => StateValue::Null,
			Value::Bool(b) => StateValue::Bool(b),
			Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					StateValue::Int(i)
				} else {
					let text = n.to_string();
					text.parse::<Decimal>()
						.or_else(|_| Decimal::from_scientific(&text))
						.map(StateValue::Decimal)
						.unwrap_or(StateValue::Opaque(text))
				}
			},
			Value::String(s) => StateValue::Text(s),
			Value::Array(items) => StateValue::List(
				items
					.into_iter()
					.map(StateValue::from_canonical_json)
					.collect(),
			),
			Value::Object(map) => Self::from_canonical_object(map),
		}
	}

	fn from_canonical_object(map: serde_json::Map<String, Value>) -> StateValue {
		if map.len() == 1 {
			if let Some(Value::String(raw)) = map.get(FIXED_TAG) {
				return raw
					.parse::<Decimal>()
					.map(StateValue::Decimal)
					.unwrap_or_else(|_| StateValue::Text(raw.clone()));
			}
			if let Some(Value::Array(parts)) = map.get(TIME_TAG) {
				if let Some(ts) = timestamp_from_parts(parts) {
					return StateValue::Timestamp(ts);
				}
			}
		}
		StateValue::Map(
			map.into_iter()
				.map(|(k, v)| (k, StateValue::from_canonical_json(v)))
				.collect(),
		)
	}

	/// Coerces an integer-like value down to `i64`.
	///
	/// Decimals are truncated toward zero, matching how chain singletons
	/// such as the block height are read.
	pub fn as_integer(&self) -> Option<i64> {
		match self {
			StateValue::Int(i) => Some(*i),
			StateValue::Decimal(d) => d.trunc().to_i64(),
			_ => None,
		}
	}

	/// Returns the text content of `Text` values.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			StateValue::Text(s) => Some(s),
			_ => None,
		}
	}
}

/// Reconstructs a timestamp from the canonical seven-component list.
fn timestamp_from_parts(parts: &[Value]) -> Option<DateTime<Utc>> {
	if parts.len() != 7 {
		return None;
	}
	let mut nums = parts.iter().map(Value::as_i64);
	let year = nums.next()??;
	let month = u32::try_from(nums.next()??).ok()?;
	let day = u32::try_from(nums.next()??).ok()?;
	let hour = u32::try_from(nums.next()??).ok()?;
	let minute = u32::try_from(nums.next()??).ok()?;
	let second = u32::try_from(nums.next()??).ok()?;
	let micro = u32::try_from(nums.next()??).ok()?;

	let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
	let time = date.and_hms_micro_opt(hour, minute, second, micro)?;
	Some(time.and_utc())
}

impl Serialize for StateValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_canonical_json().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for StateValue {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		Ok(StateValue::from_canonical_json(value))
	}
}

impl fmt::Display for StateValue {
	/// Renders the textual form used by the safe result representation.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateValue::Null => write!(f, "null"),
			StateValue::Bool(b) => write!(f, "{}", b),
			StateValue::Int(i) => write!(f, "{}", i),
			StateValue::Decimal(d) => write!(f, "{}", d),
			StateValue::Text(s) => write!(f, "{}", s),
			StateValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
			StateValue::List(items) => {
				write!(f, "[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", item)?;
				}
				write!(f, "]")
			},
			StateValue::Map(map) => {
				write!(f, "{{")?;
				for (i, (k, v)) in map.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}: {}", k, v)?;
				}
				write!(f, "}}")
			},
			StateValue::Opaque(s) => write!(f, "{}", s),
		}
	}
}

impl From<i64> for StateValue {
	fn from(value: i64) -> Self {
		StateValue::Int(value)
	}
}

impl From<&str> for StateValue {
	fn from(value: &str) -> Self {
		StateValue::Text(value.to_string())
	}
}

impl From<Decimal> for StateValue {
	fn from(value: Decimal) -> Self {
		StateValue::Decimal(value)
	}
}
