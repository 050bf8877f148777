//! Result formatting.
//!
//! Shapes engine output into the transport-safe response structure. Two
//! guarantees hold at this boundary: every value in the response is
//! JSON-native (decimals and timestamps become strings, opaque values
//! become their safe textual form), and formatting itself never fails a
//! response. An unrepresentable return value degrades to null.

use crate::EstimatorError;
use estimator_types::{
	ExecutionOutput, StateValue, StateWrite, Transaction, TxOutput, FIXED_TAG, TIME_TAG,
};
use serde_json::Value;

/// Hard cap on the textual form of a return value.
pub const MAX_RESULT_LEN: usize = 1024;

/// Marker engines leave in the representation of heap objects.
const ADDRESS_MARKER: &str = " at 0x";

/// Builds the response payload from a transaction and its engine output.
///
/// The `state` sequence preserves the iteration order of the writes map,
/// which is lexicographic by key.
pub fn format(transaction: Transaction, output: ExecutionOutput) -> TxOutput {
	let state = output
		.writes
		.iter()
		.map(|(key, value)| StateWrite {
			key: key.clone(),
			value: to_boundary_json(value),
		})
		.collect();
	let result = match &output.result {
		StateValue::Null => None,
		value => safe_repr(value),
	};

	TxOutput {
		transaction,
		status: output.status_code,
		state,
		stamps_used: output.stamps_used,
		result,
	}
}

/// Serializes a response for the wire, applying the final normalization
/// pass over the whole structure.
pub fn encode_response(output: &TxOutput) -> Result<Vec<u8>, EstimatorError> {
	let value = serde_json::to_value(output)
		.map_err(|e| EstimatorError::Serialization(e.to_string()))?;
	serde_json::to_vec(&normalize_json(value))
		.map_err(|e| EstimatorError::Serialization(e.to_string()))
}

/// Produces the safe textual form of a return value.
///
/// The rendering is truncated at an engine memory-address marker when one
/// is present and always capped at `MAX_RESULT_LEN` characters. Returns
/// `None` only when no textual form can be produced.
pub fn safe_repr(value: &StateValue) -> Option<String> {
	Some(safe_repr_text(&value.to_string()))
}

/// Applies the address-marker truncation and length cap to a rendering.
fn safe_repr_text(rendered: &str) -> String {
	let truncated = match rendered.find(ADDRESS_MARKER) {
		Some(index) => format!("{}>", &rendered[..index]),
		None => rendered.to_string(),
	};
	if truncated.chars().count() > MAX_RESULT_LEN {
		truncated.chars().take(MAX_RESULT_LEN).collect()
	} else {
		truncated
	}
}

/// Encodes a value into its wire-native JSON form.
///
/// Decimals become decimal strings, timestamps become ISO-8601 strings,
/// and opaque values carry their safe textual form; containers are
/// encoded recursively.
pub fn to_boundary_json(value: &StateValue) -> Value {
	match value {
		StateValue::Null => Value::Null,
		StateValue::Bool(b) => Value::Bool(*b),
		StateValue::Int(i) => Value::from(*i),
		StateValue::Decimal(d) => Value::String(d.to_string()),
		StateValue::Text(s) => Value::String(s.clone()),
		StateValue::Timestamp(t) => Value::String(t.to_rfc3339()),
		StateValue::List(items) => Value::Array(items.iter().map(to_boundary_json).collect()),
		StateValue::Map(map) => Value::Object(
			map.iter()
				.map(|(k, v)| (k.clone(), to_boundary_json(v)))
				.collect(),
		),
		StateValue::Opaque(s) => Value::String(safe_repr_text(s)),
	}
}

/// Normalization pass over an already-built response.
///
/// The boundary encoder handles values the pipeline produced itself, but
/// the echoed transaction can still carry canonical state encodings
/// inside its kwargs. This walk rewrites any residual `__fixed__` or
/// `__time__` encoding into its boundary string so the serialized
/// response contains only native forms.
pub fn normalize_json(value: Value) -> Value {
	match value {
		Value::Object(map) => {
			if map.len() == 1 {
				if let Some(Value::String(raw)) = map.get(FIXED_TAG) {
					return Value::String(raw.clone());
				}
				if map.contains_key(TIME_TAG) {
					if let StateValue::Timestamp(t) =
						StateValue::from_canonical_json(Value::Object(map.clone()))
					{
						return Value::String(t.to_rfc3339());
					}
				}
			}
			Value::Object(
				map.into_iter()
					.map(|(k, v)| (k, normalize_json(v)))
					.collect(),
			)
		},
		Value::Array(items) => Value::Array(items.into_iter().map(normalize_json).collect()),
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;

	#[test]
	fn test_safe_repr_truncates_at_address_marker() {
		let value = StateValue::Opaque("<Foo object at 0x7fabc1234>".to_string());
		assert_eq!(safe_repr(&value), Some("<Foo object>".to_string()));
	}

	#[test]
	fn test_safe_repr_caps_length() {
		let value = StateValue::Text("x".repeat(4000));
		let repr = safe_repr(&value).unwrap();
		assert_eq!(repr.chars().count(), MAX_RESULT_LEN);
	}

	#[test]
	fn test_safe_repr_plain_values() {
		assert_eq!(safe_repr(&StateValue::Int(5)), Some("5".to_string()));
		assert_eq!(
			safe_repr(&StateValue::Text("done".into())),
			Some("done".to_string())
		);
	}

	#[test]
	fn test_boundary_encoding_stringifies_special_kinds() {
		let decimal = StateValue::Decimal("1.5".parse().unwrap());
		assert_eq!(to_boundary_json(&decimal), Value::String("1.5".into()));

		let ts = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
		let encoded = to_boundary_json(&StateValue::Timestamp(ts));
		assert_eq!(encoded, Value::String(ts.to_rfc3339()));

		let opaque = StateValue::Opaque("<Engine object at 0xdeadbeef>".to_string());
		assert_eq!(
			to_boundary_json(&opaque),
			Value::String("<Engine object>".into())
		);
	}

	#[test]
	fn test_format_preserves_write_order_and_nulls_result() {
		let mut writes = BTreeMap::new();
		writes.insert(
			"currency.balances:bob".to_string(),
			StateValue::Int(50),
		);
		writes.insert(
			"currency.balances:alice".to_string(),
			StateValue::Decimal("50.0".parse().unwrap()),
		);
		let output = ExecutionOutput {
			status_code: 0,
			writes,
			stamps_used: 96,
			result: StateValue::Null,
		};
		let transaction: Transaction = serde_json::from_value(serde_json::json!({
			"payload": {
				"sender": "bob", "contract": "currency", "function": "transfer",
				"kwargs": {}
			},
			"metadata": { "signature": "sig" }
		}))
		.unwrap();

		let tx_output = format(transaction, output);
		assert_eq!(tx_output.state[0].key, "currency.balances:alice");
		assert_eq!(tx_output.state[0].value, Value::String("50.0".into()));
		assert_eq!(tx_output.state[1].key, "currency.balances:bob");
		assert_eq!(tx_output.result, None);
	}

	#[test]
	fn test_normalize_rewrites_residual_encodings() {
		let raw = serde_json::json!({
			"kwargs": {
				"amount": { "__fixed__": "10.5" },
				"deadline": { "__time__": [2024, 3, 5, 12, 0, 0, 0] },
				"note": { "__fixed__": "1.0", "unit": "tau" }
			}
		});
		let normalized = normalize_json(raw);
		assert_eq!(normalized["kwargs"]["amount"], Value::String("10.5".into()));
		assert!(normalized["kwargs"]["deadline"]
			.as_str()
			.unwrap()
			.starts_with("2024-03-05T12:00:00"));
		// Two-field objects are real maps, not encodings
		assert!(normalized["kwargs"]["note"].is_object());
	}
}
