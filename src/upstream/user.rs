//! Upstream user quota attributes.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Quota attributes read from the upstream user resource.
///
/// `expire` is an epoch second; `0` means unset (no expiry).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamUser {
	/// Data limit in bytes.
	pub data_limit: i64,
	/// Expiry as an epoch second.
	pub expire: i64,
}
impl UpstreamUser {
	/// Extracts quota attributes from a user resource body.
	///
	/// Missing, `null`, or non-numeric values read as `0`.
	pub fn from_json(body: &Value) -> Self {
		Self {
			data_limit: body.get("data_limit").map(lenient_int).unwrap_or_default(),
			expire: body.get("expire").map(lenient_int).unwrap_or_default(),
		}
	}
}

/// Payload written to the upstream user resource by a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UserQuota {
	/// New data limit in bytes.
	pub data_limit: i64,
	/// New expiry as an epoch second.
	pub expire: i64,
}

/// Reads an integer out of a loosely typed JSON value; anything unusable becomes `0`.
pub fn lenient_int(value: &Value) -> i64 {
	match value {
		Value::Number(n) => n
			.as_i64()
			.or_else(|| n.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
			.or_else(|| n.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
			.unwrap_or_default(),
		Value::String(s) => s.trim().parse().unwrap_or_default(),
		Value::Bool(b) => i64::from(*b),
		_ => 0,
	}
}
