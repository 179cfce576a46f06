// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Conversion from document leaves to the types a caller asks for.
//!
//! Conversions are strict: strings are never parsed into numbers or
//! booleans, and a mismatch is an error rather than a zero value.

use crate::value::{number_is_integral, Value, ValueKind};

/// A type a flag can be resolved as.
pub trait FlagValue: Sized + Clone + Send + Sync + 'static {
	/// The kind reported when coercion fails.
	const KIND: ValueKind;

	/// Converts a leaf, or returns the leaf's actual kind on mismatch.
	fn from_leaf(value: &Value) -> Result<Self, ValueKind>;
}

impl FlagValue for String {
	const KIND: ValueKind = ValueKind::String;

	fn from_leaf(value: &Value) -> Result<Self, ValueKind> {
		match value {
			Value::String(s) => Ok(s.clone()),
			Value::Number(n) => Ok(n.to_string()),
			Value::Bool(b) => Ok(b.to_string()),
			other => Err(other.kind()),
		}
	}
}

impl FlagValue for i64 {
	const KIND: ValueKind = ValueKind::Integer;

	fn from_leaf(value: &Value) -> Result<Self, ValueKind> {
		let Value::Number(n) = value else {
			return Err(value.kind());
		};
		if let Some(i) = n.as_i64() {
			return Ok(i);
		}
		if !number_is_integral(n) {
			return Err(ValueKind::Float);
		}
		// Integral but outside i64 (large u64 or huge float); reported as float
		// so the mismatch names two different kinds.
		n.as_f64()
			.filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
			.map(|f| f as i64)
			.ok_or(ValueKind::Float)
	}
}

impl FlagValue for f64 {
	const KIND: ValueKind = ValueKind::Float;

	fn from_leaf(value: &Value) -> Result<Self, ValueKind> {
		match value {
			Value::Number(n) => n.as_f64().ok_or(ValueKind::Integer),
			other => Err(other.kind()),
		}
	}
}

impl FlagValue for bool {
	const KIND: ValueKind = ValueKind::Bool;

	fn from_leaf(value: &Value) -> Result<Self, ValueKind> {
		match value {
			Value::Bool(b) => Ok(*b),
			other => Err(other.kind()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn num(v: serde_json::Value) -> Value {
		match v {
			serde_json::Value::Number(n) => Value::Number(n),
			_ => panic!("fixture must be a number"),
		}
	}

	#[test]
	fn strings_render_scalars_naturally() {
		assert_eq!(String::from_leaf(&Value::from("abc")), Ok("abc".to_string()));
		assert_eq!(String::from_leaf(&num(json!(50))), Ok("50".to_string()));
		assert_eq!(String::from_leaf(&num(json!(0.75))), Ok("0.75".to_string()));
		assert_eq!(String::from_leaf(&Value::from(false)), Ok("false".to_string()));
		assert_eq!(String::from_leaf(&Value::Null), Err(ValueKind::Null));
	}

	#[test]
	fn integers_require_integral_numbers() {
		assert_eq!(i64::from_leaf(&num(json!(50))), Ok(50));
		assert_eq!(i64::from_leaf(&num(json!(-7))), Ok(-7));
		assert_eq!(i64::from_leaf(&num(json!(3.0))), Ok(3));
		assert_eq!(i64::from_leaf(&num(json!(0.75))), Err(ValueKind::Float));
		assert_eq!(i64::from_leaf(&num(json!(u64::MAX))), Err(ValueKind::Float));
		assert_eq!(i64::from_leaf(&num(json!(1e300))), Err(ValueKind::Float));
	}

	#[test]
	fn integers_never_parse_strings() {
		assert_eq!(i64::from_leaf(&Value::from("50")), Err(ValueKind::String));
		assert_eq!(i64::from_leaf(&Value::from(true)), Err(ValueKind::Bool));
	}

	#[test]
	fn floats_accept_any_number() {
		assert_eq!(f64::from_leaf(&num(json!(0.75))), Ok(0.75));
		assert_eq!(f64::from_leaf(&num(json!(50))), Ok(50.0));
		assert_eq!(f64::from_leaf(&Value::from("0.75")), Err(ValueKind::String));
	}

	#[test]
	fn booleans_only_from_booleans() {
		assert_eq!(bool::from_leaf(&Value::from(false)), Ok(false));
		assert_eq!(bool::from_leaf(&Value::from("true")), Err(ValueKind::String));
		assert_eq!(bool::from_leaf(&num(json!(1))), Err(ValueKind::Integer));
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn integers_widen_to_floats_without_loss(n in -(1i64 << 53)..(1i64 << 53)) {
			let value = Value::from(n);
			prop_assert_eq!(f64::from_leaf(&value), Ok(n as f64));
			prop_assert_eq!(i64::from_leaf(&value), Ok(n));
		}

		#[test]
		fn fractional_floats_never_become_integers(whole in -1_000_000i64..1_000_000, frac in 1u32..1000) {
			let f = whole as f64 + f64::from(frac) / 1000.0;
			prop_assume!(f.fract() != 0.0);
			let Some(n) = serde_json::Number::from_f64(f) else {
				return Ok(());
			};
			prop_assert_eq!(i64::from_leaf(&Value::Number(n)), Err(ValueKind::Float));
		}

		#[test]
		fn strings_pass_through_unchanged(s in ".*") {
			prop_assert_eq!(String::from_leaf(&Value::String(s.clone())), Ok(s));
		}
	}
}
