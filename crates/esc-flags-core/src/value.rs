// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of a configuration document: a value plus the backend's secret marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
	pub value: Value,
	pub secret: bool,
}

impl Node {
	pub fn new(value: Value) -> Self {
		Self {
			value,
			secret: false,
		}
	}

	pub fn secret(value: Value) -> Self {
		Self {
			value,
			secret: true,
		}
	}

	/// Number of scalar leaves at or below this node.
	pub fn leaf_count(&self) -> usize {
		match &self.value {
			Value::Array(items) => items.iter().map(Node::leaf_count).sum(),
			Value::Object(fields) => fields.values().map(Node::leaf_count).sum(),
			_ => 1,
		}
	}
}

/// A configuration value. Scalars are leaves; arrays and objects nest further nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(serde_json::Number),
	String(String),
	Array(Vec<Node>),
	Object(BTreeMap<String, Node>),
}

impl Value {
	/// Returns the kind used in type-mismatch reports.
	pub fn kind(&self) -> ValueKind {
		match self {
			Value::Null => ValueKind::Null,
			Value::Bool(_) => ValueKind::Bool,
			Value::Number(n) if number_is_integral(n) => ValueKind::Integer,
			Value::Number(_) => ValueKind::Float,
			Value::String(_) => ValueKind::String,
			Value::Array(_) => ValueKind::Array,
			Value::Object(_) => ValueKind::Object,
		}
	}

	/// Returns true for scalars (including null).
	pub fn is_leaf(&self) -> bool {
		!matches!(self, Value::Array(_) | Value::Object(_))
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Value::Number(n.into())
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

/// The kind of a value, as requested by a typed resolution or found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
	String,
	Integer,
	Float,
	Bool,
	Null,
	Array,
	Object,
}

impl std::fmt::Display for ValueKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ValueKind::String => "string",
			ValueKind::Integer => "integer",
			ValueKind::Float => "float",
			ValueKind::Bool => "boolean",
			ValueKind::Null => "null",
			ValueKind::Array => "array",
			ValueKind::Object => "object",
		};
		f.write_str(name)
	}
}

pub(crate) fn number_is_integral(n: &serde_json::Number) -> bool {
	if n.is_i64() || n.is_u64() {
		return true;
	}
	n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}
