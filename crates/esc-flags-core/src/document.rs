// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The configuration document fetched from an ESC environment.
//!
//! A document is immutable once decoded; a refresh builds a new one and
//! swaps it in wholesale.

use std::collections::BTreeMap;

use serde_json::Map;

use crate::error::{FlagsError, Result};
use crate::path::{self, ResolvedLeaf};
use crate::value::{Node, Value};

/// A decoded environment: top-level property names mapped to value trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
	root: BTreeMap<String, Node>,
}

impl Document {
	pub fn new(root: BTreeMap<String, Node>) -> Self {
		Self { root }
	}

	/// Decodes the `properties` object of an opened ESC environment.
	///
	/// Every property is an ESC value: `{"value": ..., "secret": bool, "unknown": bool}`
	/// where `value` is a scalar, an array of ESC values, or an object of ESC values.
	/// Secret markers are inherited by everything nested below a secret container.
	/// Unknown values decode to [`Value::Null`].
	pub fn from_esc_properties(properties: &Map<String, serde_json::Value>) -> Result<Self> {
		let mut root = BTreeMap::new();
		for (name, raw) in properties {
			root.insert(name.clone(), decode_esc_node(raw, false, name)?);
		}
		Ok(Self { root })
	}

	/// Builds a document from a plain JSON object. Nothing is marked secret.
	pub fn from_json(json: serde_json::Value) -> Result<Self> {
		match json {
			serde_json::Value::Object(fields) => Ok(Self {
				root: fields
					.into_iter()
					.map(|(name, v)| (name, decode_plain_node(v)))
					.collect(),
			}),
			other => Err(FlagsError::InvalidResponse(format!(
				"document root must be an object, got {}",
				json_type_name(&other)
			))),
		}
	}

	/// Resolves a dotted flag key to a leaf.
	pub fn lookup(&self, key: &str) -> Result<ResolvedLeaf<'_>> {
		path::lookup(self, key)
	}

	pub fn get(&self, name: &str) -> Option<&Node> {
		self.root.get(name)
	}

	pub fn is_empty(&self) -> bool {
		self.root.is_empty()
	}

	/// Number of scalar leaves in the whole document.
	pub fn leaf_count(&self) -> usize {
		self.root.values().map(Node::leaf_count).sum()
	}
}

fn decode_esc_node(raw: &serde_json::Value, inherited_secret: bool, at: &str) -> Result<Node> {
	let fields = raw.as_object().ok_or_else(|| {
		FlagsError::InvalidResponse(format!(
			"property {at} is not an ESC value (got {})",
			json_type_name(raw)
		))
	})?;

	let secret = inherited_secret
		|| fields
			.get("secret")
			.and_then(serde_json::Value::as_bool)
			.unwrap_or(false);
	let unknown = fields
		.get("unknown")
		.and_then(serde_json::Value::as_bool)
		.unwrap_or(false);

	let value = match fields.get("value") {
		_ if unknown => Value::Null,
		None | Some(serde_json::Value::Null) => Value::Null,
		Some(serde_json::Value::Bool(b)) => Value::Bool(*b),
		Some(serde_json::Value::Number(n)) => Value::Number(n.clone()),
		Some(serde_json::Value::String(s)) => Value::String(s.clone()),
		Some(serde_json::Value::Array(items)) => Value::Array(
			items
				.iter()
				.enumerate()
				.map(|(i, item)| decode_esc_node(item, secret, &format!("{at}.{i}")))
				.collect::<Result<_>>()?,
		),
		Some(serde_json::Value::Object(children)) => Value::Object(
			children
				.iter()
				.map(|(name, child)| {
					decode_esc_node(child, secret, &format!("{at}.{name}")).map(|n| (name.clone(), n))
				})
				.collect::<Result<_>>()?,
		),
	};

	Ok(Node { value, secret })
}

fn decode_plain_node(raw: serde_json::Value) -> Node {
	let value = match raw {
		serde_json::Value::Null => Value::Null,
		serde_json::Value::Bool(b) => Value::Bool(b),
		serde_json::Value::Number(n) => Value::Number(n),
		serde_json::Value::String(s) => Value::String(s),
		serde_json::Value::Array(items) => {
			Value::Array(items.into_iter().map(decode_plain_node).collect())
		}
		serde_json::Value::Object(fields) => Value::Object(
			fields
				.into_iter()
				.map(|(name, v)| (name, decode_plain_node(v)))
				.collect(),
		),
	};
	Node::new(value)
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
	match v {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "boolean",
		serde_json::Value::Number(_) => "number",
		serde_json::Value::String(_) => "string",
		serde_json::Value::Array(_) => "array",
		serde_json::Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn props(v: serde_json::Value) -> Map<String, serde_json::Value> {
		match v {
			serde_json::Value::Object(m) => m,
			_ => panic!("fixture must be an object"),
		}
	}

	#[test]
	fn decodes_esc_properties_with_secret_markers() {
		let doc = Document::from_esc_properties(&props(json!({
			"aws": {"value": {
				"secrets": {"value": {
					"GITHUB_ACCESS_TOKEN": {"value": "ghp_abc", "secret": true}
				}},
				"params": {"value": {
					"GOOGLE_API_KEY": {"value": "AIza"}
				}}
			}},
			"configs": {"value": {
				"MAX_CONNECTIONS": {"value": 50},
				"DEBUG_MODE": {"value": false}
			}}
		})))
		.unwrap();

		let token = doc.lookup("aws.secrets.GITHUB_ACCESS_TOKEN").unwrap();
		assert_eq!(token.value, &Value::from("ghp_abc"));
		assert!(token.secret);

		let key = doc.lookup("aws.params.GOOGLE_API_KEY").unwrap();
		assert!(!key.secret);

		assert_eq!(doc.leaf_count(), 4);
	}

	#[test]
	fn secret_container_marks_descendants() {
		let doc = Document::from_esc_properties(&props(json!({
			"db": {"secret": true, "value": {
				"password": {"value": "hunter2"},
				"replicas": {"value": [{"value": "r1"}]}
			}}
		})))
		.unwrap();

		assert!(doc.lookup("db.password").unwrap().secret);
		assert!(doc.lookup("db.replicas.0").unwrap().secret);
	}

	#[test]
	fn unknown_values_decode_as_null() {
		let doc = Document::from_esc_properties(&props(json!({
			"pending": {"unknown": true},
			"missing_value": {}
		})))
		.unwrap();

		assert_eq!(doc.lookup("pending").unwrap().value, &Value::Null);
		assert_eq!(doc.lookup("missing_value").unwrap().value, &Value::Null);
	}

	#[test]
	fn rejects_bare_scalars_in_esc_format() {
		let err = Document::from_esc_properties(&props(json!({
			"configs": {"value": {"MAX_CONNECTIONS": 50}}
		})))
		.unwrap_err();

		match err {
			FlagsError::InvalidResponse(message) => {
				assert!(message.contains("configs.MAX_CONNECTIONS"))
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn plain_json_documents_are_never_secret() {
		let doc = Document::from_json(json!({
			"configs": {"MAX_CONNECTIONS": 50, "CPU_THRESHOLD": 0.75}
		}))
		.unwrap();

		let leaf = doc.lookup("configs.MAX_CONNECTIONS").unwrap();
		assert!(!leaf.secret);
		assert_eq!(doc.leaf_count(), 2);
	}

	#[test]
	fn plain_json_root_must_be_object() {
		assert!(matches!(
			Document::from_json(json!([1, 2])),
			Err(FlagsError::InvalidResponse(_))
		));
	}

	#[test]
	fn empty_document() {
		let doc = Document::default();
		assert!(doc.is_empty());
		assert_eq!(doc.leaf_count(), 0);
		assert!(doc.get("configs").is_none());
	}
}
