// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dotted flag-key resolution.
//!
//! `configs.MAX_CONNECTIONS` descends into the `configs` property and then its
//! `MAX_CONNECTIONS` field. Decimal segments index into arrays. Namespaces are
//! not special; they are ordinary tree paths.

use crate::document::Document;
use crate::error::{FlagsError, Result};
use crate::value::{Node, Value};

/// A scalar leaf found at a flag key, with its secret marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLeaf<'a> {
	pub value: &'a Value,
	pub secret: bool,
}

/// Resolves `key` against `document`.
///
/// Fails with [`FlagsError::KeyNotFound`] when the key is empty, contains an
/// empty segment, names a missing field or index, or ends on an array or object.
pub fn lookup<'a>(document: &'a Document, key: &str) -> Result<ResolvedLeaf<'a>> {
	let not_found = || FlagsError::KeyNotFound {
		key: key.to_string(),
	};

	let mut segments = key.split('.');
	let first = segments.next().filter(|s| !s.is_empty()).ok_or_else(not_found)?;
	let mut node: &Node = document.get(first).ok_or_else(not_found)?;

	for segment in segments {
		if segment.is_empty() {
			return Err(not_found());
		}
		node = child(node, segment).ok_or_else(not_found)?;
	}

	if !node.value.is_leaf() {
		return Err(not_found());
	}

	Ok(ResolvedLeaf {
		value: &node.value,
		secret: node.secret,
	})
}

fn child<'a>(node: &'a Node, segment: &str) -> Option<&'a Node> {
	match &node.value {
		Value::Object(fields) => fields.get(segment),
		Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
		_ => None,
	}
}
