// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, FlagsError};

/// Metadata key carrying the backend's secret marker.
pub const SECRET_METADATA_KEY: &str = "secret";

/// Context passed by callers for flag evaluation.
///
/// ESC environments resolve by path only, so the context does not change the
/// outcome today; it is accepted so callers can use one context across providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
	pub targeting_key: Option<String>,
	#[serde(default)]
	pub attributes: HashMap<String, serde_json::Value>,
}

impl EvaluationContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_targeting_key(mut self, key: impl Into<String>) -> Self {
		self.targeting_key = Some(key.into());
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	/// Layers `other` over `self`: `other`'s targeting key and attributes win.
	pub fn merged_with(&self, other: &EvaluationContext) -> EvaluationContext {
		let mut merged = self.clone();
		if other.targeting_key.is_some() {
			merged.targeting_key = other.targeting_key.clone();
		}
		for (k, v) in &other.attributes {
			merged.attributes.insert(k.clone(), v.clone());
		}
		merged
	}
}

/// Why a resolution produced the value it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
	/// The value came straight from the environment document.
	Static,
	/// The caller's default was returned without consulting a document.
	Default,
	/// Resolution failed and the caller's default was returned.
	Error,
}

/// A scalar metadata value attached to a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
}

/// Side-channel annotations returned alongside a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagMetadata {
	values: BTreeMap<String, MetadataValue>,
}

impl FlagMetadata {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
		self.values.insert(key.into(), value);
		self
	}

	/// Metadata for a successfully resolved leaf.
	pub fn for_leaf(secret: bool) -> Self {
		Self::new().with(SECRET_METADATA_KEY, MetadataValue::Bool(secret))
	}

	pub fn get(&self, key: &str) -> Option<&MetadataValue> {
		self.values.get(key)
	}

	pub fn get_bool(&self, key: &str) -> Option<bool> {
		match self.values.get(key) {
			Some(MetadataValue::Bool(b)) => Some(*b),
			_ => None,
		}
	}

	pub fn get_string(&self, key: &str) -> Option<&str> {
		match self.values.get(key) {
			Some(MetadataValue::String(s)) => Some(s),
			_ => None,
		}
	}

	/// True when the backend marked the resolved leaf secret.
	pub fn is_secret(&self) -> bool {
		self.get_bool(SECRET_METADATA_KEY).unwrap_or(false)
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}
}

/// The outcome of one typed resolution.
///
/// Always carries a usable value: the resolved one on success, the caller's
/// default otherwise, with the cause in `error`.
#[derive(Clone, PartialEq)]
pub struct ResolutionDetails<T> {
	pub flag_key: String,
	pub value: T,
	pub reason: Reason,
	pub error: Option<FlagsError>,
	pub flag_metadata: FlagMetadata,
}

impl<T> ResolutionDetails<T> {
	/// A successful resolution from the document.
	pub fn resolved(flag_key: impl Into<String>, value: T, secret: bool) -> Self {
		Self {
			flag_key: flag_key.into(),
			value,
			reason: Reason::Static,
			error: None,
			flag_metadata: FlagMetadata::for_leaf(secret),
		}
	}

	/// A fallback to the caller's default.
	///
	/// `ProviderNotReady` is reported with [`Reason::Default`] since no document
	/// was consulted; every other error is reported with [`Reason::Error`].
	pub fn fallback(flag_key: impl Into<String>, default: T, error: FlagsError) -> Self {
		let reason = match error {
			FlagsError::ProviderNotReady { .. } => Reason::Default,
			_ => Reason::Error,
		};
		Self {
			flag_key: flag_key.into(),
			value: default,
			reason,
			error: Some(error),
			flag_metadata: FlagMetadata::new(),
		}
	}

	pub fn is_error(&self) -> bool {
		self.error.is_some()
	}

	pub fn error_code(&self) -> Option<ErrorCode> {
		self.error.as_ref().map(FlagsError::error_code)
	}
}

// Secret values must not leak through `{:?}` in logs.
impl<T: std::fmt::Debug> std::fmt::Debug for ResolutionDetails<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut s = f.debug_struct("ResolutionDetails");
		s.field("flag_key", &self.flag_key);
		if self.flag_metadata.is_secret() {
			s.field("value", &crate::token::REDACTED);
		} else {
			s.field("value", &self.value);
		}
		s.field("reason", &self.reason)
			.field("error", &self.error)
			.field("flag_metadata", &self.flag_metadata)
			.finish()
	}
}
