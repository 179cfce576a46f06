// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-facing handle over a [`FeatureProvider`].
//!
//! There is no process-wide provider registry. Callers build a provider,
//! wrap it in a [`FlagsClient`] and pass the client to whoever needs flags.

use std::sync::Arc;

use esc_flags_core::{EvaluationContext, FeatureProvider, ProviderMetadata, ProviderState, ResolutionDetails};

/// A named handle for evaluating flags through one provider.
///
/// Cloning is cheap and shares the provider.
#[derive(Clone)]
pub struct FlagsClient {
	name: String,
	provider: Arc<dyn FeatureProvider>,
	context: EvaluationContext,
}

impl FlagsClient {
	pub fn new(name: impl Into<String>, provider: Arc<dyn FeatureProvider>) -> Self {
		Self {
			name: name.into(),
			provider,
			context: EvaluationContext::default(),
		}
	}

	/// Sets the client-level context. Per-call context wins on conflicts.
	pub fn with_context(mut self, context: EvaluationContext) -> Self {
		self.context = context;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn provider(&self) -> &Arc<dyn FeatureProvider> {
		&self.provider
	}

	pub fn metadata(&self) -> ProviderMetadata {
		self.provider.metadata()
	}

	pub fn state(&self) -> ProviderState {
		self.provider.state()
	}

	pub async fn boolean_value_details(
		&self,
		flag_key: &str,
		default: bool,
		context: &EvaluationContext,
	) -> ResolutionDetails<bool> {
		self
			.provider
			.resolve_bool(flag_key, default, &self.context.merged_with(context))
			.await
	}

	pub async fn string_value_details(
		&self,
		flag_key: &str,
		default: impl Into<String>,
		context: &EvaluationContext,
	) -> ResolutionDetails<String> {
		self
			.provider
			.resolve_string(flag_key, default.into(), &self.context.merged_with(context))
			.await
	}

	pub async fn int_value_details(
		&self,
		flag_key: &str,
		default: i64,
		context: &EvaluationContext,
	) -> ResolutionDetails<i64> {
		self
			.provider
			.resolve_int(flag_key, default, &self.context.merged_with(context))
			.await
	}

	pub async fn float_value_details(
		&self,
		flag_key: &str,
		default: f64,
		context: &EvaluationContext,
	) -> ResolutionDetails<f64> {
		self
			.provider
			.resolve_float(flag_key, default, &self.context.merged_with(context))
			.await
	}

	/// Value-only shorthand for [`Self::boolean_value_details`].
	pub async fn boolean_value(&self, flag_key: &str, default: bool, context: &EvaluationContext) -> bool {
		self.boolean_value_details(flag_key, default, context).await.value
	}

	pub async fn string_value(
		&self,
		flag_key: &str,
		default: impl Into<String>,
		context: &EvaluationContext,
	) -> String {
		self.string_value_details(flag_key, default, context).await.value
	}

	pub async fn int_value(&self, flag_key: &str, default: i64, context: &EvaluationContext) -> i64 {
		self.int_value_details(flag_key, default, context).await.value
	}

	pub async fn float_value(&self, flag_key: &str, default: f64, context: &EvaluationContext) -> f64 {
		self.float_value_details(flag_key, default, context).await.value
	}
}

impl std::fmt::Debug for FlagsClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagsClient")
			.field("name", &self.name)
			.field("provider", &self.provider.metadata().name)
			.field("state", &self.provider.state())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use esc_flags_core::{FlagsError, Reason, Result};
	use serde_json::json;
	use std::sync::Mutex;

	/// Records the context each call saw and echoes the targeting key.
	#[derive(Default)]
	struct RecordingProvider {
		seen: Mutex<Vec<EvaluationContext>>,
	}

	impl RecordingProvider {
		fn record(&self, context: &EvaluationContext) {
			self.seen.lock().unwrap().push(context.clone());
		}
	}

	#[async_trait]
	impl FeatureProvider for RecordingProvider {
		fn metadata(&self) -> ProviderMetadata {
			ProviderMetadata::new("recording")
		}

		fn state(&self) -> ProviderState {
			ProviderState::Ready
		}

		async fn initialize(&self, _context: &EvaluationContext) -> Result<()> {
			Ok(())
		}

		async fn shutdown(&self) {}

		async fn resolve_bool(&self, key: &str, _default: bool, ctx: &EvaluationContext) -> ResolutionDetails<bool> {
			self.record(ctx);
			ResolutionDetails::resolved(key, true, false)
		}

		async fn resolve_string(
			&self,
			key: &str,
			default: String,
			ctx: &EvaluationContext,
		) -> ResolutionDetails<String> {
			self.record(ctx);
			match &ctx.targeting_key {
				Some(t) => ResolutionDetails::resolved(key, t.clone(), true),
				None => ResolutionDetails::fallback(key, default, FlagsError::KeyNotFound { key: key.to_string() }),
			}
		}

		async fn resolve_int(&self, key: &str, _default: i64, ctx: &EvaluationContext) -> ResolutionDetails<i64> {
			self.record(ctx);
			ResolutionDetails::resolved(key, 42, false)
		}

		async fn resolve_float(&self, key: &str, _default: f64, ctx: &EvaluationContext) -> ResolutionDetails<f64> {
			self.record(ctx);
			ResolutionDetails::resolved(key, 0.25, false)
		}
	}

	#[tokio::test]
	async fn merges_client_context_under_call_context() {
		let provider = Arc::new(RecordingProvider::default());
		let client = FlagsClient::new("billing", provider.clone()).with_context(
			EvaluationContext::new()
				.with_targeting_key("client")
				.with_attribute("region", json!("eu")),
		);

		let call = EvaluationContext::new().with_targeting_key("user-1");
		let details = client.string_value_details("any", "none", &call).await;

		assert_eq!(details.value, "user-1");
		assert_eq!(details.reason, Reason::Static);
		assert!(details.flag_metadata.is_secret());

		let seen = provider.seen.lock().unwrap();
		assert_eq!(seen[0].targeting_key.as_deref(), Some("user-1"));
		assert_eq!(seen[0].attributes.get("region"), Some(&json!("eu")));
	}

	#[tokio::test]
	async fn value_shorthands_unwrap_details() {
		let client = FlagsClient::new("billing", Arc::new(RecordingProvider::default()));
		let ctx = EvaluationContext::new();

		assert!(client.boolean_value("a", false, &ctx).await);
		assert_eq!(client.int_value("a", 0, &ctx).await, 42);
		assert_eq!(client.float_value("a", 0.0, &ctx).await, 0.25);
		assert_eq!(client.string_value("a", "fallback", &ctx).await, "fallback");
	}

	#[test]
	fn exposes_provider_information() {
		let client = FlagsClient::new("billing", Arc::new(RecordingProvider::default()));
		assert_eq!(client.name(), "billing");
		assert_eq!(client.metadata().name, "recording");
		assert_eq!(client.state(), ProviderState::Ready);
		assert!(format!("{client:?}").contains("recording"));
	}
}
