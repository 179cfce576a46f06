// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ESC-backed feature provider.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use esc_common_http::RetryConfig;
use esc_flags_core::{
	AccessToken, Document, EnvironmentIdentity, EvaluationContext, FeatureProvider, FlagValue,
	FlagsError, ProviderMetadata, ProviderState, ResolutionDetails, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::DocumentCache;
use crate::fetcher::{EnvironmentFetcher, FetchMode, FetchPolicy};
use crate::transport::{
	parse_backend_url, AuthScheme, EnvironmentTransport, HttpTransport, DEFAULT_BACKEND_URL,
};

/// Name reported by [`FeatureProvider::metadata`].
pub const PROVIDER_NAME: &str = "pulumi-esc";

/// Tuning for an [`EscProvider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
	/// How long a fetched document is served before the next resolve refetches it.
	pub cache_ttl: Duration,
	/// Timeout for each HTTP call to the backend.
	pub request_timeout: Duration,
	/// Longest a single resolve waits for a fetch, retries included.
	pub fetch_timeout: Duration,
	/// Lifetime requested for the ESC open session.
	pub open_duration: Duration,
	/// Retry policy applied around a whole fetch.
	pub retry_config: RetryConfig,
	/// Whether to keep serving the previous document when a refresh fails. Off by default.
	pub serve_stale: bool,
	pub auth_scheme: AuthScheme,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			cache_ttl: Duration::from_secs(300),
			request_timeout: Duration::from_secs(10),
			fetch_timeout: Duration::from_secs(30),
			open_duration: Duration::from_secs(2 * 60 * 60),
			retry_config: RetryConfig::default(),
			serve_stale: false,
			auth_scheme: AuthScheme::Bearer,
		}
	}
}

/// Builder for [`EscProvider`].
#[derive(Default)]
pub struct EscProviderBuilder {
	organization: Option<String>,
	project: Option<String>,
	environment: Option<String>,
	access_token: Option<AccessToken>,
	backend_url: Option<String>,
	config: ProviderConfig,
	transport: Option<Arc<dyn EnvironmentTransport>>,
}

impl EscProviderBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn organization(mut self, organization: impl Into<String>) -> Self {
		self.organization = Some(organization.into());
		self
	}

	pub fn project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());
		self
	}

	pub fn environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	/// Sets the token sent with every backend call.
	pub fn access_token(mut self, token: impl Into<AccessToken>) -> Self {
		self.access_token = Some(token.into());
		self
	}

	/// Overrides the backend, e.g. for a self-hosted Pulumi Cloud.
	///
	/// Defaults to [`DEFAULT_BACKEND_URL`].
	pub fn backend_url(mut self, url: impl Into<String>) -> Self {
		self.backend_url = Some(url.into());
		self
	}

	/// Sets the document TTL. `Duration::ZERO` refetches on every resolve.
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.config.cache_ttl = ttl;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
		self.config.fetch_timeout = timeout;
		self
	}

	pub fn open_duration(mut self, duration: Duration) -> Self {
		self.config.open_duration = duration;
		self
	}

	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.config.retry_config = config;
		self
	}

	/// Serves the previous document when a TTL refresh fails with a transient error.
	///
	/// Off by default, so a failed refresh reports its error with the caller's default.
	pub fn serve_stale(mut self, enable: bool) -> Self {
		self.config.serve_stale = enable;
		self
	}

	pub fn auth_scheme(mut self, scheme: AuthScheme) -> Self {
		self.config.auth_scheme = scheme;
		self
	}

	/// Replaces the HTTP transport, e.g. with an in-memory one in tests.
	///
	/// Inputs are still validated as if the HTTP transport were used.
	pub fn transport<T: EnvironmentTransport>(mut self, transport: T) -> Self {
		self.transport = Some(Arc::new(transport));
		self
	}

	/// Validates the inputs and builds a provider in the `Initializing` state.
	///
	/// No network call is made; the first fetch happens in
	/// [`FeatureProvider::initialize`] or on the first resolve.
	pub fn build(self) -> Result<EscProvider> {
		let identity = EnvironmentIdentity::new(
			required("organization", self.organization)?,
			required("project", self.project)?,
			required("environment", self.environment)?,
		)?;

		let token = self
			.access_token
			.filter(|t| !t.is_blank())
			.ok_or_else(|| FlagsError::Configuration("access token must not be empty".to_string()))?;

		let base_url = parse_backend_url(self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL))?;

		let config = self.config;
		if config.request_timeout.is_zero() || config.fetch_timeout.is_zero() {
			return Err(FlagsError::Configuration(
				"request and fetch timeouts must be non-zero".to_string(),
			));
		}

		let transport: Arc<dyn EnvironmentTransport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(
				base_url,
				token,
				config.auth_scheme,
				config.open_duration,
				config.request_timeout,
			)?),
		};

		let fetcher = EnvironmentFetcher::new(
			identity,
			transport,
			DocumentCache::new(config.cache_ttl),
			FetchPolicy {
				retry: config.retry_config.clone(),
				fetch_timeout: config.fetch_timeout,
				serve_stale: config.serve_stale,
			},
		);

		debug!(environment = %fetcher.identity(), "ESC provider built");

		Ok(EscProvider {
			fetcher,
			state: AtomicU8::new(ProviderState::Initializing as u8),
			config,
		})
	}

	/// Builds the provider and performs the first fetch.
	pub async fn build_initialized(self) -> Result<EscProvider> {
		let provider = self.build()?;
		provider.initialize(&EvaluationContext::new()).await?;
		Ok(provider)
	}
}

fn required(field: &str, value: Option<String>) -> Result<String> {
	value.ok_or_else(|| FlagsError::Configuration(format!("{field} name is required")))
}

/// Feature provider that resolves flags from one ESC environment.
///
/// Safe to share across tasks; wrap it in an `Arc` and hand it to a
/// [`FlagsClient`](crate::FlagsClient).
pub struct EscProvider {
	fetcher: EnvironmentFetcher,
	state: AtomicU8,
	config: ProviderConfig,
}

impl EscProvider {
	pub fn builder() -> EscProviderBuilder {
		EscProviderBuilder::new()
	}

	pub fn identity(&self) -> &EnvironmentIdentity {
		self.fetcher.identity()
	}

	pub fn config(&self) -> &ProviderConfig {
		&self.config
	}

	/// When the currently cached document was fetched.
	pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
		self.fetcher.last_updated().await
	}

	/// Fetches the environment now, bypassing the TTL.
	pub async fn refresh(&self) -> Result<()> {
		self.ensure_not_shut_down()?;
		self
			.load(FetchMode::ForceRefresh, &CancellationToken::new())
			.await
			.map(|_| ())
	}

	/// Resolves `flag_key` as `T`, giving up on the fetch when `cancel` fires.
	///
	/// A cancelled call returns `default` with [`FlagsError::Cancelled`] and
	/// leaves the cached document untouched.
	pub async fn resolve_with_cancel<T: FlagValue>(
		&self,
		flag_key: &str,
		default: T,
		_context: &EvaluationContext,
		cancel: &CancellationToken,
	) -> ResolutionDetails<T> {
		let outcome = match self.ensure_not_shut_down() {
			Ok(()) => match self.load(FetchMode::Cached, cancel).await {
				Ok(document) => evaluate::<T>(&document, flag_key),
				Err(err) => Err(err),
			},
			Err(err) => Err(err),
		};

		match outcome {
			Ok((value, secret)) => ResolutionDetails::resolved(flag_key, value, secret),
			Err(err) => {
				debug!(
					flag_key,
					error_code = %err.error_code(),
					error = %err,
					"flag resolved to default"
				);
				ResolutionDetails::fallback(flag_key, default, err)
			}
		}
	}

	fn ensure_not_shut_down(&self) -> Result<()> {
		match self.state() {
			state @ (ProviderState::Uninitialized | ProviderState::ShutDown) => {
				Err(FlagsError::ProviderNotReady { state })
			}
			_ => Ok(()),
		}
	}

	/// Gets a document and records the outcome in the lifecycle state.
	async fn load(&self, mode: FetchMode, cancel: &CancellationToken) -> Result<Arc<Document>> {
		match self.fetcher.get_document(mode, cancel).await {
			Ok(document) => {
				self.transition(ProviderState::Ready);
				Ok(document)
			}
			Err(FlagsError::Cancelled) => Err(FlagsError::Cancelled),
			Err(err) => {
				self.transition(ProviderState::Error);
				Err(err)
			}
		}
	}

	/// Moves to `next` unless the provider has been shut down.
	fn transition(&self, next: ProviderState) {
		let mut current = self.state.load(Ordering::Acquire);
		loop {
			let from = ProviderState::from_u8(current);
			if from.is_terminal() || from == next {
				return;
			}
			match self.state.compare_exchange_weak(
				current,
				next as u8,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => {
					if next == ProviderState::Error {
						warn!(environment = %self.identity(), %from, "ESC provider entered error state");
					} else {
						debug!(environment = %self.identity(), %from, to = %next, "ESC provider state changed");
					}
					return;
				}
				Err(actual) => current = actual,
			}
		}
	}
}

fn evaluate<T: FlagValue>(document: &Document, flag_key: &str) -> Result<(T, bool)> {
	let leaf = document.lookup(flag_key)?;
	let value = T::from_leaf(leaf.value).map_err(|actual| FlagsError::TypeMismatch {
		key: flag_key.to_string(),
		expected: T::KIND,
		actual,
	})?;
	Ok((value, leaf.secret))
}

#[async_trait]
impl FeatureProvider for EscProvider {
	fn metadata(&self) -> ProviderMetadata {
		ProviderMetadata::new(PROVIDER_NAME)
	}

	fn state(&self) -> ProviderState {
		ProviderState::from_u8(self.state.load(Ordering::Acquire))
	}

	async fn initialize(&self, _context: &EvaluationContext) -> Result<()> {
		self.ensure_not_shut_down()?;
		let document = self.load(FetchMode::Cached, &CancellationToken::new()).await?;
		info!(
			environment = %self.identity(),
			leaves = document.leaf_count(),
			"ESC provider initialized"
		);
		Ok(())
	}

	async fn shutdown(&self) {
		let previous = ProviderState::from_u8(
			self
				.state
				.swap(ProviderState::ShutDown as u8, Ordering::AcqRel),
		);
		if previous.is_terminal() {
			return;
		}
		self.fetcher.close().await;
		info!(environment = %self.identity(), "ESC provider shut down");
	}

	async fn resolve_bool(
		&self,
		flag_key: &str,
		default: bool,
		context: &EvaluationContext,
	) -> ResolutionDetails<bool> {
		self
			.resolve_with_cancel(flag_key, default, context, &CancellationToken::new())
			.await
	}

	async fn resolve_string(
		&self,
		flag_key: &str,
		default: String,
		context: &EvaluationContext,
	) -> ResolutionDetails<String> {
		self
			.resolve_with_cancel(flag_key, default, context, &CancellationToken::new())
			.await
	}

	async fn resolve_int(
		&self,
		flag_key: &str,
		default: i64,
		context: &EvaluationContext,
	) -> ResolutionDetails<i64> {
		self
			.resolve_with_cancel(flag_key, default, context, &CancellationToken::new())
			.await
	}

	async fn resolve_float(
		&self,
		flag_key: &str,
		default: f64,
		context: &EvaluationContext,
	) -> ResolutionDetails<f64> {
		self
			.resolve_with_cancel(flag_key, default, context, &CancellationToken::new())
			.await
	}
}

impl std::fmt::Debug for EscProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EscProvider")
			.field("environment", &self.identity().to_string())
			.field("state", &self.state())
			.field("config", &self.config)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use esc_flags_core::{ErrorCode, Reason};
	use serde_json::json;

	struct StaticTransport(serde_json::Value);

	#[async_trait]
	impl EnvironmentTransport for StaticTransport {
		async fn fetch_environment(&self, _identity: &EnvironmentIdentity) -> Result<Document> {
			Document::from_json(self.0.clone())
		}
	}

	struct DownTransport;

	#[async_trait]
	impl EnvironmentTransport for DownTransport {
		async fn fetch_environment(&self, identity: &EnvironmentIdentity) -> Result<Document> {
			Err(FlagsError::EnvironmentNotFound(identity.to_string()))
		}
	}

	fn builder() -> EscProviderBuilder {
		EscProvider::builder()
			.organization("acme")
			.project("payments")
			.environment("prod")
			.access_token("pul-test")
			.retry_config(RetryConfig::none())
	}

	fn provider() -> EscProvider {
		builder()
			.transport(StaticTransport(json!({
				"configs": {"MAX_CONNECTIONS": 50, "DEBUG_MODE": false, "CPU_THRESHOLD": 0.75}
			})))
			.build()
			.unwrap()
	}

	#[test]
	fn default_config() {
		let config = ProviderConfig::default();
		assert_eq!(config.cache_ttl, Duration::from_secs(300));
		assert_eq!(config.request_timeout, Duration::from_secs(10));
		assert_eq!(config.open_duration, Duration::from_secs(7200));
		assert!(!config.serve_stale);
		assert_eq!(config.auth_scheme, AuthScheme::Bearer);
	}

	#[test]
	fn build_requires_every_identity_part() {
		let missing_org = EscProvider::builder()
			.project("payments")
			.environment("prod")
			.access_token("pul-test")
			.build()
			.unwrap_err();
		assert!(matches!(missing_org, FlagsError::Configuration(ref m) if m.contains("organization")));

		let blank_env = builder().environment("  ").build().unwrap_err();
		assert!(matches!(blank_env, FlagsError::Configuration(ref m) if m.contains("environment")));
	}

	#[test]
	fn build_rejects_blank_tokens_even_with_custom_transport() {
		let err = builder()
			.access_token("   ")
			.transport(DownTransport)
			.build()
			.unwrap_err();
		assert!(matches!(err, FlagsError::Configuration(ref m) if m.contains("token")));
	}

	#[test]
	fn build_rejects_bad_backend_urls_and_timeouts() {
		assert!(matches!(
			builder().backend_url("ftp://example.com").build(),
			Err(FlagsError::Configuration(_))
		));
		assert!(matches!(
			builder().fetch_timeout(Duration::ZERO).build(),
			Err(FlagsError::Configuration(_))
		));
	}

	#[test]
	fn built_provider_is_initializing() {
		let provider = provider();
		assert_eq!(provider.state(), ProviderState::Initializing);
		assert_eq!(provider.metadata().name, PROVIDER_NAME);
		assert_eq!(provider.identity().to_string(), "acme/payments/prod");
	}

	#[tokio::test]
	async fn initialize_moves_to_ready() {
		let provider = provider();
		provider.initialize(&EvaluationContext::new()).await.unwrap();
		assert_eq!(provider.state(), ProviderState::Ready);
		assert!(provider.last_updated().await.is_some());
	}

	#[tokio::test]
	async fn failed_initialize_moves_to_error_and_serves_defaults() {
		let provider = builder().transport(DownTransport).build().unwrap();

		let err = provider.initialize(&EvaluationContext::new()).await.unwrap_err();
		assert!(matches!(err, FlagsError::EnvironmentNotFound(_)));
		assert_eq!(provider.state(), ProviderState::Error);

		let details = provider
			.resolve_int("configs.MAX_CONNECTIONS", 10, &EvaluationContext::new())
			.await;
		assert_eq!(details.value, 10);
		assert_eq!(details.reason, Reason::Error);
		assert_eq!(details.error_code(), Some(ErrorCode::General));
	}

	#[tokio::test]
	async fn first_resolve_initializes_lazily() {
		let provider = provider();
		let ctx = EvaluationContext::new();

		let details = provider.resolve_int("configs.MAX_CONNECTIONS", 10, &ctx).await;
		assert_eq!(details.value, 50);
		assert_eq!(details.reason, Reason::Static);
		assert_eq!(provider.state(), ProviderState::Ready);
	}

	#[tokio::test]
	async fn resolves_each_type() {
		let provider = provider();
		let ctx = EvaluationContext::new();

		assert!(!provider.resolve_bool("configs.DEBUG_MODE", true, &ctx).await.value);
		assert_eq!(
			provider.resolve_float("configs.CPU_THRESHOLD", 0.5, &ctx).await.value,
			0.75
		);
		assert_eq!(
			provider.resolve_float("configs.MAX_CONNECTIONS", 0.5, &ctx).await.value,
			50.0
		);
		assert_eq!(
			provider
				.resolve_string("configs.MAX_CONNECTIONS", "none".to_string(), &ctx)
				.await
				.value,
			"50"
		);
	}

	#[tokio::test]
	async fn type_mismatch_returns_default() {
		let provider = provider();
		let details = provider
			.resolve_int("configs.DEBUG_MODE", 7, &EvaluationContext::new())
			.await;

		assert_eq!(details.value, 7);
		assert_eq!(details.reason, Reason::Error);
		assert_eq!(
			details.error,
			Some(FlagsError::TypeMismatch {
				key: "configs.DEBUG_MODE".to_string(),
				expected: esc_flags_core::ValueKind::Integer,
				actual: esc_flags_core::ValueKind::Bool,
			})
		);
		assert!(details.flag_metadata.is_empty());
	}

	#[tokio::test]
	async fn shutdown_is_terminal() {
		let provider = provider();
		provider.initialize(&EvaluationContext::new()).await.unwrap();
		provider.shutdown().await;
		assert_eq!(provider.state(), ProviderState::ShutDown);

		let details = provider
			.resolve_int("configs.MAX_CONNECTIONS", 10, &EvaluationContext::new())
			.await;
		assert_eq!(details.value, 10);
		assert_eq!(details.reason, Reason::Default);
		assert_eq!(details.error_code(), Some(ErrorCode::ProviderNotReady));

		assert!(provider.refresh().await.is_err());
		assert!(provider.initialize(&EvaluationContext::new()).await.is_err());
		assert_eq!(provider.state(), ProviderState::ShutDown);
		assert!(provider.last_updated().await.is_none());

		// Idempotent.
		provider.shutdown().await;
	}

	#[test]
	fn debug_output_hides_the_token() {
		let out = format!("{:?}", provider());
		assert!(out.contains("acme/payments/prod"));
		assert!(!out.contains("pul-test"));
	}
}
