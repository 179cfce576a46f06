// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flag provider backed by Pulumi ESC environments.
//!
//! Flag keys are dotted paths into the environment's resolved document, e.g.
//! `configs.MAX_CONNECTIONS` or `aws.secrets.GITHUB_ACCESS_TOKEN`.
//!
//! # Features
//!
//! - **Typed resolution**: string, integer, boolean and float, with strict coercion
//! - **Safe defaults**: failures return the caller's default plus the error
//! - **Secret metadata**: leaves the backend marks secret carry `secret: true`
//! - **Caching**: one document per provider with a TTL and a single in-flight fetch
//! - **Stale serving**: opt in to keep serving the previous document when a refresh fails
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use esc_flags::{EscProvider, EvaluationContext, FlagsClient};
//!
//! # async fn run() -> esc_flags::Result<()> {
//! let provider = EscProvider::builder()
//!     .organization("acme")
//!     .project("payments")
//!     .environment("prod")
//!     .access_token("pul-xxx")
//!     .build_initialized()
//!     .await?;
//!
//! let client = FlagsClient::new("payments-api", Arc::new(provider));
//! let ctx = EvaluationContext::new();
//!
//! let max = client.int_value_details("configs.MAX_CONNECTIONS", 10, &ctx).await;
//! if let Some(err) = &max.error {
//!     eprintln!("using default: {err}");
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod fetcher;
mod provider;
mod transport;

pub use cache::{DocumentCache, Snapshot};
pub use client::FlagsClient;
pub use config::{
	ACCESS_TOKEN_VAR, BACKEND_URL_VAR, CACHE_TTL_VAR, ENVIRONMENT_VAR, ORGANIZATION_VAR, PROJECT_VAR,
};
pub use fetcher::{EnvironmentFetcher, FetchMode, FetchPolicy};
pub use provider::{EscProvider, EscProviderBuilder, ProviderConfig, PROVIDER_NAME};
pub use transport::{
	parse_backend_url, AuthScheme, EnvironmentTransport, HttpTransport, DEFAULT_BACKEND_URL,
};

// Re-export core types for convenience
pub use esc_common_http::RetryConfig;
pub use esc_flags_core::{
	AccessToken, Document, EnvironmentIdentity, ErrorCode, EvaluationContext, FeatureProvider,
	FlagMetadata, FlagValue, FlagsError, MetadataValue, Node, ProviderMetadata, ProviderState,
	Reason, ResolutionDetails, Result, Value, ValueKind, SECRET_METADATA_KEY,
};
