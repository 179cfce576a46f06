// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache-aware document fetching with a single in-flight fetch.
//!
//! Concurrent callers that miss the cache join the same shared future, so a
//! cache-miss window costs one backend round trip and every waiter observes
//! the same outcome, success or failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use esc_common_http::{retry, RetryConfig, RetryableError};
use esc_flags_core::{Document, EnvironmentIdentity, FlagsError, ProviderState, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{DocumentCache, Snapshot};
use crate::transport::EnvironmentTransport;

type SharedFetch = Shared<BoxFuture<'static, Result<Snapshot>>>;

/// Whether a lookup may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
	/// Use the cached document while it is within its TTL.
	Cached,
	/// Always go to the backend, sharing any fetch already in flight.
	ForceRefresh,
}

/// Knobs the fetcher needs from the provider configuration.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
	pub retry: RetryConfig,
	/// Upper bound on how long one caller waits for a fetch.
	pub fetch_timeout: Duration,
	/// Keep serving the previous document when a TTL refresh fails.
	pub serve_stale: bool,
}

/// Resolves the identity to its current document via cache or transport.
pub struct EnvironmentFetcher {
	identity: EnvironmentIdentity,
	transport: Mutex<Option<Arc<dyn EnvironmentTransport>>>,
	cache: DocumentCache,
	inflight: Arc<tokio::sync::Mutex<Option<InFlight>>>,
	next_fetch_id: AtomicU64,
	policy: FetchPolicy,
}

struct InFlight {
	id: u64,
	fetch: SharedFetch,
}

// The shared future only ever reports `FlagsError`, which is cheap to retry on.
struct Retryable(FlagsError);

impl RetryableError for Retryable {
	fn is_retryable(&self) -> bool {
		self.0.is_retryable()
	}
}

impl std::fmt::Display for Retryable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl EnvironmentFetcher {
	pub fn new(
		identity: EnvironmentIdentity,
		transport: Arc<dyn EnvironmentTransport>,
		cache: DocumentCache,
		policy: FetchPolicy,
	) -> Self {
		Self {
			identity,
			transport: Mutex::new(Some(transport)),
			cache,
			inflight: Arc::new(tokio::sync::Mutex::new(None)),
			next_fetch_id: AtomicU64::new(0),
			policy,
		}
	}

	pub fn identity(&self) -> &EnvironmentIdentity {
		&self.identity
	}

	pub fn cache(&self) -> &DocumentCache {
		&self.cache
	}

	pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
		self.cache.last_updated().await
	}

	/// Returns the current document, fetching when the cache cannot answer.
	///
	/// Cancellation and `fetch_timeout` only stop this caller from waiting;
	/// the cached document is left as it was.
	pub async fn get_document(
		&self,
		mode: FetchMode,
		cancel: &CancellationToken,
	) -> Result<Arc<Document>> {
		let observed = self.cache.generation().await;

		if mode == FetchMode::Cached {
			if let Some(snapshot) = self.cache.fresh().await {
				debug!(environment = %self.identity, generation = snapshot.generation, "document cache hit");
				return Ok(snapshot.document);
			}
		}

		let fetch = {
			let mut slot = self.inflight.lock().await;
			match slot.as_ref() {
				Some(inflight) => inflight.fetch.clone(),
				None => {
					// A fetch may have finished between our cache check and taking the slot.
					if let Some(snapshot) = self.cache.newer_than(observed).await {
						return Ok(snapshot.document);
					}
					let inflight = self.start_fetch()?;
					let fetch = inflight.fetch.clone();
					*slot = Some(inflight);
					fetch
				}
			}
		};

		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(FlagsError::Cancelled),
			waited = tokio::time::timeout(self.policy.fetch_timeout, fetch) => {
				waited.unwrap_or(Err(FlagsError::Timeout(self.policy.fetch_timeout)))
			}
		};

		match outcome {
			Ok(snapshot) => Ok(snapshot.document),
			Err(err) if self.may_serve_stale(mode, &err) => {
				match self.cache.current().await {
					Some(stale) => {
						warn!(
							environment = %self.identity,
							error = %err,
							generation = stale.generation,
							"environment refresh failed, serving previous document"
						);
						Ok(stale.document)
					}
					None => Err(err),
				}
			}
			Err(err) => Err(err),
		}
	}

	fn may_serve_stale(&self, mode: FetchMode, err: &FlagsError) -> bool {
		mode == FetchMode::Cached
			&& self.policy.serve_stale
			&& err.should_use_cache()
			&& *err != FlagsError::Cancelled
	}

	/// Releases the transport and drops the cached document.
	pub async fn close(&self) {
		self
			.transport
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		self.cache.close().await;
		self.inflight.lock().await.take();
	}

	fn start_fetch(&self) -> Result<InFlight> {
		let transport = self
			.transport
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
			.ok_or(FlagsError::ProviderNotReady {
				state: ProviderState::ShutDown,
			})?;

		let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
		let fetch = fetch_and_store(
			transport,
			self.identity.clone(),
			self.cache.clone(),
			self.policy.retry.clone(),
			Arc::downgrade(&self.inflight),
			id,
		)
		.boxed()
		.shared();

		Ok(InFlight { id, fetch })
	}
}

async fn fetch_and_store(
	transport: Arc<dyn EnvironmentTransport>,
	identity: EnvironmentIdentity,
	cache: DocumentCache,
	retry_config: RetryConfig,
	// Weak: the slot owns this future, so a strong handle would keep both alive forever.
	inflight: Weak<tokio::sync::Mutex<Option<InFlight>>>,
	id: u64,
) -> Result<Snapshot> {
	let started = Instant::now();
	let fetched = retry(&retry_config, || async {
		transport
			.fetch_environment(&identity)
			.await
			.map_err(Retryable)
	})
	.await
	.map_err(|Retryable(err)| err);

	// Store before freeing the slot so late arrivals see the new generation.
	let outcome = match fetched {
		Ok(document) => {
			let leaves = document.leaf_count();
			match cache.store(document).await {
				Some(snapshot) => {
					info!(
						environment = %identity,
						leaves,
						generation = snapshot.generation,
						elapsed_ms = started.elapsed().as_millis() as u64,
						"environment document fetched"
					);
					Ok(snapshot)
				}
				None => Err(FlagsError::ProviderNotReady {
					state: ProviderState::ShutDown,
				}),
			}
		}
		Err(err) => {
			warn!(environment = %identity, error = %err, "environment fetch failed");
			Err(err)
		}
	};

	if let Some(inflight) = inflight.upgrade() {
		let mut slot = inflight.lock().await;
		if slot.as_ref().is_some_and(|f| f.id == id) {
			*slot = None;
		}
	}

	outcome
}
