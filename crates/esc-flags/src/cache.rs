// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory cache holding the last fetched environment document.
//!
//! There is exactly one document at a time. Storing replaces it wholesale and
//! bumps a generation counter, so readers can tell whether a fetch completed
//! after they last looked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use esc_flags_core::Document;
use tokio::sync::RwLock;

/// An immutable view of a fetched document.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub document: Arc<Document>,
	pub fetched_at: DateTime<Utc>,
	pub generation: u64,
	stored: Instant,
}

impl Snapshot {
	/// Age of the snapshot at `now`.
	pub fn age(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.stored)
	}
}

/// Single-document cache with a time-to-live.
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct DocumentCache {
	inner: Arc<RwLock<CacheInner>>,
	ttl: Duration,
}

#[derive(Debug, Default)]
struct CacheInner {
	snapshot: Option<Snapshot>,
	/// Number of documents stored so far.
	generation: u64,
	closed: bool,
}

impl DocumentCache {
	/// Creates an empty cache. A zero `ttl` makes every snapshot stale immediately.
	pub fn new(ttl: Duration) -> Self {
		Self {
			inner: Arc::new(RwLock::new(CacheInner::default())),
			ttl,
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Returns the snapshot if one exists and is younger than the TTL.
	pub async fn fresh(&self) -> Option<Snapshot> {
		let now = Instant::now();
		self
			.inner
			.read()
			.await
			.snapshot
			.as_ref()
			.filter(|s| s.age(now) < self.ttl)
			.cloned()
	}

	/// Returns the snapshot regardless of age.
	pub async fn current(&self) -> Option<Snapshot> {
		self.inner.read().await.snapshot.clone()
	}

	/// Returns the snapshot if it was stored after `generation`.
	pub async fn newer_than(&self, generation: u64) -> Option<Snapshot> {
		self
			.inner
			.read()
			.await
			.snapshot
			.as_ref()
			.filter(|s| s.generation > generation)
			.cloned()
	}

	pub async fn generation(&self) -> u64 {
		self.inner.read().await.generation
	}

	/// Replaces the cached document. Returns `None` once the cache is closed.
	pub async fn store(&self, document: Document) -> Option<Snapshot> {
		let mut inner = self.inner.write().await;
		if inner.closed {
			return None;
		}

		inner.generation += 1;
		let snapshot = Snapshot {
			document: Arc::new(document),
			fetched_at: Utc::now(),
			generation: inner.generation,
			stored: Instant::now(),
		};
		inner.snapshot = Some(snapshot.clone());
		Some(snapshot)
	}

	/// When the current document was fetched.
	pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
		self.inner.read().await.snapshot.as_ref().map(|s| s.fetched_at)
	}

	pub async fn is_initialized(&self) -> bool {
		self.inner.read().await.snapshot.is_some()
	}

	/// Drops the document and refuses further stores.
	pub async fn close(&self) {
		let mut inner = self.inner.write().await;
		inner.snapshot = None;
		inner.closed = true;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn doc(max_connections: i64) -> Document {
		Document::from_json(json!({"configs": {"MAX_CONNECTIONS": max_connections}})).unwrap()
	}

	#[tokio::test]
	async fn empty_cache_has_nothing() {
		let cache = DocumentCache::new(Duration::from_secs(60));
		assert!(!cache.is_initialized().await);
		assert!(cache.fresh().await.is_none());
		assert!(cache.current().await.is_none());
		assert!(cache.last_updated().await.is_none());
		assert_eq!(cache.generation().await, 0);
	}

	#[tokio::test]
	async fn store_replaces_wholesale() {
		let cache = DocumentCache::new(Duration::from_secs(60));
		let first = cache.store(doc(10)).await.unwrap();
		let second = cache.store(doc(20)).await.unwrap();

		assert_eq!(first.generation, 1);
		assert_eq!(second.generation, 2);
		assert_eq!(*first.document, doc(10));

		let current = cache.fresh().await.unwrap();
		assert_eq!(*current.document, doc(20));
		assert!(cache.last_updated().await.is_some());
	}

	#[tokio::test]
	async fn zero_ttl_is_never_fresh() {
		let cache = DocumentCache::new(Duration::ZERO);
		cache.store(doc(10)).await;
		assert!(cache.fresh().await.is_none());
		assert!(cache.current().await.is_some());
	}

	#[tokio::test]
	async fn expires_after_ttl() {
		let cache = DocumentCache::new(Duration::from_millis(20));
		cache.store(doc(10)).await;
		assert!(cache.fresh().await.is_some());
		tokio::time::sleep(Duration::from_millis(40)).await;
		assert!(cache.fresh().await.is_none());
	}

	#[tokio::test]
	async fn newer_than_tracks_generations() {
		let cache = DocumentCache::new(Duration::from_secs(60));
		let before = cache.generation().await;
		assert!(cache.newer_than(before).await.is_none());
		cache.store(doc(10)).await;
		assert!(cache.newer_than(before).await.is_some());
		assert!(cache.newer_than(before + 1).await.is_none());
	}

	#[tokio::test]
	async fn closed_cache_refuses_stores() {
		let cache = DocumentCache::new(Duration::from_secs(60));
		cache.store(doc(10)).await;
		cache.close().await;
		assert!(cache.current().await.is_none());
		assert!(cache.store(doc(20)).await.is_none());
		assert!(!cache.is_initialized().await);
	}

	#[tokio::test]
	async fn clones_share_state() {
		let cache = DocumentCache::new(Duration::from_secs(60));
		let other = cache.clone();
		cache.store(doc(10)).await;
		assert!(other.is_initialized().await);
	}
}
