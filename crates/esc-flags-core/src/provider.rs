// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provider contract.
//!
//! Resolution never fails outright: each operation returns a
//! [`ResolutionDetails`] holding either the resolved value or the caller's
//! default together with the error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::evaluation::{EvaluationContext, ResolutionDetails};

/// Lifecycle of a provider.
///
/// ```text
/// Uninitialized -> Initializing -> Ready <-> Ready (refresh)
///                              \-> Error -> Ready (recovered fetch)
/// Ready | Error -> ShutDown (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProviderState {
	#[default]
	Uninitialized = 0,
	Initializing = 1,
	Ready = 2,
	Error = 3,
	ShutDown = 4,
}

impl ProviderState {
	/// Inverse of `state as u8`. Unknown discriminants map to `ShutDown`.
	pub fn from_u8(raw: u8) -> Self {
		match raw {
			0 => ProviderState::Uninitialized,
			1 => ProviderState::Initializing,
			2 => ProviderState::Ready,
			3 => ProviderState::Error,
			_ => ProviderState::ShutDown,
		}
	}

	pub fn is_terminal(self) -> bool {
		self == ProviderState::ShutDown
	}
}

impl std::fmt::Display for ProviderState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ProviderState::Uninitialized => "uninitialized",
			ProviderState::Initializing => "initializing",
			ProviderState::Ready => "ready",
			ProviderState::Error => "error",
			ProviderState::ShutDown => "shut_down",
		};
		f.write_str(name)
	}
}

/// Descriptive information about a provider implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	pub name: String,
}

impl ProviderMetadata {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into() }
	}
}

/// A source of typed flag values.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
	fn metadata(&self) -> ProviderMetadata;

	fn state(&self) -> ProviderState;

	/// Performs the first fetch eagerly and reports its failure.
	async fn initialize(&self, context: &EvaluationContext) -> Result<()>;

	/// Releases resources. Later resolutions return `ProviderNotReady`.
	async fn shutdown(&self);

	async fn resolve_bool(
		&self,
		flag_key: &str,
		default: bool,
		context: &EvaluationContext,
	) -> ResolutionDetails<bool>;

	async fn resolve_string(
		&self,
		flag_key: &str,
		default: String,
		context: &EvaluationContext,
	) -> ResolutionDetails<String>;

	async fn resolve_int(
		&self,
		flag_key: &str,
		default: i64,
		context: &EvaluationContext,
	) -> ResolutionDetails<i64>;

	async fn resolve_float(
		&self,
		flag_key: &str,
		default: f64,
		context: &EvaluationContext,
	) -> ResolutionDetails<f64>;
}
