// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProviderState, ValueKind};

/// Errors produced while configuring the provider or resolving a flag.
///
/// The type is `Clone` because a single fetch outcome is shared by every
/// caller waiting on it, and because each [`crate::ResolutionDetails`]
/// carries its own copy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlagsError {
	/// Construction inputs were missing or malformed.
	#[error("invalid provider configuration: {0}")]
	Configuration(String),

	/// The backend rejected the access token.
	#[error("authentication failed ({status}): {message}")]
	Authentication { status: u16, message: String },

	/// No environment exists at the requested address.
	#[error("environment not found: {0}")]
	EnvironmentNotFound(String),

	/// The request never produced an HTTP response.
	#[error("transport error: {0}")]
	Transport(String),

	/// The fetch did not finish within the configured budget.
	#[error("request timed out after {0:?}")]
	Timeout(Duration),

	/// The caller cancelled the resolution while a fetch was in flight.
	#[error("request cancelled")]
	Cancelled,

	/// The backend answered with a failure status.
	#[error("backend error ({status}): {message}")]
	Backend { status: u16, message: String },

	/// The backend answered successfully but the body could not be decoded.
	#[error("invalid backend response: {0}")]
	InvalidResponse(String),

	/// No leaf exists at the flag key.
	#[error("flag key not found: {key}")]
	KeyNotFound { key: String },

	/// The leaf exists but holds a different kind of value.
	#[error("type mismatch for {key}: expected {expected}, found {actual}")]
	TypeMismatch {
		key: String,
		expected: ValueKind,
		actual: ValueKind,
	},

	/// Resolution was attempted outside the provider's serving window.
	#[error("provider not ready (state: {state})")]
	ProviderNotReady { state: ProviderState },
}

impl FlagsError {
	/// Returns true if repeating the fetch could succeed.
	pub fn is_retryable(&self) -> bool {
		match self {
			FlagsError::Transport(_) | FlagsError::Timeout(_) => true,
			FlagsError::Backend { status, .. } => *status == 429 || (500..=599).contains(status),
			_ => false,
		}
	}

	/// Returns true if a previously fetched document may keep serving after this error.
	pub fn should_use_cache(&self) -> bool {
		matches!(
			self,
			FlagsError::Transport(_)
				| FlagsError::Timeout(_)
				| FlagsError::Cancelled
				| FlagsError::Backend { .. }
				| FlagsError::InvalidResponse(_)
		)
	}

	/// Returns the stable code reported alongside a fallback resolution.
	pub fn error_code(&self) -> ErrorCode {
		match self {
			FlagsError::ProviderNotReady { .. } => ErrorCode::ProviderNotReady,
			FlagsError::KeyNotFound { .. } => ErrorCode::FlagNotFound,
			FlagsError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
			FlagsError::InvalidResponse(_) => ErrorCode::ParseError,
			_ => ErrorCode::General,
		}
	}
}

/// Coarse error classification exposed on resolution results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	ProviderNotReady,
	FlagNotFound,
	TypeMismatch,
	ParseError,
	General,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::ProviderNotReady => "PROVIDER_NOT_READY",
			ErrorCode::FlagNotFound => "FLAG_NOT_FOUND",
			ErrorCode::TypeMismatch => "TYPE_MISMATCH",
			ErrorCode::ParseError => "PARSE_ERROR",
			ErrorCode::General => "GENERAL",
		};
		f.write_str(code)
	}
}

pub type Result<T> = std::result::Result<T, FlagsError>;
