// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment variable configuration for [`EscProviderBuilder`].
//!
//! The access token follows the `VAR` / `VAR_FILE` convention: when
//! `PULUMI_ACCESS_TOKEN_FILE` is set the token is read from that file
//! (Docker and Kubernetes secrets), otherwise from `PULUMI_ACCESS_TOKEN`.

use std::path::Path;
use std::time::Duration;
use std::{env, fs};

use esc_flags_core::{AccessToken, FlagsError, Result};
use zeroize::Zeroizing;

use crate::provider::EscProviderBuilder;

pub const ORGANIZATION_VAR: &str = "PULUMI_ORG_NAME";
pub const PROJECT_VAR: &str = "PULUMI_PROJECT_NAME";
pub const ENVIRONMENT_VAR: &str = "PULUMI_ENV_NAME";
pub const ACCESS_TOKEN_VAR: &str = "PULUMI_ACCESS_TOKEN";
pub const BACKEND_URL_VAR: &str = "PULUMI_BACKEND_URL";
pub const CACHE_TTL_VAR: &str = "ESC_FLAGS_CACHE_TTL_SECS";

impl EscProviderBuilder {
	/// Starts a builder from the process environment.
	///
	/// Reads [`ORGANIZATION_VAR`], [`PROJECT_VAR`], [`ENVIRONMENT_VAR`] and the
	/// access token, all required, plus the optional [`BACKEND_URL_VAR`] and
	/// [`CACHE_TTL_VAR`]. Further builder calls may override any of them.
	///
	/// ```no_run
	/// use esc_flags::EscProviderBuilder;
	///
	/// let provider = EscProviderBuilder::from_env()?.build()?;
	/// # Ok::<(), esc_flags::FlagsError>(())
	/// ```
	pub fn from_env() -> Result<Self> {
		Self::from_vars(|name| env::var(name).ok())
	}

	fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let required = |name: &str| {
			var(name)
				.filter(|v| !v.trim().is_empty())
				.ok_or_else(|| FlagsError::Configuration(format!("{name} is not set")))
		};

		let token = load_secret(ACCESS_TOKEN_VAR, &var)?.ok_or_else(|| {
			FlagsError::Configuration(format!(
				"set either {ACCESS_TOKEN_VAR} or {ACCESS_TOKEN_VAR}_FILE"
			))
		})?;

		let mut builder = EscProviderBuilder::new()
			.organization(required(ORGANIZATION_VAR)?)
			.project(required(PROJECT_VAR)?)
			.environment(required(ENVIRONMENT_VAR)?)
			.access_token(token);

		if let Some(url) = var(BACKEND_URL_VAR).filter(|v| !v.trim().is_empty()) {
			builder = builder.backend_url(url);
		}

		if let Some(raw) = var(CACHE_TTL_VAR) {
			let secs = raw.trim().parse::<u64>().map_err(|e| {
				FlagsError::Configuration(format!("{CACHE_TTL_VAR} must be whole seconds, got {raw:?}: {e}"))
			})?;
			builder = builder.cache_ttl(Duration::from_secs(secs));
		}

		Ok(builder)
	}
}

/// Loads a secret using the `VAR` / `VAR_FILE` convention. `VAR_FILE` wins.
fn load_secret(name: &str, var: impl Fn(&str) -> Option<String>) -> Result<Option<AccessToken>> {
	let file_var = format!("{name}_FILE");

	if let Some(path) = var(&file_var) {
		if path.is_empty() {
			return Err(FlagsError::Configuration(format!(
				"secret file path in {file_var} is empty"
			)));
		}
		let content = Zeroizing::new(fs::read_to_string(Path::new(&path)).map_err(|e| {
			FlagsError::Configuration(format!("failed to read secret file at {path}: {e}"))
		})?);
		let secret = content.strip_suffix('\n').unwrap_or(content.as_str());
		return Ok(Some(AccessToken::new(secret)));
	}

	Ok(var(name).map(AccessToken::new))
}
