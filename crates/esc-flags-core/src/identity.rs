// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::error::{FlagsError, Result};

/// Fully qualified address of one ESC environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentIdentity {
	organization: String,
	project: String,
	environment: String,
}

impl EnvironmentIdentity {
	/// Validates and builds an identity.
	///
	/// Each part is trimmed and must be non-empty and free of `/`.
	pub fn new(
		organization: impl Into<String>,
		project: impl Into<String>,
		environment: impl Into<String>,
	) -> Result<Self> {
		Ok(Self {
			organization: validate_segment("organization", organization.into())?,
			project: validate_segment("project", project.into())?,
			environment: validate_segment("environment", environment.into())?,
		})
	}

	pub fn organization(&self) -> &str {
		&self.organization
	}

	pub fn project(&self) -> &str {
		&self.project
	}

	pub fn environment(&self) -> &str {
		&self.environment
	}

	/// Path segments in backend order.
	pub fn segments(&self) -> [&str; 3] {
		[
			self.organization.as_str(),
			self.project.as_str(),
			self.environment.as_str(),
		]
	}
}

impl std::fmt::Display for EnvironmentIdentity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}/{}", self.organization, self.project, self.environment)
	}
}

fn validate_segment(field: &str, value: String) -> Result<String> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(FlagsError::Configuration(format!("{field} name must not be empty")));
	}
	if trimmed.contains('/') {
		return Err(FlagsError::Configuration(format!(
			"{field} name must not contain '/': {trimmed}"
		)));
	}
	Ok(trimmed.to_string())
}
