// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated access to the ESC environments API.
//!
//! Reading an environment takes two calls: open a session, then read the
//! session's resolved properties. This layer never retries; the fetcher owns
//! the retry policy.

use std::time::Duration;

use async_trait::async_trait;
use esc_flags_core::{AccessToken, Document, EnvironmentIdentity, FlagsError, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

/// Backend used when no URL override is configured.
pub const DEFAULT_BACKEND_URL: &str = "https://api.pulumi.com";

const API_PREFIX: [&str; 3] = ["api", "esc", "environments"];

/// Longest backend error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Fetches the current configuration document of an environment.
#[async_trait]
pub trait EnvironmentTransport: Send + Sync + 'static {
	async fn fetch_environment(&self, identity: &EnvironmentIdentity) -> Result<Document>;
}

/// How the access token is presented in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
	/// `Authorization: Bearer <token>`
	#[default]
	Bearer,
	/// `Authorization: token <token>`, the scheme used by the Pulumi Cloud CLI.
	Token,
}

impl AuthScheme {
	fn header_value(self, token: &AccessToken) -> String {
		match self {
			AuthScheme::Bearer => format!("Bearer {}", token.expose()),
			AuthScheme::Token => format!("token {}", token.expose()),
		}
	}
}

/// HTTP transport against a Pulumi Cloud compatible backend.
pub struct HttpTransport {
	client: Client,
	base_url: Url,
	token: AccessToken,
	auth_scheme: AuthScheme,
	open_duration: Duration,
	request_timeout: Duration,
}

impl HttpTransport {
	pub fn new(
		base_url: Url,
		token: AccessToken,
		auth_scheme: AuthScheme,
		open_duration: Duration,
		request_timeout: Duration,
	) -> Result<Self> {
		if base_url.cannot_be_a_base() {
			return Err(FlagsError::Configuration(format!(
				"backend URL cannot carry a path: {base_url}"
			)));
		}

		let client = esc_common_http::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| FlagsError::Configuration(format!("failed to build HTTP client: {e}")))?;

		Ok(Self {
			client,
			base_url,
			token,
			auth_scheme,
			open_duration,
			request_timeout,
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// `{base}/api/esc/environments/{org}/{project}/{env}/{tail...}` with every
	/// segment percent-encoded.
	fn environment_url(&self, identity: &EnvironmentIdentity, tail: &[&str]) -> Result<Url> {
		let mut url = self.base_url.clone();
		{
			let mut segments = url.path_segments_mut().map_err(|_| {
				FlagsError::Configuration(format!(
					"backend URL cannot carry a path: {}",
					self.base_url
				))
			})?;
			segments
				.pop_if_empty()
				.extend(API_PREFIX)
				.extend(identity.segments())
				.extend(tail);
		}
		Ok(url)
	}

	async fn open(&self, identity: &EnvironmentIdentity) -> Result<String> {
		let mut url = self.environment_url(identity, &["open"])?;
		url.query_pairs_mut()
			.append_pair("duration", &format!("{}s", self.open_duration.as_secs()));

		let response = self
			.client
			.post(url)
			.header(AUTHORIZATION, self.auth_scheme.header_value(&self.token))
			.send()
			.await
			.map_err(|e| self.request_error(e))?;

		let opened: OpenResponse = decode(check_status(response, identity).await?).await?;
		if !opened.diagnostics.is_empty() {
			warn!(
				environment = %identity,
				diagnostics = opened.diagnostics.len(),
				first = %opened.diagnostics[0].summary,
				"environment opened with diagnostics"
			);
		}
		if opened.id.is_empty() {
			return Err(FlagsError::InvalidResponse(
				"open response carried an empty session id".to_string(),
			));
		}
		Ok(opened.id)
	}

	async fn read(&self, identity: &EnvironmentIdentity, session: &str) -> Result<Document> {
		let url = self.environment_url(identity, &["open", session])?;

		let response = self
			.client
			.get(url)
			.header(AUTHORIZATION, self.auth_scheme.header_value(&self.token))
			.send()
			.await
			.map_err(|e| self.request_error(e))?;

		let opened: OpenedEnvironment = decode(check_status(response, identity).await?).await?;
		Document::from_esc_properties(&opened.properties)
	}

	fn request_error(&self, err: reqwest::Error) -> FlagsError {
		if err.is_timeout() {
			FlagsError::Timeout(self.request_timeout)
		} else {
			FlagsError::Transport(err.to_string())
		}
	}
}

#[async_trait]
impl EnvironmentTransport for HttpTransport {
	async fn fetch_environment(&self, identity: &EnvironmentIdentity) -> Result<Document> {
		let session = self.open(identity).await?;
		debug!(environment = %identity, "environment session opened");
		self.read(identity, &session).await
	}
}

impl std::fmt::Debug for HttpTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpTransport")
			.field("base_url", &self.base_url.as_str())
			.field("token", &self.token)
			.field("auth_scheme", &self.auth_scheme)
			.finish()
	}
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
	id: String,
	#[serde(default)]
	diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
struct Diagnostic {
	#[serde(default)]
	summary: String,
}

#[derive(Debug, Deserialize)]
struct OpenedEnvironment {
	#[serde(default)]
	properties: serde_json::Map<String, serde_json::Value>,
}

async fn check_status(response: Response, identity: &EnvironmentIdentity) -> Result<Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let message = truncate(response.text().await.unwrap_or_default());
	Err(match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FlagsError::Authentication {
			status: status.as_u16(),
			message,
		},
		StatusCode::NOT_FOUND => FlagsError::EnvironmentNotFound(identity.to_string()),
		_ => FlagsError::Backend {
			status: status.as_u16(),
			message,
		},
	})
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
	response.json::<T>().await.map_err(|e| {
		if e.is_decode() {
			FlagsError::InvalidResponse(e.to_string())
		} else {
			FlagsError::Transport(e.to_string())
		}
	})
}

fn truncate(body: String) -> String {
	if body.chars().count() <= MAX_ERROR_BODY_CHARS {
		return body;
	}
	body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>() + "..."
}

/// Parses and checks a backend URL override.
pub fn parse_backend_url(raw: &str) -> Result<Url> {
	let url = Url::parse(raw.trim())
		.map_err(|e| FlagsError::Configuration(format!("invalid backend URL {raw:?}: {e}")))?;
	match url.scheme() {
		"http" | "https" => {}
		other => {
			return Err(FlagsError::Configuration(format!(
				"backend URL must use http or https, got {other}"
			)))
		}
	}
	if url.cannot_be_a_base() {
		return Err(FlagsError::Configuration(format!(
			"backend URL cannot carry a path: {raw}"
		)));
	}
	Ok(url)
}
