// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP client construction with a consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// Product token sent as the first User-Agent component.
const PRODUCT: &str = "esc-flags";

/// Creates a client builder carrying the standard User-Agent.
///
/// Callers finish configuration (timeouts, pooling) and call `build()`
/// themselves, so construction errors surface where they can be mapped.
///
/// # Example
/// ```ignore
/// let client = esc_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the standard User-Agent string.
///
/// Format: `esc-flags/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{PRODUCT}/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
