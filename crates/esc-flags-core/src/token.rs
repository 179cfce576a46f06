// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access token wrapper that never prints its contents.
//!
//! ```
//! use esc_flags_core::AccessToken;
//!
//! let token = AccessToken::new("pul-0123456789");
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(format!("{token:?}"), "AccessToken(\"[REDACTED]\")");
//! assert_eq!(token.expose(), "pul-0123456789");
//! ```

use std::fmt;

use zeroize::Zeroizing;

/// Placeholder printed instead of sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// A bearer credential for the ESC backend.
///
/// `Debug` and `Display` are redacted, the buffer is zeroed on drop, and the
/// raw value is only reachable through [`AccessToken::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(Zeroizing::new(token.into()))
	}

	/// The raw token. Call sites opt in explicitly so access shows up in review.
	pub fn expose(&self) -> &str {
		self.0.as_str()
	}

	/// True when the token is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("AccessToken").field(&REDACTED).finish()
	}
}

impl fmt::Display for AccessToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for AccessToken {
	fn from(token: String) -> Self {
		Self::new(token)
	}
}

impl From<&str> for AccessToken {
	fn from(token: &str) -> Self {
		Self::new(token)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn formatting_is_redacted() {
		let token = AccessToken::new("pul-live-token");
		assert!(!format!("{token:?}").contains("pul-live-token"));
		assert_eq!(token.to_string(), REDACTED);
	}

	#[test]
	fn option_debug_is_redacted() {
		let token = Some(AccessToken::new("pul-live-token"));
		assert!(!format!("{token:?}").contains("pul-live-token"));
	}

	#[test]
	fn blank_detection() {
		assert!(AccessToken::new("").is_blank());
		assert!(AccessToken::new("  \n").is_blank());
		assert!(!AccessToken::new("pul-x").is_blank());
	}

	proptest! {
		#[test]
		fn never_prints_the_token(raw in "[a-zA-Z0-9_-]{4,64}") {
			prop_assume!(!raw.contains("REDACTED") && !raw.contains("AccessToken"));
			let token = AccessToken::new(raw.clone());
			let debug = format!("{:?}", token);
			let display = format!("{}", token);
			prop_assert!(!debug.contains(&raw));
			prop_assert!(!display.contains(&raw));
			prop_assert_eq!(token.expose(), raw.as_str());
		}
	}
}
