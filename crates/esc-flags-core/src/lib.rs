// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for resolving feature flags from Pulumi ESC environments.
//!
//! This crate has no I/O. It defines the environment address, the decoded
//! configuration document, dotted-key lookup, strict value coercion, the
//! resolution result types and the provider contract. The networked provider
//! lives in `esc-flags`.
//!
//! # Example
//!
//! ```
//! use esc_flags_core::{Document, FlagValue};
//!
//! let doc = Document::from_json(serde_json::json!({
//!     "configs": {"MAX_CONNECTIONS": 50, "CPU_THRESHOLD": 0.75}
//! }))
//! .unwrap();
//!
//! let leaf = doc.lookup("configs.MAX_CONNECTIONS").unwrap();
//! assert_eq!(i64::from_leaf(leaf.value), Ok(50));
//! assert!(!leaf.secret);
//! ```

pub mod coerce;
pub mod document;
pub mod error;
pub mod evaluation;
pub mod identity;
pub mod path;
pub mod provider;
pub mod token;
pub mod value;

pub use coerce::FlagValue;
pub use document::Document;
pub use error::{ErrorCode, FlagsError, Result};
pub use evaluation::{
	EvaluationContext, FlagMetadata, MetadataValue, Reason, ResolutionDetails, SECRET_METADATA_KEY,
};
pub use identity::EnvironmentIdentity;
pub use path::ResolvedLeaf;
pub use provider::{FeatureProvider, ProviderMetadata, ProviderState};
pub use token::{AccessToken, REDACTED};
pub use value::{Node, Value, ValueKind};
