// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the ESC flags provider.
//!
//! This crate provides:
//! - A pre-configured `reqwest` client builder with a stable User-Agent header
//! - Retry with exponential backoff and jitter for transient failures

mod client;
mod retry;

pub use client::{builder, user_agent};
pub use retry::{retry, RetryConfig, RetryableError};
