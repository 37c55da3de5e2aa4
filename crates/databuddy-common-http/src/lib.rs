// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Databuddy tracker.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with a consistent User-Agent header
//! - Retry logic with exponential backoff and jitter for transient failures

mod client;
mod retry;

pub use client::{builder, builder_with_user_agent, user_agent, SDK_VERSION};
pub use retry::{is_retryable_status, retry, RetryConfig, RetryableError};
