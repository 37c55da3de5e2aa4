// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client builder with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// Version of the tracker SDK, reported in the User-Agent and SDK headers.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the standard tracker User-Agent header.
///
/// # Example
/// ```ignore
/// let client = databuddy_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client builder with a custom User-Agent header.
///
/// Embedders that proxy traffic for a browser use this to forward the page's
/// own User-Agent.
pub fn builder_with_user_agent(user_agent: impl Into<String>) -> ClientBuilder {
	Client::builder().user_agent(user_agent.into())
}

/// Returns the standard tracker User-Agent string.
///
/// Format: `databuddy-tracker/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"databuddy-tracker/{} ({}-{})",
		SDK_VERSION,
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
