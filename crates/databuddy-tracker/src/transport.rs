// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Network transport used by [`crate::HttpClient`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TrackerError, TransportError};

/// Default per-request timeout for [`ReqwestTransport`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A single outgoing POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
	pub url: String,
	pub headers: Vec<(String, String)>,
	/// Serialized JSON.
	pub body: String,
	/// `fetch(..., { keepalive: true })`: the request may outlive the page.
	pub keepalive: bool,
	/// `credentials: "omit"`: no cookies are attached.
	pub omit_credentials: bool,
}

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
	pub status: u16,
	pub body: String,
}

/// Performs HTTP requests on behalf of the tracker.
///
/// Any response, including 4xx and 5xx, is `Ok`; `Err` means no response was
/// received at all.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

	/// Fire-and-forget GET used for pixel requests.
	async fn get(&self, url: &str) -> Result<(), TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
	client: reqwest::Client,
}

impl ReqwestTransport {
	pub fn new() -> Result<Self, TrackerError> {
		Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
	}

	pub fn with_timeout(timeout: Duration) -> Result<Self, TrackerError> {
		let client = databuddy_common_http::builder().timeout(timeout).build()?;
		Ok(Self { client })
	}

	/// Wraps an existing client, e.g. one built with
	/// [`databuddy_common_http::builder_with_user_agent`].
	pub fn from_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl Transport for ReqwestTransport {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		// reqwest never attaches cookies without a cookie store, which matches
		// `credentials: "omit"`. Keepalive has no equivalent outside a page.
		let mut builder = self.client.post(&request.url).body(request.body);
		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let body = response.text().await.unwrap_or_default();
		Ok(TransportResponse { status, body })
	}

	async fn get(&self, url: &str) -> Result<(), TransportError> {
		self.client.get(url).send().await?;
		Ok(())
	}
}
