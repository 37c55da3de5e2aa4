// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP delivery client for the ingestion API.

use std::collections::BTreeMap;
use std::sync::Arc;

use databuddy_common_http::{retry, RetryConfig};
use databuddy_tracker_core::TrackerOptions;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::error::{Result, TrackerError};
use crate::host::Beacon;
use crate::transport::{Transport, TransportRequest, TransportResponse};

/// Resolves a header value at request time; `None` omits the header.
pub type HeaderProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Configuration for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
	/// Base URL without a trailing slash.
	pub base_url: String,
	pub client_id: String,
	pub sdk_name: String,
	pub sdk_version: String,
	pub retry: RetryConfig,
}

impl HttpClientConfig {
	pub fn from_options(options: &TrackerOptions) -> Self {
		Self {
			base_url: options.api_url.clone(),
			client_id: options.client_id.clone(),
			sdk_name: options.sdk.clone(),
			sdk_version: options.sdk_version.clone(),
			retry: RetryConfig::new(options.effective_max_retries(), options.initial_retry_delay),
		}
	}
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostOptions {
	/// Allows the Beacon API fast path, for requests that must survive unload.
	pub keepalive: bool,
}

impl PostOptions {
	pub fn keepalive() -> Self {
		Self { keepalive: true }
	}
}

/// Delivers JSON payloads with bounded retries.
pub struct HttpClient {
	base_url: String,
	client_id: String,
	static_headers: Vec<(String, String)>,
	dynamic_headers: Mutex<BTreeMap<String, HeaderProvider>>,
	retry: RetryConfig,
	transport: Arc<dyn Transport>,
	beacon: Option<Arc<dyn Beacon>>,
}

impl HttpClient {
	pub fn new(config: HttpClientConfig, transport: Arc<dyn Transport>) -> Self {
		let static_headers = vec![
			("Content-Type".to_string(), "application/json".to_string()),
			("databuddy-client-id".to_string(), config.client_id.clone()),
			("databuddy-sdk-name".to_string(), config.sdk_name),
			("databuddy-sdk-version".to_string(), config.sdk_version),
		];
		Self {
			base_url: config.base_url.trim_end_matches('/').to_string(),
			client_id: config.client_id,
			static_headers,
			dynamic_headers: Mutex::new(BTreeMap::new()),
			retry: config.retry,
			transport,
			beacon: None,
		}
	}

	pub fn with_beacon(mut self, beacon: Option<Arc<dyn Beacon>>) -> Self {
		self.beacon = beacon;
		self
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Registers a header whose value is resolved again on every attempt.
	pub fn set_dynamic_header<F>(&self, name: impl Into<String>, provider: F)
	where
		F: Fn() -> Option<String> + Send + Sync + 'static,
	{
		self.dynamic_headers.lock().insert(name.into(), Arc::new(provider));
	}

	pub fn remove_dynamic_header(&self, name: &str) {
		self.dynamic_headers.lock().remove(name);
	}

	/// Static headers followed by the current value of every dynamic header.
	pub fn headers(&self) -> Vec<(String, String)> {
		let providers: Vec<(String, HeaderProvider)> = self
			.dynamic_headers
			.lock()
			.iter()
			.map(|(name, provider)| (name.clone(), Arc::clone(provider)))
			.collect();

		let mut headers = self.static_headers.clone();
		for (name, provider) in providers {
			if let Some(value) = provider() {
				match headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
					Some(slot) => slot.1 = value,
					None => headers.push((name, value)),
				}
			}
		}
		headers
	}

	/// `{base}{path}`
	pub fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	/// `{base}{path}?client_id=<id>`, used where headers cannot be sent.
	pub fn beacon_url(&self, path: &str) -> String {
		let client_id: String = url::form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect();
		format!("{}{}?client_id={}", self.base_url, path, client_id)
	}

	/// POSTs `data` (or `{}`) to `path`.
	///
	/// Returns `Ok(None)` for 401, for an empty or unparseable success body,
	/// and when network failures outlast the retry budget. Other failing
	/// statuses are returned as [`TrackerError::Status`] once retries are
	/// spent.
	#[instrument(skip(self, data), fields(base_url = %self.base_url))]
	pub async fn post<T>(&self, path: &str, data: Option<&T>, options: PostOptions) -> Result<Option<Value>>
	where
		T: Serialize + ?Sized,
	{
		let body = match data {
			Some(data) => serde_json::to_string(data)?,
			None => "{}".to_string(),
		};

		if options.keepalive {
			if let Some(beacon) = &self.beacon {
				if beacon.send_beacon(&self.beacon_url(path), &body) {
					debug!("Payload queued by beacon");
					return Ok(Some(json!({ "success": true, "beacon": true })));
				}
				debug!("Beacon refused payload, falling back to fetch");
			}
		}

		let url = self.url(path);
		let outcome = retry(&self.retry, || {
			let request = TransportRequest {
				url: url.clone(),
				headers: self.headers(),
				body: body.clone(),
				keepalive: true,
				omit_credentials: true,
			};
			let transport = Arc::clone(&self.transport);
			async move { attempt(transport.as_ref(), request).await }
		})
		.await;

		match outcome {
			Ok(value) => Ok(value),
			Err(TrackerError::Network(e)) => {
				warn!(error = %e, "Giving up on request after network failures");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	/// Hands `data` straight to the Beacon API; false when unavailable or refused.
	pub fn send_beacon<T>(&self, path: &str, data: &T) -> bool
	where
		T: Serialize + ?Sized,
	{
		let Some(beacon) = &self.beacon else {
			return false;
		};
		match serde_json::to_string(data) {
			Ok(body) => beacon.send_beacon(&self.beacon_url(path), &body),
			Err(e) => {
				debug!(error = %e, "Failed to serialize beacon payload");
				false
			}
		}
	}

	/// Issues a GET for a pixel URL. Failures are logged and absorbed.
	pub async fn get_pixel(&self, url: &str) {
		if let Err(e) = self.transport.get(url).await {
			debug!(error = %e, "Pixel request failed");
		}
	}
}

async fn attempt(transport: &dyn Transport, request: TransportRequest) -> Result<Option<Value>> {
	let TransportResponse { status, body } = transport.post(request).await?;
	match status {
		200 | 202 => Ok(parse_body(&body)),
		401 => {
			debug!("Unauthorized, dropping payload");
			Ok(None)
		}
		status => Err(TrackerError::Status { status, body }),
	}
}

/// Parses a success body, retrying on the trimmed text without a BOM.
fn parse_body(body: &str) -> Option<Value> {
	if body.trim().is_empty() {
		return None;
	}
	serde_json::from_str(body).ok().or_else(|| {
		let cleaned = body.trim().trim_start_matches('\u{feff}').trim();
		serde_json::from_str(cleaned).ok()
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TransportError;
	use crate::testing::{RecordingBeacon, RecordingTransport};
	use crate::transport::ReqwestTransport;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration;
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config(base_url: &str, max_retries: u32) -> HttpClientConfig {
		HttpClientConfig {
			base_url: base_url.to_string(),
			client_id: "client 1".to_string(),
			sdk_name: "web".to_string(),
			sdk_version: "1.0.0".to_string(),
			retry: RetryConfig::new(max_retries, Duration::from_millis(500)),
		}
	}

	fn recording_client(max_retries: u32) -> (HttpClient, Arc<RecordingTransport>) {
		let transport = Arc::new(RecordingTransport::new());
		let client = HttpClient::new(config("https://basket.databuddy.cc", max_retries), transport.clone());
		(client, transport)
	}

	#[test]
	fn test_parse_body_handles_bom_and_whitespace() {
		assert_eq!(parse_body(r#"{"ok":true}"#), Some(json!({"ok": true})));
		assert_eq!(parse_body("\u{feff}{\"ok\":1}\n"), Some(json!({"ok": 1})));
		assert_eq!(parse_body("  "), None);
		assert_eq!(parse_body("accepted"), None);
	}

	#[test]
	fn test_beacon_url_encodes_client_id() {
		let (client, _) = recording_client(0);
		assert_eq!(
			client.beacon_url("/batch"),
			"https://basket.databuddy.cc/batch?client_id=client+1"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_success_returns_parsed_body() {
		let (client, transport) = recording_client(3);
		transport.respond(202, r#"{"status":"success"}"#);

		let result = client.post("/", Some(&json!({"name": "x"})), PostOptions::default()).await;
		assert_eq!(result.unwrap(), Some(json!({"status": "success"})));

		let requests = transport.requests();
		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].url, "https://basket.databuddy.cc/");
		assert_eq!(requests[0].body, r#"{"name":"x"}"#);
		assert!(requests[0].keepalive);
		assert!(requests[0].omit_credentials);
	}

	#[tokio::test(start_paused = true)]
	async fn test_missing_data_posts_empty_object() {
		let (client, transport) = recording_client(0);
		client.post::<Value>("/", None, PostOptions::default()).await.unwrap();
		assert_eq!(transport.requests()[0].body, "{}");
	}

	#[tokio::test(start_paused = true)]
	async fn test_unauthorized_is_not_retried() {
		let (client, transport) = recording_client(3);
		transport.respond(401, "unauthorized");

		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert_eq!(result.unwrap(), None);
		assert_eq!(transport.requests().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_server_errors_retry_then_fail() {
		let (client, transport) = recording_client(3);
		for _ in 0..4 {
			transport.respond(503, "down");
		}

		let result = client.post("/batch", Some(&json!([])), PostOptions::default()).await;
		assert!(matches!(result, Err(TrackerError::Status { status: 503, .. })));
		assert_eq!(transport.requests().len(), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn test_rate_limit_retries_then_succeeds() {
		let (client, transport) = recording_client(3);
		transport.respond(429, "");
		transport.respond(200, r#"{"ok":true}"#);

		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert_eq!(result.unwrap(), Some(json!({"ok": true})));
		assert_eq!(transport.requests().len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_client_error_is_not_retried() {
		let (client, transport) = recording_client(3);
		transport.respond(400, "bad");

		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert!(matches!(result, Err(TrackerError::Status { status: 400, .. })));
		assert_eq!(transport.requests().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_no_content_is_a_failure() {
		let (client, transport) = recording_client(0);
		transport.respond(204, "");

		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert!(matches!(result, Err(TrackerError::Status { status: 204, .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_network_failure_is_swallowed_after_retries() {
		let (client, transport) = recording_client(2);
		for _ in 0..3 {
			transport.fail(TransportError::Failed("offline".to_string()));
		}

		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert_eq!(result.unwrap(), None);
		assert_eq!(transport.requests().len(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_retry_delays_follow_backoff() {
		let (client, transport) = recording_client(2);
		for _ in 0..3 {
			transport.respond(500, "");
		}

		let started = tokio::time::Instant::now();
		let _ = client.post("/", Some(&json!({})), PostOptions::default()).await;
		let elapsed = started.elapsed();

		// 500ms * (1 + 2) with jitter in [0.85, 1.15]
		assert!(elapsed >= Duration::from_millis(1275), "elapsed {elapsed:?}");
		assert!(elapsed <= Duration::from_millis(1725), "elapsed {elapsed:?}");
	}

	#[tokio::test(start_paused = true)]
	async fn test_dynamic_headers_resolve_per_attempt() {
		let (client, transport) = recording_client(1);
		let counter = Arc::new(AtomicU32::new(0));
		let c = counter.clone();
		client.set_dynamic_header("Authorization", move || {
			Some(format!("Bearer token-{}", c.fetch_add(1, Ordering::SeqCst)))
		});
		client.set_dynamic_header("X-Absent", || None);
		transport.respond(500, "");
		transport.respond(200, "");

		client.post("/", Some(&json!({})), PostOptions::default()).await.unwrap();

		let requests = transport.requests();
		let auth = |i: usize| {
			requests[i]
				.headers
				.iter()
				.find(|(name, _)| name == "Authorization")
				.map(|(_, v)| v.clone())
		};
		assert_eq!(auth(0).as_deref(), Some("Bearer token-0"));
		assert_eq!(auth(1).as_deref(), Some("Bearer token-1"));
		assert!(requests[0].headers.iter().all(|(name, _)| name != "X-Absent"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_keepalive_uses_beacon_first() {
		let transport = Arc::new(RecordingTransport::new());
		let beacon = Arc::new(RecordingBeacon::accepting());
		let client = HttpClient::new(config("https://basket.databuddy.cc", 3), transport.clone())
			.with_beacon(Some(beacon.clone()));

		let result = client
			.post("/vitals", Some(&json!({"lcp": 1.0})), PostOptions::keepalive())
			.await
			.unwrap();

		assert_eq!(result, Some(json!({"success": true, "beacon": true})));
		assert!(transport.requests().is_empty());
		let sent = beacon.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0, "https://basket.databuddy.cc/vitals?client_id=client+1");
		assert_eq!(sent[0].1, r#"{"lcp":1.0}"#);
	}

	#[tokio::test(start_paused = true)]
	async fn test_refused_beacon_falls_back_to_fetch() {
		let transport = Arc::new(RecordingTransport::new());
		let beacon = Arc::new(RecordingBeacon::refusing());
		let client = HttpClient::new(config("https://basket.databuddy.cc", 3), transport.clone())
			.with_beacon(Some(beacon.clone()));

		client
			.post("/", Some(&json!({})), PostOptions::keepalive())
			.await
			.unwrap();
		assert_eq!(beacon.sent().len(), 1);
		assert_eq!(transport.requests().len(), 1);
	}

	#[test]
	fn test_send_beacon_without_beacon_is_false() {
		let (client, _) = recording_client(0);
		assert!(!client.send_beacon("/errors", &json!({})));
	}

	#[tokio::test]
	async fn test_reqwest_transport_end_to_end() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/batch"))
			.and(header("databuddy-client-id", "client 1"))
			.and(header("databuddy-sdk-name", "web"))
			.and(header("databuddy-sdk-version", "1.0.0"))
			.respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"success"}"#))
			.expect(1)
			.mount(&server)
			.await;

		let transport = Arc::new(ReqwestTransport::new().unwrap());
		let client = HttpClient::new(config(&format!("{}/", server.uri()), 0), transport);
		let result = client
			.post("/batch", Some(&json!([{"name": "a"}])), PostOptions::default())
			.await
			.unwrap();
		assert_eq!(result, Some(json!({"status": "success"})));
	}

	#[tokio::test]
	async fn test_reqwest_transport_retries_server_errors() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500))
			.expect(3)
			.mount(&server)
			.await;

		let transport = Arc::new(ReqwestTransport::new().unwrap());
		let mut cfg = config(&server.uri(), 2);
		cfg.retry = RetryConfig::new(2, Duration::from_millis(1));
		let client = HttpClient::new(cfg, transport);
		let result = client.post("/", Some(&json!({})), PostOptions::default()).await;
		assert!(matches!(result, Err(TrackerError::Status { status: 500, .. })));
	}
}
