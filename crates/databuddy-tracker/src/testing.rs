// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test doubles for the host, transport and beacon seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use databuddy_tracker_core::ConfigSources;
use parking_lot::Mutex;
use serde_json::Value;
use url::Url;

use crate::error::{HostError, StorageError, TransportError};
use crate::host::{
	AutomationSignals, Beacon, BrowserHost, HistoryHook, HistoryMethod, HistoryRestore, MemoryStorage,
	Storage,
};
use crate::transport::{Transport, TransportRequest, TransportResponse};

pub const CHROME_UA: &str =
	"Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Storage that fails every operation, like Safari private browsing.
#[derive(Debug, Default)]
pub struct FailingStorage;

impl Storage for FailingStorage {
	fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
		Err(StorageError::Unavailable("disabled".to_string()))
	}

	fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
		Err(StorageError::QuotaExceeded)
	}

	fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
		Err(StorageError::Unavailable("disabled".to_string()))
	}
}

/// Beacon that records payloads and accepts or refuses them on demand.
#[derive(Debug)]
pub struct RecordingBeacon {
	accept: AtomicBool,
	sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBeacon {
	pub fn accepting() -> Self {
		Self {
			accept: AtomicBool::new(true),
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn refusing() -> Self {
		Self {
			accept: AtomicBool::new(false),
			sent: Mutex::new(Vec::new()),
		}
	}

	pub fn set_accept(&self, accept: bool) {
		self.accept.store(accept, Ordering::SeqCst);
	}

	/// `(url, body)` of every call, accepted or not.
	pub fn sent(&self) -> Vec<(String, String)> {
		self.sent.lock().clone()
	}

	pub fn sent_json(&self, index: usize) -> Value {
		let sent = self.sent.lock();
		serde_json::from_str(&sent[index].1).expect("beacon body is JSON")
	}
}

impl Beacon for RecordingBeacon {
	fn send_beacon(&self, url: &str, body: &str) -> bool {
		self.sent.lock().push((url.to_string(), body.to_string()));
		self.accept.load(Ordering::SeqCst)
	}
}

/// Transport with scripted responses.
///
/// Responses are consumed in order; once the script runs out every POST gets
/// `default_status` with an empty body.
pub struct RecordingTransport {
	script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
	requests: Mutex<Vec<TransportRequest>>,
	gets: Mutex<Vec<String>>,
	default_status: Mutex<u16>,
	latency: Mutex<Option<Duration>>,
}

impl Default for RecordingTransport {
	fn default() -> Self {
		Self::new()
	}
}

impl RecordingTransport {
	pub fn new() -> Self {
		Self {
			script: Mutex::new(VecDeque::new()),
			requests: Mutex::new(Vec::new()),
			gets: Mutex::new(Vec::new()),
			default_status: Mutex::new(200),
			latency: Mutex::new(None),
		}
	}

	pub fn respond(&self, status: u16, body: &str) {
		self.script.lock().push_back(Ok(TransportResponse {
			status,
			body: body.to_string(),
		}));
	}

	pub fn fail(&self, error: TransportError) {
		self.script.lock().push_back(Err(error));
	}

	pub fn set_default_status(&self, status: u16) {
		*self.default_status.lock() = status;
	}

	/// Every POST sleeps this long before answering.
	pub fn set_latency(&self, latency: Duration) {
		*self.latency.lock() = Some(latency);
	}

	pub fn requests(&self) -> Vec<TransportRequest> {
		self.requests.lock().clone()
	}

	pub fn requests_to(&self, path_suffix: &str) -> Vec<TransportRequest> {
		self.requests
			.lock()
			.iter()
			.filter(|r| r.url.split('?').next().is_some_and(|u| u.ends_with(path_suffix)))
			.cloned()
			.collect()
	}

	/// Parsed bodies of every POST whose URL ends with `path_suffix`.
	pub fn bodies_to(&self, path_suffix: &str) -> Vec<Value> {
		self.requests_to(path_suffix)
			.iter()
			.map(|r| serde_json::from_str(&r.body).expect("request body is JSON"))
			.collect()
	}

	pub fn gets(&self) -> Vec<String> {
		self.gets.lock().clone()
	}

	pub fn clear(&self) {
		self.requests.lock().clear();
		self.gets.lock().clear();
	}
}

#[async_trait]
impl Transport for RecordingTransport {
	async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
		self.requests.lock().push(request);
		let latency = *self.latency.lock();
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		let scripted = self.script.lock().pop_front();
		scripted.unwrap_or_else(|| {
			Ok(TransportResponse {
				status: *self.default_status.lock(),
				body: String::new(),
			})
		})
	}

	async fn get(&self, url: &str) -> Result<(), TransportError> {
		self.gets.lock().push(url.to_string());
		Ok(())
	}
}

/// Controllable browser.
pub struct FakeHost {
	location: Mutex<Url>,
	title: Mutex<String>,
	referrer: Mutex<String>,
	viewport: Mutex<(u32, u32)>,
	user_agent: Mutex<String>,
	automation: Mutex<AutomationSignals>,
	now: AtomicI64,
	local: Mutex<Option<Arc<dyn Storage>>>,
	session: Mutex<Option<Arc<dyn Storage>>>,
	local_memory: Arc<MemoryStorage>,
	session_memory: Arc<MemoryStorage>,
	beacon: Mutex<Option<Arc<RecordingBeacon>>>,
	history_hook: Arc<Mutex<Option<HistoryHook>>>,
	history_restored: Arc<AtomicBool>,
	sources: Mutex<ConfigSources>,
}

impl FakeHost {
	pub fn new(url: &str) -> Arc<Self> {
		let local_memory = Arc::new(MemoryStorage::new());
		let session_memory = Arc::new(MemoryStorage::new());
		Arc::new(Self {
			location: Mutex::new(Url::parse(url).expect("valid test url")),
			title: Mutex::new("Test Page".to_string()),
			referrer: Mutex::new(String::new()),
			viewport: Mutex::new((1280, 720)),
			user_agent: Mutex::new(CHROME_UA.to_string()),
			automation: Mutex::new(AutomationSignals::default()),
			now: AtomicI64::new(1_700_000_000_000),
			local: Mutex::new(Some(local_memory.clone() as Arc<dyn Storage>)),
			session: Mutex::new(Some(session_memory.clone() as Arc<dyn Storage>)),
			local_memory,
			session_memory,
			beacon: Mutex::new(None),
			history_hook: Arc::new(Mutex::new(None)),
			history_restored: Arc::new(AtomicBool::new(false)),
			sources: Mutex::new(ConfigSources::default()),
		})
	}

	pub fn local(&self) -> Arc<MemoryStorage> {
		self.local_memory.clone()
	}

	pub fn session(&self) -> Arc<MemoryStorage> {
		self.session_memory.clone()
	}

	pub fn set_storage_failing(&self) {
		*self.local.lock() = Some(Arc::new(FailingStorage));
		*self.session.lock() = Some(Arc::new(FailingStorage));
	}

	pub fn install_beacon(&self, beacon: Arc<RecordingBeacon>) {
		*self.beacon.lock() = Some(beacon);
	}

	pub fn set_url(&self, url: &str) {
		*self.location.lock() = Url::parse(url).expect("valid test url");
	}

	pub fn set_title(&self, title: &str) {
		*self.title.lock() = title.to_string();
	}

	pub fn set_referrer(&self, referrer: &str) {
		*self.referrer.lock() = referrer.to_string();
	}

	pub fn set_viewport(&self, width: u32, height: u32) {
		*self.viewport.lock() = (width, height);
	}

	pub fn set_user_agent(&self, ua: &str) {
		*self.user_agent.lock() = ua.to_string();
	}

	pub fn set_automation(&self, signals: AutomationSignals) {
		*self.automation.lock() = signals;
	}

	pub fn set_sources(&self, sources: ConfigSources) {
		*self.sources.lock() = sources;
	}

	pub fn now(&self) -> i64 {
		self.now.load(Ordering::SeqCst)
	}

	pub fn advance(&self, ms: i64) {
		self.now.fetch_add(ms, Ordering::SeqCst);
	}

	/// `history.pushState(null, "", url)` through the wrapped method.
	pub fn push_state(&self, url: &str) {
		self.navigate(HistoryMethod::PushState, url);
	}

	pub fn replace_state(&self, url: &str) {
		self.navigate(HistoryMethod::ReplaceState, url);
	}

	fn navigate(&self, method: HistoryMethod, url: &str) {
		self.set_url(url);
		let hook = self.history_hook.lock().clone();
		if let Some(hook) = hook {
			hook(method);
		}
	}

	pub fn history_wrapped(&self) -> bool {
		self.history_hook.lock().is_some()
	}

	pub fn history_restored(&self) -> bool {
		self.history_restored.load(Ordering::SeqCst)
	}
}

impl BrowserHost for FakeHost {
	fn now_ms(&self) -> i64 {
		self.now()
	}

	fn location(&self) -> Option<Url> {
		Some(self.location.lock().clone())
	}

	fn title(&self) -> String {
		self.title.lock().clone()
	}

	fn referrer(&self) -> String {
		self.referrer.lock().clone()
	}

	fn viewport(&self) -> (u32, u32) {
		*self.viewport.lock()
	}

	fn timezone(&self) -> Result<String, HostError> {
		Ok("Europe/Berlin".to_string())
	}

	fn language(&self) -> Option<String> {
		Some("en-US".to_string())
	}

	fn user_agent(&self) -> String {
		self.user_agent.lock().clone()
	}

	fn automation_signals(&self) -> AutomationSignals {
		*self.automation.lock()
	}

	fn local_storage(&self) -> Option<Arc<dyn Storage>> {
		self.local.lock().clone()
	}

	fn session_storage(&self) -> Option<Arc<dyn Storage>> {
		self.session.lock().clone()
	}

	fn beacon(&self) -> Option<Arc<dyn Beacon>> {
		self.beacon.lock().clone().map(|b| b as Arc<dyn Beacon>)
	}

	fn wrap_history(&self, hook: HistoryHook) -> Option<HistoryRestore> {
		*self.history_hook.lock() = Some(hook);
		self.history_restored.store(false, Ordering::SeqCst);
		let restored = self.history_restored.clone();
		let installed = self.history_hook.clone();
		Some(Box::new(move || {
			installed.lock().take();
			restored.store(true, Ordering::SeqCst);
		}))
	}

	fn config_sources(&self) -> ConfigSources {
		self.sources.lock().clone()
	}
}
