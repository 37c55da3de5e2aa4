// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker core: gating, context, engagement and the send pipeline.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use databuddy_tracker_core::{
	is_skipped, mask_path, Endpoint, EventEnvelope, EventKind, PageContext, PageSnapshot, TrackerEvent,
	TrackerOptions,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::batch::{BatchConfig, BatchQueue};
use crate::client::{HttpClient, HttpClientConfig, PostOptions};
use crate::error::{Result, TrackerError};
use crate::host::BrowserHost;
use crate::identity::IdentityStore;
use crate::plugins::pixel;
use crate::transport::Transport;

static HEADLESS_USER_AGENT: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)\b(?:HeadlessChrome|PhantomJS)\b").expect("static pattern is valid"));

/// Spawns `future` on the current tokio runtime.
///
/// Outside a runtime the work is dropped; tracking never panics the host.
pub(crate) fn spawn<F>(future: F) -> Option<JoinHandle<()>>
where
	F: Future<Output = ()> + Send + 'static,
{
	match Handle::try_current() {
		Ok(handle) => Some(handle.spawn(future)),
		Err(_) => {
			debug!("No async runtime available, dropping background work");
			None
		}
	}
}

/// Options for a single send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
	/// Bypass the batch queue and deliver immediately.
	pub force: bool,
}

impl SendOptions {
	pub fn forced() -> Self {
		Self { force: true }
	}
}

/// How individual events leave the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
	/// POST with JSON body.
	Fetch,
	/// GET of `/px.jpg` with the event in the query string.
	Pixel,
}

/// Per-page-view engagement counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngagementState {
	/// Screen views recorded by this instance.
	pub page_count: u32,
	/// URL of the last recorded screen view.
	pub last_path: Option<String>,
	pub interaction_count: u32,
	/// Percentage, non-decreasing within one page view.
	pub max_scroll_depth: u8,
	pub page_start_time: i64,
	/// Engaged milliseconds banked by earlier visible spans.
	pub engaged_ms: i64,
	/// Start of the current visible span, `None` while hidden.
	pub engagement_start: Option<i64>,
	/// Last reported document visibility.
	pub page_visible: bool,
	/// Set by the first mousemove, scroll or keydown.
	pub has_interacted: bool,
	/// A `page_exit` was already emitted for the current page segment.
	pub exit_sent: bool,
}

pub type RouteCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registration returned by [`BaseTracker::on_route_change`].
#[derive(Debug)]
pub struct RouteSubscription {
	id: u64,
	tracker: Weak<BaseTracker>,
}

impl RouteSubscription {
	pub fn unsubscribe(self) {
		if let Some(tracker) = self.tracker.upgrade() {
			tracker.route_callbacks.lock().remove(&self.id);
		}
	}
}

enum Route {
	Dropped,
	Queued,
	Deliver(TrackerEvent),
}

/// Owns identity, the HTTP client and the batch queue for one instance.
pub struct BaseTracker {
	options: TrackerOptions,
	host: Arc<dyn BrowserHost>,
	client: HttpClient,
	identity: IdentityStore,
	disabled: AtomicBool,
	is_likely_bot: bool,
	batching: AtomicBool,
	delivery: Mutex<DeliveryMode>,
	batch: BatchQueue,
	engagement: Mutex<EngagementState>,
	route_callbacks: Mutex<BTreeMap<u64, RouteCallback>>,
	next_route_id: AtomicU64,
	shutdown: AtomicBool,
	weak_self: Weak<BaseTracker>,
}

impl std::fmt::Debug for BaseTracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BaseTracker")
			.field("client_id", &self.options.client_id)
			.field("disabled", &self.is_disabled())
			.field("is_likely_bot", &self.is_likely_bot)
			.field("batching", &self.is_batching())
			.finish_non_exhaustive()
	}
}

impl BaseTracker {
	pub fn new(host: Arc<dyn BrowserHost>, options: TrackerOptions, transport: Arc<dyn Transport>) -> Arc<Self> {
		let client = HttpClient::new(HttpClientConfig::from_options(&options), transport).with_beacon(host.beacon());
		let identity = IdentityStore::load(host.as_ref());
		let is_likely_bot = detect_bot(host.as_ref(), &options);
		let now = host.now_ms();

		if is_likely_bot {
			info!("Automation detected, tracking disabled");
		}

		Arc::new_cyclic(|weak_self| Self {
			disabled: AtomicBool::new(options.disabled),
			batching: AtomicBool::new(options.enable_batching),
			batch: BatchQueue::new(BatchConfig::from_options(&options)),
			engagement: Mutex::new(EngagementState {
				page_start_time: now,
				engagement_start: Some(now),
				page_visible: true,
				..Default::default()
			}),
			options,
			host,
			client,
			identity,
			is_likely_bot,
			delivery: Mutex::new(DeliveryMode::Fetch),
			route_callbacks: Mutex::new(BTreeMap::new()),
			next_route_id: AtomicU64::new(0),
			shutdown: AtomicBool::new(false),
			weak_self: weak_self.clone(),
		})
	}

	pub fn options(&self) -> &TrackerOptions {
		&self.options
	}

	pub fn host(&self) -> &Arc<dyn BrowserHost> {
		&self.host
	}

	pub fn client(&self) -> &HttpClient {
		&self.client
	}

	pub fn identity(&self) -> &IdentityStore {
		&self.identity
	}

	pub fn now_ms(&self) -> i64 {
		self.host.now_ms()
	}

	pub fn is_server(&self) -> bool {
		!self.host.is_browser()
	}

	pub fn is_disabled(&self) -> bool {
		self.disabled.load(Ordering::SeqCst)
	}

	/// Runtime opt-out.
	pub fn set_disabled(&self, disabled: bool) {
		self.disabled.store(disabled, Ordering::SeqCst);
	}

	pub fn is_likely_bot(&self) -> bool {
		self.is_likely_bot
	}

	pub fn is_batching(&self) -> bool {
		self.batching.load(Ordering::SeqCst)
	}

	pub fn delivery_mode(&self) -> DeliveryMode {
		*self.delivery.lock()
	}

	/// Routes single events through `/px.jpg` and turns batching off.
	pub fn enable_pixel_mode(&self) {
		self.batching.store(false, Ordering::SeqCst);
		*self.delivery.lock() = DeliveryMode::Pixel;
	}

	pub fn is_shut_down(&self) -> bool {
		self.shutdown.load(Ordering::SeqCst)
	}

	/// True when nothing should be sent for the current page.
	pub fn should_skip_tracking(&self) -> bool {
		if self.is_server() || self.is_disabled() || self.is_likely_bot || self.is_shut_down() {
			return true;
		}
		match self.host.location() {
			Some(location) => is_skipped(&self.options.skip_patterns, location.path()),
			None => true,
		}
	}

	/// Page context for an event created now.
	pub fn base_context(&self) -> PageContext {
		let Some(location) = self.host.location() else {
			return PageContext::default();
		};
		let masked = mask_path(&self.options.mask_patterns, location.path());
		let timezone = match self.host.timezone() {
			Ok(tz) => Some(tz),
			Err(e) => {
				debug!(error = %e, "Timezone unavailable");
				None
			}
		};
		PageContext::capture(PageSnapshot {
			location: &location,
			masked_path: &masked,
			title: self.host.title(),
			referrer: self.host.referrer(),
			viewport: self.host.viewport(),
			timezone,
			language: self.host.language(),
		})
	}

	/// Builds an event with a fresh id and the current context, touching the session.
	pub fn create_event(&self, kind: EventKind, properties: Map<String, Value>) -> TrackerEvent {
		let now = self.now_ms();
		self.identity.touch_session(now);
		let envelope = EventEnvelope::new(
			self.identity.anonymous_id(),
			self.identity.session_id(),
			self.identity.session_start_time(),
			now,
			self.base_context(),
		);
		TrackerEvent::new(envelope, kind).with_properties(properties)
	}

	/// Skip, filter and sampling gates for one event.
	pub(crate) fn admits(&self, event: &TrackerEvent) -> bool {
		if self.should_skip_tracking() {
			debug!(event = %event.name(), "Tracking skipped");
			return false;
		}

		if let Some(filter) = &self.options.filter {
			if !filter(event) {
				debug!(event = %event.name(), "Event rejected by filter");
				return false;
			}
		}

		let rate = self.options.sampling_rate;
		if rate < 1.0 && fastrand::f64() >= rate {
			debug!(event = %event.name(), rate, "Event sampled out");
			return false;
		}
		true
	}

	fn route(&self, event: TrackerEvent, options: SendOptions) -> Route {
		if !self.admits(&event) {
			return Route::Dropped;
		}

		if self.is_batching() && !options.force && event.kind.is_batchable() {
			self.add_to_batch(event);
			return Route::Queued;
		}

		Route::Deliver(event)
	}

	/// Sends `event` and waits for delivery. Queued and dropped events yield `Ok(None)`.
	#[instrument(skip(self, event), fields(event = %event.name()))]
	pub async fn send(&self, event: TrackerEvent, options: SendOptions) -> Result<Option<Value>> {
		if self.is_shut_down() {
			return Err(TrackerError::Shutdown);
		}
		match self.route(event, options) {
			Route::Dropped | Route::Queued => Ok(None),
			Route::Deliver(event) => self.deliver(&event).await,
		}
	}

	/// Fire-and-forget [`BaseTracker::send`]; failures are logged.
	pub fn submit(&self, event: TrackerEvent, options: SendOptions) {
		let Route::Deliver(event) = self.route(event, options) else {
			return;
		};
		let Some(tracker) = self.weak_self.upgrade() else {
			return;
		};
		spawn(async move {
			if let Err(e) = tracker.deliver(&event).await {
				warn!(event = %event.name(), error = %e, "Failed to deliver event");
			}
		});
	}

	/// Delivers one event to its endpoint, bypassing every gate.
	pub async fn deliver(&self, event: &TrackerEvent) -> Result<Option<Value>> {
		if self.delivery_mode() == DeliveryMode::Pixel && event.kind.endpoint() == Endpoint::Events {
			let url = pixel::pixel_request_url(&self.options, event)?;
			self.client.get_pixel(url.as_str()).await;
			return Ok(None);
		}
		self.client
			.post(event.kind.endpoint().path(), Some(event), PostOptions::keepalive())
			.await
	}

	/// Appends to the batch queue, scheduling or triggering a flush.
	pub fn add_to_batch(&self, event: TrackerEvent) {
		let outcome = self.batch.push(event);
		if outcome.should_flush {
			self.trigger_flush();
		} else if outcome.needs_timer {
			self.schedule_batch_timer();
		}
	}

	fn schedule_batch_timer(&self) {
		let weak = self.weak_self.clone();
		let delay = self.batch.config().flush_interval;
		let timer = spawn(async move {
			tokio::time::sleep(delay).await;
			if let Some(tracker) = weak.upgrade() {
				tracker.batch.take_timer();
				tracker.flush_batch().await;
			}
		});
		if let Some(timer) = timer {
			self.batch.set_timer(timer);
		}
	}

	fn trigger_flush(&self) {
		let Some(tracker) = self.weak_self.upgrade() else {
			return;
		};
		spawn(async move { tracker.flush_batch().await });
	}

	/// Delivers the queued events to `/batch`.
	///
	/// If the batch request fails, every event is resent individually.
	pub async fn flush_batch(&self) {
		let Some(events) = self.batch.begin_flush() else {
			return;
		};

		debug!(count = events.len(), "Flushing event batch");
		if let Err(e) = self.deliver_batch(&events).await {
			warn!(count = events.len(), error = %e, "Batch delivery failed, sending events individually");
			for event in events {
				if let Err(e) = self.send(event, SendOptions::forced()).await {
					warn!(error = %e, "Failed to deliver event individually");
				}
			}
		}

		let pending = self.batch.finish_flush();
		if pending && !self.batch.has_timer() && !self.is_shut_down() {
			self.schedule_batch_timer();
		}
	}

	async fn deliver_batch(&self, events: &[TrackerEvent]) -> Result<Option<Value>> {
		let payload: Vec<Value> = events.iter().map(TrackerEvent::to_json).collect();
		self.client
			.post(Endpoint::Batch.path(), Some(&payload), PostOptions::keepalive())
			.await
	}

	/// Removes queued events and cancels the timer without sending.
	pub fn drain_batch(&self) -> Vec<TrackerEvent> {
		self.batch.drain()
	}

	pub fn queued_events(&self) -> usize {
		self.batch.len()
	}

	pub fn send_beacon<T>(&self, endpoint: Endpoint, data: &T) -> bool
	where
		T: serde::Serialize + ?Sized,
	{
		self.client.send_beacon(endpoint.path(), data)
	}

	pub fn engagement(&self) -> EngagementState {
		self.engagement.lock().clone()
	}

	pub(crate) fn with_engagement<R>(&self, f: impl FnOnce(&mut EngagementState) -> R) -> R {
		f(&mut self.engagement.lock())
	}

	/// Resumes engaged-time accounting (page visible).
	pub fn start_engagement(&self) {
		let now = self.now_ms();
		let mut state = self.engagement.lock();
		state.page_visible = true;
		if state.engagement_start.is_none() {
			state.engagement_start = Some(now);
		}
	}

	/// Banks the current visible span (page hidden).
	pub fn pause_engagement(&self) {
		let now = self.now_ms();
		let mut state = self.engagement.lock();
		state.page_visible = false;
		if let Some(start) = state.engagement_start.take() {
			state.engaged_ms += now.saturating_sub(start).max(0);
		}
	}

	pub fn engaged_time_ms(&self) -> i64 {
		let now = self.now_ms();
		let state = self.engagement.lock();
		let current = state
			.engagement_start
			.map(|start| now.saturating_sub(start).max(0))
			.unwrap_or(0);
		state.engaged_ms + current
	}

	/// Starts a new page segment: engaged time and per-page counters restart.
	pub fn reset_engagement(&self) {
		let now = self.now_ms();
		let mut state = self.engagement.lock();
		state.page_start_time = now;
		state.engaged_ms = 0;
		state.engagement_start = state.page_visible.then_some(now);
		state.interaction_count = 0;
		state.max_scroll_depth = 0;
		state.exit_sent = false;
	}

	/// Restarts the counters after a `page_exit` went out on hide or unload.
	///
	/// `exit_sent` stays set until the page is visible again.
	pub fn restart_after_exit(&self) {
		let now = self.now_ms();
		let mut state = self.engagement.lock();
		state.page_start_time = now;
		state.engaged_ms = 0;
		state.engagement_start = state.engagement_start.map(|_| now);
		state.interaction_count = 0;
		state.max_scroll_depth = 0;
	}

	pub fn record_interaction(&self) {
		let mut state = self.engagement.lock();
		state.interaction_count = state.interaction_count.saturating_add(1);
	}

	pub fn record_scroll_depth(&self, percentage: u8) {
		let mut state = self.engagement.lock();
		state.max_scroll_depth = state.max_scroll_depth.max(percentage.min(100));
	}

	pub fn mark_interacted(&self) {
		self.engagement.lock().has_interacted = true;
	}

	pub fn on_route_change<F>(&self, callback: F) -> RouteSubscription
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		let id = self.next_route_id.fetch_add(1, Ordering::SeqCst);
		self.route_callbacks.lock().insert(id, Arc::new(callback));
		RouteSubscription {
			id,
			tracker: self.weak_self.clone(),
		}
	}

	/// Calls every route callback; a panicking callback does not stop the others.
	pub fn notify_route_change(&self, path: &str) {
		let callbacks: Vec<RouteCallback> = self.route_callbacks.lock().values().cloned().collect();
		for callback in callbacks {
			if catch_unwind(AssertUnwindSafe(|| callback(path))).is_err() {
				warn!(path, "Route change callback panicked");
			}
		}
	}

	pub fn clear_identity(&self) {
		self.identity.clear(self.now_ms());
	}

	pub fn refresh_session_if_expired(&self) -> bool {
		self.identity.refresh_session_if_expired(self.now_ms())
	}

	/// Stops all tracking and discards queued events.
	pub fn shutdown(&self) {
		self.shutdown.store(true, Ordering::SeqCst);
		let dropped = self.batch.drain();
		if !dropped.is_empty() {
			debug!(count = dropped.len(), "Discarded queued events on shutdown");
		}
		self.route_callbacks.lock().clear();
	}
}

fn detect_bot(host: &dyn BrowserHost, options: &TrackerOptions) -> bool {
	if options.ignore_bot_detection || !host.is_browser() {
		return false;
	}
	host.automation_signals().any() || HEADLESS_USER_AGENT.is_match(&host.user_agent())
}
