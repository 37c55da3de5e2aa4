// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The tracker instance a page talks to.
//!
//! [`Databuddy`] owns a [`BaseTracker`] and an [`EventBus`]. The host forwards
//! DOM events through [`Databuddy::dispatch`]; listeners turn them into screen
//! views, page exits, outgoing-link clicks and attribute-tracked events.

use std::sync::{Arc, Weak};

use databuddy_tracker_core::{
	is_hash_only_change, Endpoint, EventKind, OutgoingLink, PageExit, ScreenView, TrackerEvent,
	TrackerOptions,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::PostOptions;
use crate::events::{BrowserEvent, ClickTarget, EventBus, EventType, InteractionKind, ListenerId, Visibility};
use crate::global;
use crate::host::{BrowserHost, HistoryRestore};
use crate::navigation::{self, Debouncer, NAVIGATION_DEBOUNCE};
use crate::plugins;
use crate::properties::Properties;
use crate::tracker::{spawn, BaseTracker, SendOptions};
use crate::transport::Transport;

/// `navigation_type` of a screen view restored from the back/forward cache.
pub const BFCACHE_NAVIGATION: &str = "back_forward_cache";

pub struct Databuddy {
	tracker: Arc<BaseTracker>,
	bus: Arc<EventBus>,
	listeners: Mutex<Vec<ListenerId>>,
	history_restore: Mutex<Option<HistoryRestore>>,
	debouncer: Debouncer,
	global_properties: Mutex<Map<String, Value>>,
	weak_self: Weak<Databuddy>,
}

impl std::fmt::Debug for Databuddy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Databuddy")
			.field("tracker", &self.tracker)
			.field("listeners", &self.listeners.lock().len())
			.finish_non_exhaustive()
	}
}

impl Databuddy {
	/// Builds the tracker, installs listeners and records the first screen view.
	pub fn init(host: Arc<dyn BrowserHost>, options: TrackerOptions, transport: Arc<dyn Transport>) -> Arc<Self> {
		let tracker = BaseTracker::new(host, options, transport);
		let this = Arc::new_cyclic(|weak_self| Self {
			tracker,
			bus: Arc::new(EventBus::new()),
			listeners: Mutex::new(Vec::new()),
			history_restore: Mutex::new(None),
			debouncer: Debouncer::new(NAVIGATION_DEBOUNCE),
			global_properties: Mutex::new(Map::new()),
			weak_self: weak_self.clone(),
		});

		if this.tracker.is_server() {
			debug!("Not a browser, tracker stays inert");
			return this;
		}

		this.install();
		info!(client_id = %this.tracker.options().client_id, "Databuddy tracker initialized");
		this.screen_view(Properties::new());
		this
	}

	fn install(self: &Arc<Self>) {
		let options = self.tracker.options().clone();
		let mut ids = plugins::install_enabled(&self.tracker, &self.bus);

		let restore = navigation::wrap_history(self.tracker.host().as_ref(), Arc::downgrade(&self.bus));
		if restore.is_none() {
			debug!("History API not available, SPA navigation is not observed");
		}
		*self.history_restore.lock() = restore;

		ids.push(self.listen(EventType::PopState, |this, _| {
			this.bus.emit(&BrowserEvent::LocationChange);
		}));
		ids.push(self.listen(EventType::LocationChange, |this, _| this.schedule_screen_view()));
		if options.track_hash_changes {
			ids.push(self.listen(EventType::HashChange, |this, _| this.schedule_screen_view()));
		}

		ids.push(self.listen(EventType::VisibilityChange, |this, event| match event {
			BrowserEvent::VisibilityChange(Visibility::Hidden) => {
				this.tracker.pause_engagement();
				this.flush_on_unload();
			}
			BrowserEvent::VisibilityChange(Visibility::Visible) => this.resume_visible(),
			_ => {}
		}));
		ids.push(self.listen(EventType::PageHide, |this, _| this.flush_on_unload()));
		ids.push(self.listen(EventType::BeforeUnload, |this, _| this.flush_on_unload()));
		ids.push(self.listen(EventType::PageShow, |this, event| {
			if matches!(event, BrowserEvent::PageShow { persisted: true }) {
				this.restore_from_bfcache();
			}
		}));

		ids.push(self.listen(EventType::Interaction, |this, event| {
			if matches!(
				event,
				BrowserEvent::Interaction(InteractionKind::MouseMove | InteractionKind::KeyDown)
			) {
				this.tracker.mark_interacted();
			}
		}));
		ids.push(self.listen_once(EventType::Scroll, |this, _| this.tracker.mark_interacted()));

		if options.track_outgoing_links || options.track_attributes {
			ids.push(self.listen(EventType::Click, move |this, event| {
				let BrowserEvent::Click(target) = event else {
					return;
				};
				if options.track_outgoing_links {
					this.track_outgoing_click(target);
				}
				if options.track_attributes {
					this.track_attribute_click(target);
				}
			}));
		}

		self.listeners.lock().extend(ids);
	}

	/// Registers `handler` with a weak reference back to this instance.
	fn listen<F>(self: &Arc<Self>, event_type: EventType, handler: F) -> ListenerId
	where
		F: Fn(&Databuddy, &BrowserEvent) + Send + Sync + 'static,
	{
		self.bus.add_listener(event_type, self.bind(handler))
	}

	fn listen_once<F>(self: &Arc<Self>, event_type: EventType, handler: F) -> ListenerId
	where
		F: Fn(&Databuddy, &BrowserEvent) + Send + Sync + 'static,
	{
		self.bus.add_once(event_type, self.bind(handler))
	}

	fn bind<F>(self: &Arc<Self>, handler: F) -> impl Fn(&BrowserEvent) + Send + Sync + 'static
	where
		F: Fn(&Databuddy, &BrowserEvent) + Send + Sync + 'static,
	{
		let weak = Arc::downgrade(self);
		move |event| {
			if let Some(this) = weak.upgrade() {
				handler(&this, event);
			}
		}
	}

	pub fn tracker(&self) -> &Arc<BaseTracker> {
		&self.tracker
	}

	pub fn options(&self) -> &TrackerOptions {
		self.tracker.options()
	}

	/// Forwards a DOM event from the host.
	pub fn dispatch(&self, event: BrowserEvent) {
		if self.tracker.is_shut_down() {
			return;
		}
		self.bus.emit(&event);
	}

	pub fn track(&self, name: &str, properties: Properties) {
		if self.tracker.should_skip_tracking() {
			return;
		}
		let event = self
			.tracker
			.create_event(EventKind::custom(name), self.merged_properties(properties));
		self.tracker.submit(event, SendOptions::default());
	}

	/// [`Databuddy::track`] tagged with `event_type: "custom"`.
	pub fn track_custom_event(&self, name: &str, properties: Properties) {
		self.track(name, Properties::new().insert("event_type", "custom").merge(properties));
	}

	/// Records a view of the current URL unless it repeats the last one.
	pub fn screen_view(&self, properties: Properties) {
		self.record_screen_view(properties, None);
	}

	fn schedule_screen_view(&self) {
		let weak = self.weak_self.clone();
		self.debouncer.schedule(move || {
			if let Some(this) = weak.upgrade() {
				this.screen_view(Properties::new());
			}
		});
	}

	fn record_screen_view(&self, properties: Properties, navigation_type: Option<&str>) {
		if self.tracker.should_skip_tracking() {
			return;
		}
		let Some(location) = self.tracker.host().location() else {
			return;
		};
		let url = location.to_string();

		if let Some(last) = self.tracker.engagement().last_path {
			if last == url {
				debug!(%url, "Same URL as last screen view");
				return;
			}
			if !self.tracker.options().track_hash_changes {
				if let Ok(last) = Url::parse(&last) {
					if is_hash_only_change(&last, &location) {
						debug!(%url, "Ignoring hash-only navigation");
						return;
					}
				}
			}
		}

		if let Some(exit) = self.take_page_exit() {
			self.tracker.submit(exit, SendOptions::default());
		}
		self.tracker.reset_engagement();
		let page_count = self.tracker.with_engagement(|state| {
			state.last_path = Some(url.clone());
			state.page_count = state.page_count.saturating_add(1);
			state.page_count
		});

		let event = self.tracker.create_event(
			EventKind::ScreenView(ScreenView {
				page_count,
				navigation_type: navigation_type.map(str::to_string),
			}),
			self.merged_properties(properties),
		);
		self.tracker.submit(event, SendOptions::default());
		self.tracker.notify_route_change(location.path());
	}

	/// The `page_exit` for the current page segment, at most once per segment.
	fn take_page_exit(&self) -> Option<TrackerEvent> {
		let engaged_ms = self.tracker.engaged_time_ms().max(0);
		let exit = self.tracker.with_engagement(|state| {
			if state.page_count == 0 || state.exit_sent {
				return None;
			}
			state.exit_sent = true;
			Some(PageExit {
				time_on_page: (engaged_ms as f64 / 1000.0).round() as u64,
				max_scroll_depth: state.max_scroll_depth,
				interaction_count: state.interaction_count,
				page_count: state.page_count,
			})
		})?;
		let properties = self.global_properties.lock().clone();
		Some(self.tracker.create_event(EventKind::PageExit(exit), properties))
	}

	/// Sends the queued events plus the page exit while the page goes away.
	///
	/// A beacon survives unload; a keepalive POST is the fallback.
	fn flush_on_unload(&self) {
		let mut events = self.tracker.drain_batch();
		if !self.tracker.should_skip_tracking() {
			if let Some(exit) = self.take_page_exit() {
				self.tracker.restart_after_exit();
				if self.tracker.admits(&exit) {
					events.push(exit);
				}
			}
		}
		if events.is_empty() {
			return;
		}

		let payload: Vec<Value> = events.iter().map(TrackerEvent::to_json).collect();
		if self.tracker.send_beacon(Endpoint::Batch, &payload) {
			debug!(count = payload.len(), "Unload batch handed to beacon");
			return;
		}

		let tracker = Arc::clone(&self.tracker);
		spawn(async move {
			let result = tracker
				.client()
				.post(Endpoint::Batch.path(), Some(&payload), PostOptions::keepalive())
				.await;
			if let Err(e) = result {
				warn!(count = payload.len(), error = %e, "Failed to deliver unload batch");
			}
		});
	}

	/// The visitor is back: engaged time resumes and the span since the
	/// return gets its own `page_exit`.
	fn resume_visible(&self) {
		self.tracker.start_engagement();
		self.tracker.with_engagement(|state| state.exit_sent = false);
	}

	fn restore_from_bfcache(&self) {
		debug!("Page restored from back/forward cache");
		self.tracker.reset_engagement();
		self.tracker.refresh_session_if_expired();
		self.tracker.with_engagement(|state| {
			state.last_path = None;
			// The previous segment already reported its exit on pagehide.
			state.exit_sent = true;
		});
		self.record_screen_view(Properties::new(), Some(BFCACHE_NAVIGATION));
	}

	fn track_outgoing_click(&self, target: &ClickTarget) {
		let Some(link) = &target.link else {
			return;
		};
		if link.href.is_empty() || self.tracker.should_skip_tracking() {
			return;
		}
		let Some(location) = self.tracker.host().location() else {
			return;
		};
		if location.host_str().unwrap_or_default() == link.hostname {
			return;
		}

		let text = [&link.text, &link.title]
			.into_iter()
			.find(|s| !s.is_empty())
			.cloned()
			.unwrap_or_default();
		debug!(href = %link.href, "Outgoing link clicked");
		let event = self.tracker.create_event(
			EventKind::OutgoingLink(OutgoingLink {
				href: link.href.clone(),
				text,
			}),
			Map::new(),
		);
		self.tracker.submit(event, SendOptions::forced());
	}

	fn track_attribute_click(&self, target: &ClickTarget) {
		let Some(attributes) = &target.tracked_attributes else {
			return;
		};
		let Some(name) = attributes
			.iter()
			.find(|(key, _)| key == "data-track")
			.map(|(_, value)| value.as_str())
			.filter(|name| !name.is_empty())
		else {
			return;
		};
		let properties = Properties::from_data_attributes(attributes.iter().map(|(k, v)| (k.as_str(), v.as_str())));
		self.track(name, properties);
	}

	fn merged_properties(&self, properties: Properties) -> Map<String, Value> {
		let mut merged = self.global_properties.lock().clone();
		merged.extend(properties.into_map());
		merged
	}

	/// Merged below call properties into every later event.
	pub fn set_global_properties(&self, properties: Properties) {
		self.global_properties.lock().extend(properties.into_map());
	}

	pub fn global_properties(&self) -> Map<String, Value> {
		self.global_properties.lock().clone()
	}

	pub async fn flush(&self) {
		self.tracker.flush_batch().await;
	}

	/// Forgets the visitor: new identity, no global properties, counters reset.
	pub fn clear(&self) {
		self.global_properties.lock().clear();
		self.tracker.clear_identity();
		self.tracker.with_engagement(|state| {
			state.page_count = 0;
			state.last_path = None;
			state.interaction_count = 0;
			state.max_scroll_depth = 0;
		});
	}

	pub fn is_destroyed(&self) -> bool {
		self.tracker.is_shut_down()
	}

	/// Detaches from the page. Queued events are discarded, not flushed.
	pub fn destroy(&self) {
		if self.tracker.is_shut_down() {
			return;
		}
		let ids = std::mem::take(&mut *self.listeners.lock());
		self.bus.remove_all(ids);
		if let Some(restore) = self.history_restore.lock().take() {
			restore();
		}
		self.debouncer.cancel();
		self.tracker.shutdown();
		global::release(self);
		debug!("Databuddy tracker destroyed");
	}
}
