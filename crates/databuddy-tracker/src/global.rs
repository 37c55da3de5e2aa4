// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The process-wide tracker handle and visitor opt-out.

use std::sync::Arc;

use async_trait::async_trait;
use databuddy_tracker_core::{keys, ConfigError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::databuddy::Databuddy;
use crate::events::BrowserEvent;
use crate::host::{BrowserHost, Storage};
use crate::identity::{read, remove, write};
use crate::logging;
use crate::properties::Properties;
use crate::transport::Transport;

/// What page code can call on the installed tracker.
#[async_trait]
pub trait DatabuddyApi: Send + Sync {
	fn track(&self, name: &str, properties: Properties);
	fn track_custom_event(&self, name: &str, properties: Properties);
	fn screen_view(&self, properties: Properties);
	async fn flush(&self);
	fn clear(&self);
	fn set_global_properties(&self, properties: Properties);
	fn dispatch(&self, event: BrowserEvent);
	fn is_disabled(&self) -> bool;
	fn set_disabled(&self, disabled: bool);
	fn destroy(&self);
}

#[async_trait]
impl DatabuddyApi for Databuddy {
	fn track(&self, name: &str, properties: Properties) {
		Databuddy::track(self, name, properties);
	}

	fn track_custom_event(&self, name: &str, properties: Properties) {
		Databuddy::track_custom_event(self, name, properties);
	}

	fn screen_view(&self, properties: Properties) {
		Databuddy::screen_view(self, properties);
	}

	async fn flush(&self) {
		Databuddy::flush(self).await;
	}

	fn clear(&self) {
		Databuddy::clear(self);
	}

	fn set_global_properties(&self, properties: Properties) {
		Databuddy::set_global_properties(self, properties);
	}

	fn dispatch(&self, event: BrowserEvent) {
		Databuddy::dispatch(self, event);
	}

	fn is_disabled(&self) -> bool {
		self.tracker().is_disabled()
	}

	fn set_disabled(&self, disabled: bool) {
		self.tracker().set_disabled(disabled);
	}

	fn destroy(&self) {
		Databuddy::destroy(self);
	}
}

/// Installed for opted-out visitors: accepts every call, sends nothing.
#[derive(Debug, Default)]
pub struct NoopApi;

#[async_trait]
impl DatabuddyApi for NoopApi {
	fn track(&self, _name: &str, _properties: Properties) {}

	fn track_custom_event(&self, _name: &str, _properties: Properties) {}

	fn screen_view(&self, _properties: Properties) {}

	async fn flush(&self) {}

	fn clear(&self) {}

	fn set_global_properties(&self, _properties: Properties) {}

	fn dispatch(&self, _event: BrowserEvent) {}

	fn is_disabled(&self) -> bool {
		true
	}

	fn set_disabled(&self, _disabled: bool) {}

	fn destroy(&self) {}
}

static HANDLE: Mutex<Option<Arc<dyn DatabuddyApi>>> = parking_lot::const_mutex(None);

/// Installs the page's tracker once; later calls return the existing handle.
///
/// Returns `None` off-browser and when no client id is configured.
pub fn initialize(host: Arc<dyn BrowserHost>, transport: Arc<dyn Transport>) -> Option<Arc<dyn DatabuddyApi>> {
	let mut slot = HANDLE.lock();
	if let Some(existing) = slot.as_ref() {
		return Some(Arc::clone(existing));
	}
	if !host.is_browser() {
		return None;
	}

	if is_opted_out(host.local_storage().as_ref()) {
		info!("Visitor opted out, installing disabled tracker");
		let api: Arc<dyn DatabuddyApi> = Arc::new(NoopApi);
		*slot = Some(Arc::clone(&api));
		return Some(api);
	}

	let options = match host.config_sources().resolve(None) {
		Ok(options) => options,
		Err(ConfigError::MissingField(field)) => {
			debug!(%field, "No tracker configuration found");
			return None;
		}
		Err(e) => {
			warn!(error = %e, "Invalid tracker configuration");
			return None;
		}
	};
	if options.debug {
		logging::init_logging(true);
	}

	let api: Arc<dyn DatabuddyApi> = Databuddy::init(host, options, transport);
	*slot = Some(Arc::clone(&api));
	Some(api)
}

pub fn handle() -> Option<Arc<dyn DatabuddyApi>> {
	HANDLE.lock().clone()
}

pub fn clear_handle() {
	HANDLE.lock().take();
}

/// Drops the global handle if it is `instance`.
pub(crate) fn release(instance: &Databuddy) {
	let mut slot = HANDLE.lock();
	let is_instance = slot
		.as_ref()
		.is_some_and(|api| Arc::as_ptr(api) as *const () == instance as *const Databuddy as *const ());
	if is_instance {
		slot.take();
	}
}

pub fn is_opted_out(storage: Option<&Arc<dyn Storage>>) -> bool {
	[keys::OPT_OUT, keys::DISABLED]
		.into_iter()
		.any(|key| read(storage, key).as_deref() == Some("true"))
}

/// Persists the opt-out and disables the installed tracker.
pub fn opt_out(storage: Option<&Arc<dyn Storage>>) {
	write(storage, keys::OPT_OUT, "true");
	write(storage, keys::DISABLED, "true");
	if let Some(api) = handle() {
		api.set_disabled(true);
	}
	info!("Visitor opted out of tracking");
}

/// Removes the persisted opt-out. Takes effect on the next initialization.
pub fn opt_in(storage: Option<&Arc<dyn Storage>>) {
	remove(storage, keys::OPT_OUT);
	remove(storage, keys::DISABLED);
	info!("Visitor opted in to tracking");
}
