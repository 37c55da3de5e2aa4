// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The browser environment as seen by the tracker.
//!
//! A WebView bridge, a browser extension or a wasm shim implements
//! [`BrowserHost`]; the tracker never reaches for globals itself.

use std::collections::HashMap;
use std::sync::Arc;

use databuddy_tracker_core::ConfigSources;
use parking_lot::Mutex;
use url::Url;

use crate::error::{HostError, StorageError};

/// `localStorage` / `sessionStorage`.
pub trait Storage: Send + Sync {
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
	fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// `navigator.sendBeacon`.
pub trait Beacon: Send + Sync {
	/// Queues `body` (JSON) for delivery; false when the browser refused it.
	fn send_beacon(&self, url: &str, body: &str) -> bool;
}

/// The two history methods single-page apps navigate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
	PushState,
	ReplaceState,
}

/// Called after every wrapped `pushState`/`replaceState`.
pub type HistoryHook = Arc<dyn Fn(HistoryMethod) + Send + Sync>;

/// Reinstates the original history methods.
pub type HistoryRestore = Box<dyn FnOnce() + Send>;

/// Traces left behind by automation tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationSignals {
	/// `navigator.webdriver`
	pub navigator_webdriver: bool,
	/// `window.webdriver`
	pub window_webdriver: bool,
	/// `window.callPhantom` or `window._phantom`
	pub phantom_globals: bool,
	/// `window.selenium`
	pub selenium_global: bool,
	/// `webdriver="true"` on the root element
	pub webdriver_attribute: bool,
}

impl AutomationSignals {
	pub fn any(&self) -> bool {
		self.navigator_webdriver
			|| self.window_webdriver
			|| self.phantom_globals
			|| self.selenium_global
			|| self.webdriver_attribute
	}
}

/// Everything the tracker reads from `window`, `document` and `navigator`.
pub trait BrowserHost: Send + Sync {
	/// False during server-side rendering: no document, window or storage.
	fn is_browser(&self) -> bool {
		true
	}

	/// `Date.now()`
	fn now_ms(&self) -> i64;

	/// `window.location.href`
	fn location(&self) -> Option<Url>;

	fn title(&self) -> String;

	/// `document.referrer`, empty for direct visits.
	fn referrer(&self) -> String;

	/// `(innerWidth, innerHeight)`
	fn viewport(&self) -> (u32, u32);

	/// Resolved IANA timezone.
	fn timezone(&self) -> Result<String, HostError>;

	/// `navigator.language`
	fn language(&self) -> Option<String>;

	fn user_agent(&self) -> String;

	fn automation_signals(&self) -> AutomationSignals {
		AutomationSignals::default()
	}

	fn local_storage(&self) -> Option<Arc<dyn Storage>>;

	fn session_storage(&self) -> Option<Arc<dyn Storage>>;

	/// `None` when the Beacon API is unavailable.
	fn beacon(&self) -> Option<Arc<dyn Beacon>> {
		None
	}

	/// Wraps `history.pushState`/`replaceState` so that `hook` runs after the
	/// original method. Returns the function restoring the originals, or
	/// `None` when the host has no history to wrap.
	fn wrap_history(&self, hook: HistoryHook) -> Option<HistoryRestore>;

	/// Configuration found on the loader script and the global config object.
	fn config_sources(&self) -> ConfigSources {
		ConfigSources::default()
	}
}

/// In-memory [`Storage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
	items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.items.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.lock().is_empty()
	}
}

impl Storage for MemoryStorage {
	fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.items.lock().get(key).cloned())
	}

	fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.items.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove_item(&self, key: &str) -> Result<(), StorageError> {
		self.items.lock().remove(key);
		Ok(())
	}
}

/// Host for server-side rendering, where tracking is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerHost;

impl BrowserHost for ServerHost {
	fn is_browser(&self) -> bool {
		false
	}

	fn now_ms(&self) -> i64 {
		chrono::Utc::now().timestamp_millis()
	}

	fn location(&self) -> Option<Url> {
		None
	}

	fn title(&self) -> String {
		String::new()
	}

	fn referrer(&self) -> String {
		String::new()
	}

	fn viewport(&self) -> (u32, u32) {
		(0, 0)
	}

	fn timezone(&self) -> Result<String, HostError> {
		Err(HostError::Unsupported("timezone"))
	}

	fn language(&self) -> Option<String> {
		None
	}

	fn user_agent(&self) -> String {
		String::new()
	}

	fn local_storage(&self) -> Option<Arc<dyn Storage>> {
		None
	}

	fn session_storage(&self) -> Option<Arc<dyn Storage>> {
		None
	}

	fn wrap_history(&self, _hook: HistoryHook) -> Option<HistoryRestore> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_storage_round_trip() {
		let storage = MemoryStorage::new();
		assert!(storage.is_empty());
		storage.set_item("did", "anon_1").unwrap();
		assert_eq!(storage.get_item("did").unwrap().as_deref(), Some("anon_1"));
		storage.remove_item("did").unwrap();
		assert_eq!(storage.get_item("did").unwrap(), None);
	}

	#[test]
	fn automation_signals_any() {
		assert!(!AutomationSignals::default().any());
		let signals = AutomationSignals {
			selenium_global: true,
			..Default::default()
		};
		assert!(signals.any());
	}

	#[test]
	fn server_host_is_not_a_browser() {
		let host = ServerHost;
		assert!(!host.is_browser());
		assert!(host.location().is_none());
		assert!(host.local_storage().is_none());
		assert!(host.timezone().is_err());
		assert!(host.beacon().is_none());
	}
}
