// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visitor and session identity backed by browser storage.
//!
//! The anonymous id lives in `localStorage`, the session id with its
//! timestamps in `sessionStorage`. Storage is best-effort: when it is missing
//! or throws, identity degrades to in-memory values for the page lifetime.

use std::sync::Arc;

use databuddy_tracker_core::{keys, session_expired, AnonymousId, SessionId};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;

use crate::host::{BrowserHost, Storage};

#[derive(Debug, Clone)]
struct IdentityState {
	anonymous_id: AnonymousId,
	session_id: SessionId,
	session_start: i64,
	last_touched: i64,
}

/// Identity for one tracker instance.
pub struct IdentityStore {
	local: Option<Arc<dyn Storage>>,
	session: Option<Arc<dyn Storage>>,
	state: Mutex<Option<IdentityState>>,
}

impl IdentityStore {
	/// Resolves identity from URL overrides and storage. Inert on non-browser hosts.
	pub fn load(host: &dyn BrowserHost) -> Self {
		if !host.is_browser() {
			return Self::inert();
		}

		let store = Self {
			local: host.local_storage(),
			session: host.session_storage(),
			state: Mutex::new(None),
		};

		let now = host.now_ms();
		let location = host.location();
		let anonymous_id = store.resolve_anonymous_id(location.as_ref());
		let session_id = store.resolve_session_id(location.as_ref(), now);
		let session_start = store.resolve_session_start(now);

		*store.state.lock() = Some(IdentityState {
			anonymous_id,
			session_id,
			session_start,
			last_touched: now,
		});
		store
	}

	/// An identity that never produces ids (server-side rendering).
	pub fn inert() -> Self {
		Self {
			local: None,
			session: None,
			state: Mutex::new(None),
		}
	}

	pub fn anonymous_id(&self) -> Option<String> {
		self.state.lock().as_ref().map(|s| s.anonymous_id.to_string())
	}

	pub fn session_id(&self) -> Option<String> {
		self.state.lock().as_ref().map(|s| s.session_id.to_string())
	}

	pub fn session_start_time(&self) -> Option<i64> {
		self.state.lock().as_ref().map(|s| s.session_start)
	}

	/// Records activity so the session does not expire while in use.
	pub fn touch_session(&self, now: i64) {
		let mut state = self.state.lock();
		if let Some(state) = state.as_mut() {
			state.last_touched = now;
			write(self.session.as_ref(), keys::SESSION_TIMESTAMP, &now.to_string());
		}
	}

	/// Rotates the session when it has been idle for the timeout.
	///
	/// Returns true when a new session was started.
	pub fn refresh_session_if_expired(&self, now: i64) -> bool {
		let mut guard = self.state.lock();
		let Some(state) = guard.as_mut() else {
			return false;
		};

		let last_touched = read(self.session.as_ref(), keys::SESSION_TIMESTAMP)
			.and_then(|v| v.parse::<i64>().ok())
			.unwrap_or(state.last_touched);
		if !session_expired(last_touched, now) {
			return false;
		}

		self.clear_session_keys();
		state.session_id = self.mint_session(now);
		state.session_start = now;
		state.last_touched = now;
		write(self.session.as_ref(), keys::SESSION_START, &now.to_string());
		debug!(session_id = %state.session_id, "Session expired, started a new one");
		true
	}

	/// Forgets the visitor: removes every identity key and mints fresh ids.
	pub fn clear(&self, now: i64) {
		let mut guard = self.state.lock();
		let Some(state) = guard.as_mut() else {
			return;
		};

		remove(self.local.as_ref(), keys::ANONYMOUS_ID);
		self.clear_session_keys();

		let anonymous_id = AnonymousId::generate();
		write(self.local.as_ref(), keys::ANONYMOUS_ID, anonymous_id.as_str());
		state.anonymous_id = anonymous_id;
		state.session_id = self.mint_session(now);
		state.session_start = now;
		state.last_touched = now;
		write(self.session.as_ref(), keys::SESSION_START, &now.to_string());
	}

	fn resolve_anonymous_id(&self, location: Option<&Url>) -> AnonymousId {
		if let Some(id) = query_param(location, "anonId").and_then(|v| v.parse::<AnonymousId>().ok()) {
			write(self.local.as_ref(), keys::ANONYMOUS_ID, id.as_str());
			return id;
		}

		if let Some(id) = read(self.local.as_ref(), keys::ANONYMOUS_ID).and_then(|v| v.parse().ok()) {
			return id;
		}

		let id = AnonymousId::generate();
		write(self.local.as_ref(), keys::ANONYMOUS_ID, id.as_str());
		id
	}

	fn resolve_session_id(&self, location: Option<&Url>, now: i64) -> SessionId {
		if let Some(id) = query_param(location, "sessionId").and_then(|v| v.parse::<SessionId>().ok()) {
			write(self.session.as_ref(), keys::SESSION_ID, id.as_str());
			write(self.session.as_ref(), keys::SESSION_TIMESTAMP, &now.to_string());
			return id;
		}

		let stored = read(self.session.as_ref(), keys::SESSION_ID).and_then(|v| v.parse::<SessionId>().ok());
		let timestamp = read(self.session.as_ref(), keys::SESSION_TIMESTAMP).and_then(|v| v.parse::<i64>().ok());
		if let (Some(id), Some(timestamp)) = (stored, timestamp) {
			if !session_expired(timestamp, now) {
				write(self.session.as_ref(), keys::SESSION_TIMESTAMP, &now.to_string());
				return id;
			}
			debug!(session_id = %id, "Stored session expired");
		}

		self.clear_session_keys();
		self.mint_session(now)
	}

	fn resolve_session_start(&self, now: i64) -> i64 {
		if let Some(start) = read(self.session.as_ref(), keys::SESSION_START).and_then(|v| v.parse().ok()) {
			return start;
		}
		write(self.session.as_ref(), keys::SESSION_START, &now.to_string());
		now
	}

	fn mint_session(&self, now: i64) -> SessionId {
		let id = SessionId::generate();
		write(self.session.as_ref(), keys::SESSION_ID, id.as_str());
		write(self.session.as_ref(), keys::SESSION_TIMESTAMP, &now.to_string());
		id
	}

	fn clear_session_keys(&self) {
		remove(self.session.as_ref(), keys::SESSION_ID);
		remove(self.session.as_ref(), keys::SESSION_TIMESTAMP);
		remove(self.session.as_ref(), keys::SESSION_START);
	}
}

fn query_param(location: Option<&Url>, name: &str) -> Option<String> {
	location?
		.query_pairs()
		.find(|(key, value)| key == name && !value.is_empty())
		.map(|(_, value)| value.into_owned())
}

pub(crate) fn read(storage: Option<&Arc<dyn Storage>>, key: &str) -> Option<String> {
	match storage?.get_item(key) {
		Ok(value) => value,
		Err(e) => {
			debug!(key, error = %e, "Storage read failed");
			None
		}
	}
}

pub(crate) fn write(storage: Option<&Arc<dyn Storage>>, key: &str, value: &str) {
	if let Some(storage) = storage {
		if let Err(e) = storage.set_item(key, value) {
			debug!(key, error = %e, "Storage write failed");
		}
	}
}

pub(crate) fn remove(storage: Option<&Arc<dyn Storage>>, key: &str) {
	if let Some(storage) = storage {
		if let Err(e) = storage.remove_item(key) {
			debug!(key, error = %e, "Storage remove failed");
		}
	}
}
