// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Visitor and session identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inactivity gap after which a stored session is considered expired.
pub const SESSION_TIMEOUT_MS: i64 = 30 * 60 * 1000;

/// Storage keys shared by the tracker and the opt-out helpers.
pub mod keys {
	/// `localStorage` key holding the anonymous id.
	pub const ANONYMOUS_ID: &str = "did";
	/// `sessionStorage` key holding the session id.
	pub const SESSION_ID: &str = "did_session";
	/// `sessionStorage` key holding the last-touched timestamp (epoch ms).
	pub const SESSION_TIMESTAMP: &str = "did_session_timestamp";
	/// `sessionStorage` key holding the session start time (epoch ms).
	pub const SESSION_START: &str = "did_session_start";
	pub const OPT_OUT: &str = "databuddy_opt_out";
	pub const DISABLED: &str = "databuddy_disabled";
}

/// Durable pseudonymous visitor identifier, `anon_<uuidv4>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnonymousId(String);

impl AnonymousId {
	#[must_use]
	pub fn generate() -> Self {
		Self(format!("anon_{}", Uuid::new_v4()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for AnonymousId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl std::str::FromStr for AnonymousId {
	type Err = crate::error::ConfigError;

	/// Accepts any non-empty value so ids handed over in URLs round-trip.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Err(crate::error::ConfigError::invalid_value("anonId", "empty"));
		}
		Ok(Self(s.to_string()))
	}
}

/// Identifier for one browsing session, `sess_<uuidv4>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	#[must_use]
	pub fn generate() -> Self {
		Self(format!("sess_{}", Uuid::new_v4()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = crate::error::ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.is_empty() {
			return Err(crate::error::ConfigError::invalid_value("sessionId", "empty"));
		}
		Ok(Self(s.to_string()))
	}
}

/// Returns true when a session last touched at `last_touched_ms` has expired at `now_ms`.
pub fn session_expired(last_touched_ms: i64, now_ms: i64) -> bool {
	now_ms.saturating_sub(last_touched_ms) >= SESSION_TIMEOUT_MS
}
