// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker.

use databuddy_common_http::{is_retryable_status, RetryableError};
use databuddy_tracker_core::ConfigError;
use thiserror::Error;

/// Tracker errors.
///
/// None of these reach host-page code: public tracking methods log and absorb
/// them. They exist so internal callers can pick a fallback, e.g. a failed
/// `/batch` delivery falling back to per-event sends.
#[derive(Debug, Error)]
pub enum TrackerError {
	/// Server answered with a status that is neither success nor 401.
	#[error("server error ({status}): {body}")]
	Status { status: u16, body: String },

	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(#[from] TransportError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("invalid configuration: {0}")]
	Config(#[from] ConfigError),

	/// HTTP client construction failed.
	#[error("HTTP client error: {0}")]
	Client(#[from] reqwest::Error),

	#[error("tracker has been destroyed")]
	Shutdown,
}

impl RetryableError for TrackerError {
	fn is_retryable(&self) -> bool {
		match self {
			TrackerError::Status { status, .. } => is_retryable_status(*status),
			TrackerError::Network(_) => true,
			_ => false,
		}
	}
}

/// Network-level failures reported by a [`crate::Transport`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
	#[error("request failed: {0}")]
	Failed(String),

	#[error("request timed out")]
	Timeout,
}

impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			TransportError::Timeout
		} else {
			TransportError::Failed(e.to_string())
		}
	}
}

/// Failures of `localStorage`/`sessionStorage` (private browsing, quota, disabled).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
	#[error("storage unavailable: {0}")]
	Unavailable(String),

	#[error("storage quota exceeded")]
	QuotaExceeded,
}

/// Failures of best-effort host lookups such as timezone resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
	#[error("{0} is not supported by this host")]
	Unsupported(&'static str),

	#[error("host lookup failed: {0}")]
	Failed(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
