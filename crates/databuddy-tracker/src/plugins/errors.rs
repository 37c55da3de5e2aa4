// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Uncaught errors and unhandled promise rejections.

use std::sync::Arc;

use databuddy_tracker_core::{Endpoint, ErrorReport, EventKind};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::events::{BrowserEvent, ErrorEventData, EventBus, EventType, ListenerId, RejectionReason};
use crate::tracker::{spawn, BaseTracker, SendOptions};

pub const DEFAULT_ERROR_TYPE: &str = "Error";
pub const REJECTION_ERROR_TYPE: &str = "UnhandledRejection";

pub fn from_error_event(data: &ErrorEventData) -> ErrorReport {
	ErrorReport {
		message: data.message.clone(),
		filename: data.filename.clone().filter(|f| !f.is_empty()),
		lineno: data.lineno,
		colno: data.colno,
		stack: data.stack.clone(),
		error_type: data
			.error_name
			.clone()
			.filter(|n| !n.is_empty())
			.unwrap_or_else(|| DEFAULT_ERROR_TYPE.to_string()),
	}
}

/// Non-error reasons are serialized as JSON; strings are kept verbatim.
pub fn from_rejection(reason: &RejectionReason) -> ErrorReport {
	match reason {
		RejectionReason::Error { name, message, stack } => ErrorReport {
			message: message.clone(),
			filename: None,
			lineno: None,
			colno: None,
			stack: stack.clone(),
			error_type: name
				.clone()
				.filter(|n| !n.is_empty())
				.unwrap_or_else(|| REJECTION_ERROR_TYPE.to_string()),
		},
		RejectionReason::Value(value) => ErrorReport {
			message: match value {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			},
			filename: None,
			lineno: None,
			colno: None,
			stack: None,
			error_type: REJECTION_ERROR_TYPE.to_string(),
		},
	}
}

fn report(tracker: &Arc<BaseTracker>, report: ErrorReport) {
	if tracker.should_skip_tracking() {
		return;
	}
	debug!(error_type = %report.error_type, "Reporting uncaught error");
	let event = tracker.create_event(EventKind::Error(report), Map::new());
	let tracker = Arc::clone(tracker);
	spawn(async move {
		match tracker.send(event.clone(), SendOptions::forced()).await {
			Ok(_) => {}
			Err(TrackerError::Shutdown) => debug!("Tracker destroyed, error report dropped"),
			Err(e) => {
				warn!(error = %e, "Error report failed, falling back to beacon");
				tracker.send_beacon(Endpoint::Errors, &event);
			}
		}
	});
}

pub fn install(tracker: &Arc<BaseTracker>, bus: &EventBus) -> Vec<ListenerId> {
	let on_error = Arc::clone(tracker);
	let on_rejection = Arc::clone(tracker);
	vec![
		bus.add_listener(EventType::Error, move |event| {
			if let BrowserEvent::Error(data) = event {
				report(&on_error, from_error_event(data));
			}
		}),
		bus.add_listener(EventType::UnhandledRejection, move |event| {
			if let BrowserEvent::UnhandledRejection(reason) = event {
				report(&on_rejection, from_rejection(reason));
			}
		}),
	]
}
