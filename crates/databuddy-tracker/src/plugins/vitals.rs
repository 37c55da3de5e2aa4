// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core Web Vitals, reported once per page lifetime.
//!
//! Metrics are collected as the host's observers report them and sent as a
//! single `/vitals` event when the page is first hidden.

use std::sync::Arc;

use databuddy_tracker_core::{EventKind, VitalsReport};
use parking_lot::Mutex;
use serde_json::Map;
use tracing::debug;

use crate::events::{BrowserEvent, EventBus, EventType, ListenerId, Visibility};
use crate::tracker::{BaseTracker, SendOptions};

/// Upper bound for timing metrics; larger values are measurement noise.
pub const MAX_TIMING_MS: f64 = 60_000.0;

#[derive(Debug, Default)]
struct VitalsState {
	report: VitalsReport,
	sent: bool,
}

/// Folds one observer callback into `report`. CLS accumulates, the others
/// keep the latest value.
pub fn record(report: &mut VitalsReport, metric: &str, value: f64) {
	if !value.is_finite() {
		debug!(metric, "Ignoring non-finite vital");
		return;
	}
	match metric.to_ascii_uppercase().as_str() {
		"FCP" => report.fcp = Some(value),
		"LCP" => report.lcp = Some(value),
		"CLS" => report.cls = Some(report.cls.unwrap_or(0.0) + value),
		"INP" => report.inp = Some(value),
		"TTFB" => report.ttfb = Some(value),
		other => debug!(metric = other, "Ignoring unknown vital"),
	}
}

/// Clamps timing metrics into `[0, MAX_TIMING_MS]`.
pub fn finalize(mut report: VitalsReport) -> VitalsReport {
	let clamp = |v: Option<f64>| v.map(|v| v.clamp(0.0, MAX_TIMING_MS));
	report.fcp = clamp(report.fcp);
	report.lcp = clamp(report.lcp);
	report.ttfb = clamp(report.ttfb);
	report
}

fn report_once(tracker: &BaseTracker, state: &Mutex<VitalsState>) {
	let report = {
		let mut state = state.lock();
		if state.sent {
			return;
		}
		state.sent = true;
		std::mem::take(&mut state.report)
	};

	if report.is_empty() {
		debug!("No web vitals observed");
		return;
	}

	let event = tracker.create_event(EventKind::Vitals(finalize(report)), Map::new());
	tracker.submit(event, SendOptions::forced());
}

pub fn install(tracker: &Arc<BaseTracker>, bus: &EventBus) -> Vec<ListenerId> {
	let state = Arc::new(Mutex::new(VitalsState::default()));
	let mut ids = Vec::with_capacity(3);

	let collect = Arc::clone(&state);
	ids.push(bus.add_listener(EventType::WebVital, move |event| {
		if let BrowserEvent::WebVital { metric, value } = event {
			record(&mut collect.lock().report, metric, *value);
		}
	}));

	let (t, s) = (Arc::clone(tracker), Arc::clone(&state));
	ids.push(bus.add_listener(EventType::PageHide, move |_| report_once(&t, &s)));

	let (t, s) = (Arc::clone(tracker), state);
	ids.push(bus.add_listener(EventType::VisibilityChange, move |event| {
		if matches!(event, BrowserEvent::VisibilityChange(Visibility::Hidden)) {
			report_once(&t, &s);
		}
	}));

	ids
}
