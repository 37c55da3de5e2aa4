// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Maximum scroll depth per page view.

use std::sync::Arc;

use crate::events::{BrowserEvent, EventBus, EventType, ListenerId, ScrollMetrics};
use crate::tracker::BaseTracker;

/// Scrolled share of the scrollable distance, in percent.
///
/// A page without overflow counts as fully read.
pub fn scroll_percentage(metrics: &ScrollMetrics) -> u8 {
	let scrollable = metrics.scroll_height - metrics.client_height;
	if !scrollable.is_finite() || scrollable <= 0.0 {
		return 100;
	}
	let pct = (metrics.scroll_top / scrollable * 100.0).round();
	if pct.is_nan() {
		return 0;
	}
	pct.clamp(0.0, 100.0) as u8
}

pub fn install(tracker: &Arc<BaseTracker>, bus: &EventBus) -> Vec<ListenerId> {
	let tracker = Arc::clone(tracker);
	vec![bus.add_listener(EventType::Scroll, move |event| {
		if let BrowserEvent::Scroll(metrics) = event {
			tracker.record_scroll_depth(scroll_percentage(metrics));
		}
	})]
}
