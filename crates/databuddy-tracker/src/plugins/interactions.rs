// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Counts user interactions for the `page_exit` summary.

use std::sync::Arc;

use crate::events::{BrowserEvent, EventBus, EventType, InteractionKind, ListenerId};
use crate::tracker::BaseTracker;

fn counts(event: &BrowserEvent) -> bool {
	match event {
		BrowserEvent::Interaction(kind) => matches!(
			kind,
			InteractionKind::MouseDown | InteractionKind::KeyDown | InteractionKind::TouchStart
		),
		BrowserEvent::Scroll(_) => true,
		_ => false,
	}
}

pub fn install(tracker: &Arc<BaseTracker>, bus: &EventBus) -> Vec<ListenerId> {
	[EventType::Interaction, EventType::Scroll]
		.into_iter()
		.map(|event_type| {
			let tracker = Arc::clone(tracker);
			bus.add_listener(event_type, move |event| {
				if counts(event) {
					tracker.record_interaction();
				}
			})
		})
		.collect()
}
