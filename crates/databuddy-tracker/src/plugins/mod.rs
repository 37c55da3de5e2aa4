// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Optional instrumentation, installed per option toggle.
//!
//! Each plugin registers listeners on the [`EventBus`] and returns their ids
//! so the orchestrator can remove them on destroy.

pub mod errors;
pub mod interactions;
pub mod pixel;
pub mod scroll_depth;
pub mod vitals;

use std::sync::Arc;

use crate::events::{EventBus, ListenerId};
use crate::tracker::BaseTracker;

/// Installs every plugin enabled in the tracker's options.
pub fn install_enabled(tracker: &Arc<BaseTracker>, bus: &EventBus) -> Vec<ListenerId> {
	let options = tracker.options();
	let mut ids = Vec::new();

	if options.use_pixel {
		pixel::install(tracker);
	}
	if options.track_interactions {
		ids.extend(interactions::install(tracker, bus));
	}
	if options.track_scroll_depth {
		ids.extend(scroll_depth::install(tracker, bus));
	}
	if options.track_web_vitals {
		ids.extend(vitals::install(tracker, bus));
	}
	if options.track_errors {
		ids.extend(errors::install(tracker, bus));
	}

	ids
}
