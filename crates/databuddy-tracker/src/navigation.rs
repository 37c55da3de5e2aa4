// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-page-app navigation: History API wrapping and debouncing.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{BrowserEvent, EventBus};
use crate::host::{BrowserHost, HistoryHook, HistoryMethod, HistoryRestore};

/// Quiet period before a navigation burst produces one screen view.
pub const NAVIGATION_DEBOUNCE: Duration = Duration::from_millis(50);

/// Wraps `pushState`/`replaceState` so each call emits the matching event
/// followed by [`BrowserEvent::LocationChange`].
///
/// The bus is held weakly: a wrapped history outliving its tracker emits
/// nothing.
pub fn wrap_history(host: &dyn BrowserHost, bus: Weak<EventBus>) -> Option<HistoryRestore> {
	let hook: HistoryHook = Arc::new(move |method| {
		let Some(bus) = bus.upgrade() else {
			return;
		};
		let event = match method {
			HistoryMethod::PushState => BrowserEvent::PushState,
			HistoryMethod::ReplaceState => BrowserEvent::ReplaceState,
		};
		bus.emit(&event);
		bus.emit(&BrowserEvent::LocationChange);
	});
	host.wrap_history(hook)
}

/// Runs only the last of a burst of calls, after `delay` of quiet.
#[derive(Debug)]
pub struct Debouncer {
	delay: Duration,
	pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
	pub fn new(delay: Duration) -> Self {
		Self {
			delay,
			pending: Mutex::new(None),
		}
	}

	/// Replaces any pending call with `f`.
	///
	/// Without an async runtime there is no timer to wait on and `f` runs
	/// immediately.
	pub fn schedule<F>(&self, f: F)
	where
		F: FnOnce() + Send + 'static,
	{
		let mut pending = self.pending.lock();
		if let Some(previous) = pending.take() {
			previous.abort();
		}

		match Handle::try_current() {
			Ok(handle) => {
				let delay = self.delay;
				*pending = Some(handle.spawn(async move {
					tokio::time::sleep(delay).await;
					f();
				}));
			}
			Err(_) => {
				drop(pending);
				debug!("No async runtime available, running debounced call now");
				f();
			}
		}
	}

	pub fn cancel(&self) {
		if let Some(pending) = self.pending.lock().take() {
			pending.abort();
		}
	}

	pub fn is_pending(&self) -> bool {
		self.pending.lock().as_ref().is_some_and(|h| !h.is_finished())
	}
}

impl Drop for Debouncer {
	fn drop(&mut self) {
		self.cancel();
	}
}
