// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event batching for the `/batch` endpoint.
//!
//! The queue only holds state; [`crate::BaseTracker`] owns the timer task and
//! the delivery. Every transition happens under one lock so that a flush
//! snapshots and clears the queue before its first await.

use std::time::Duration;

use databuddy_tracker_core::{TrackerEvent, TrackerOptions};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

/// Configuration for the event batch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
	/// Queue length that triggers an immediate flush.
	pub max_batch_size: usize,
	/// Delay between the first queued event and the timed flush.
	pub flush_interval: Duration,
	/// Maximum number of events to queue before dropping oldest.
	pub max_queue_size: usize,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			max_batch_size: 10,
			flush_interval: Duration::from_millis(2000),
			max_queue_size: 1000,
		}
	}
}

impl BatchConfig {
	pub fn from_options(options: &TrackerOptions) -> Self {
		Self {
			max_batch_size: options.batch_size,
			flush_interval: options.batch_timeout,
			max_queue_size: options.max_queue_size.max(options.batch_size),
		}
	}
}

/// What the caller must do after [`BatchQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
	/// No timer is pending; one should be scheduled.
	pub needs_timer: bool,
	/// The queue reached `max_batch_size`; flush now.
	pub should_flush: bool,
}

#[derive(Default)]
struct QueueState {
	events: Vec<TrackerEvent>,
	timer: Option<JoinHandle<()>>,
	flushing: bool,
}

/// Pending events, the flush timer and the in-flight flag.
pub struct BatchQueue {
	config: BatchConfig,
	state: Mutex<QueueState>,
}

impl BatchQueue {
	pub fn new(config: BatchConfig) -> Self {
		Self {
			config,
			state: Mutex::new(QueueState::default()),
		}
	}

	pub fn config(&self) -> &BatchConfig {
		&self.config
	}

	pub fn push(&self, event: TrackerEvent) -> PushOutcome {
		let mut state = self.state.lock();

		while state.events.len() >= self.config.max_queue_size {
			let dropped = state.events.remove(0);
			warn!(
				event_name = %dropped.name(),
				event_id = %dropped.event_id(),
				"Dropped event due to queue overflow"
			);
		}

		state.events.push(event);
		PushOutcome {
			needs_timer: state.timer.is_none(),
			should_flush: state.events.len() >= self.config.max_batch_size,
		}
	}

	/// Stores the pending timer. A timer installed while another is pending
	/// replaces and aborts it.
	pub fn set_timer(&self, timer: JoinHandle<()>) {
		if let Some(previous) = self.state.lock().timer.replace(timer) {
			previous.abort();
		}
	}

	pub fn has_timer(&self) -> bool {
		self.state.lock().timer.is_some()
	}

	/// Forgets the pending timer without aborting it. Called by the timer task
	/// itself once it fires.
	pub fn take_timer(&self) -> Option<JoinHandle<()>> {
		self.state.lock().timer.take()
	}

	/// Clears the timer and takes the queued events for delivery.
	///
	/// Returns `None` when the queue is empty or another flush is in flight.
	pub fn begin_flush(&self) -> Option<Vec<TrackerEvent>> {
		let mut state = self.state.lock();
		if let Some(timer) = state.timer.take() {
			timer.abort();
		}
		if state.events.is_empty() || state.flushing {
			return None;
		}
		state.flushing = true;
		Some(std::mem::take(&mut state.events))
	}

	/// Clears the in-flight flag. Returns true when events arrived meanwhile.
	pub fn finish_flush(&self) -> bool {
		let mut state = self.state.lock();
		state.flushing = false;
		!state.events.is_empty()
	}

	pub fn is_flushing(&self) -> bool {
		self.state.lock().flushing
	}

	/// Empties the queue and cancels the timer without sending anything.
	pub fn drain(&self) -> Vec<TrackerEvent> {
		let mut state = self.state.lock();
		if let Some(timer) = state.timer.take() {
			timer.abort();
		}
		std::mem::take(&mut state.events)
	}

	pub fn len(&self) -> usize {
		self.state.lock().events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
