// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! DOM events delivered by the host, and the bus plugins listen on.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
	Visible,
	Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
	MouseDown,
	MouseMove,
	KeyDown,
	TouchStart,
}

/// Scroll geometry of the document element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
	pub scroll_top: f64,
	pub scroll_height: f64,
	pub client_height: f64,
}

/// The closest `<a href>` ancestor of a click target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTarget {
	pub href: String,
	pub hostname: String,
	/// `innerText`
	pub text: String,
	/// `title` attribute
	pub title: String,
}

/// What a click landed on, as resolved by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
	pub link: Option<LinkTarget>,
	/// `data-*` attributes of the closest element carrying `data-track`.
	pub tracked_attributes: Option<Vec<(String, String)>>,
}

/// `window.onerror` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorEventData {
	pub message: String,
	pub filename: Option<String>,
	pub lineno: Option<u32>,
	pub colno: Option<u32>,
	pub stack: Option<String>,
	/// `error.name`, e.g. `TypeError`.
	pub error_name: Option<String>,
}

/// `unhandledrejection` reason.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
	/// An `Error` instance.
	Error {
		name: Option<String>,
		message: String,
		stack: Option<String>,
	},
	/// Anything else that was thrown.
	Value(Value),
}

/// A browser event forwarded to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
	PushState,
	ReplaceState,
	/// Synthetic: the URL changed through the History API.
	LocationChange,
	PopState,
	HashChange,
	VisibilityChange(Visibility),
	PageHide,
	BeforeUnload,
	PageShow { persisted: bool },
	Scroll(ScrollMetrics),
	Interaction(InteractionKind),
	Click(ClickTarget),
	Error(ErrorEventData),
	UnhandledRejection(RejectionReason),
	/// A web-vitals observer reported `metric` (`FCP`, `LCP`, `CLS`, `INP`, `TTFB`).
	WebVital { metric: String, value: f64 },
}

/// Discriminant of [`BrowserEvent`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
	PushState,
	ReplaceState,
	LocationChange,
	PopState,
	HashChange,
	VisibilityChange,
	PageHide,
	BeforeUnload,
	PageShow,
	Scroll,
	Interaction,
	Click,
	Error,
	UnhandledRejection,
	WebVital,
}

impl BrowserEvent {
	pub fn event_type(&self) -> EventType {
		match self {
			BrowserEvent::PushState => EventType::PushState,
			BrowserEvent::ReplaceState => EventType::ReplaceState,
			BrowserEvent::LocationChange => EventType::LocationChange,
			BrowserEvent::PopState => EventType::PopState,
			BrowserEvent::HashChange => EventType::HashChange,
			BrowserEvent::VisibilityChange(_) => EventType::VisibilityChange,
			BrowserEvent::PageHide => EventType::PageHide,
			BrowserEvent::BeforeUnload => EventType::BeforeUnload,
			BrowserEvent::PageShow { .. } => EventType::PageShow,
			BrowserEvent::Scroll(_) => EventType::Scroll,
			BrowserEvent::Interaction(_) => EventType::Interaction,
			BrowserEvent::Click(_) => EventType::Click,
			BrowserEvent::Error(_) => EventType::Error,
			BrowserEvent::UnhandledRejection(_) => EventType::UnhandledRejection,
			BrowserEvent::WebVital { .. } => EventType::WebVital,
		}
	}
}

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&BrowserEvent) + Send + Sync>;

struct Registration {
	event_type: EventType,
	listener: Listener,
	once: bool,
}

#[derive(Default)]
struct BusState {
	next_id: u64,
	listeners: BTreeMap<ListenerId, Registration>,
}

/// Listener registry keyed by [`EventType`].
///
/// Listeners run in registration order with the registry unlocked, so a
/// listener may emit further events or register and remove listeners.
#[derive(Default)]
pub struct EventBus {
	state: Mutex<BusState>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_listener<F>(&self, event_type: EventType, listener: F) -> ListenerId
	where
		F: Fn(&BrowserEvent) + Send + Sync + 'static,
	{
		self.register(event_type, Arc::new(listener), false)
	}

	/// Registers a listener removed after its first call.
	pub fn add_once<F>(&self, event_type: EventType, listener: F) -> ListenerId
	where
		F: Fn(&BrowserEvent) + Send + Sync + 'static,
	{
		self.register(event_type, Arc::new(listener), true)
	}

	fn register(&self, event_type: EventType, listener: Listener, once: bool) -> ListenerId {
		let mut state = self.state.lock();
		state.next_id += 1;
		let id = ListenerId(state.next_id);
		state.listeners.insert(
			id,
			Registration {
				event_type,
				listener,
				once,
			},
		);
		id
	}

	/// Returns false when the listener was already gone.
	pub fn remove(&self, id: ListenerId) -> bool {
		self.state.lock().listeners.remove(&id).is_some()
	}

	pub fn remove_all(&self, ids: impl IntoIterator<Item = ListenerId>) {
		let mut state = self.state.lock();
		for id in ids {
			state.listeners.remove(&id);
		}
	}

	pub fn len(&self) -> usize {
		self.state.lock().listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn emit(&self, event: &BrowserEvent) {
		let event_type = event.event_type();
		let listeners: Vec<Listener> = {
			let mut state = self.state.lock();
			let mut listeners = Vec::new();
			let mut fired_once = Vec::new();
			for (id, registration) in state.listeners.iter() {
				if registration.event_type != event_type {
					continue;
				}
				listeners.push(Arc::clone(&registration.listener));
				if registration.once {
					fired_once.push(*id);
				}
			}
			for id in fired_once {
				state.listeners.remove(&id);
			}
			listeners
		};

		for listener in listeners {
			listener(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn test_listeners_receive_matching_events_only() {
		let bus = EventBus::new();
		let scrolls = Arc::new(AtomicUsize::new(0));
		let s = scrolls.clone();
		bus.add_listener(EventType::Scroll, move |_| {
			s.fetch_add(1, Ordering::SeqCst);
		});

		bus.emit(&BrowserEvent::Scroll(ScrollMetrics {
			scroll_top: 0.0,
			scroll_height: 100.0,
			client_height: 100.0,
		}));
		bus.emit(&BrowserEvent::PageHide);

		assert_eq!(scrolls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_removed_listener_is_not_called() {
		let bus = EventBus::new();
		let calls = Arc::new(AtomicUsize::new(0));
		let c = calls.clone();
		let id = bus.add_listener(EventType::PageHide, move |_| {
			c.fetch_add(1, Ordering::SeqCst);
		});

		assert!(bus.remove(id));
		assert!(!bus.remove(id));
		bus.emit(&BrowserEvent::PageHide);
		assert_eq!(calls.load(Ordering::SeqCst), 0);
		assert!(bus.is_empty());
	}

	#[test]
	fn test_once_listener_fires_once() {
		let bus = EventBus::new();
		let calls = Arc::new(AtomicUsize::new(0));
		let c = calls.clone();
		bus.add_once(EventType::Interaction, move |_| {
			c.fetch_add(1, Ordering::SeqCst);
		});

		bus.emit(&BrowserEvent::Interaction(InteractionKind::KeyDown));
		bus.emit(&BrowserEvent::Interaction(InteractionKind::KeyDown));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(bus.is_empty());
	}

	#[test]
	fn test_listener_may_emit_reentrantly() {
		let bus = Arc::new(EventBus::new());
		let changes = Arc::new(AtomicUsize::new(0));

		let weak = Arc::downgrade(&bus);
		bus.add_listener(EventType::PopState, move |_| {
			if let Some(bus) = weak.upgrade() {
				bus.emit(&BrowserEvent::LocationChange);
			}
		});
		let c = changes.clone();
		bus.add_listener(EventType::LocationChange, move |_| {
			c.fetch_add(1, Ordering::SeqCst);
		});

		bus.emit(&BrowserEvent::PopState);
		assert_eq!(changes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_event_type_discriminant() {
		assert_eq!(
			BrowserEvent::PageShow { persisted: true }.event_type(),
			EventType::PageShow
		);
		assert_eq!(
			BrowserEvent::WebVital {
				metric: "LCP".to_string(),
				value: 1.0
			}
			.event_type(),
			EventType::WebVital
		);
	}
}
