// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Databuddy web analytics tracker.
//!
//! The tracker records page views, custom events, engagement, web vitals and
//! uncaught errors from a page, and delivers them to the Databuddy collector.
//! The page itself is abstracted behind [`BrowserHost`]; DOM events are
//! forwarded as [`BrowserEvent`]s.
//!
//! # Features
//!
//! - **Identity**: anonymous visitor id and 30-minute sliding sessions
//! - **SPA navigation**: History API wrapping with debounced screen views
//! - **Batching**: size- and time-triggered `/batch` delivery with fallback
//! - **Unload safety**: beacon delivery of the queue and `page_exit` on hide
//! - **Plugins**: web vitals, errors, scroll depth, interactions, pixel mode
//!
//! # Example
//!
//! ```ignore
//! use databuddy_tracker::{Databuddy, Properties, ReqwestTransport, TrackerOptions};
//!
//! let options = TrackerOptions::builder("my-client-id")
//!     .track_web_vitals(true)
//!     .track_errors(true)
//!     .build()?;
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let tracker = Databuddy::init(host, options, transport);
//!
//! tracker.track("signup", Properties::new().insert("plan", "pro"));
//! tracker.dispatch(BrowserEvent::PageHide);
//! ```

mod batch;
mod client;
mod databuddy;
mod error;
mod events;
mod global;
mod host;
mod identity;
mod logging;
mod navigation;
pub mod plugins;
mod properties;
mod tracker;
mod transport;

#[cfg(test)]
mod testing;

pub use batch::{BatchConfig, BatchQueue, PushOutcome};
pub use client::{HeaderProvider, HttpClient, HttpClientConfig, PostOptions};
pub use databuddy::{Databuddy, BFCACHE_NAVIGATION};
pub use error::{HostError, Result, StorageError, TrackerError, TransportError};
pub use events::{
	BrowserEvent, ClickTarget, ErrorEventData, EventBus, EventType, InteractionKind, LinkTarget,
	Listener, ListenerId, RejectionReason, ScrollMetrics, Visibility,
};
pub use global::{
	clear_handle, handle, initialize, is_opted_out, opt_in, opt_out, DatabuddyApi, NoopApi,
};
pub use host::{
	AutomationSignals, Beacon, BrowserHost, HistoryHook, HistoryMethod, HistoryRestore,
	MemoryStorage, ServerHost, Storage,
};
pub use identity::IdentityStore;
pub use logging::init_logging;
pub use navigation::{Debouncer, NAVIGATION_DEBOUNCE};
pub use properties::Properties;
pub use tracker::{
	BaseTracker, DeliveryMode, EngagementState, RouteCallback, RouteSubscription, SendOptions,
};
pub use transport::{
	ReqwestTransport, Transport, TransportRequest, TransportResponse, DEFAULT_REQUEST_TIMEOUT,
};

// Re-export core types for convenience
pub use databuddy_tracker_core::{
	ConfigError, ConfigSources, Endpoint, EventFilter, EventKind, PageContext, TrackerConfigLayer,
	TrackerEvent, TrackerOptions, TrackerOptionsBuilder,
};
