// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Databuddy tracker.
//!
//! Everything here is free of I/O: event envelopes and their wire shape, page
//! context, identity newtypes, path skip/mask patterns, pixel query
//! flattening, and the layered tracker configuration.

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod identity;
pub mod patterns;
pub mod pixel;

pub use config::{
	ConfigSources, EventFilter, Precedence, TrackerConfigLayer, TrackerOptions,
	TrackerOptionsBuilder, DEFAULT_API_URL,
};
pub use context::{is_hash_only_change, viewport_size, PageContext, PageSnapshot, UtmParams};
pub use error::ConfigError;
pub use event::{
	CustomEvent, Endpoint, ErrorReport, EventEnvelope, EventKind, OutgoingLink, PageExit,
	ScreenView, TrackerEvent, VitalsReport,
};
pub use identity::{keys, session_expired, AnonymousId, SessionId, SESSION_TIMEOUT_MS};
pub use patterns::{is_skipped, mask_path, matches_skip_pattern};
pub use pixel::{flatten_query_params, pixel_url};
