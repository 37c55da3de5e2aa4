// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event envelope and per-kind payloads.
//!
//! On the wire every event is a single flat JSON object: the envelope
//! (`eventId`, ids, `timestamp`, page context), the event `name`, the
//! kind-specific fields, and finally free-form properties. Later groups win
//! on key collisions, so caller properties can override anything.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::PageContext;

/// Ingestion endpoints relative to the configured API URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Single event envelope.
	Events,
	/// Array of event envelopes.
	Batch,
	Errors,
	Vitals,
	Outgoing,
	/// Image GET used by pixel mode.
	Pixel,
}

impl Endpoint {
	pub fn path(&self) -> &'static str {
		match self {
			Endpoint::Events => "/",
			Endpoint::Batch => "/batch",
			Endpoint::Errors => "/errors",
			Endpoint::Vitals => "/vitals",
			Endpoint::Outgoing => "/outgoing",
			Endpoint::Pixel => "/px.jpg",
		}
	}
}

impl std::fmt::Display for Endpoint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.path())
	}
}

/// Fields shared by every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
	pub event_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub anonymous_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_start_time: Option<i64>,
	/// Epoch milliseconds.
	pub timestamp: i64,
	#[serde(flatten)]
	pub context: PageContext,
}

impl EventEnvelope {
	/// Creates an envelope with a fresh v4 event id.
	pub fn new(
		anonymous_id: Option<String>,
		session_id: Option<String>,
		session_start_time: Option<i64>,
		timestamp: i64,
		context: PageContext,
	) -> Self {
		Self {
			event_id: Uuid::new_v4(),
			anonymous_id,
			session_id,
			session_start_time,
			timestamp,
			context,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenView {
	pub page_count: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub navigation_type: Option<String>,
}

/// Engagement summary for the page view that just ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageExit {
	/// Engaged seconds since the page view started.
	pub time_on_page: u64,
	pub max_scroll_depth: u8,
	pub interaction_count: u32,
	pub page_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
	pub name: String,
}

/// One consolidated web-vitals report per page lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsReport {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fcp: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lcp: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cls: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub inp: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttfb: Option<f64>,
}

impl VitalsReport {
	pub fn is_empty(&self) -> bool {
		self.fcp.is_none()
			&& self.lcp.is_none()
			&& self.cls.is_none()
			&& self.inp.is_none()
			&& self.ttfb.is_none()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub lineno: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub colno: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
	pub error_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingLink {
	pub href: String,
	pub text: String,
}

/// The kind of an event and its strongly-typed fields.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
	ScreenView(ScreenView),
	PageExit(PageExit),
	Custom(CustomEvent),
	Vitals(VitalsReport),
	Error(ErrorReport),
	OutgoingLink(OutgoingLink),
}

impl EventKind {
	pub fn custom(name: impl Into<String>) -> Self {
		EventKind::Custom(CustomEvent { name: name.into() })
	}

	pub fn name(&self) -> &str {
		match self {
			EventKind::ScreenView(_) => "screen_view",
			EventKind::PageExit(_) => "page_exit",
			EventKind::Custom(c) => &c.name,
			EventKind::Vitals(_) => "web_vitals",
			EventKind::Error(_) => "error",
			EventKind::OutgoingLink(_) => "outgoing_link",
		}
	}

	/// Endpoint used when the event is delivered on its own.
	pub fn endpoint(&self) -> Endpoint {
		match self {
			EventKind::ScreenView(_) | EventKind::PageExit(_) | EventKind::Custom(_) => {
				Endpoint::Events
			}
			EventKind::Vitals(_) => Endpoint::Vitals,
			EventKind::Error(_) => Endpoint::Errors,
			EventKind::OutgoingLink(_) => Endpoint::Outgoing,
		}
	}

	/// Only page-level events go through the `/` + `/batch` pipeline.
	pub fn is_batchable(&self) -> bool {
		self.endpoint() == Endpoint::Events
	}

	fn fields(&self) -> Map<String, Value> {
		let value = match self {
			EventKind::ScreenView(v) => serde_json::to_value(v),
			EventKind::PageExit(v) => serde_json::to_value(v),
			EventKind::Custom(_) => return Map::new(),
			EventKind::Vitals(v) => serde_json::to_value(v),
			EventKind::Error(v) => serde_json::to_value(v),
			EventKind::OutgoingLink(v) => serde_json::to_value(v),
		};
		match value {
			Ok(Value::Object(map)) => map,
			_ => Map::new(),
		}
	}
}

/// A fully-assembled event ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerEvent {
	pub envelope: EventEnvelope,
	pub kind: EventKind,
	pub properties: Map<String, Value>,
}

impl TrackerEvent {
	pub fn new(envelope: EventEnvelope, kind: EventKind) -> Self {
		Self {
			envelope,
			kind,
			properties: Map::new(),
		}
	}

	/// Merges `properties` over the existing ones.
	pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
		self.properties.extend(properties);
		self
	}

	pub fn name(&self) -> &str {
		self.kind.name()
	}

	pub fn event_id(&self) -> Uuid {
		self.envelope.event_id
	}

	/// Flat wire representation.
	pub fn to_json(&self) -> Value {
		let mut map = match serde_json::to_value(&self.envelope) {
			Ok(Value::Object(map)) => map,
			_ => Map::new(),
		};
		// Outgoing clicks and error reports carry no `name` on the wire.
		if !matches!(self.kind, EventKind::OutgoingLink(_) | EventKind::Error(_)) {
			map.insert("name".to_string(), Value::String(self.name().to_string()));
		}
		map.extend(self.kind.fields());
		map.extend(self.properties.clone());
		Value::Object(map)
	}
}

impl Serialize for TrackerEvent {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}
