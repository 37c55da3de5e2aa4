// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page context attached to every event.
//!
//! Context is a snapshot taken at send time and never persisted: the URL,
//! title and viewport may all change between two events of the same page.

use serde::{Deserialize, Serialize};
use url::Url;

/// Viewports outside this range on either axis are treated as rendering
/// artifacts (embedded frames, headless browsers) and omitted.
pub const VIEWPORT_RANGE: std::ops::RangeInclusive<u32> = 240..=10_000;

/// Standard campaign parameters read from the page query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utm_source: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utm_medium: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utm_campaign: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utm_term: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub utm_content: Option<String>,
}

impl UtmParams {
	/// Reads the five UTM parameters; empty values count as absent.
	pub fn from_url(url: &Url) -> Self {
		let mut utm = Self::default();
		for (key, value) in url.query_pairs() {
			if value.is_empty() {
				continue;
			}
			let slot = match key.as_ref() {
				"utm_source" => &mut utm.utm_source,
				"utm_medium" => &mut utm.utm_medium,
				"utm_campaign" => &mut utm.utm_campaign,
				"utm_term" => &mut utm.utm_term,
				"utm_content" => &mut utm.utm_content,
				_ => continue,
			};
			if slot.is_none() {
				*slot = Some(value.into_owned());
			}
		}
		utm
	}
}

/// Page context snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
	/// origin + masked path + search + hash
	pub path: String,
	pub title: String,
	/// `"direct"` when the document has no referrer.
	pub referrer: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub viewport_size: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timezone: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub language: Option<String>,
	#[serde(flatten)]
	pub utm: UtmParams,
}

/// Raw page state read from the host for one snapshot.
#[derive(Debug, Clone)]
pub struct PageSnapshot<'a> {
	pub location: &'a Url,
	pub masked_path: &'a str,
	pub title: String,
	pub referrer: String,
	pub viewport: (u32, u32),
	pub timezone: Option<String>,
	pub language: Option<String>,
}

impl PageContext {
	pub fn capture(snapshot: PageSnapshot<'_>) -> Self {
		let location = snapshot.location;
		let path = format!(
			"{}{}{}{}",
			location.origin().ascii_serialization(),
			snapshot.masked_path,
			search(location),
			hash(location)
		);

		let referrer = if snapshot.referrer.is_empty() {
			"direct".to_string()
		} else {
			snapshot.referrer
		};

		Self {
			path,
			title: snapshot.title,
			referrer,
			viewport_size: viewport_size(snapshot.viewport.0, snapshot.viewport.1),
			timezone: snapshot.timezone,
			language: snapshot.language,
			utm: UtmParams::from_url(location),
		}
	}
}

/// Formats `{w}x{h}`, or `None` when either axis is implausible.
pub fn viewport_size(width: u32, height: u32) -> Option<String> {
	if VIEWPORT_RANGE.contains(&width) && VIEWPORT_RANGE.contains(&height) {
		Some(format!("{width}x{height}"))
	} else {
		None
	}
}

/// `location.search`: empty when there is no query or it is empty.
pub fn search(url: &Url) -> String {
	match url.query() {
		Some(q) if !q.is_empty() => format!("?{q}"),
		_ => String::new(),
	}
}

/// `location.hash`: empty when there is no fragment or it is empty.
pub fn hash(url: &Url) -> String {
	match url.fragment() {
		Some(f) if !f.is_empty() => format!("#{f}"),
		_ => String::new(),
	}
}

/// True when two URLs differ only in their fragment.
pub fn is_hash_only_change(previous: &Url, current: &Url) -> bool {
	previous.origin() == current.origin()
		&& previous.path() == current.path()
		&& search(previous) == search(current)
		&& hash(previous) != hash(current)
}
