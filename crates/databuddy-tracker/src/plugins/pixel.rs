// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Image-pixel transport for pages where `fetch` is blocked.
//!
//! Images cannot carry headers, so the client id and SDK identity travel in
//! the query string next to the flattened event.

use std::sync::Arc;

use databuddy_tracker_core::{
	flatten_query_params, pixel_url, ConfigError, Endpoint, TrackerEvent, TrackerOptions,
};
use url::Url;

use crate::error::Result;
use crate::tracker::BaseTracker;

/// Switches `tracker` to pixel delivery. Batching is turned off because a
/// batch does not fit in a GET URL.
pub fn install(tracker: &Arc<BaseTracker>) {
	tracker.enable_pixel_mode();
}

/// `{api}/px.jpg?<event fields>&client_id=..&sdk_name=..&sdk_version=..`
pub fn pixel_request_url(options: &TrackerOptions, event: &TrackerEvent) -> Result<Url> {
	let base = Url::parse(&format!("{}{}", options.api_url, Endpoint::Pixel.path()))
		.map_err(|e| ConfigError::invalid_value("apiUrl", e.to_string()))?;

	let mut params = flatten_query_params(&event.to_json());
	params.push(("client_id".to_string(), options.client_id.clone()));
	params.push(("sdk_name".to_string(), options.sdk.clone()));
	params.push(("sdk_version".to_string(), options.sdk_version.clone()));
	Ok(pixel_url(&base, &params))
}
