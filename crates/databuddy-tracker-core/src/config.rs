// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker options and their layered sources.
//!
//! Options are assembled once at construction. Each source produces a
//! [`TrackerConfigLayer`] where every field is optional; layers are merged in
//! [`Precedence`] order (later overrides earlier) and finalized into
//! [`TrackerOptions`] with defaults applied:
//!
//! global config object < script `src` query < script `data-*` attributes < explicit options

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ConfigError;
use crate::event::TrackerEvent;

pub const DEFAULT_API_URL: &str = "https://basket.databuddy.cc";
pub const DEFAULT_SDK_NAME: &str = "web";
pub const DEFAULT_SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Custom predicate deciding whether an event is delivered.
pub type EventFilter = Arc<dyn Fn(&TrackerEvent) -> bool + Send + Sync>;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	GlobalObject = 10,
	ScriptQuery = 20,
	ScriptAttributes = 30,
	Explicit = 40,
}

/// One configuration source with every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfigLayer {
	pub client_id: Option<String>,
	pub api_url: Option<String>,
	pub disabled: Option<bool>,
	pub debug: Option<bool>,
	pub sdk: Option<String>,
	pub sdk_version: Option<String>,
	pub track_hash_changes: Option<bool>,
	pub track_attributes: Option<bool>,
	pub track_outgoing_links: Option<bool>,
	pub track_interactions: Option<bool>,
	pub track_scroll_depth: Option<bool>,
	pub track_web_vitals: Option<bool>,
	pub track_errors: Option<bool>,
	pub track_performance: Option<bool>,
	pub use_pixel: Option<bool>,
	pub ignore_bot_detection: Option<bool>,
	pub sampling_rate: Option<f64>,
	pub enable_retries: Option<bool>,
	pub max_retries: Option<u32>,
	/// Milliseconds.
	pub initial_retry_delay: Option<u64>,
	pub enable_batching: Option<bool>,
	pub batch_size: Option<usize>,
	/// Milliseconds.
	pub batch_timeout: Option<u64>,
	pub max_queue_size: Option<usize>,
	pub skip_patterns: Option<Vec<String>>,
	pub mask_patterns: Option<Vec<String>>,
}

macro_rules! merge_fields {
	($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
		$(
			if $other.$field.is_some() {
				$self.$field = $other.$field;
			}
		)+
	};
}

impl TrackerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_fields!(
			self,
			other,
			client_id,
			api_url,
			disabled,
			debug,
			sdk,
			sdk_version,
			track_hash_changes,
			track_attributes,
			track_outgoing_links,
			track_interactions,
			track_scroll_depth,
			track_web_vitals,
			track_errors,
			track_performance,
			use_pixel,
			ignore_bot_detection,
			sampling_rate,
			enable_retries,
			max_retries,
			initial_retry_delay,
			enable_batching,
			batch_size,
			batch_timeout,
			max_queue_size,
			skip_patterns,
			mask_patterns,
		);
	}

	/// Parses a global config object such as `window.databuddyConfig`.
	pub fn from_json(value: Value) -> Result<Self, ConfigError> {
		serde_json::from_value(value).map_err(|source| ConfigError::Json {
			field: "databuddyConfig".to_string(),
			source,
		})
	}

	/// Parses string key/value pairs from script attributes or query parameters.
	///
	/// Keys are normalized first (`data-track-errors` → `trackErrors`);
	/// unknown keys are ignored.
	pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut layer = Self::default();
		for (key, value) in pairs {
			let key = normalize_key(key.as_ref());
			let value = value.as_ref();
			match key.as_str() {
				"clientId" => layer.client_id = non_empty(value),
				"apiUrl" => layer.api_url = non_empty(value),
				"sdk" => layer.sdk = non_empty(value),
				"sdkVersion" => layer.sdk_version = non_empty(value),
				"disabled" => layer.disabled = Some(parse_bool(&key, value)?),
				"debug" => layer.debug = Some(parse_bool(&key, value)?),
				"trackHashChanges" => layer.track_hash_changes = Some(parse_bool(&key, value)?),
				"trackAttributes" => layer.track_attributes = Some(parse_bool(&key, value)?),
				"trackOutgoingLinks" => {
					layer.track_outgoing_links = Some(parse_bool(&key, value)?)
				}
				"trackInteractions" => layer.track_interactions = Some(parse_bool(&key, value)?),
				"trackScrollDepth" => layer.track_scroll_depth = Some(parse_bool(&key, value)?),
				"trackWebVitals" => layer.track_web_vitals = Some(parse_bool(&key, value)?),
				"trackErrors" => layer.track_errors = Some(parse_bool(&key, value)?),
				"trackPerformance" => layer.track_performance = Some(parse_bool(&key, value)?),
				"usePixel" => layer.use_pixel = Some(parse_bool(&key, value)?),
				"ignoreBotDetection" => {
					layer.ignore_bot_detection = Some(parse_bool(&key, value)?)
				}
				"enableRetries" => layer.enable_retries = Some(parse_bool(&key, value)?),
				"enableBatching" => layer.enable_batching = Some(parse_bool(&key, value)?),
				"samplingRate" => layer.sampling_rate = Some(parse_number(&key, value)?),
				"maxRetries" => layer.max_retries = Some(parse_number(&key, value)?),
				"initialRetryDelay" => layer.initial_retry_delay = Some(parse_number(&key, value)?),
				"batchSize" => layer.batch_size = Some(parse_number(&key, value)?),
				"batchTimeout" => layer.batch_timeout = Some(parse_number(&key, value)?),
				"maxQueueSize" => layer.max_queue_size = Some(parse_number(&key, value)?),
				"skipPatterns" => layer.skip_patterns = Some(parse_patterns(&key, value)?),
				"maskPatterns" => layer.mask_patterns = Some(parse_patterns(&key, value)?),
				_ => {}
			}
		}
		Ok(layer)
	}

	/// Parses the query string of the loader script's `src`.
	pub fn from_script_src(src: &str) -> Result<Self, ConfigError> {
		let url = Url::parse(src).map_err(|e| ConfigError::invalid_value("src", e.to_string()))?;
		Self::from_pairs(url.query_pairs())
	}

	pub fn finalize(self) -> Result<TrackerOptions, ConfigError> {
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or_else(|| ConfigError::missing_field("clientId"))?;

		let api_url = self
			.api_url
			.unwrap_or_else(|| DEFAULT_API_URL.to_string())
			.trim_end_matches('/')
			.to_string();
		Url::parse(&api_url).map_err(|e| ConfigError::invalid_value("apiUrl", e.to_string()))?;

		let sampling_rate = self.sampling_rate.unwrap_or(1.0);
		if sampling_rate.is_nan() {
			return Err(ConfigError::invalid_value("samplingRate", "NaN"));
		}

		Ok(TrackerOptions {
			client_id,
			api_url,
			disabled: self.disabled.unwrap_or(false),
			debug: self.debug.unwrap_or(false),
			sdk: self.sdk.unwrap_or_else(|| DEFAULT_SDK_NAME.to_string()),
			sdk_version: self
				.sdk_version
				.unwrap_or_else(|| DEFAULT_SDK_VERSION.to_string()),
			track_hash_changes: self.track_hash_changes.unwrap_or(false),
			track_attributes: self.track_attributes.unwrap_or(false),
			track_outgoing_links: self.track_outgoing_links.unwrap_or(false),
			track_interactions: self.track_interactions.unwrap_or(false),
			track_scroll_depth: self.track_scroll_depth.unwrap_or(false),
			track_web_vitals: self.track_web_vitals.unwrap_or(false),
			track_errors: self.track_errors.unwrap_or(false),
			track_performance: self.track_performance.unwrap_or(true),
			use_pixel: self.use_pixel.unwrap_or(false),
			ignore_bot_detection: self.ignore_bot_detection.unwrap_or(false),
			sampling_rate: sampling_rate.clamp(0.0, 1.0),
			enable_retries: self.enable_retries.unwrap_or(true),
			max_retries: self.max_retries.unwrap_or(3),
			initial_retry_delay: Duration::from_millis(self.initial_retry_delay.unwrap_or(500)),
			enable_batching: self.enable_batching.unwrap_or(true),
			batch_size: self.batch_size.unwrap_or(10).clamp(1, 50),
			batch_timeout: Duration::from_millis(self.batch_timeout.unwrap_or(2000).clamp(100, 30_000)),
			max_queue_size: self.max_queue_size.unwrap_or(1000).max(1),
			skip_patterns: self.skip_patterns.unwrap_or_default(),
			mask_patterns: self.mask_patterns.unwrap_or_default(),
			filter: None,
		})
	}
}

/// Raw configuration as found by the loader.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
	/// A global config object (`window.databuddyConfig`).
	pub global: Option<Value>,
	/// The loader script's `src` attribute.
	pub script_src: Option<String>,
	/// Every attribute on the loader script tag.
	pub script_attributes: Vec<(String, String)>,
}

impl ConfigSources {
	/// Loads every source in precedence order.
	pub fn layers(&self) -> Result<Vec<(Precedence, TrackerConfigLayer)>, ConfigError> {
		let mut layers = Vec::new();
		if let Some(global) = &self.global {
			layers.push((
				Precedence::GlobalObject,
				TrackerConfigLayer::from_json(global.clone())?,
			));
		}
		if let Some(src) = &self.script_src {
			layers.push((Precedence::ScriptQuery, TrackerConfigLayer::from_script_src(src)?));
		}
		let data_attributes = self
			.script_attributes
			.iter()
			.filter(|(name, _)| name.starts_with("data-"));
		layers.push((
			Precedence::ScriptAttributes,
			TrackerConfigLayer::from_pairs(data_attributes.map(|(k, v)| (k.as_str(), v.as_str())))?,
		));
		layers.sort_by_key(|(precedence, _)| *precedence);
		Ok(layers)
	}

	/// Merges every source plus `explicit`, which overrides all of them.
	pub fn resolve(&self, explicit: Option<TrackerConfigLayer>) -> Result<TrackerOptions, ConfigError> {
		let mut merged = TrackerConfigLayer::default();
		for (_, layer) in self.layers()? {
			merged.merge(layer);
		}
		if let Some(explicit) = explicit {
			merged.merge(explicit);
		}
		merged.finalize()
	}
}

/// Final tracker options.
#[derive(Clone)]
pub struct TrackerOptions {
	pub client_id: String,
	/// Base URL without a trailing slash.
	pub api_url: String,
	pub disabled: bool,
	pub debug: bool,
	pub sdk: String,
	pub sdk_version: String,
	pub track_hash_changes: bool,
	pub track_attributes: bool,
	pub track_outgoing_links: bool,
	pub track_interactions: bool,
	pub track_scroll_depth: bool,
	pub track_web_vitals: bool,
	pub track_errors: bool,
	pub track_performance: bool,
	pub use_pixel: bool,
	pub ignore_bot_detection: bool,
	/// Probability in `[0, 1]` that an event is kept.
	pub sampling_rate: f64,
	pub enable_retries: bool,
	pub max_retries: u32,
	pub initial_retry_delay: Duration,
	pub enable_batching: bool,
	pub batch_size: usize,
	pub batch_timeout: Duration,
	pub max_queue_size: usize,
	pub skip_patterns: Vec<String>,
	pub mask_patterns: Vec<String>,
	pub filter: Option<EventFilter>,
}

impl std::fmt::Debug for TrackerOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TrackerOptions")
			.field("client_id", &self.client_id)
			.field("api_url", &self.api_url)
			.field("disabled", &self.disabled)
			.field("sampling_rate", &self.sampling_rate)
			.field("enable_batching", &self.enable_batching)
			.field("batch_size", &self.batch_size)
			.field("batch_timeout", &self.batch_timeout)
			.field("max_retries", &self.max_retries)
			.field("use_pixel", &self.use_pixel)
			.field("skip_patterns", &self.skip_patterns)
			.field("mask_patterns", &self.mask_patterns)
			.field("filter", &self.filter.as_ref().map(|_| "<fn>"))
			.finish_non_exhaustive()
	}
}

impl TrackerOptions {
	pub fn builder(client_id: impl Into<String>) -> TrackerOptionsBuilder {
		TrackerOptionsBuilder::new(client_id)
	}

	/// Maximum retries actually used by the delivery client.
	pub fn effective_max_retries(&self) -> u32 {
		if self.enable_retries {
			self.max_retries
		} else {
			0
		}
	}
}

/// Builder for explicitly constructed trackers.
///
/// Values set here override every loader source.
pub struct TrackerOptionsBuilder {
	layer: TrackerConfigLayer,
	filter: Option<EventFilter>,
}

impl TrackerOptionsBuilder {
	pub fn new(client_id: impl Into<String>) -> Self {
		Self {
			layer: TrackerConfigLayer {
				client_id: Some(client_id.into()),
				..Default::default()
			},
			filter: None,
		}
	}

	pub fn api_url(mut self, url: impl Into<String>) -> Self {
		self.layer.api_url = Some(url.into());
		self
	}

	pub fn disabled(mut self, disabled: bool) -> Self {
		self.layer.disabled = Some(disabled);
		self
	}

	pub fn debug(mut self, debug: bool) -> Self {
		self.layer.debug = Some(debug);
		self
	}

	pub fn sampling_rate(mut self, rate: f64) -> Self {
		self.layer.sampling_rate = Some(rate);
		self
	}

	pub fn enable_batching(mut self, enabled: bool) -> Self {
		self.layer.enable_batching = Some(enabled);
		self
	}

	pub fn batch_size(mut self, size: usize) -> Self {
		self.layer.batch_size = Some(size);
		self
	}

	pub fn batch_timeout(mut self, timeout: Duration) -> Self {
		self.layer.batch_timeout = Some(timeout.as_millis() as u64);
		self
	}

	pub fn max_queue_size(mut self, size: usize) -> Self {
		self.layer.max_queue_size = Some(size);
		self
	}

	pub fn enable_retries(mut self, enabled: bool) -> Self {
		self.layer.enable_retries = Some(enabled);
		self
	}

	pub fn max_retries(mut self, retries: u32) -> Self {
		self.layer.max_retries = Some(retries);
		self
	}

	pub fn initial_retry_delay(mut self, delay: Duration) -> Self {
		self.layer.initial_retry_delay = Some(delay.as_millis() as u64);
		self
	}

	pub fn track_hash_changes(mut self, enabled: bool) -> Self {
		self.layer.track_hash_changes = Some(enabled);
		self
	}

	pub fn track_attributes(mut self, enabled: bool) -> Self {
		self.layer.track_attributes = Some(enabled);
		self
	}

	pub fn track_outgoing_links(mut self, enabled: bool) -> Self {
		self.layer.track_outgoing_links = Some(enabled);
		self
	}

	pub fn track_interactions(mut self, enabled: bool) -> Self {
		self.layer.track_interactions = Some(enabled);
		self
	}

	pub fn track_scroll_depth(mut self, enabled: bool) -> Self {
		self.layer.track_scroll_depth = Some(enabled);
		self
	}

	pub fn track_web_vitals(mut self, enabled: bool) -> Self {
		self.layer.track_web_vitals = Some(enabled);
		self
	}

	pub fn track_errors(mut self, enabled: bool) -> Self {
		self.layer.track_errors = Some(enabled);
		self
	}

	pub fn use_pixel(mut self, enabled: bool) -> Self {
		self.layer.use_pixel = Some(enabled);
		self
	}

	pub fn ignore_bot_detection(mut self, ignore: bool) -> Self {
		self.layer.ignore_bot_detection = Some(ignore);
		self
	}

	pub fn skip_patterns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
		self.layer.skip_patterns = Some(patterns.into_iter().map(Into::into).collect());
		self
	}

	pub fn mask_patterns<I: IntoIterator<Item = S>, S: Into<String>>(mut self, patterns: I) -> Self {
		self.layer.mask_patterns = Some(patterns.into_iter().map(Into::into).collect());
		self
	}

	pub fn filter<F>(mut self, filter: F) -> Self
	where
		F: Fn(&TrackerEvent) -> bool + Send + Sync + 'static,
	{
		self.filter = Some(Arc::new(filter));
		self
	}

	/// The explicit layer, for merging over loader sources.
	pub fn layer(&self) -> &TrackerConfigLayer {
		&self.layer
	}

	pub fn build(self) -> Result<TrackerOptions, ConfigError> {
		self.build_over(&ConfigSources::default())
	}

	/// Builds with loader `sources` underneath the explicit values.
	pub fn build_over(self, sources: &ConfigSources) -> Result<TrackerOptions, ConfigError> {
		let mut options = sources.resolve(Some(self.layer))?;
		options.filter = self.filter;
		Ok(options)
	}
}

/// `data-track-web-vitals` → `trackWebVitals`, `client_id` → `clientId`.
fn normalize_key(key: &str) -> String {
	let key = key.strip_prefix("data-").unwrap_or(key);
	let mut out = String::with_capacity(key.len());
	let mut upper = false;
	for c in key.chars() {
		if c == '-' || c == '_' {
			upper = true;
		} else if upper {
			out.extend(c.to_uppercase());
			upper = false;
		} else {
			out.push(c);
		}
	}
	out
}

fn non_empty(value: &str) -> Option<String> {
	let value = value.trim();
	(!value.is_empty()).then(|| value.to_string())
}

/// A bare attribute (`data-track-errors` with no value) counts as true.
fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
	match value.trim().to_ascii_lowercase().as_str() {
		"" | "true" | "1" | "yes" => Ok(true),
		"false" | "0" | "no" => Ok(false),
		other => Err(ConfigError::invalid_value(
			field,
			format!("expected a boolean, got {other:?}"),
		)),
	}
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
	value
		.trim()
		.parse()
		.map_err(|_| ConfigError::invalid_value(field, format!("expected a number, got {value:?}")))
}

fn parse_patterns(field: &str, value: &str) -> Result<Vec<String>, ConfigError> {
	serde_json::from_str(value).map_err(|source| ConfigError::Json {
		field: field.to_string(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn defaults_apply() {
		let options = TrackerOptions::builder("client-1").build().unwrap();
		assert_eq!(options.api_url, DEFAULT_API_URL);
		assert_eq!(options.sdk, "web");
		assert!(options.enable_batching);
		assert_eq!(options.batch_size, 10);
		assert_eq!(options.batch_timeout, Duration::from_millis(2000));
		assert_eq!(options.max_retries, 3);
		assert_eq!(options.initial_retry_delay, Duration::from_millis(500));
		assert_eq!(options.sampling_rate, 1.0);
		assert!(options.track_performance);
		assert!(!options.track_errors);
		assert!(options.filter.is_none());
	}

	#[test]
	fn missing_client_id_is_rejected() {
		let err = TrackerConfigLayer::default().finalize().unwrap_err();
		assert!(matches!(err, ConfigError::MissingField(ref f) if f == "clientId"));
		assert!(TrackerOptions::builder("  ").build().is_err());
	}

	#[test]
	fn invalid_api_url_is_rejected() {
		let err = TrackerOptions::builder("c").api_url("not a url").build().unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn api_url_trailing_slash_is_trimmed() {
		let options = TrackerOptions::builder("c")
			.api_url("https://collector.example.com/")
			.build()
			.unwrap();
		assert_eq!(options.api_url, "https://collector.example.com");
	}

	#[test]
	fn values_are_clamped() {
		let options = TrackerOptions::builder("c")
			.sampling_rate(4.0)
			.batch_size(500)
			.batch_timeout(Duration::from_millis(5))
			.build()
			.unwrap();
		assert_eq!(options.sampling_rate, 1.0);
		assert_eq!(options.batch_size, 50);
		assert_eq!(options.batch_timeout, Duration::from_millis(100));
	}

	#[test]
	fn retries_can_be_disabled() {
		let options = TrackerOptions::builder("c").enable_retries(false).build().unwrap();
		assert_eq!(options.effective_max_retries(), 0);
	}

	#[test]
	fn attribute_keys_are_normalized() {
		assert_eq!(normalize_key("data-client-id"), "clientId");
		assert_eq!(normalize_key("data-track-web-vitals"), "trackWebVitals");
		assert_eq!(normalize_key("sampling_rate"), "samplingRate");
		assert_eq!(normalize_key("apiUrl"), "apiUrl");
	}

	#[test]
	fn attributes_parse_into_layer() {
		let layer = TrackerConfigLayer::from_pairs([
			("data-client-id", "abc"),
			("data-track-errors", ""),
			("data-track-web-vitals", "false"),
			("data-sampling-rate", "0.25"),
			("data-batch-size", "5"),
			("data-skip-patterns", r#"["/admin/*"]"#),
			("data-unknown", "ignored"),
		])
		.unwrap();
		assert_eq!(layer.client_id.as_deref(), Some("abc"));
		assert_eq!(layer.track_errors, Some(true));
		assert_eq!(layer.track_web_vitals, Some(false));
		assert_eq!(layer.sampling_rate, Some(0.25));
		assert_eq!(layer.batch_size, Some(5));
		assert_eq!(layer.skip_patterns, Some(vec!["/admin/*".to_string()]));
	}

	#[test]
	fn invalid_attribute_values_are_errors() {
		assert!(TrackerConfigLayer::from_pairs([("data-batch-size", "lots")]).is_err());
		assert!(TrackerConfigLayer::from_pairs([("data-debug", "maybe")]).is_err());
		assert!(TrackerConfigLayer::from_pairs([("data-mask-patterns", "/users/*")]).is_err());
	}

	#[test]
	fn precedence_attributes_over_query_over_global() {
		let sources = ConfigSources {
			global: Some(json!({
				"clientId": "from-global",
				"apiUrl": "https://global.example.com",
				"batchSize": 3,
				"trackErrors": true
			})),
			script_src: Some(
				"https://cdn.databuddy.cc/databuddy.js?clientId=from-query&apiUrl=https://query.example.com"
					.to_string(),
			),
			script_attributes: vec![
				("src".to_string(), "ignored".to_string()),
				("data-client-id".to_string(), "from-attr".to_string()),
			],
		};

		let options = sources.resolve(None).unwrap();
		assert_eq!(options.client_id, "from-attr");
		assert_eq!(options.api_url, "https://query.example.com");
		assert_eq!(options.batch_size, 3);
		assert!(options.track_errors);
	}

	#[test]
	fn explicit_options_override_every_source() {
		let sources = ConfigSources {
			script_attributes: vec![
				("data-client-id".to_string(), "from-attr".to_string()),
				("data-sampling-rate".to_string(), "0.1".to_string()),
			],
			..Default::default()
		};
		let options = TrackerOptions::builder("explicit")
			.filter(|_| true)
			.build_over(&sources)
			.unwrap();
		assert_eq!(options.client_id, "explicit");
		assert_eq!(options.sampling_rate, 0.1);
		assert!(options.filter.is_some());
	}

	#[test]
	fn merge_keeps_unset_fields() {
		let mut base = TrackerConfigLayer {
			batch_size: Some(4),
			debug: Some(true),
			..Default::default()
		};
		base.merge(TrackerConfigLayer {
			batch_size: Some(8),
			..Default::default()
		});
		assert_eq!(base.batch_size, Some(8));
		assert_eq!(base.debug, Some(true));
	}

	proptest! {
		#[test]
		fn sampling_rate_always_in_unit_range(rate in -10.0f64..10.0) {
			let options = TrackerOptions::builder("c").sampling_rate(rate).build().unwrap();
			prop_assert!((0.0..=1.0).contains(&options.sampling_rate));
		}
	}
}
