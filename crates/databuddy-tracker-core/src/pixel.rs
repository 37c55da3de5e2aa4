// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Query-string encoding for the pixel transport.

use serde_json::Value;
use url::Url;

/// Flattens a JSON object into query parameters.
///
/// Scalars become their string form, nested objects and arrays are
/// JSON-encoded into a single value, and nulls are dropped. Non-object input
/// yields no parameters.
pub fn flatten_query_params(value: &Value) -> Vec<(String, String)> {
	let Value::Object(map) = value else {
		return Vec::new();
	};

	map.iter()
		.filter_map(|(key, value)| {
			let encoded = match value {
				Value::Null => return None,
				Value::String(s) => s.clone(),
				Value::Bool(b) => b.to_string(),
				Value::Number(n) => n.to_string(),
				Value::Array(_) | Value::Object(_) => value.to_string(),
			};
			Some((key.clone(), encoded))
		})
		.collect()
}

/// Appends `params` to `base` as a query string.
pub fn pixel_url(base: &Url, params: &[(String, String)]) -> Url {
	let mut url = base.clone();
	if !params.is_empty() {
		let mut pairs = url.query_pairs_mut();
		for (key, value) in params {
			pairs.append_pair(key, value);
		}
	}
	url
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn flattens_scalars_and_nested_values() {
		let params = flatten_query_params(&json!({
			"name": "screen_view",
			"page_count": 2,
			"engaged": true,
			"missing": null,
			"tags": ["a", "b"],
			"meta": {"k": 1}
		}));

		let get = |k: &str| params.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
		assert_eq!(get("name"), Some("screen_view"));
		assert_eq!(get("page_count"), Some("2"));
		assert_eq!(get("engaged"), Some("true"));
		assert_eq!(get("missing"), None);
		assert_eq!(get("tags"), Some(r#"["a","b"]"#));
		assert_eq!(get("meta"), Some(r#"{"k":1}"#));
	}

	#[test]
	fn non_object_has_no_params() {
		assert!(flatten_query_params(&json!([1, 2])).is_empty());
		assert!(flatten_query_params(&json!("x")).is_empty());
	}

	#[test]
	fn pixel_url_encodes_values() {
		let base = Url::parse("https://basket.databuddy.cc/px.jpg").unwrap();
		let url = pixel_url(
			&base,
			&[
				("name".to_string(), "a b".to_string()),
				("path".to_string(), "https://x.io/?q=1".to_string()),
			],
		);
		let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
		assert_eq!(pairs[0], ("name".to_string(), "a b".to_string()));
		assert_eq!(pairs[1], ("path".to_string(), "https://x.io/?q=1".to_string()));
		assert_eq!(url.path(), "/px.jpg");
	}
}
