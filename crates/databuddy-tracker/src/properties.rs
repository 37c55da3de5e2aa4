// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free-form properties attached to tracked events.

use serde_json::{Map, Value};

/// A builder for event properties.
///
/// # Example
///
/// ```
/// use databuddy_tracker::Properties;
///
/// let props = Properties::new()
///     .insert("plan", "pro")
///     .insert("seats", 5)
///     .insert("annual", true);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Merges `other` into this one; `other` wins on key collisions.
	pub fn merge(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	/// Properties from the `data-*` attributes of a `data-track` element.
	///
	/// `data-track` itself names the event and is skipped; every other
	/// attribute becomes a camelCase key (`data-plan-name` → `planName`).
	pub fn from_data_attributes<'a, I>(attributes: I) -> Self
	where
		I: IntoIterator<Item = (&'a str, &'a str)>,
	{
		let inner = attributes
			.into_iter()
			.filter_map(|(name, value)| {
				let key = name.strip_prefix("data-")?;
				if key == "track" || key.is_empty() {
					return None;
				}
				Some((camel_case(key), Value::String(value.to_string())))
			})
			.collect();
		Self { inner }
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.inner
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

fn camel_case(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	let mut upper = false;
	for c in key.chars() {
		if c == '-' {
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
