// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff and jitter.
//!
//! The delay before retry `k` (zero based) is
//! `initial_delay * 2^k * jitter`, with `jitter` drawn uniformly from
//! `[jitter_min, jitter_max]`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that know whether a retry could succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() || self.is_request() {
			return true;
		}
		self
			.status()
			.map(|s| is_retryable_status(s.as_u16()))
			.unwrap_or(false)
	}
}

/// Returns true for statuses worth retrying: 429 and every 5xx.
pub fn is_retryable_status(status: u16) -> bool {
	status == 429 || (500..600).contains(&status)
}

/// Backoff configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
	/// Retries after the first attempt. Total attempts are `max_retries + 1`.
	pub max_retries: u32,
	/// Delay before the first retry, before jitter.
	pub initial_delay: Duration,
	pub jitter_min: f64,
	pub jitter_max: f64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_delay: Duration::from_millis(500),
			jitter_min: 0.85,
			jitter_max: 1.15,
		}
	}
}

impl RetryConfig {
	pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
		Self {
			max_retries,
			initial_delay,
			..Self::default()
		}
	}

	/// A configuration that never retries.
	pub fn disabled() -> Self {
		Self {
			max_retries: 0,
			..Self::default()
		}
	}

	/// Delay before retry `attempt` without jitter.
	pub fn base_delay(&self, attempt: u32) -> Duration {
		let factor = 2u32.saturating_pow(attempt);
		self.initial_delay.saturating_mul(factor)
	}

	/// Delay before retry `attempt` with jitter applied.
	pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
		self.base_delay(attempt).mul_f64(self.jitter_factor())
	}

	/// A uniform draw from `[jitter_min, jitter_max]`.
	pub fn jitter_factor(&self) -> f64 {
		self.jitter_min + fastrand::f64() * (self.jitter_max - self.jitter_min)
	}
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_retries` retries have been spent.
///
/// The last error is returned on exhaustion.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
	E: RetryableError + Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let mut attempt = 0u32;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_retryable() && attempt < config.max_retries => {
				let delay = config.delay_for_attempt(attempt);
				warn!(
					error = %e,
					attempt = attempt + 1,
					max_retries = config.max_retries,
					delay_ms = delay.as_millis() as u64,
					"Request failed, retrying"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => {
				if attempt > 0 {
					debug!(error = %e, attempts = attempt + 1, "Giving up after retries");
				}
				return Err(e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct TestError {
		retryable: bool,
	}

	impl Display for TestError {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			write!(f, "test error (retryable: {})", self.retryable)
		}
	}

	impl RetryableError for TestError {
		fn is_retryable(&self) -> bool {
			self.retryable
		}
	}

	#[test]
	fn retryable_statuses() {
		for status in [429, 500, 502, 503, 504, 599] {
			assert!(is_retryable_status(status), "{status} should be retryable");
		}
		for status in [200, 202, 400, 401, 403, 404, 422, 600] {
			assert!(!is_retryable_status(status), "{status} should not be retryable");
		}
	}

	#[test]
	fn base_delay_doubles() {
		let config = RetryConfig::new(5, Duration::from_millis(500));
		assert_eq!(config.base_delay(0), Duration::from_millis(500));
		assert_eq!(config.base_delay(1), Duration::from_millis(1000));
		assert_eq!(config.base_delay(2), Duration::from_millis(2000));
		assert_eq!(config.base_delay(3), Duration::from_millis(4000));
	}

	#[test]
	fn base_delay_saturates() {
		let config = RetryConfig::new(100, Duration::from_secs(1));
		assert_eq!(config.base_delay(64), Duration::from_secs(1).saturating_mul(u32::MAX));
	}

	#[tokio::test(start_paused = true)]
	async fn retries_until_exhausted() {
		let calls = AtomicU32::new(0);
		let config = RetryConfig::new(3, Duration::from_millis(10));

		let result: Result<(), TestError> = retry(&config, || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(TestError { retryable: true })
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 4);
	}

	#[tokio::test(start_paused = true)]
	async fn stops_on_non_retryable_error() {
		let calls = AtomicU32::new(0);
		let config = RetryConfig::default();

		let result: Result<(), TestError> = retry(&config, || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(TestError { retryable: false })
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn succeeds_after_transient_failures() {
		let calls = AtomicU32::new(0);
		let config = RetryConfig::default();

		let result: Result<u32, TestError> = retry(&config, || async {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			if n < 2 {
				Err(TestError { retryable: true })
			} else {
				Ok(n)
			}
		})
		.await;

		assert_eq!(result.unwrap(), 2);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn disabled_config_makes_one_attempt() {
		let calls = AtomicU32::new(0);
		let result: Result<(), TestError> = retry(&RetryConfig::disabled(), || async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(TestError { retryable: true })
		})
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn tokio_test_block_on_retry() {
		let config = RetryConfig::new(0, Duration::from_millis(1));
		let result: Result<u8, TestError> = tokio_test::block_on(retry(&config, || async { Ok(7) }));
		assert_eq!(result.unwrap(), 7);
	}

	proptest! {
		#[test]
		fn delay_stays_within_jitter_bounds(attempt in 0u32..8, initial_ms in 1u64..5_000) {
			let config = RetryConfig::new(8, Duration::from_millis(initial_ms));
			let base = config.base_delay(attempt).as_secs_f64();
			let delay = config.delay_for_attempt(attempt).as_secs_f64();
			prop_assert!(delay >= base * 0.85 - 1e-9);
			prop_assert!(delay <= base * 1.15 + 1e-9);
		}

		#[test]
		fn jitter_factor_in_range(_seed in 0u8..50) {
			let factor = RetryConfig::default().jitter_factor();
			prop_assert!((0.85..=1.15).contains(&factor));
		}
	}
}
