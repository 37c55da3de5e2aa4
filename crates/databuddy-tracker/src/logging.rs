// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::EnvFilter;

const DEBUG_FILTER: &str = "databuddy_tracker=debug,databuddy_common_http=debug";
const DEFAULT_FILTER: &str = "warn";

/// Installs a `fmt` subscriber. `RUST_LOG` overrides the default filter.
///
/// Does nothing when the embedding application already installed one.
pub fn init_logging(debug: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));
	if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
		tracing::debug!("Global tracing subscriber already installed");
	}
}

fn default_filter(debug: bool) -> &'static str {
	if debug {
		DEBUG_FILTER
	} else {
		DEFAULT_FILTER
	}
}
