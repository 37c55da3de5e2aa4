// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Path skip and mask patterns.
//!
//! Patterns are plain paths optionally containing a wildcard. Only the literal
//! prefix before the first `*` is compared; `/admin/*` and `/admin/**` both
//! match anything under `/admin/`. For masking, `**` collapses the whole
//! remainder while `*` replaces a single path segment.

/// Returns true when `pathname` is excluded from tracking by `pattern`.
pub fn matches_skip_pattern(pattern: &str, pathname: &str) -> bool {
	if pattern == pathname {
		return true;
	}
	match pattern.find('*') {
		Some(star) => pathname.starts_with(&pattern[..star]),
		None => false,
	}
}

/// Returns true when any pattern excludes `pathname`.
pub fn is_skipped<S: AsRef<str>>(patterns: &[S], pathname: &str) -> bool {
	patterns
		.iter()
		.any(|p| matches_skip_pattern(p.as_ref(), pathname))
}

/// Applies the first matching mask pattern to `pathname`.
///
/// ```
/// use databuddy_tracker_core::mask_path;
///
/// assert_eq!(mask_path(&["/users/*"], "/users/123/profile"), "/users/*/profile");
/// assert_eq!(mask_path(&["/users/**"], "/users/123/profile"), "/users/*");
/// ```
pub fn mask_path<S: AsRef<str>>(patterns: &[S], pathname: &str) -> String {
	for pattern in patterns {
		let pattern = pattern.as_ref();
		let Some(star) = pattern.find('*') else {
			continue;
		};

		let prefix = &pattern[..star];
		if !pathname.starts_with(prefix) {
			continue;
		}

		if pattern[star..].starts_with("**") {
			return format!("{prefix}*");
		}

		let remainder = &pathname[prefix.len()..];
		return match remainder.find('/') {
			Some(slash) => format!("{prefix}*{}", &remainder[slash..]),
			None => format!("{prefix}*"),
		};
	}
	pathname.to_string()
}
