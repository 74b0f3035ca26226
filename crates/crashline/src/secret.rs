// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key wrapper that keeps the key out of logs.
//!
//! ```
//! use crashline::ApiKey;
//!
//! let key = ApiKey::parse("k1").unwrap();
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(format!("{key:?}"), "ApiKey(\"[REDACTED]\")");
//! assert_eq!(key.expose(), "k1");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// The placeholder printed instead of the key.
pub const REDACTED: &str = "[REDACTED]";

/// An API key for the session endpoint.
///
/// Debug and Display are redacted, the memory is zeroed on drop, and the
/// raw value is only reachable through [`ApiKey::expose`].
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct ApiKey {
	inner: String,
}

impl ApiKey {
	/// Wraps a key, rejecting blank input.
	///
	/// Surrounding whitespace is trimmed, so a key read from a file or an
	/// environment variable with a stray newline still works.
	pub fn parse(value: impl AsRef<str>) -> Option<Self> {
		let trimmed = value.as_ref().trim();
		if trimmed.is_empty() {
			return None;
		}
		Some(Self {
			inner: trimmed.to_string(),
		})
	}

	/// Explicitly access the raw key.
	pub fn expose(&self) -> &str {
		&self.inner
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}
