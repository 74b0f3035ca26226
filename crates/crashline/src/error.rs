// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the crash reporter.

use thiserror::Error;

use crate::config::SecretEnvError;

/// Result type alias for reporter operations.
pub type Result<T> = std::result::Result<T, ReporterError>;

/// Errors that can occur while building a reporter or delivering a report.
///
/// Delivery errors never leave the worker; they are logged and dropped.
#[derive(Debug, Error)]
pub enum ReporterError {
	/// The request could not be sent (connection refused, DNS, timeout).
	#[error("HTTP request failed: {0}")]
	Transport(#[from] reqwest::Error),

	/// The server answered with a non-2xx status.
	#[error("HTTP {status}: {body}")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Response body text.
		body: String,
	},

	/// The session response was not valid JSON.
	#[error("malformed response: {0}")]
	MalformedResponse(#[source] serde_json::Error),

	/// The session response did not carry a usable `name`.
	#[error("session response is missing a `name` field")]
	MissingSessionName,

	/// A request body could not be encoded.
	#[error("serialization error: {0}")]
	Serialize(#[source] serde_json::Error),

	/// The HTTP client could not be constructed.
	#[error("failed to build HTTP client: {0}")]
	HttpClient(#[source] reqwest::Error),

	/// The worker runtime or thread could not be started.
	#[error("failed to start report worker: {0}")]
	WorkerSpawn(#[source] std::io::Error),

	/// A secret could not be loaded from the environment.
	#[error(transparent)]
	Env(#[from] SecretEnvError),
}
