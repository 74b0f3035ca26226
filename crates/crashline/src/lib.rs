// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting that files every panic as a remote agent session.
//!
//! When a panic reaches the hook, the reporter captures the message and
//! backtrace and queues a report. A background worker then creates a
//! session for the configured repository and sends the trace into it as a
//! message. The panic hook that was registered before keeps running as
//! usual, and a failed report is logged and dropped.
//!
//! # Quick Start
//!
//! ```no_run
//! fn main() -> Result<(), crashline::ReporterError> {
//!     // Reads CRASHLINE_API_KEY, CRASHLINE_USER and CRASHLINE_SOURCE.
//!     let reporter = crashline::init()?;
//!
//!     // Recoverable errors can be reported too.
//!     if let Err(e) = std::fs::read_to_string("settings.toml") {
//!         reporter.report_error(&e);
//!     }
//!
//!     // Your application code here...
//!
//!     Ok(())
//! }
//! ```
//!
//! # Delivery
//!
//! - Reports are sent one at a time, in order, from a dedicated thread.
//! - Submitting never blocks; when the backlog is full the report is dropped.
//! - No retries. Failures are logged with `tracing` and discarded.
//! - Without an API key every call is a no-op.

mod config;
mod error;
mod event;
pub mod hook;
mod payload;
mod reporter;
mod secret;
mod trace;
mod transport;
mod worker;

#[cfg(test)]
mod test_support;

pub use config::{
	load_api_key_env, ReporterConfig, ReporterConfigBuilder, SecretEnvError, DEFAULT_BASE_URL,
	DEFAULT_INSTRUCTION, DEFAULT_MAX_TRACE_CHARS, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT,
	DEFAULT_USER, ENV_API_KEY, ENV_BASE_URL, ENV_SOURCE, ENV_USER, STARTING_BRANCH,
};
pub use error::{ReporterError, Result};
pub use event::{CrashEvent, PANIC_ERROR_TYPE};
pub use payload::{
	parse_session_name, CreateSessionRequest, GithubRepoContext, SendMessageRequest, SourceContext,
};
pub use reporter::CrashReporter;
pub use secret::{ApiKey, REDACTED};
pub use trace::{short_type_name, Frame, Stacktrace};
pub use transport::{user_agent, HttpTransport, Transport, API_KEY_HEADER, JSON_CONTENT_TYPE};
pub use worker::{Submission, WORKER_THREAD_NAME};

/// Builds a reporter from baked-in defaults and the environment, and
/// installs its panic hook.
pub fn init() -> Result<CrashReporter> {
	init_with(None, None, None)
}

/// Like [`init`], with explicit values that take precedence when non-blank.
pub fn init_with(
	api_key: Option<&str>,
	user: Option<&str>,
	source: Option<&str>,
) -> Result<CrashReporter> {
	let config = ReporterConfig::builder()
		.with_baked_defaults()
		.with_env()?
		.apply(api_key, user, source)
		.build();

	let reporter = CrashReporter::new(config)?;
	reporter.install_panic_hook();
	Ok(reporter)
}
