// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reporter configuration.
//!
//! A [`ReporterConfig`] is assembled once at startup from up to three
//! layers, lowest precedence first:
//!
//! 1. values baked in at compile time ([`ReporterConfigBuilder::with_baked_defaults`]),
//! 2. the process environment ([`ReporterConfigBuilder::with_env`]),
//! 3. explicit builder calls.
//!
//! A layer only overrides the previous one when its value is non-blank.
//! The finished config is immutable and shared behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use thiserror::Error;

use crate::secret::ApiKey;

/// Default host for the session API.
pub const DEFAULT_BASE_URL: &str = "https://jules.googleapis.com";

/// Branch every session starts from.
pub const STARTING_BRANCH: &str = "main";

/// Policy text appended to every crash message unless overridden.
pub const DEFAULT_INSTRUCTION: &str = "You are required to get a perfect code review, no blocks or nitpicks allowed in it. \
	Then you must get a passing build with tests. \
	Once you have it, you must take the time to go get all of the documentation up to date before committing.";

/// User identifier used when none is configured.
pub const DEFAULT_USER: &str = "unknown";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of reports that may wait behind the one in flight.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default cap on the formatted trace, in characters.
pub const DEFAULT_MAX_TRACE_CHARS: usize = 200_000;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "CRASHLINE_API_KEY";
/// Environment variable holding the user identifier.
pub const ENV_USER: &str = "CRASHLINE_USER";
/// Environment variable holding the source repository identifier.
pub const ENV_SOURCE: &str = "CRASHLINE_SOURCE";
/// Environment variable overriding the API host.
pub const ENV_BASE_URL: &str = "CRASHLINE_BASE_URL";

/// Errors that can occur when loading secrets from environment variables.
#[derive(Debug, Error)]
pub enum SecretEnvError {
	/// Failed to read the secret file.
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The secret file path was empty.
	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load an API key using the `VAR` / `VAR_FILE` convention.
///
/// `{var}_FILE` wins over `{var}`. A single trailing newline is stripped
/// from file contents. Blank values count as unset.
pub fn load_api_key_env(var: &str) -> Result<Option<ApiKey>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;

		let value = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(ApiKey::parse(value));
	}

	Ok(env::var(var).ok().and_then(ApiKey::parse))
}

/// Immutable configuration for a [`CrashReporter`](crate::CrashReporter).
#[derive(Debug, Clone)]
pub struct ReporterConfig {
	api_key: Option<ApiKey>,
	user: String,
	source: String,
	base_url: String,
	instruction: String,
	request_timeout: Duration,
	queue_capacity: usize,
	max_trace_chars: usize,
	panic_flush_timeout: Option<Duration>,
}

impl ReporterConfig {
	/// Starts an empty builder (no key, default user, default host).
	pub fn builder() -> ReporterConfigBuilder {
		ReporterConfigBuilder::new()
	}

	/// The API key, if reporting is enabled.
	pub fn api_key(&self) -> Option<&ApiKey> {
		self.api_key.as_ref()
	}

	/// Whether an API key is configured.
	pub fn is_enabled(&self) -> bool {
		self.api_key.is_some()
	}

	pub fn user(&self) -> &str {
		&self.user
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	/// API host without a trailing slash.
	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	pub fn instruction(&self) -> &str {
		&self.instruction
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}

	pub fn queue_capacity(&self) -> usize {
		self.queue_capacity
	}

	pub fn max_trace_chars(&self) -> usize {
		self.max_trace_chars
	}

	/// How long the panic hook waits for the queue to drain, if at all.
	pub fn panic_flush_timeout(&self) -> Option<Duration> {
		self.panic_flush_timeout
	}

	/// `{base}/v1alpha/sessions`
	pub fn sessions_url(&self) -> String {
		format!("{}/v1alpha/sessions", self.base_url)
	}

	/// `{base}/v1alpha/{session}:sendMessage`
	pub fn send_message_url(&self, session: &str) -> String {
		format!("{}/v1alpha/{}:sendMessage", self.base_url, session)
	}
}

impl Default for ReporterConfig {
	fn default() -> Self {
		ReporterConfigBuilder::new().build()
	}
}

/// Builder for [`ReporterConfig`].
#[derive(Debug, Clone)]
pub struct ReporterConfigBuilder {
	api_key: Option<ApiKey>,
	user: Option<String>,
	source: Option<String>,
	base_url: Option<String>,
	instruction: Option<String>,
	request_timeout: Duration,
	queue_capacity: usize,
	max_trace_chars: usize,
	panic_flush_timeout: Option<Duration>,
}

impl ReporterConfigBuilder {
	/// Creates a builder with no key and default tuning.
	pub fn new() -> Self {
		Self {
			api_key: None,
			user: None,
			source: None,
			base_url: None,
			instruction: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			max_trace_chars: DEFAULT_MAX_TRACE_CHARS,
			panic_flush_timeout: None,
		}
	}

	/// Applies values captured from the build environment.
	///
	/// `CRASHLINE_API_KEY`, `CRASHLINE_USER` and `CRASHLINE_SOURCE` are read
	/// with `option_env!` when this crate is compiled.
	pub fn with_baked_defaults(self) -> Self {
		self.apply(
			option_env!("CRASHLINE_API_KEY"),
			option_env!("CRASHLINE_USER"),
			option_env!("CRASHLINE_SOURCE"),
		)
	}

	/// Applies values from the process environment.
	///
	/// Reads `CRASHLINE_API_KEY` (or `CRASHLINE_API_KEY_FILE`),
	/// `CRASHLINE_USER`, `CRASHLINE_SOURCE` and `CRASHLINE_BASE_URL`.
	pub fn with_env(self) -> Result<Self, SecretEnvError> {
		let mut builder = self;
		if let Some(key) = load_api_key_env(ENV_API_KEY)? {
			builder.api_key = Some(key);
		}
		let user = env::var(ENV_USER).ok();
		let source = env::var(ENV_SOURCE).ok();
		let base_url = env::var(ENV_BASE_URL).ok();
		builder = builder.apply(None, user.as_deref(), source.as_deref());
		if let Some(url) = base_url {
			builder = builder.base_url(url);
		}
		Ok(builder)
	}

	/// Applies the three identity values, skipping any that are absent or blank.
	pub fn apply(self, api_key: Option<&str>, user: Option<&str>, source: Option<&str>) -> Self {
		let mut builder = self;
		if let Some(key) = api_key {
			builder = builder.api_key(key);
		}
		if let Some(user) = user {
			builder = builder.user(user);
		}
		if let Some(source) = source {
			builder = builder.source(source);
		}
		builder
	}

	/// Sets the API key. Blank values are ignored.
	pub fn api_key(mut self, key: impl AsRef<str>) -> Self {
		if let Some(key) = ApiKey::parse(key) {
			self.api_key = Some(key);
		}
		self
	}

	/// Sets the user identifier embedded in the session prompt. Blank values are ignored.
	pub fn user(mut self, user: impl Into<String>) -> Self {
		if let Some(user) = non_blank(user.into()) {
			self.user = Some(user);
		}
		self
	}

	/// Sets the source repository, e.g. `sources/github/owner/repo`. Blank values are ignored.
	pub fn source(mut self, source: impl Into<String>) -> Self {
		if let Some(source) = non_blank(source.into()) {
			self.source = Some(source);
		}
		self
	}

	/// Sets the API host. Blank values are ignored.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		if let Some(url) = non_blank(url.into()) {
			self.base_url = Some(url.trim_end_matches('/').to_string());
		}
		self
	}

	/// Replaces the instruction appended to every crash message. Blank values are ignored.
	pub fn instruction(mut self, text: impl Into<String>) -> Self {
		if let Some(text) = non_blank(text.into()) {
			self.instruction = Some(text);
		}
		self
	}

	/// Sets the per-request HTTP timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Sets how many reports may queue behind the one in flight (minimum 1).
	pub fn queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity.max(1);
		self
	}

	/// Sets the maximum length of the formatted trace.
	pub fn max_trace_chars(mut self, max: usize) -> Self {
		self.max_trace_chars = max;
		self
	}

	/// Makes the panic hook wait up to `timeout` for queued reports.
	///
	/// Without this a panic on the main thread usually ends the process
	/// before the report leaves. Blocking the panicking thread is opt-in.
	pub fn panic_flush_timeout(mut self, timeout: Duration) -> Self {
		self.panic_flush_timeout = Some(timeout);
		self
	}

	pub fn build(self) -> ReporterConfig {
		ReporterConfig {
			api_key: self.api_key,
			user: self.user.unwrap_or_else(|| DEFAULT_USER.to_string()),
			source: self.source.unwrap_or_default(),
			base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			instruction: self
				.instruction
				.unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
			request_timeout: self.request_timeout,
			queue_capacity: self.queue_capacity,
			max_trace_chars: self.max_trace_chars,
			panic_flush_timeout: self.panic_flush_timeout,
		}
	}
}

impl Default for ReporterConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn non_blank(value: String) -> Option<String> {
	if value.trim().is_empty() {
		None
	} else {
		Some(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::sync::{Mutex, MutexGuard, PoisonError};

	/// Serializes tests that touch the real `CRASHLINE_*` variables.
	static ENV_LOCK: Mutex<()> = Mutex::new(());

	const ALL_VARS: [&str; 5] = [
		ENV_API_KEY,
		"CRASHLINE_API_KEY_FILE",
		ENV_USER,
		ENV_SOURCE,
		ENV_BASE_URL,
	];

	fn clean_env() -> MutexGuard<'static, ()> {
		let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
		for var in ALL_VARS {
			env::remove_var(var);
		}
		guard
	}

	#[test]
	fn env_layer_sits_between_baked_and_explicit() {
		let _guard = clean_env();
		env::set_var(ENV_API_KEY, "env-key");
		env::set_var(ENV_USER, "env-user");
		env::set_var(ENV_SOURCE, "sources/github/env/repo");
		env::set_var(ENV_BASE_URL, "https://env.test/");

		let config = ReporterConfig::builder()
			.apply(Some("baked-key"), Some("baked-user"), Some("baked/repo"))
			.with_env()
			.unwrap()
			.apply(Some("explicit"), Some(" "), None)
			.build();

		assert_eq!(config.api_key().unwrap().expose(), "explicit");
		assert_eq!(config.user(), "env-user");
		assert_eq!(config.source(), "sources/github/env/repo");
		assert_eq!(config.base_url(), "https://env.test");

		for var in ALL_VARS {
			env::remove_var(var);
		}
	}

	#[test]
	fn blank_env_values_keep_baked_values() {
		let _guard = clean_env();
		env::set_var(ENV_API_KEY, "  ");
		env::set_var(ENV_USER, "");
		env::set_var(ENV_SOURCE, "\t");
		env::set_var(ENV_BASE_URL, " ");

		let config = ReporterConfig::builder()
			.apply(Some("baked-key"), Some("baked-user"), Some("baked/repo"))
			.with_env()
			.unwrap()
			.build();

		assert_eq!(config.api_key().unwrap().expose(), "baked-key");
		assert_eq!(config.user(), "baked-user");
		assert_eq!(config.source(), "baked/repo");
		assert_eq!(config.base_url(), DEFAULT_BASE_URL);

		for var in ALL_VARS {
			env::remove_var(var);
		}
	}

	#[test]
	fn env_layer_reads_api_key_file() {
		let _guard = clean_env();
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "file-key").unwrap();
		env::set_var(ENV_API_KEY, "env-key");
		env::set_var("CRASHLINE_API_KEY_FILE", file.path());

		let config = ReporterConfig::builder().with_env().unwrap().build();
		assert_eq!(config.api_key().unwrap().expose(), "file-key");

		for var in ALL_VARS {
			env::remove_var(var);
		}
	}

	#[test]
	fn unset_env_leaves_reporting_disabled() {
		let _guard = clean_env();
		let config = ReporterConfig::builder().with_env().unwrap().build();
		assert!(!config.is_enabled());
		assert_eq!(config.user(), DEFAULT_USER);
	}

	#[test]
	fn empty_builder_is_disabled() {
		let config = ReporterConfig::builder().build();
		assert!(!config.is_enabled());
		assert_eq!(config.user(), DEFAULT_USER);
		assert_eq!(config.base_url(), DEFAULT_BASE_URL);
		assert_eq!(config.instruction(), DEFAULT_INSTRUCTION);
		assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
		assert_eq!(config.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
		assert!(config.panic_flush_timeout().is_none());
	}

	#[test]
	fn blank_overrides_keep_previous_values() {
		let config = ReporterConfig::builder()
			.api_key("k1")
			.user("alice")
			.source("owner/repo")
			.api_key("  ")
			.user("")
			.source("\t")
			.instruction(" ")
			.build();

		assert_eq!(config.api_key().unwrap().expose(), "k1");
		assert_eq!(config.user(), "alice");
		assert_eq!(config.source(), "owner/repo");
		assert_eq!(config.instruction(), DEFAULT_INSTRUCTION);
	}

	#[test]
	fn non_blank_overrides_win() {
		let config = ReporterConfig::builder()
			.apply(Some("baked"), Some("baked-user"), Some("baked/repo"))
			.apply(Some("k2"), None, Some("owner/other"))
			.build();

		assert_eq!(config.api_key().unwrap().expose(), "k2");
		assert_eq!(config.user(), "baked-user");
		assert_eq!(config.source(), "owner/other");
	}

	#[test]
	fn base_url_is_normalized() {
		let config = ReporterConfig::builder()
			.base_url("http://127.0.0.1:8080//")
			.build();
		assert_eq!(config.base_url(), "http://127.0.0.1:8080");
		assert_eq!(
			config.sessions_url(),
			"http://127.0.0.1:8080/v1alpha/sessions"
		);
		assert_eq!(
			config.send_message_url("sessions/abc123"),
			"http://127.0.0.1:8080/v1alpha/sessions/abc123:sendMessage"
		);
	}

	#[test]
	fn queue_capacity_has_a_floor() {
		let config = ReporterConfig::builder().queue_capacity(0).build();
		assert_eq!(config.queue_capacity(), 1);
	}

	#[test]
	fn load_api_key_env_prefers_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();

		let var = "CRASHLINE_TEST_KEY_FILE_WINS";
		env::set_var(var, "from-env");
		env::set_var(format!("{var}_FILE"), file.path());

		let key = load_api_key_env(var).unwrap().unwrap();
		assert_eq!(key.expose(), "from-file");

		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn load_api_key_env_reads_plain_var() {
		let var = "CRASHLINE_TEST_KEY_PLAIN";
		env::set_var(var, "plain");
		let key = load_api_key_env(var).unwrap().unwrap();
		assert_eq!(key.expose(), "plain");
		env::remove_var(var);
	}

	#[test]
	fn load_api_key_env_treats_blank_as_unset() {
		let var = "CRASHLINE_TEST_KEY_BLANK";
		env::set_var(var, "   ");
		assert!(load_api_key_env(var).unwrap().is_none());
		env::remove_var(var);
	}

	#[test]
	fn load_api_key_env_rejects_empty_file_path() {
		let var = "CRASHLINE_TEST_KEY_EMPTY_PATH";
		env::set_var(format!("{var}_FILE"), "");
		let result = load_api_key_env(var);
		assert!(matches!(result, Err(SecretEnvError::EmptyPath { .. })));
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn load_api_key_env_reports_missing_file() {
		let var = "CRASHLINE_TEST_KEY_MISSING_FILE";
		env::set_var(format!("{var}_FILE"), "/nonexistent/crashline/key");
		let result = load_api_key_env(var);
		assert!(matches!(result, Err(SecretEnvError::Io { .. })));
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn unset_var_is_none() {
		assert!(load_api_key_env("CRASHLINE_TEST_KEY_NEVER_SET")
			.unwrap()
			.is_none());
	}
}
