// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporter: the entry point applications hold on to.

use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ReporterConfig;
use crate::error::Result;
use crate::event::CrashEvent;
use crate::hook;
use crate::transport::{HttpTransport, Transport};
use crate::worker::{ReportJob, ReportQueue, Submission, WORKER_THREAD_NAME};

/// Captures crashes and hands them to the background worker.
///
/// # Example
///
/// ```no_run
/// use crashline::{CrashReporter, ReporterConfig};
///
/// let config = ReporterConfig::builder()
///     .api_key("k1")
///     .user("alice")
///     .source("sources/github/owner/repo")
///     .build();
///
/// let reporter = CrashReporter::new(config)?;
/// reporter.install_panic_hook();
/// # Ok::<(), crashline::ReporterError>(())
/// ```
#[derive(Clone)]
pub struct CrashReporter {
	inner: Arc<ReporterInner>,
}

struct ReporterInner {
	config: Arc<ReporterConfig>,
	// None when reporting is disabled; no thread is started then.
	queue: Option<ReportQueue>,
}

impl CrashReporter {
	/// Creates a reporter that talks HTTP to the configured host.
	pub fn new(config: ReporterConfig) -> Result<Self> {
		if !config.is_enabled() {
			return Ok(Self::from_parts(config, None));
		}
		let transport = HttpTransport::new(config.request_timeout())?;
		Self::with_transport(config, Arc::new(transport))
	}

	/// Creates a reporter that delivers through `transport`.
	pub fn with_transport(config: ReporterConfig, transport: Arc<dyn Transport>) -> Result<Self> {
		let queue = if config.is_enabled() {
			Some(ReportQueue::spawn(transport, config.queue_capacity())?)
		} else {
			None
		};
		Ok(Self::from_parts(config, queue))
	}

	fn from_parts(config: ReporterConfig, queue: Option<ReportQueue>) -> Self {
		info!(
			enabled = config.is_enabled(),
			user = %config.user(),
			source = %config.source(),
			base_url = %config.base_url(),
			"Crash reporter initialized"
		);
		if config.is_enabled() && config.source().is_empty() {
			warn!("Crash reporting is enabled but no source repository is configured");
		}

		Self {
			inner: Arc::new(ReporterInner {
				config: Arc::new(config),
				queue,
			}),
		}
	}

	/// The configuration this reporter was built with.
	pub fn config(&self) -> &ReporterConfig {
		&self.inner.config
	}

	/// Whether an API key is configured.
	pub fn is_enabled(&self) -> bool {
		self.inner.queue.is_some()
	}

	/// Queues `event` for delivery and returns without waiting.
	pub fn report(&self, event: CrashEvent) -> Submission {
		let Some(queue) = &self.inner.queue else {
			return Submission::Disabled;
		};
		match ReportJob::new(event, Arc::clone(&self.inner.config)) {
			Some(job) => queue.submit(job),
			None => Submission::Disabled,
		}
	}

	/// Reports an error value together with the caller's backtrace.
	pub fn report_error<E>(&self, error: &E) -> Submission
	where
		E: Error + ?Sized,
	{
		if !self.is_enabled() {
			return Submission::Disabled;
		}
		self.report(CrashEvent::from_error(error, self.inner.config.max_trace_chars()))
	}

	/// Waits until every report queued so far has been processed.
	///
	/// Returns false if `timeout` elapsed first. A disabled reporter is
	/// always idle.
	pub fn flush(&self, timeout: Duration) -> bool {
		match &self.inner.queue {
			Some(queue) => queue.flush(timeout),
			None => true,
		}
	}

	/// Makes this reporter the first link of the process panic hook chain.
	///
	/// The hook that was registered before the first install keeps running
	/// after the report is queued. Installing again replaces the reporter.
	pub fn install_panic_hook(&self) {
		let reporter = self.clone();
		hook::install(hook::handler(move |info| reporter.on_panic(info)));
		info!("Panic hook installed");
	}

	fn on_panic(&self, info: &PanicHookInfo<'_>) {
		if !self.is_enabled() {
			return;
		}
		// A panic inside delivery must not feed itself back into the queue.
		if std::thread::current().name() == Some(WORKER_THREAD_NAME) {
			return;
		}

		let backtrace = Backtrace::force_capture();
		let event = CrashEvent::from_panic(info, &backtrace, self.inner.config.max_trace_chars());
		let event_id = event.id();

		if self.report(event) != Submission::Queued {
			return;
		}
		if let Some(timeout) = self.inner.config.panic_flush_timeout() {
			if !self.flush(timeout) {
				warn!(%event_id, "Crash report still pending after panic flush timeout");
			}
		}
	}
}
