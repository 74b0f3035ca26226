// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-lane background queue that delivers crash reports.
//!
//! Reports are processed one at a time, in submission order, on a dedicated
//! thread running a current-thread tokio runtime. Submitting never blocks:
//! when the backlog is full the report is dropped. Delivery is best-effort;
//! failures are logged and discarded, never retried.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::ReporterConfig;
use crate::error::{ReporterError, Result};
use crate::event::CrashEvent;
use crate::payload::{parse_session_name, CreateSessionRequest, SendMessageRequest};
use crate::secret::ApiKey;
use crate::transport::Transport;

/// Name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "crashline-reporter";

/// Outcome of handing a crash to the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
	/// No API key is configured; nothing was queued.
	Disabled,
	/// The report is waiting for, or being handled by, the worker.
	Queued,
	/// The backlog was full and the report was discarded.
	Dropped,
	/// The worker is gone and the report was discarded.
	Closed,
}

/// One unit of work for the worker.
#[derive(Debug)]
pub(crate) struct ReportJob {
	event: CrashEvent,
	config: Arc<ReporterConfig>,
	api_key: ApiKey,
}

impl ReportJob {
	/// Returns `None` when the config has no API key.
	pub(crate) fn new(event: CrashEvent, config: Arc<ReporterConfig>) -> Option<Self> {
		let api_key = config.api_key()?.clone();
		Some(Self {
			event,
			config,
			api_key,
		})
	}
}

#[derive(Debug, Default)]
struct Counts {
	submitted: u64,
	finished: u64,
}

/// Submission and completion counters, waitable from synchronous code.
#[derive(Debug, Default)]
struct Progress {
	counts: Mutex<Counts>,
	changed: Condvar,
}

impl Progress {
	fn lock(&self) -> MutexGuard<'_, Counts> {
		self.counts.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn begin(&self) {
		self.lock().submitted += 1;
	}

	fn cancel(&self) {
		self.lock().submitted -= 1;
		self.changed.notify_all();
	}

	fn finish(&self) {
		self.lock().finished += 1;
		self.changed.notify_all();
	}

	fn wait_idle(&self, timeout: Duration) -> bool {
		let guard = self.lock();
		let target = guard.submitted;
		let (guard, _) = self
			.changed
			.wait_timeout_while(guard, timeout, |c| c.finished < target.min(c.submitted))
			.unwrap_or_else(PoisonError::into_inner);
		guard.finished >= target.min(guard.submitted)
	}
}

/// Handle to the worker. Dropping every handle stops the worker once the
/// backlog is drained.
#[derive(Debug)]
pub(crate) struct ReportQueue {
	tx: mpsc::Sender<ReportJob>,
	progress: Arc<Progress>,
}

impl ReportQueue {
	/// Starts the worker thread with room for `capacity` waiting reports.
	pub(crate) fn spawn(transport: Arc<dyn Transport>, capacity: usize) -> Result<Self> {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.map_err(ReporterError::WorkerSpawn)?;

		let (tx, rx) = mpsc::channel(capacity.max(1));
		let progress = Arc::new(Progress::default());
		let worker_progress = Arc::clone(&progress);

		std::thread::Builder::new()
			.name(WORKER_THREAD_NAME.to_string())
			.spawn(move || runtime.block_on(run(rx, transport, worker_progress)))
			.map_err(ReporterError::WorkerSpawn)?;

		Ok(Self { tx, progress })
	}

	/// Queues a job without waiting.
	pub(crate) fn submit(&self, job: ReportJob) -> Submission {
		self.progress.begin();
		match self.tx.try_send(job) {
			Ok(()) => Submission::Queued,
			Err(TrySendError::Full(job)) => {
				self.progress.cancel();
				warn!(event_id = %job.event.id(), "Crash report queue full, dropping report");
				Submission::Dropped
			}
			Err(TrySendError::Closed(job)) => {
				self.progress.cancel();
				warn!(event_id = %job.event.id(), "Crash report worker stopped, dropping report");
				Submission::Closed
			}
		}
	}

	/// Waits until every job submitted so far has been processed.
	///
	/// Returns false if `timeout` elapsed first.
	pub(crate) fn flush(&self, timeout: Duration) -> bool {
		self.progress.wait_idle(timeout)
	}
}

async fn run(
	mut rx: mpsc::Receiver<ReportJob>,
	transport: Arc<dyn Transport>,
	progress: Arc<Progress>,
) {
	info!("Crash report worker started");

	while let Some(job) = rx.recv().await {
		let event_id = job.event.id();
		let captured_at = job.event.captured_at();

		// A panicking transport must not take the worker down with it.
		match tokio::spawn(deliver(Arc::clone(&transport), job)).await {
			Ok(Ok(session)) => {
				debug!(%event_id, %captured_at, session = %session, "Crash report submitted");
			}
			Ok(Err(e)) => {
				error!(%event_id, %captured_at, error = %e, "Failed to submit crash report");
			}
			Err(e) => {
				error!(%event_id, %captured_at, error = %e, "Crash report task aborted");
			}
		}

		progress.finish();
	}

	debug!("Crash report worker stopped");
}

/// Runs the two-request exchange for one job and returns the session name.
///
/// The message is only sent once the session request has succeeded and
/// yielded a name.
pub(crate) async fn deliver(transport: Arc<dyn Transport>, job: ReportJob) -> Result<String> {
	let ReportJob {
		event,
		config,
		api_key,
	} = job;

	let session_body = serde_json::to_value(CreateSessionRequest::for_event(&config, &event))
		.map_err(ReporterError::Serialize)?;
	let response = transport
		.post_json(&config.sessions_url(), &api_key, &session_body)
		.await?;
	let session = parse_session_name(&response)?;

	debug!(event_id = %event.id(), session = %session, "Crash session created");

	let message_body = serde_json::to_value(SendMessageRequest::for_event(&config, &event))
		.map_err(ReporterError::Serialize)?;
	transport
		.post_json(&config.send_message_url(&session), &api_key, &message_body)
		.await?;

	Ok(session)
}
