// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scriptable in-memory transport for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::{ReporterError, Result};
use crate::secret::ApiKey;
use crate::transport::Transport;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct Call {
	pub url: String,
	pub api_key: String,
	pub body: serde_json::Value,
}

#[derive(Default)]
struct GateState {
	held: AtomicBool,
	released: Notify,
}

/// Holds requests inside the transport until released.
pub struct Gate {
	state: Arc<GateState>,
}

impl Gate {
	pub fn release(&self) {
		self.state.held.store(false, Ordering::SeqCst);
		self.state.released.notify_waiters();
	}
}

pub struct MockTransport {
	calls: Mutex<Vec<Call>>,
	sessions_created: AtomicUsize,
	fail_sessions: AtomicBool,
	fail_messages: AtomicBool,
	panic_on_next: AtomicBool,
	session_body: Mutex<Option<String>>,
	delay: Mutex<Option<Duration>>,
	in_flight: AtomicUsize,
	max_in_flight: AtomicUsize,
	gate: Arc<GateState>,
}

impl MockTransport {
	pub fn new() -> Self {
		Self {
			calls: Mutex::new(Vec::new()),
			sessions_created: AtomicUsize::new(0),
			fail_sessions: AtomicBool::new(false),
			fail_messages: AtomicBool::new(false),
			panic_on_next: AtomicBool::new(false),
			session_body: Mutex::new(None),
			delay: Mutex::new(None),
			in_flight: AtomicUsize::new(0),
			max_in_flight: AtomicUsize::new(0),
			gate: Arc::new(GateState::default()),
		}
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn fail_sessions(&self, fail: bool) {
		self.fail_sessions.store(fail, Ordering::SeqCst);
	}

	pub fn fail_messages(&self, fail: bool) {
		self.fail_messages.store(fail, Ordering::SeqCst);
	}

	pub fn panic_on_next(&self) {
		self.panic_on_next.store(true, Ordering::SeqCst);
	}

	/// Replace the create-session response body.
	pub fn session_body(&self, body: &str) {
		*self.session_body.lock().unwrap() = Some(body.to_string());
	}

	/// Sleep this long inside every request.
	pub fn delay(&self, delay: Duration) {
		*self.delay.lock().unwrap() = Some(delay);
	}

	/// Highest number of requests observed in flight at once.
	pub fn max_in_flight(&self) -> usize {
		self.max_in_flight.load(Ordering::SeqCst)
	}

	/// Park every request until the returned gate is released.
	pub fn hold(&self) -> Gate {
		self.gate.held.store(true, Ordering::SeqCst);
		Gate {
			state: Arc::clone(&self.gate),
		}
	}

	/// Poll until at least `count` requests were recorded.
	pub fn wait_for_calls(&self, count: usize, timeout: Duration) {
		let deadline = Instant::now() + timeout;
		while self.calls.lock().unwrap().len() < count && Instant::now() < deadline {
			std::thread::sleep(Duration::from_millis(5));
		}
	}

	async fn wait_for_gate(&self) {
		loop {
			let released = self.gate.released.notified();
			if !self.gate.held.load(Ordering::SeqCst) {
				break;
			}
			released.await;
		}
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn post_json(&self, url: &str, api_key: &ApiKey, body: &serde_json::Value) -> Result<String> {
		let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(now, Ordering::SeqCst);

		self.calls.lock().unwrap().push(Call {
			url: url.to_string(),
			api_key: api_key.expose().to_string(),
			body: body.clone(),
		});

		if self.panic_on_next.swap(false, Ordering::SeqCst) {
			self.in_flight.fetch_sub(1, Ordering::SeqCst);
			panic!("mock transport panic");
		}

		self.wait_for_gate().await;
		let delay = *self.delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.in_flight.fetch_sub(1, Ordering::SeqCst);

		if url.ends_with("/sessions") {
			if self.fail_sessions.load(Ordering::SeqCst) {
				return Err(ReporterError::Server {
					status: 500,
					body: "mock failure".to_string(),
				});
			}
			if let Some(body) = self.session_body.lock().unwrap().clone() {
				return Ok(body);
			}
			let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
			return Ok(serde_json::json!({ "name": format!("sessions/{n}") }).to_string());
		}

		if self.fail_messages.load(Ordering::SeqCst) {
			return Err(ReporterError::Server {
				status: 503,
				body: "mock failure".to_string(),
			});
		}
		Ok("{}".to_string())
	}
}
