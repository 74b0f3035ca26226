// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Captured crash events.

use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write as _;
use std::panic::PanicHookInfo;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::trace::{short_type_name, truncate, Stacktrace};

/// Error type reported for panics.
pub const PANIC_ERROR_TYPE: &str = "panic";

/// A crash captured at the moment it happened, consumed once by the worker.
#[derive(Debug, Clone)]
pub struct CrashEvent {
	id: Uuid,
	captured_at: DateTime<Utc>,
	error_type: String,
	message: String,
	location: Option<String>,
	thread: Option<String>,
	trace: String,
}

impl CrashEvent {
	/// Creates an event from already formatted parts.
	pub fn new(
		error_type: impl Into<String>,
		message: impl Into<String>,
		trace: impl Into<String>,
	) -> Self {
		Self {
			id: Uuid::now_v7(),
			captured_at: Utc::now(),
			error_type: error_type.into(),
			message: message.into(),
			location: None,
			thread: None,
			trace: trace.into(),
		}
	}

	/// Builds an event from a panic, inside the panic hook.
	pub fn from_panic(info: &PanicHookInfo<'_>, backtrace: &Backtrace, max_trace_chars: usize) -> Self {
		let message = panic_message(info);
		let location = info
			.location()
			.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
		let thread = std::thread::current().name().map(str::to_string);

		let mut trace = format!(
			"thread '{}' panicked at {}:\n{}\n",
			thread.as_deref().unwrap_or("<unnamed>"),
			location.as_deref().unwrap_or("<unknown>"),
			message
		);
		trace.push_str("stack backtrace:\n");
		trace.push_str(&Stacktrace::from_backtrace(backtrace).trim_runtime_frames().render());

		Self {
			location,
			thread,
			trace: truncate(trace, max_trace_chars),
			..Self::new(PANIC_ERROR_TYPE, message, String::new())
		}
	}

	/// Builds an event from an error value, capturing the current backtrace.
	///
	/// The trace lists the error, one `Caused by:` line per source, and the
	/// frames of the reporting call site.
	pub fn from_error<E>(error: &E, max_trace_chars: usize) -> Self
	where
		E: Error + ?Sized,
	{
		let error_type = short_type_name(std::any::type_name::<E>()).to_string();
		let message = error.to_string();

		let mut trace = format!("{error_type}: {message}\n");
		let mut source = error.source();
		while let Some(cause) = source {
			let _ = writeln!(trace, "Caused by: {cause}");
			source = cause.source();
		}
		trace.push_str("stack backtrace:\n");
		trace.push_str(&Stacktrace::capture().trim_runtime_frames().render());

		Self::new(error_type, message, truncate(trace, max_trace_chars))
	}

	/// Unique id, for log correlation.
	pub fn id(&self) -> Uuid {
		self.id
	}

	pub fn captured_at(&self) -> DateTime<Utc> {
		self.captured_at
	}

	/// Short type name used in the session title.
	pub fn error_type(&self) -> &str {
		&self.error_type
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	/// `file:line:col` of a panic, when known.
	pub fn location(&self) -> Option<&str> {
		self.location.as_deref()
	}

	/// Name of the thread that crashed, when known.
	pub fn thread(&self) -> Option<&str> {
		self.thread.as_deref()
	}

	/// Human-readable trace sent in the crash message.
	pub fn trace(&self) -> &str {
		&self.trace
	}
}

/// Extract the panic message from panic info.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
	if let Some(s) = info.payload().downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = info.payload().downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
