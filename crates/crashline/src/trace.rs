// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture, parsing and rendering.
//!
//! The session API only takes text, so a backtrace is parsed into frames,
//! stripped of the panic machinery that precedes the first application
//! frame, and rendered back into a compact human-readable block.

use std::backtrace::Backtrace;
use std::fmt::Write as _;

use rustc_demangle::demangle;

/// Appended when a trace is cut to fit `max_trace_chars`.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// A single parsed stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
	pub function: Option<String>,
	pub module: Option<String>,
	pub filename: Option<String>,
	pub lineno: Option<u32>,
	pub colno: Option<u32>,
	pub in_app: bool,
}

/// An ordered list of frames, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

impl Stacktrace {
	/// Parse a captured backtrace.
	pub fn from_backtrace(backtrace: &Backtrace) -> Self {
		Self::parse(&backtrace.to_string())
	}

	/// Capture the current thread's backtrace, regardless of `RUST_BACKTRACE`.
	pub fn capture() -> Self {
		Self::from_backtrace(&Backtrace::force_capture())
	}

	/// Parse the `Display` output of [`Backtrace`].
	///
	/// Frame lines look like `  3: my_app::main` and are optionally followed
	/// by `at src/main.rs:10:5`, which is attached to the preceding frame.
	pub fn parse(text: &str) -> Self {
		let mut frames: Vec<Frame> = Vec::new();

		for line in text.lines() {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}

			if let Some(location) = line.strip_prefix("at ") {
				if let Some(frame) = frames.last_mut() {
					apply_location(frame, location);
				}
				continue;
			}

			if let Some(frame) = parse_frame_line(line) {
				frames.push(frame);
			}
		}

		Self { frames }
	}

	/// Drop the capture and panic machinery above the first application frame.
	///
	/// A trace with no application frames is returned unchanged.
	pub fn trim_runtime_frames(mut self) -> Self {
		if let Some(first_app) = self.frames.iter().position(|f| f.in_app) {
			self.frames.drain(..first_app);
		}
		self
	}

	/// Render the frames as text, one numbered entry per frame.
	pub fn render(&self) -> String {
		let mut out = String::new();
		for (index, frame) in self.frames.iter().enumerate() {
			let function = frame.function.as_deref().unwrap_or("<unknown>");
			let _ = writeln!(out, "{index:>4}: {function}");
			if let Some(file) = &frame.filename {
				match (frame.lineno, frame.colno) {
					(Some(line), Some(col)) => {
						let _ = writeln!(out, "             at {file}:{line}:{col}");
					}
					(Some(line), None) => {
						let _ = writeln!(out, "             at {file}:{line}");
					}
					_ => {
						let _ = writeln!(out, "             at {file}");
					}
				}
			}
		}
		out
	}
}

/// Parse a single frame line, with or without its `N:` prefix.
fn parse_frame_line(line: &str) -> Option<Frame> {
	let function_part = match line.split_once(':') {
		Some((prefix, rest)) if prefix.trim().parse::<u32>().is_ok() => rest.trim(),
		_ => line,
	};

	if function_part.is_empty() {
		return None;
	}

	let demangled = strip_hash(&format!("{:#}", demangle(function_part))).to_string();

	// e.g. "my_app::handlers::process" -> "my_app::handlers"
	let module = demangled.rfind("::").map(|idx| demangled[..idx].to_string());
	let in_app = is_in_app_frame(&demangled);

	Some(Frame {
		function: Some(demangled),
		module,
		in_app,
		..Default::default()
	})
}

/// Attach `file:line:col` (any suffix optional) to a frame.
fn apply_location(frame: &mut Frame, location: &str) {
	let mut parts = location.rsplitn(3, ':');
	let last = parts.next();
	let middle = parts.next();
	let rest = parts.next();

	match (rest, middle, last) {
		(Some(file), Some(line), Some(col)) if line.parse::<u32>().is_ok() => {
			frame.filename = Some(file.to_string());
			frame.lineno = line.parse().ok();
			frame.colno = col.parse().ok();
		}
		(_, Some(_), Some(line)) if line.parse::<u32>().is_ok() => {
			let file = location.rsplit_once(':').map(|(file, _)| file).unwrap_or(location);
			frame.filename = Some(file.to_string());
			frame.lineno = line.parse().ok();
		}
		_ => frame.filename = Some(location.to_string()),
	}
}

/// Remove a trailing `::h0123456789abcdef` symbol hash.
fn strip_hash(name: &str) -> &str {
	if let Some((head, hash)) = name.rsplit_once("::h") {
		if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
			return head;
		}
	}
	name
}

/// Determine if a frame is from application code rather than the runtime.
fn is_in_app_frame(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"backtrace::",
		"<backtrace::",
		"panic_unwind::",
		"<panic_unwind::",
		"crashline::",
		"<crashline::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panic::",
		"::panicking::",
		"::rt::",
		"::sys_common::",
		"::backtrace_rs::",
	];

	if SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p)) {
		return false;
	}
	!SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: String, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((byte_idx, _)) => {
			let mut cut = text[..byte_idx].to_string();
			cut.push_str(TRUNCATION_MARKER);
			cut
		}
		None => text,
	}
}

/// Shorten a Rust type path to its final segment, without generics.
///
/// `std::io::error::Error` becomes `Error`,
/// `my_app::Wrapper<std::string::String>` becomes `Wrapper`.
pub fn short_type_name(type_name: &str) -> &str {
	let without_generics = type_name.split('<').next().unwrap_or(type_name);
	without_generics
		.rsplit("::")
		.next()
		.unwrap_or(without_generics)
		.trim_start_matches('&')
}
