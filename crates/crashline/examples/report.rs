// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: report an error and a panic with the crashline reporter.
//!
//! Run with:
//!   CRASHLINE_API_KEY=... CRASHLINE_USER=alice CRASHLINE_SOURCE=sources/github/owner/repo \
//!     cargo run --example report -p crashline

use std::time::Duration;

use crashline::{CrashReporter, ReporterConfig, Submission};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crashline=debug")),
		)
		.init();

	let config = ReporterConfig::builder()
		.with_env()?
		.panic_flush_timeout(Duration::from_secs(20))
		.build();

	println!("Crash reporter configuration:");
	println!("  Enabled: {}", config.is_enabled());
	println!("  User: {}", config.user());
	println!("  Source: {}", config.source());
	println!("  Base URL: {}", config.base_url());

	let reporter = CrashReporter::new(config)?;
	reporter.install_panic_hook();

	// A recoverable error, reported explicitly.
	if let Err(e) = std::fs::read_to_string("/nonexistent/settings.toml") {
		match reporter.report_error(&e) {
			Submission::Queued => println!("Error report queued"),
			other => println!("Error report not queued: {other:?}"),
		}
	}

	if !reporter.flush(Duration::from_secs(20)) {
		println!("Error report still pending");
	}

	// The hook files this one, then the default hook prints it as usual.
	let values: Vec<u32> = Vec::new();
	println!("First value: {}", values[0]);

	Ok(())
}
