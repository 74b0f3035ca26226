// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request and response bodies for the session API.

use serde::{Deserialize, Serialize};

use crate::config::{ReporterConfig, STARTING_BRANCH};
use crate::error::{ReporterError, Result};
use crate::event::CrashEvent;

/// Body of `POST /v1alpha/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
	pub prompt: String,
	pub source_context: SourceContext,
	pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceContext {
	pub source: String,
	pub github_repo_context: GithubRepoContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GithubRepoContext {
	pub starting_branch: String,
}

impl CreateSessionRequest {
	pub fn for_event(config: &ReporterConfig, event: &CrashEvent) -> Self {
		Self {
			prompt: format!("CRASH REPORT from {}", config.user()),
			source_context: SourceContext {
				source: config.source().to_string(),
				github_repo_context: GithubRepoContext {
					starting_branch: STARTING_BRANCH.to_string(),
				},
			},
			title: format!("Crash Report: {}", event.error_type()),
		}
	}
}

/// Body of `POST /v1alpha/{session}:sendMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
	pub prompt: String,
}

impl SendMessageRequest {
	pub fn for_event(config: &ReporterConfig, event: &CrashEvent) -> Self {
		Self {
			prompt: format!(
				"AUTOMATED CRASH REPORT:\n\n{}\n\n{}",
				event.trace(),
				config.instruction()
			),
		}
	}
}

/// The part of the session response we need.
#[derive(Debug, Clone, Deserialize)]
struct SessionResponse {
	#[serde(default)]
	name: Option<String>,
}

/// Extract the session `name` from a create-session response body.
pub fn parse_session_name(body: &str) -> Result<String> {
	let response: SessionResponse =
		serde_json::from_str(body).map_err(ReporterError::MalformedResponse)?;
	match response.name {
		Some(name) if !name.trim().is_empty() => Ok(name),
		_ => Err(ReporterError::MissingSessionName),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::DEFAULT_INSTRUCTION;

	fn config() -> ReporterConfig {
		ReporterConfig::builder()
			.api_key("k1")
			.user("alice")
			.source("owner/repo")
			.build()
	}

	#[test]
	fn session_request_matches_wire_shape() {
		let event = CrashEvent::new("NullPointerException", "boom", "trace");
		let body = serde_json::to_value(CreateSessionRequest::for_event(&config(), &event)).unwrap();

		assert_eq!(
			body,
			serde_json::json!({
				"prompt": "CRASH REPORT from alice",
				"sourceContext": {
					"source": "owner/repo",
					"githubRepoContext": { "startingBranch": "main" }
				},
				"title": "Crash Report: NullPointerException"
			})
		);

		let text = serde_json::to_string(&CreateSessionRequest::for_event(&config(), &event)).unwrap();
		assert!(text.contains(r#""prompt":"CRASH REPORT from alice""#));
		assert!(text.contains(r#""title":"Crash Report: NullPointerException""#));
	}

	#[test]
	fn message_request_embeds_trace_and_instruction() {
		let event = CrashEvent::new(
			"NullPointerException",
			"boom",
			"NullPointerException: boom\n   0: my_app::main",
		);
		let request = SendMessageRequest::for_event(&config(), &event);

		assert!(request.prompt.starts_with("AUTOMATED CRASH REPORT:\n\n"));
		assert!(request.prompt.contains("boom"));
		assert!(request.prompt.ends_with(DEFAULT_INSTRUCTION));
	}

	#[test]
	fn custom_instruction_replaces_default() {
		let config = ReporterConfig::builder()
			.api_key("k1")
			.instruction("Open a pull request with a fix.")
			.build();
		let event = CrashEvent::new("panic", "boom", "trace");
		let request = SendMessageRequest::for_event(&config, &event);

		assert!(request.prompt.ends_with("\n\nOpen a pull request with a fix."));
		assert!(!request.prompt.contains(DEFAULT_INSTRUCTION));
	}

	#[test]
	fn parse_session_name_reads_name() {
		let name = parse_session_name(r#"{"name":"sessions/abc123","id":"abc123"}"#).unwrap();
		assert_eq!(name, "sessions/abc123");
	}

	#[test]
	fn parse_session_name_rejects_bad_bodies() {
		assert!(matches!(
			parse_session_name("<html>oops</html>"),
			Err(ReporterError::MalformedResponse(_))
		));
		assert!(matches!(
			parse_session_name(r#"{"id":"abc123"}"#),
			Err(ReporterError::MissingSessionName)
		));
		assert!(matches!(
			parse_session_name(r#"{"name":""}"#),
			Err(ReporterError::MissingSessionName)
		));
		assert!(matches!(
			parse_session_name(r#"{"name":42}"#),
			Err(ReporterError::MalformedResponse(_))
		));
	}
}
