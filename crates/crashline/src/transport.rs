// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport for the session API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::error::{ReporterError, Result};
use crate::secret::ApiKey;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Goog-Api-Key";

/// Content type sent with every request body.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Posts a JSON body and returns the response body text.
///
/// Implementations must turn a non-2xx status into
/// [`ReporterError::Server`] carrying the status code and body.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn post_json(&self, url: &str, api_key: &ApiKey, body: &serde_json::Value) -> Result<String>;
}

/// [`Transport`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
	client: Client,
}

impl HttpTransport {
	/// Creates a transport whose requests time out after `timeout`.
	pub fn new(timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.user_agent(user_agent())
			.timeout(timeout)
			.build()
			.map_err(ReporterError::HttpClient)?;
		Ok(Self { client })
	}

	/// Wraps an existing client, e.g. one with a proxy configured.
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn post_json(&self, url: &str, api_key: &ApiKey, body: &serde_json::Value) -> Result<String> {
		let payload = serde_json::to_vec(body).map_err(ReporterError::Serialize)?;

		debug!(url = %url, bytes = payload.len(), "POST");

		let response = self
			.client
			.post(url)
			.header(CONTENT_TYPE, JSON_CONTENT_TYPE)
			.header(API_KEY_HEADER, api_key.expose())
			.body(payload)
			.send()
			.await?;

		let status = response.status();
		let text = response.text().await?;

		if !status.is_success() {
			return Err(ReporterError::Server {
				status: status.as_u16(),
				body: text,
			});
		}

		Ok(text)
	}
}

/// Returns the User-Agent sent with every request.
///
/// Format: `crashline/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"crashline/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
