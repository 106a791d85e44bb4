//! Authenticated upstream dispatch (§4.4).
//!
//! Grounded on the teacher's `webc::WebClient`: a thin `reqwest::Client`
//! wrapper that turns a non-2xx response into a structured error rather than
//! propagating `reqwest`'s own status-aware error variants.

use crate::error::{Error, Result};
use crate::config::{Endpoint, ProxyConfig};
use crate::sse::SseStream;
use crate::upstream::token_source::TokenSource;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Defensive connect timeout; upstream I/O timeouts beyond this are the
/// embedding HTTP layer's concern (§5 Timeouts).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticated client for the Code Assist `{endpoint}/{version}:{method}` surface.
///
/// Holds the onboarding-resolved project id once discovered (§4.7): the
/// handshake runs at most once per client instance.
pub struct UpstreamClient {
	http: reqwest::Client,
	endpoint: Endpoint,
	api_version: &'static str,
	token_source: Arc<dyn TokenSource>,
	project: RwLock<Option<String>>,
}

impl UpstreamClient {
	pub fn new(config: &ProxyConfig, token_source: Arc<dyn TokenSource>) -> Self {
		UpstreamClient {
			http: reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build().unwrap_or_default(),
			endpoint: config.endpoint.clone(),
			api_version: config.api_version,
			token_source,
			project: RwLock::new(config.project.clone()),
		}
	}

	pub(crate) fn url_for(&self, method: &str) -> String {
		let base = self.endpoint.base_url();
		let sep = if base.ends_with('/') { "" } else { "/" };
		let query = if method == "streamGenerateContent" { "?alt=sse" } else { "" };
		format!("{base}{sep}{}:{method}{query}", self.api_version)
	}

	pub(crate) async fn current_project(&self) -> Option<String> {
		self.project.read().await.clone()
	}

	pub(crate) async fn set_project(&self, project: String) {
		*self.project.write().await = Some(project);
	}

	async fn authorized_request(&self, url: &str, body: &Value) -> Result<reqwest::RequestBuilder> {
		let token = self.token_source.token().await?;
		Ok(self.http.post(url).bearer_auth(token).header("Content-Type", "application/json").json(body))
	}

	/// `call_endpoint(method, body) -> JSON` (§4.4). No retry on non-2xx other
	/// than the caller re-invoking after resolving a project id.
	pub async fn call_endpoint(&self, method: &str, body: Value) -> Result<Value> {
		let url = self.url_for(method);
		tracing::debug!("dispatching upstream call: {method} -> {url}");
		let request = self.authorized_request(&url, &body).await?;
		let response = request.send().await?;
		self.read_json_or_error(response).await
	}

	/// `stream_endpoint(method, body) -> byte stream` (§4.4). A 401 on the
	/// first attempt clears the cached token and retries once; a 401 on the
	/// retry surfaces as `Error::Upstream`.
	pub async fn stream_endpoint(&self, method: &str, body: Value) -> Result<SseStream<impl futures::Stream<Item = reqwest::Result<bytes::Bytes>>>> {
		let url = self.url_for(method);
		tracing::debug!("dispatching upstream stream: {method} -> {url}");

		let request = self.authorized_request(&url, &body).await?;
		let response = request.send().await?;

		if response.status() == reqwest::StatusCode::UNAUTHORIZED {
			tracing::info!("upstream 401 on {method}, invalidating token and retrying once");
			self.token_source.invalidate();
			let retry = self.authorized_request(&url, &body).await?;
			let response = retry.send().await?;
			if !response.status().is_success() {
				let status = response.status().as_u16();
				let body_text = response.text().await.unwrap_or_default();
				return Err(Error::Upstream { status, body: body_text });
			}
			return Ok(SseStream::new(response.bytes_stream()));
		}

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let body_text = response.text().await.unwrap_or_default();
			return Err(Error::Upstream { status, body: body_text });
		}

		Ok(SseStream::new(response.bytes_stream()))
	}

	async fn read_json_or_error(&self, response: reqwest::Response) -> Result<Value> {
		let status = response.status();
		if !status.is_success() {
			let body_text = response.text().await.unwrap_or_default();
			return Err(Error::Upstream { status: status.as_u16(), body: body_text });
		}
		Ok(response.json::<Value>().await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn url_for_generate_content() {
		let config = ProxyConfig { endpoint: Endpoint::from_static("https://cloudcode-pa.googleapis.com/"), ..ProxyConfig::default() };
		let client = UpstreamClient::new(&config, Arc::new(crate::upstream::EnvTokenSource::new("UNUSED")));
		assert_eq!(client.url_for("generateContent"), "https://cloudcode-pa.googleapis.com/v1internal:generateContent");
	}

	#[test]
	fn url_for_stream_generate_content_adds_sse_query() {
		let config = ProxyConfig { endpoint: Endpoint::from_static("https://cloudcode-pa.googleapis.com/"), ..ProxyConfig::default() };
		let client = UpstreamClient::new(&config, Arc::new(crate::upstream::EnvTokenSource::new("UNUSED")));
		assert_eq!(client.url_for("streamGenerateContent"), "https://cloudcode-pa.googleapis.com/v1internal:streamGenerateContent?alt=sse");
	}
}
