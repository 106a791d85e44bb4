//! Proxy configuration surface (§4.10, ambient).
//!
//! Populated by the embedding binary (CLI parsing and environment-variable
//! resolution are out of scope here) but typed and validated in this crate.
//! Construction never touches the filesystem; opening the signature cache's
//! durable store is a separate, fallible step ([`crate::cache::SignatureCache::open`])
//! so tests can substitute a temp path.

use crate::fallback::FallbackTable;
use crate::models;
use std::path::PathBuf;
use std::sync::Arc;

/// An upstream base URL, cheaply clonable (c.f. the teacher's `resolver::Endpoint`).
#[derive(Debug, Clone)]
pub struct Endpoint {
	inner: EndpointInner,
}

#[derive(Debug, Clone)]
enum EndpointInner {
	Static(&'static str),
	Owned(Arc<str>),
}

impl Endpoint {
	pub fn from_static(url: &'static str) -> Self {
		Endpoint { inner: EndpointInner::Static(url) }
	}

	pub fn from_owned(url: impl Into<Arc<str>>) -> Self {
		Endpoint { inner: EndpointInner::Owned(url.into()) }
	}

	pub fn base_url(&self) -> &str {
		match &self.inner {
			EndpointInner::Static(url) => url,
			EndpointInner::Owned(url) => url,
		}
	}
}

impl Default for Endpoint {
	fn default() -> Self {
		Endpoint::from_static(models::DEFAULT_ENDPOINT)
	}
}

/// Top-level configuration this crate needs to operate.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
	/// `Some` when the embedding binary (flag or `GOOGLE_CLOUD_PROJECT`) already
	/// knows the project id; `None` triggers the onboarding handshake on first use.
	pub project: Option<String>,
	pub endpoint: Endpoint,
	pub api_version: &'static str,
	/// Durable signature-cache file path, e.g. `~/.gemini/signature-cache.json`.
	pub cache_path: PathBuf,
	pub fallback_table: FallbackTable,
	pub default_temperature: f64,
}

impl Default for ProxyConfig {
	fn default() -> Self {
		ProxyConfig {
			project: None,
			endpoint: Endpoint::default(),
			api_version: models::DEFAULT_API_VERSION,
			cache_path: default_cache_path(),
			fallback_table: FallbackTable::default(),
			default_temperature: models::DEFAULT_TEMPERATURE,
		}
	}
}

fn default_cache_path() -> PathBuf {
	let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
	PathBuf::from(home).join(".gemini").join("signature-cache.json")
}
