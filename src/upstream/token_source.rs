//! Bearer-token supply for upstream calls (§4.4).
//!
//! Real OAuth acquisition/refresh is an external collaborator's concern;
//! this crate only defines the narrow trait it depends on, plus a trivial
//! environment-variable-backed implementation for tests and local use,
//! grounded on the teacher's closure-adapter `AuthDataProviderSync` pattern.

use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Supplies (and can be told to discard) a bearer token for upstream calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
	async fn token(&self) -> Result<String>;
	fn invalidate(&self);
}

impl std::fmt::Debug for dyn TokenSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("dyn TokenSource { .. }")
	}
}

/// Reads the token from an environment variable on every call; `invalidate`
/// is a no-op (there is nothing cached to discard). Intended for tests and
/// local development against a pre-issued token, not production OAuth flow.
pub struct EnvTokenSource {
	var_name: String,
	invalidated: AtomicBool,
}

impl EnvTokenSource {
	pub fn new(var_name: impl Into<String>) -> Self {
		EnvTokenSource { var_name: var_name.into(), invalidated: AtomicBool::new(false) }
	}
}

#[async_trait]
impl TokenSource for EnvTokenSource {
	async fn token(&self) -> Result<String> {
		std::env::var(&self.var_name).map_err(|_| Error::TokenUnavailable { cause: format!("environment variable `{}` not set", self.var_name) })
	}

	fn invalidate(&self) {
		self.invalidated.store(true, Ordering::Relaxed);
	}
}
