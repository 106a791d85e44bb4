//! Rate-limit fallback policy and coordinator (§4.5).
//!
//! Wraps both the non-streaming and streaming upstream paths: on a rate-limit
//! `Error::Upstream` for a model that has an eligible fallback, re-drives the
//! request once against the fallback model and prepends a human-readable
//! notification to the output. The streaming path injects the notification as
//! a synthetic leading envelope fed through a freshly-constructed
//! [`ResponseTransformer`], so first-chunk role framing is earned the same
//! way a real content chunk earns it rather than being special-cased.

use crate::cache::SignatureCache;
use crate::error::{Error, Result};
use crate::stream::ResponseTransformer;
use futures::Stream;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Statuses the coordinator treats as rate-limit conditions eligible for fallback.
const RATE_LIMIT_STATUSES: &[u16] = &[429, 503];

/// Default fallback chain, grounded on the proxy's known model table
/// ([`crate::models::KNOWN_MODELS`]): each thinking model steps down to the
/// next cheaper one; the cheapest model is the bottom of its chain and has no
/// fallback.
const DEFAULT_FALLBACK_CHAIN: &[(&str, &str)] = &[("gemini-2.5-pro", "gemini-2.5-flash"), ("gemini-2.5-flash", "gemini-2.5-flash-lite")];

/// Static table mapping a model to its (at most one) fallback.
#[derive(Debug, Clone)]
pub struct FallbackTable {
	chain: HashMap<String, String>,
}

impl Default for FallbackTable {
	fn default() -> Self {
		FallbackTable { chain: DEFAULT_FALLBACK_CHAIN.iter().map(|(from, to)| (from.to_string(), to.to_string())).collect() }
	}
}

impl FallbackTable {
	pub fn fallback_for(&self, model: &str) -> Option<&str> {
		self.chain.get(model).map(String::as_str)
	}

	pub fn is_rate_limit_status(status: u16) -> bool {
		RATE_LIMIT_STATUSES.contains(&status)
	}
}

/// One human-readable line prepended to the output of a fallback attempt.
pub fn fallback_notification(original_model: &str, fallback_model: &str) -> String {
	format!("_Note: `{original_model}` is rate-limited; this response was generated by `{fallback_model}` instead._\n\n")
}

/// A synthetic Gemini envelope carrying only a visible text part, shaped
/// exactly like a real `generateContent` envelope so it can be fed through
/// [`ResponseTransformer`] without any special-casing downstream.
fn notification_envelope(text: String) -> Value {
	serde_json::json!({"response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}})
}

pub struct FallbackCoordinator {
	table: FallbackTable,
}

impl FallbackCoordinator {
	pub fn new(table: FallbackTable) -> Self {
		FallbackCoordinator { table }
	}

	/// The fallback model eligible for `model` given an observed `status`, or
	/// `None` if the error should propagate untouched.
	pub fn eligible_fallback(&self, model: &str, status: u16) -> Option<&str> {
		if !FallbackTable::is_rate_limit_status(status) {
			return None;
		}
		self.table.fallback_for(model)
	}

	/// Wraps a non-streaming call. `call` is re-invoked with the fallback
	/// model name once on an eligible rate-limit error.
	pub async fn call_non_streaming<F, Fut, T>(&self, model: &str, call: F) -> Result<(T, Option<String>)>
	where
		F: Fn(String) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		match call(model.to_string()).await {
			Ok(value) => Ok((value, None)),
			Err(Error::Upstream { status, body }) => match self.eligible_fallback(model, status) {
				Some(fallback_model) => {
					let fallback_model = fallback_model.to_string();
					tracing::warn!("{model} rate limited (status {status}), retrying against fallback model {fallback_model}");
					let value = call(fallback_model.clone()).await.map_err(|_| Error::FallbackExhausted { original_status: status })?;
					Ok((value, Some(fallback_notification(model, &fallback_model))))
				}
				None => Err(Error::Upstream { status, body }),
			},
			Err(other) => Err(other),
		}
	}

	/// Wraps a streaming call. `make_envelopes` drives the upstream request
	/// for a given model and must fail before yielding any envelope on a
	/// rate-limit error (§4.5: "the error occurs before any data chunk is
	/// produced in this design"). Returns a transformer built from either the
	/// original envelope stream or, on fallback, a synthetic notification
	/// envelope chained ahead of the fallback model's envelope stream.
	pub async fn call_streaming<F, Fut, S>(
		&self,
		model: &str,
		id: impl Into<String>,
		created: u64,
		cache: Arc<SignatureCache>,
		make_envelopes: F,
	) -> Result<ResponseTransformer<Pin<Box<dyn Stream<Item = Value> + Send>>>>
	where
		F: Fn(String) -> Fut,
		Fut: Future<Output = Result<S>>,
		S: Stream<Item = Value> + Send + 'static,
	{
		let id = id.into();
		match make_envelopes(model.to_string()).await {
			Ok(envelopes) => {
				let boxed: Pin<Box<dyn Stream<Item = Value> + Send>> = Box::pin(envelopes);
				Ok(ResponseTransformer::new(boxed, id, model, created, cache))
			}
			Err(Error::Upstream { status, body }) => match self.eligible_fallback(model, status) {
				Some(fallback_model) => {
					let fallback_model = fallback_model.to_string();
					tracing::warn!("{model} rate limited (status {status}), retrying stream against fallback model {fallback_model}");
					let notification = fallback_notification(model, &fallback_model);
					let envelopes = make_envelopes(fallback_model.clone()).await.map_err(|_| Error::FallbackExhausted { original_status: status })?;
					let synthetic = stream::once(async move { notification_envelope(notification) });
					let combined: Pin<Box<dyn Stream<Item = Value> + Send>> = Box::pin(synthetic.chain(envelopes));
					Ok(ResponseTransformer::new(combined, id, fallback_model, created, cache))
				}
				None => Err(Error::Upstream { status, body }),
			},
			Err(other) => Err(other),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;
	use std::sync::atomic::{AtomicU32, Ordering};

	fn cache() -> Arc<SignatureCache> {
		let dir = tempfile::tempdir().unwrap();
		Arc::new(SignatureCache::open(dir.path().join("c.json")).unwrap())
	}

	#[test]
	fn bottom_of_chain_model_has_no_fallback() {
		let table = FallbackTable::default();
		assert!(table.fallback_for("gemini-2.5-flash-lite").is_none());
	}

	#[test]
	fn thinking_model_has_fallback() {
		let table = FallbackTable::default();
		assert_eq!(table.fallback_for("gemini-2.5-pro"), Some("gemini-2.5-flash"));
	}

	#[test]
	fn non_rate_limit_status_is_never_eligible() {
		let coordinator = FallbackCoordinator::new(FallbackTable::default());
		assert!(coordinator.eligible_fallback("gemini-2.5-pro", 400).is_none());
	}

	#[tokio::test]
	async fn non_streaming_retries_once_against_fallback_on_429() {
		let coordinator = FallbackCoordinator::new(FallbackTable::default());
		let calls = AtomicU32::new(0);
		let result = coordinator
			.call_non_streaming("gemini-2.5-pro", |model| {
				let n = calls.fetch_add(1, Ordering::SeqCst);
				async move {
					if n == 0 {
						assert_eq!(model, "gemini-2.5-pro");
						Err(Error::Upstream { status: 429, body: "rate limited".into() })
					} else {
						assert_eq!(model, "gemini-2.5-flash");
						Ok(serde_json::json!({"ok": true}))
					}
				}
			})
			.await
			.unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert_eq!(result.0, serde_json::json!({"ok": true}));
		assert!(result.1.unwrap().contains("gemini-2.5-flash"));
	}

	#[tokio::test]
	async fn non_streaming_propagates_non_rate_limit_error_untouched() {
		let coordinator = FallbackCoordinator::new(FallbackTable::default());
		let result: Result<(Value, Option<String>)> =
			coordinator.call_non_streaming("gemini-2.5-pro", |_| async { Err(Error::Upstream { status: 403, body: "nope".into() }) }).await;
		assert!(matches!(result, Err(Error::Upstream { status: 403, .. })));
	}

	#[tokio::test]
	async fn bottom_of_chain_model_propagates_rate_limit_without_retry() {
		let coordinator = FallbackCoordinator::new(FallbackTable::default());
		let calls = AtomicU32::new(0);
		let result: Result<(Value, Option<String>)> = coordinator
			.call_non_streaming("gemini-2.5-flash-lite", |_| {
				calls.fetch_add(1, Ordering::SeqCst);
				async { Err(Error::Upstream { status: 429, body: "rate limited".into() }) }
			})
			.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn streaming_fallback_prepends_notification_and_resets_first_chunk_framing() {
		let coordinator = FallbackCoordinator::new(FallbackTable::default());
		let transformer = coordinator
			.call_streaming("gemini-2.5-pro", "chatcmpl-1", 0, cache(), |model| async move {
				if model == "gemini-2.5-pro" {
					Err(Error::Upstream { status: 429, body: "rate limited".into() })
				} else {
					let envelope = serde_json::json!({
						"response": {"candidates": [{"content": {"parts": [{"text": "real answer"}]}}]}
					});
					Ok(stream::iter(vec![envelope]))
				}
			})
			.await
			.unwrap();
		let chunks: Vec<_> = transformer.collect().await;
		// Exactly one role-bearing chunk (the notification, now first).
		let role_chunks = chunks.iter().filter(|c| c.choices[0].delta.role.is_some()).count();
		assert_eq!(role_chunks, 1);
		assert_eq!(chunks[0].choices[0].delta.role, Some("assistant"));
		assert!(chunks[0].choices[0].delta.content.as_deref().unwrap().contains("gemini-2.5-flash"));
		let visible: String = chunks.iter().filter_map(|c| c.choices[0].delta.content.clone()).collect();
		assert!(visible.ends_with("real answer"));
	}
}
