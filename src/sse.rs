//! Hand-rolled SSE line/envelope parser (§4.2).
//!
//! A `data: `-line accumulator driven by `poll_next`, in the style of the
//! teacher's `WebStream`: a pending-bytes remainder is retained across
//! chunks so a line split mid-chunk is never lost or misparsed.

use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};

const DATA_PREFIX: &str = "data: ";

/// Wraps a byte stream (as produced by `reqwest`'s `bytes_stream`) and yields
/// one parsed JSON envelope per SSE event.
pub struct SseStream<S> {
	inner: Pin<Box<S>>,
	pending: String,
	accumulator: String,
	done: bool,
}

impl<S> SseStream<S>
where
	S: Stream<Item = reqwest::Result<Bytes>>,
{
	pub fn new(inner: S) -> Self {
		SseStream { inner: Box::pin(inner), pending: String::new(), accumulator: String::new(), done: false }
	}

	/// Drains complete lines out of `self.pending`, feeding each to
	/// `try_consume_line`. Returns `Some(envelope)` as soon as a blank line
	/// terminates a non-empty accumulator.
	fn drain_lines(&mut self) -> Option<Value> {
		loop {
			let Some(newline_pos) = self.pending.find('\n') else { return None };
			let line: String = self.pending.drain(..=newline_pos).collect();
			let line = line.trim_end_matches(['\n', '\r']);
			if let Some(envelope) = self.consume_line(line) {
				return Some(envelope);
			}
		}
	}

	fn consume_line(&mut self, line: &str) -> Option<Value> {
		if line.is_empty() {
			if self.accumulator.is_empty() {
				return None;
			}
			return self.finish_envelope();
		}
		if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
			self.accumulator.push_str(payload);
		}
		None
	}

	fn finish_envelope(&mut self) -> Option<Value> {
		let raw = std::mem::take(&mut self.accumulator);
		match serde_json::from_str(&raw) {
			Ok(value) => Some(value),
			Err(err) => {
				let truncated: String = raw.chars().take(200).collect();
				tracing::warn!("SSE envelope parse failed (skipping). Cause: {err}. Data: {truncated}");
				None
			}
		}
	}
}

impl<S> Stream for SseStream<S>
where
	S: Stream<Item = reqwest::Result<Bytes>>,
{
	type Item = Value;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			if let Some(envelope) = this.drain_lines() {
				return Poll::Ready(Some(envelope));
			}
			if this.done {
				return Poll::Ready(None);
			}
			match this.inner.as_mut().poll_next(cx) {
				Poll::Ready(Some(Ok(bytes))) => {
					this.pending.push_str(&String::from_utf8_lossy(&bytes));
				}
				Poll::Ready(Some(Err(err))) => {
					tracing::warn!("upstream byte stream error while reading SSE: {err}");
					this.done = true;
				}
				Poll::Ready(None) => {
					this.done = true;
					// One final parse attempt on whatever is left unterminated.
					if !this.pending.is_empty() {
						let leftover = std::mem::take(&mut this.pending);
						if let Some(payload) = leftover.trim_end_matches(['\n', '\r']).strip_prefix(DATA_PREFIX) {
							this.accumulator.push_str(payload);
						}
					}
					if let Some(envelope) = this.finish_envelope() {
						return Poll::Ready(Some(envelope));
					}
				}
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}
