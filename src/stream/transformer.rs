//! Streaming response transformer: upstream SSE envelopes -> downstream
//! caller-dialect chunks (§4.3).

use crate::cache::SignatureCache;
use crate::stream::chunk::{ChatCompletionChunk, ChunkChoice, Delta, ToolCallDelta, ToolCallFunctionDelta, Usage};
use crate::stream::thinking_splitter::{SplitEvent, ThinkingSplitter};
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use uuid::Uuid;

/// Consumes parsed SSE envelopes and yields [`ChatCompletionChunk`]s,
/// producing exactly one terminal chunk per stream.
pub struct ResponseTransformer<S> {
	inner: Pin<Box<S>>,
	id: String,
	model: String,
	created: u64,
	cache: Arc<SignatureCache>,

	first_chunk: bool,
	tool_call_emitted: bool,
	usage: Option<Usage>,
	current_thought_signature: Option<String>,
	accumulated_thought_text: String,
	splitter: ThinkingSplitter,

	pending: VecDeque<ChatCompletionChunk>,
	upstream_exhausted: bool,
	terminal_emitted: bool,
}

impl<S> ResponseTransformer<S>
where
	S: Stream<Item = Value>,
{
	pub fn new(inner: S, id: impl Into<String>, model: impl Into<String>, created: u64, cache: Arc<SignatureCache>) -> Self {
		ResponseTransformer {
			inner: Box::pin(inner),
			id: id.into(),
			model: model.into(),
			created,
			cache,
			first_chunk: true,
			tool_call_emitted: false,
			usage: None,
			current_thought_signature: None,
			accumulated_thought_text: String::new(),
			splitter: ThinkingSplitter::new(),
			pending: VecDeque::new(),
			upstream_exhausted: false,
			terminal_emitted: false,
		}
	}

	fn make_chunk(&mut self, mut delta: Delta, finish_reason: Option<&'static str>) -> ChatCompletionChunk {
		if self.first_chunk {
			delta.role = Some("assistant");
			if delta.tool_calls.is_some() && delta.content.is_none() {
				delta.content_is_explicit_null = true;
			}
			self.first_chunk = false;
		}
		ChatCompletionChunk {
			id: self.id.clone(),
			object: "chat.completion.chunk",
			created: self.created,
			model: self.model.clone(),
			choices: vec![ChunkChoice { index: 0, delta, finish_reason }],
			usage: if finish_reason.is_some() { self.usage } else { None },
		}
	}

	fn process_envelope(&mut self, envelope: Value) {
		if let Some(usage_meta) = envelope.pointer("/response/usageMetadata") {
			let prompt = usage_meta.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
			let completion = usage_meta.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
			self.usage = Some(Usage::from_prompt_and_completion(prompt, completion));
		}

		let Some(parts) = envelope.pointer("/response/candidates/0/content/parts").and_then(Value::as_array) else {
			return;
		};

		for part in parts {
			self.process_part(part);
		}
	}

	fn process_part(&mut self, part: &Value) {
		if let Some(function_call) = part.get("functionCall") {
			self.process_function_call(part, function_call);
			return;
		}
		if let Some(text) = part.get("text").and_then(Value::as_str) {
			let is_thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
			let signature = part.get("thoughtSignature").and_then(Value::as_str).map(str::to_string);
			if is_thought {
				self.process_thought_text(text, signature);
			} else {
				self.process_visible_text(text);
			}
		}
	}

	fn process_thought_text(&mut self, text: &str, signature: Option<String>) {
		if signature.is_some() {
			self.current_thought_signature = signature;
		}
		self.accumulated_thought_text.push_str(text);
		let delta = Delta::thinking(text, self.current_thought_signature.clone());
		let chunk = self.make_chunk(delta, None);
		self.pending.push_back(chunk);
	}

	fn process_visible_text(&mut self, text: &str) {
		let events = self.splitter.process(text);
		for event in events {
			match event {
				SplitEvent::Content(visible) => {
					let chunk = self.make_chunk(Delta::content(visible), None);
					self.pending.push_back(chunk);
				}
				SplitEvent::Thought(thought) => {
					self.accumulated_thought_text.push_str(&thought);
					let delta = Delta::thinking(thought, self.current_thought_signature.clone());
					let chunk = self.make_chunk(delta, None);
					self.pending.push_back(chunk);
				}
			}
		}
	}

	fn process_function_call(&mut self, part: &Value, function_call: &Value) {
		if self.current_thought_signature.is_none() {
			if let Some(signature) = part.get("thoughtSignature").and_then(Value::as_str) {
				self.current_thought_signature = Some(signature.to_string());
			}
		}

		let name = function_call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
		let args = function_call.get("args").cloned().unwrap_or_else(|| Value::Object(Default::default()));
		let tool_call_id = format!("call_{}", Uuid::new_v4());

		if self.current_thought_signature.is_some() {
			if let Err(err) =
				self.cache.store(tool_call_id.clone(), self.current_thought_signature.clone(), self.accumulated_thought_text.clone())
			{
				tracing::warn!("failed to persist thought signature: {err}");
			}
		}

		self.tool_call_emitted = true;
		let delta = Delta::tool_call(ToolCallDelta {
			index: 0,
			id: tool_call_id,
			kind: "function",
			function: ToolCallFunctionDelta { name, arguments: serde_json::to_string(&args).unwrap_or_default() },
		});
		let chunk = self.make_chunk(delta, None);
		self.pending.push_back(chunk);
	}

	fn terminal_chunk(&mut self) -> ChatCompletionChunk {
		let finish_reason = if self.tool_call_emitted { "tool_calls" } else { "stop" };
		self.make_chunk(Delta::default(), Some(finish_reason))
	}
}

impl<S> Stream for ResponseTransformer<S>
where
	S: Stream<Item = Value>,
{
	type Item = ChatCompletionChunk;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			if let Some(chunk) = this.pending.pop_front() {
				return Poll::Ready(Some(chunk));
			}
			if this.terminal_emitted {
				return Poll::Ready(None);
			}
			if this.upstream_exhausted {
				this.terminal_emitted = true;
				if let Some(event) = this.splitter.flush() {
					match event {
						SplitEvent::Content(visible) => {
							let chunk = this.make_chunk(Delta::content(visible), None);
							this.pending.push_back(chunk);
						}
						SplitEvent::Thought(thought) => {
							this.accumulated_thought_text.push_str(&thought);
							let delta = Delta::thinking(thought, this.current_thought_signature.clone());
							let chunk = this.make_chunk(delta, None);
							this.pending.push_back(chunk);
						}
					}
				}
				let chunk = this.terminal_chunk();
				this.pending.push_back(chunk);
				continue;
			}
			match this.inner.as_mut().poll_next(cx) {
				Poll::Ready(Some(envelope)) => this.process_envelope(envelope),
				Poll::Ready(None) => this.upstream_exhausted = true,
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;
	use futures::stream;

	fn cache() -> Arc<SignatureCache> {
		let dir = tempfile::tempdir().unwrap();
		Arc::new(SignatureCache::open(dir.path().join("c.json")).unwrap())
	}

	async fn collect(envelopes: Vec<Value>) -> Vec<ChatCompletionChunk> {
		let transformer = ResponseTransformer::new(stream::iter(envelopes), "chatcmpl-1", "gemini-2.5-pro", 1_700_000_000, cache());
		transformer.collect().await
	}

	#[tokio::test]
	async fn first_chunk_carries_assistant_role_and_terminal_carries_finish_reason() {
		let envelope = serde_json::json!({
			"response": {"candidates": [{"content": {"parts": [{"text": "hi"}]}}]}
		});
		let chunks = collect(vec![envelope]).await;
		assert_eq!(chunks.len(), 2);
		assert_eq!(chunks[0].choices[0].delta.role, Some("assistant"));
		assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("hi"));
		assert_eq!(chunks[1].choices[0].finish_reason, Some("stop"));
	}

	#[tokio::test]
	async fn tool_call_part_sets_tool_calls_finish_reason() {
		let envelope = serde_json::json!({
			"response": {"candidates": [{"content": {"parts": [
				{"functionCall": {"name": "get_weather", "args": {"city": "nyc"}}}
			]}}]}
		});
		let chunks = collect(vec![envelope]).await;
		let last = chunks.last().unwrap();
		assert_eq!(last.choices[0].finish_reason, Some("tool_calls"));
		let first = &chunks[0];
		assert!(first.choices[0].delta.tool_calls.is_some());
		assert_eq!(first.choices[0].delta.role, Some("assistant"));
		// First chunk carries a tool call and no content of its own, so it must
		// serialize an explicit `"content": null` rather than omit the key.
		let json = serde_json::to_value(first).unwrap();
		assert!(json["choices"][0]["delta"]["content"].is_null());
	}

	#[tokio::test]
	async fn thought_part_emits_thinking_delta_and_caches_signature_with_tool_call() {
		let cache = cache();
		let envelope = serde_json::json!({
			"response": {"candidates": [{"content": {"parts": [
				{"text": "reasoning...", "thought": true, "thoughtSignature": "sig-abc"},
				{"functionCall": {"name": "f", "args": {}}}
			]}}]}
		});
		let transformer = ResponseTransformer::new(stream::iter(vec![envelope]), "id", "model", 0, Arc::clone(&cache));
		let chunks: Vec<_> = transformer.collect().await;
		let tool_chunk = chunks.iter().find(|c| c.choices[0].delta.tool_calls.is_some()).unwrap();
		let tool_call_id = tool_chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0].id.clone();
		let cached = cache.get(&tool_call_id).unwrap();
		assert_eq!(cached.signature.as_deref(), Some("sig-abc"));
		assert_eq!(cached.thought_text, "reasoning...");
	}

	#[tokio::test]
	async fn thinking_tag_in_visible_text_is_excised_across_envelope_boundaries() {
		let envelopes = vec![
			serde_json::json!({"response": {"candidates": [{"content": {"parts": [{"text": "a<thi"}]}}]}}),
			serde_json::json!({"response": {"candidates": [{"content": {"parts": [{"text": "nking>secret</thinking>b"}]}}]}}),
		];
		let chunks = collect(envelopes).await;
		let content: String = chunks.iter().filter_map(|c| c.choices[0].delta.content.clone()).collect();
		let thinking: String = chunks.iter().filter_map(|c| c.choices[0].delta.thinking.clone()).collect();
		assert_eq!(content, "ab");
		assert_eq!(thinking, "secret");
	}

	#[tokio::test]
	async fn usage_attaches_only_to_terminal_chunk() {
		let envelope = serde_json::json!({
			"response": {
				"candidates": [{"content": {"parts": [{"text": "hi"}]}}],
				"usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
			}
		});
		let chunks = collect(vec![envelope]).await;
		assert!(chunks[0].usage.is_none());
		let usage = chunks.last().unwrap().usage.unwrap();
		assert_eq!(usage.total_tokens, 15);
	}

	#[tokio::test]
	async fn unterminated_partial_tag_at_stream_end_is_flushed_as_content() {
		let envelope = serde_json::json!({
			"response": {"candidates": [{"content": {"parts": [{"text": "trailing<thi"}]}}]}
		});
		let chunks = collect(vec![envelope]).await;
		let content: String = chunks.iter().filter_map(|c| c.choices[0].delta.content.clone()).collect();
		assert_eq!(content, "trailing<thi");
		assert_eq!(chunks.last().unwrap().choices[0].finish_reason, Some("stop"));
	}

	#[tokio::test]
	async fn empty_stream_still_emits_one_terminal_chunk_with_assistant_role() {
		let chunks = collect(vec![]).await;
		assert_eq!(chunks.len(), 1);
		assert_eq!(chunks[0].choices[0].delta.role, Some("assistant"));
		assert_eq!(chunks[0].choices[0].finish_reason, Some("stop"));
	}
}
