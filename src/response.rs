//! Non-streaming caller-dialect response assembly (§6).
//!
//! The streaming transformer ([`crate::stream::ResponseTransformer`]) is the
//! heart of this crate, but a `generateContent` (non-streaming) call returns
//! its whole candidate in one envelope rather than an SSE sequence. This
//! module walks that single envelope with the same per-part rules §4.3
//! describes for the streaming path — thought capture, the `<thinking>`
//! splitter run one-shot, tool-call minting, signature caching — and
//! collects the result into one `{choices:[{message, finish_reason}]}` body
//! instead of emitting chunks.

use crate::cache::SignatureCache;
use crate::stream::{ThinkingSplitter, ToolCallDelta, ToolCallFunctionDelta, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use uuid::Uuid;

/// The caller-facing non-streaming chat-completion response.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
	pub id: String,
	pub object: &'static str,
	pub created: u64,
	pub model: String,
	pub choices: Vec<ChatResponseChoice>,
	pub usage: Option<Usage>,
	/// Set only when the fallback coordinator retried this call against an
	/// alternate model (§4.5); absent on the ordinary happy path.
	pub fallback_notice: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseChoice {
	pub index: u32,
	pub message: ChatResponseMessage,
	pub finish_reason: &'static str,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponseMessage {
	pub role: &'static str,
	pub content: Option<String>,
	pub tool_calls: Option<Vec<ToolCallDelta>>,
	// Reasoning aliases (§6); only the primary pair is emitted.
	pub thinking: Option<String>,
	pub signature: Option<String>,
}

/// Build a [`ChatResponse`] from one upstream `generateContent` envelope.
///
/// `cache` captures any thought signature observed against every tool call
/// minted in this turn, exactly as the streaming path does (§3 invariant:
/// "a thought_signature observed on any part of an assistant turn is
/// associated with every tool_call_id generated during that same turn").
pub fn build_chat_response(envelope: &Value, id: impl Into<String>, model: impl Into<String>, created: u64, cache: &SignatureCache) -> ChatResponse {
	let id = id.into();
	let model = model.into();

	let mut visible_content = String::new();
	let mut thought_text = String::new();
	let mut current_signature: Option<String> = None;
	let mut tool_calls: Vec<ToolCallDelta> = Vec::new();
	let mut splitter = ThinkingSplitter::new();

	let parts = envelope.pointer("/response/candidates/0/content/parts").and_then(Value::as_array).cloned().unwrap_or_default();

	for part in &parts {
		if let Some(function_call) = part.get("functionCall") {
			if current_signature.is_none() {
				if let Some(sig) = part.get("thoughtSignature").and_then(Value::as_str) {
					current_signature = Some(sig.to_string());
				}
			}
			let name = function_call.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
			let args = function_call.get("args").cloned().unwrap_or_else(|| Value::Object(Default::default()));
			let tool_call_id = format!("call_{}", Uuid::new_v4());
			if current_signature.is_some() {
				if let Err(err) = cache.store(tool_call_id.clone(), current_signature.clone(), thought_text.clone()) {
					tracing::warn!("failed to persist thought signature: {err}");
				}
			}
			tool_calls.push(ToolCallDelta {
				index: tool_calls.len() as u32,
				id: tool_call_id,
				kind: "function",
				function: ToolCallFunctionDelta { name, arguments: serde_json::to_string(&args).unwrap_or_default() },
			});
			continue;
		}

		if let Some(text) = part.get("text").and_then(Value::as_str) {
			let is_thought = part.get("thought").and_then(Value::as_bool).unwrap_or(false);
			if is_thought {
				if let Some(sig) = part.get("thoughtSignature").and_then(Value::as_str) {
					current_signature = Some(sig.to_string());
				}
				thought_text.push_str(text);
			} else {
				for event in splitter.process(text) {
					match event {
						crate::stream::SplitEvent::Content(visible) => visible_content.push_str(&visible),
						crate::stream::SplitEvent::Thought(thought) => thought_text.push_str(&thought),
					}
				}
			}
		}
	}
	match splitter.flush() {
		Some(crate::stream::SplitEvent::Thought(thought)) => thought_text.push_str(&thought),
		Some(crate::stream::SplitEvent::Content(content)) => visible_content.push_str(&content),
		None => {}
	}

	let usage = envelope.pointer("/response/usageMetadata").map(|usage_meta| {
		let prompt = usage_meta.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
		let completion = usage_meta.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0) as u32;
		Usage::from_prompt_and_completion(prompt, completion)
	});

	let finish_reason = if tool_calls.is_empty() { "stop" } else { "tool_calls" };
	let message = ChatResponseMessage {
		role: "assistant",
		content: if visible_content.is_empty() { None } else { Some(visible_content) },
		tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
		thinking: if thought_text.is_empty() { None } else { Some(thought_text) },
		signature: current_signature,
	};

	ChatResponse {
		id,
		object: "chat.completion",
		created,
		model,
		choices: vec![ChatResponseChoice { index: 0, message, finish_reason }],
		usage,
		fallback_notice: None,
	}
}
